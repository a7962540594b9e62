use async_trait::async_trait;
use reqwest::Client;
use shared::{domain::PumpCommand, error::FetchError, protocol::signal_body};
use tracing::debug;
use url::Url;

use crate::{error::classify_reqwest_error, transport::SignalTransport};

/// Posts `{"<field>": "0"|"1"}` to the actuator endpoint.
#[derive(Clone)]
pub struct SignalClient {
    http: Client,
    endpoint: Url,
    field: String,
}

impl SignalClient {
    pub fn new(http: Client, endpoint: Url, field: impl Into<String>) -> Self {
        Self {
            http,
            endpoint,
            field: field.into(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub async fn send_signal(&self, command: PumpCommand) -> Result<(), FetchError> {
        let ack = self
            .http
            .post(self.endpoint.clone())
            .json(&signal_body(&self.field, command))
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?
            .text()
            .await
            .map_err(classify_reqwest_error)?;
        debug!(%command, ack = %ack.trim(), "pump: signal acknowledged");
        Ok(())
    }
}

#[async_trait]
impl SignalTransport for SignalClient {
    async fn send_signal(&self, command: PumpCommand) -> Result<(), FetchError> {
        SignalClient::send_signal(self, command).await
    }
}

#[cfg(test)]
#[path = "tests/signal_client_tests.rs"]
mod tests;
