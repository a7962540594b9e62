use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{LeakageResult, SensorReading},
    error::FetchError,
    protocol::{parse_predict_response, PredictRequest},
};
use tracing::{debug, warn};
use url::Url;

use crate::{error::classify_reqwest_error, transport::PredictionTransport};

#[derive(Clone)]
pub struct PredictionClient {
    http: Client,
    endpoint: Url,
}

impl PredictionClient {
    pub fn new(http: Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn predict(&self, reading: SensorReading) -> Result<LeakageResult, FetchError> {
        // Re-normalize: the fields are public and JSON has no NaN.
        let reading = SensorReading::new(
            reading.sensor1_pressure,
            reading.sensor2_pressure,
            reading.pump_pressure,
        );
        let body = self
            .http
            .post(self.endpoint.clone())
            .json(&PredictRequest::from(reading))
            .send()
            .await
            .map_err(classify_reqwest_error)?
            .error_for_status()
            .map_err(classify_reqwest_error)?
            .text()
            .await
            .map_err(classify_reqwest_error)?;

        match parse_predict_response(&body) {
            Some(value) => {
                debug!(leakage = %value, "predict: leakage received");
                Ok(LeakageResult::Value { value })
            }
            None => {
                warn!(
                    body_len = body.len(),
                    "predict: response is missing a usable Leakage field"
                );
                Ok(LeakageResult::UnexpectedFormat)
            }
        }
    }
}

#[async_trait]
impl PredictionTransport for PredictionClient {
    async fn predict(&self, reading: SensorReading) -> Result<LeakageResult, FetchError> {
        PredictionClient::predict(self, reading).await
    }
}

#[cfg(test)]
#[path = "tests/prediction_client_tests.rs"]
mod tests;
