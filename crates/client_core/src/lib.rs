use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use shared::domain::{LeakageResult, SensorReading};
use tokio::sync::broadcast;
use tracing::info;

pub mod animation;
pub mod config;
pub mod error;
pub mod prediction_client;
pub mod prediction_controller;
pub mod pump_controller;
pub mod signal_client;
pub mod transport;

pub use animation::{project, project_with_policy, AnimationDirective, OpacityTween};
pub use config::{load_settings, ClientSettings, UpdatePolicy};
pub use error::ErrorInfo;
pub use prediction_client::PredictionClient;
pub use prediction_controller::{PredictionController, PredictionState};
pub use pump_controller::{PumpController, PumpPhase, PumpState, SignalOutcome, SignalTicket};
pub use signal_client::SignalClient;
pub use transport::{PredictionTransport, SignalTransport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum ClientEvent {
    PumpStateChanged {
        state: PumpState,
        animation: AnimationDirective,
    },
    LeakageUpdated {
        seq: u64,
        reading: SensorReading,
        result: LeakageResult,
    },
}

/// Both controllers wired over one HTTP client and one event channel.
pub struct AquaClient {
    pub pump: Arc<PumpController>,
    pub prediction: Arc<PredictionController>,
    events: broadcast::Sender<ClientEvent>,
}

impl AquaClient {
    pub fn from_settings(settings: &ClientSettings) -> Result<Self> {
        settings.validate().context("invalid client settings")?;
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        let predict_url = settings.predict_url()?;
        let signal_url = settings.signal_url()?;
        info!(
            %predict_url,
            %signal_url,
            signal_field = %settings.signal_field,
            policy = ?settings.update_policy,
            "client: configured"
        );

        Ok(Self::with_transports(
            Arc::new(PredictionClient::new(http.clone(), predict_url)),
            Arc::new(SignalClient::new(
                http,
                signal_url,
                settings.signal_field.clone(),
            )),
            settings.update_policy,
        ))
    }

    pub fn with_transports(
        prediction: Arc<dyn PredictionTransport>,
        signal: Arc<dyn SignalTransport>,
        policy: UpdatePolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pump: PumpController::new(signal, policy, events.clone()),
            prediction: PredictionController::new(prediction, events.clone()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
