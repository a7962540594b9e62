use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{LeakageResult, SensorReading},
    error::FetchError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{error::ErrorInfo, transport::PredictionTransport, ClientEvent};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionState {
    pub reading: SensorReading,
    pub last_result: Option<LeakageResult>,
    pub last_error: Option<ErrorInfo>,
    pub(crate) latest_seq: u64,
}

/// Owns the sensor inputs and the latest leakage result.
///
/// `evaluate` never fails: transport, status and format problems all resolve
/// to a displayable [`LeakageResult`].
pub struct PredictionController {
    client: Arc<dyn PredictionTransport>,
    inner: Mutex<PredictionState>,
    events: broadcast::Sender<ClientEvent>,
}

impl PredictionController {
    pub fn new(
        client: Arc<dyn PredictionTransport>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            inner: Mutex::new(PredictionState::default()),
            events,
        })
    }

    pub async fn snapshot(&self) -> PredictionState {
        self.inner.lock().await.clone()
    }

    pub async fn last_result(&self) -> Option<LeakageResult> {
        self.inner.lock().await.last_result.clone()
    }

    /// Stores raw form input, coercing anything unparsable to zero.
    pub async fn set_inputs(&self, sensor1: &str, sensor2: &str, pump: &str) -> SensorReading {
        let reading = SensorReading::from_text(sensor1, sensor2, pump);
        self.inner.lock().await.reading = reading;
        reading
    }

    pub async fn evaluate_inputs(&self) -> LeakageResult {
        let reading = self.inner.lock().await.reading;
        self.evaluate(reading).await
    }

    pub fn spawn_evaluate(self: &Arc<Self>, reading: SensorReading) -> JoinHandle<LeakageResult> {
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.evaluate(reading).await })
    }

    pub async fn evaluate(&self, reading: SensorReading) -> LeakageResult {
        let seq = {
            let mut inner = self.inner.lock().await;
            inner.latest_seq += 1;
            inner.reading = reading;
            inner.latest_seq
        };

        let result = match self.client.predict(reading).await {
            Ok(result) => result,
            Err(error) => {
                warn!(seq, %error, "predict: request failed");
                LeakageResult::FetchFailed { error }
            }
        };

        let mut inner = self.inner.lock().await;
        if seq != inner.latest_seq {
            debug!(
                seq,
                latest = inner.latest_seq,
                "predict: discarding superseded result"
            );
            return result;
        }

        inner.last_error = match &result {
            LeakageResult::Value { value } => {
                info!(seq, leakage = %value, "predict: leakage updated");
                None
            }
            LeakageResult::UnexpectedFormat => Some(ErrorInfo::new(
                seq,
                FetchError::format("response is missing the Leakage field"),
            )),
            LeakageResult::FetchFailed { error } => Some(ErrorInfo::new(seq, error.clone())),
        };
        inner.last_result = Some(result.clone());

        let _ = self.events.send(ClientEvent::LeakageUpdated {
            seq,
            reading,
            result: result.clone(),
        });
        result
    }
}

#[cfg(test)]
#[path = "tests/prediction_controller_tests.rs"]
mod tests;
