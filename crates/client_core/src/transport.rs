use async_trait::async_trait;
use shared::{
    domain::{LeakageResult, PumpCommand, SensorReading},
    error::FetchError,
};

#[async_trait]
pub trait PredictionTransport: Send + Sync {
    /// One attempt, no retries. A 2xx body without a leakage field resolves
    /// to `LeakageResult::UnexpectedFormat` rather than an error.
    async fn predict(&self, reading: SensorReading) -> Result<LeakageResult, FetchError>;
}

#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn send_signal(&self, command: PumpCommand) -> Result<(), FetchError>;
}
