use shared::domain::SensorReading;

/// Produces a leakage verdict (`0` or `1`) for one reading.
pub trait LeakModel: Send + Sync {
    fn predict(&self, reading: &SensorReading) -> u8;
}

/// Flags a leak when the pressure drop between the two line sensors exceeds
/// `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct PressureDifferentialModel {
    pub threshold: f64,
}

impl Default for PressureDifferentialModel {
    fn default() -> Self {
        Self { threshold: 15.0 }
    }
}

impl LeakModel for PressureDifferentialModel {
    fn predict(&self, reading: &SensorReading) -> u8 {
        u8::from(reading.differential() > self.threshold)
    }
}
