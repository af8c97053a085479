//! Actuator invocation point

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Why an actuator call did not succeed
#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("Actuator {0} is unavailable")]
    Unavailable(String),

    #[error("Actuator rejected value: {0}")]
    Rejected(String),

    #[error("Actuator call timed out after {0}ms")]
    Timeout(u64),

    #[error("Actuator call panicked")]
    Panicked,
}

/// Drives a physical actuator.
///
/// The agent only knows the contract: an actuator id and an opaque value go
/// in, success or failure comes out.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn actuate(&self, actuator_id: &str, value: &str) -> Result<(), ActuatorError>;
}

/// Actuator that only records the call in the log.
///
/// Used until a hardware binding is plugged in.
pub struct LoggingActuator;

#[async_trait]
impl Actuator for LoggingActuator {
    async fn actuate(&self, actuator_id: &str, value: &str) -> Result<(), ActuatorError> {
        info!(actuator_id, value, "[ACTUATOR] Actuating");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_actuator_always_succeeds() {
        assert!(LoggingActuator.actuate("A1", "10").await.is_ok());
        assert!(LoggingActuator.actuate("", "").await.is_ok());
    }
}
