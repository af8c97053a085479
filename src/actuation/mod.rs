//! Actuation command execution
//!
//! This module handles:
//! - Running every command of an inbound edge message in its own task
//! - Bounding concurrent actuator calls and their duration
//! - Reporting exactly one outcome per command upstream

mod actuator;
mod executor;

#[cfg(test)]
pub(crate) mod testing;

pub use actuator::{Actuator, ActuatorError, LoggingActuator};
pub use executor::{ActuationExecutor, ExecutorConfig};
