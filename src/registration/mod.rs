//! Device registration
//!
//! This module handles:
//! - Claiming devices announced by the provider service
//! - Building registration requests with scoped actuator aliases
//! - Submitting them through the provider gateway

mod claimer;
mod workflow;

pub use claimer::{DeviceClaim, DeviceClaimer, StaticClaimer};
pub use workflow::{build_request, RegistrationWorkflow};
