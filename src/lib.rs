//! Edge device-provider agent
//!
//! Receives device and provider lifecycle notifications, registers newly seen
//! devices, and executes batched actuation commands, reporting one outcome per
//! command back to the device-provider service.

pub mod actuation;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod registration;
pub mod vault;
