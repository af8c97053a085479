//! Event dispatch for the edge agent
//!
//! This module handles:
//! - Receiving provider events from the gateway
//! - Routing each event kind to its handler
//! - Owning the actuation pool for the agent's lifetime

mod dispatcher;

pub use dispatcher::{Dispatcher, ProviderEvent};
