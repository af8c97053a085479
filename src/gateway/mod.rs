//! Provider gateway: the agent's link to the remote device-provider service
//!
//! This module handles:
//! - The outbound submission contract (`ProviderGateway`)
//! - A reconnecting TCP reference implementation
//! - Persisting the provider session credential in the vault

mod tcp;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use tcp::{GatewayConfig, GatewayEvent, GatewayEvents, TcpGateway};
pub use traits::{CommunicationError, ProviderGateway};

#[cfg(test)]
pub use traits::MockProviderGateway;
