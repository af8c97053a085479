//! Provider gateway abstraction for pluggable service transports

use async_trait::async_trait;
use edge_agent_shared::{codec::CodecError, DeviceRegistrationRequest, EdgeMessage};
use thiserror::Error;

/// Transport/protocol failures when talking to the provider service
#[derive(Error, Debug)]
pub enum CommunicationError {
    #[error("Not connected to provider service")]
    NotConnected,

    #[error("Gateway channel closed")]
    ChannelClosed,

    #[error("Connection lost before the frame was written: {0}")]
    ConnectionLost(String),

    #[error("Frame not written within {0}ms")]
    Timeout(u64),

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] CodecError),
}

/// Outbound side of the remote device-provider service.
///
/// Implementations must be safe to call from many tasks at once. `Ok` means
/// the item was handed to the transport, not that it was merely queued.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Submit a device registration request
    async fn register_device(
        &self,
        request: DeviceRegistrationRequest,
    ) -> Result<(), CommunicationError>;

    /// Submit an outbound edge message
    async fn send_message(&self, message: EdgeMessage) -> Result<(), CommunicationError>;
}
