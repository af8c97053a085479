//! Edge Agent Shared Protocol Types
//!
//! This crate provides the wire types and codec shared by the edge agent and
//! the provider simulator.

pub mod codec;
pub mod proto;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use proto::*;

/// Get current timestamp in milliseconds since Unix epoch (UTC)
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Fixed values of the outcome records reported upstream
pub mod outcome {
    /// Response code of a successful actuation
    pub const RESPONSE_SUCCESS: &str = "success";

    /// Origin tag of exceptions raised while actuating
    pub const ORIGIN_ACTUATOR: &str = "actuator";

    /// Exception text when the actuator call itself failed
    pub const ACTUATOR_CALL_FAILED: &str = "Could not call actuator.";

    /// Exception text when the success response could not be delivered
    pub const RESPONSE_NOT_SENT: &str = "Could not send actuation response.";

    /// Retry hint attached to every exception the agent reports
    pub const DEFAULT_RETRY: u32 = 1;
}

/// Builder helpers for creating messages
impl Header {
    /// Create a new header with the given provider ID and message type
    pub fn new(provider_id: impl Into<String>, msg_type: MessageType, sequence_id: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
            msg_type: msg_type.into(),
        }
    }
}

impl envelope::Payload {
    /// Message type matching this payload
    pub fn message_type(&self) -> MessageType {
        match self {
            envelope::Payload::Hello(_) => MessageType::MsgHello,
            envelope::Payload::Heartbeat(_) => MessageType::MsgHeartbeat,
            envelope::Payload::ProviderChanged(_) => MessageType::MsgProviderChanged,
            envelope::Payload::DeviceChanged(_) => MessageType::MsgDeviceChanged,
            envelope::Payload::RegistrationRequest(_) => MessageType::MsgRegistrationRequest,
            envelope::Payload::RegistrationResponse(_) => MessageType::MsgRegistrationResponse,
            envelope::Payload::EdgeMessage(_) => MessageType::MsgEdgeMessage,
        }
    }
}

impl Envelope {
    /// Wrap a payload with a freshly stamped header
    pub fn wrap(provider_id: &str, sequence_id: u64, payload: envelope::Payload) -> Self {
        Self {
            header: Some(Header::new(provider_id, payload.message_type(), sequence_id)),
            payload: Some(payload),
        }
    }
}

impl ActuationResponse {
    /// Successful outcome for a command, stamped now
    pub fn success(command: &ActuationCommand) -> Self {
        Self {
            actuator_id: command.actuator_id.clone(),
            actuation_id: command.actuation_id.clone(),
            response_code: outcome::RESPONSE_SUCCESS.into(),
            response_time_ms: now_ms(),
        }
    }
}

impl ExceptionRecord {
    /// Actuator-originated exception for the given actuator, stamped now
    pub fn actuator(actuator_id: impl Into<String>, exception: impl Into<String>, retry: u32) -> Self {
        Self {
            origin: outcome::ORIGIN_ACTUATOR.into(),
            id: actuator_id.into(),
            exception: exception.into(),
            exception_time_ms: now_ms(),
            retry,
        }
    }
}

impl EdgeMessage {
    /// Inbound message carrying commands for a device
    pub fn commands(
        device_id: impl Into<String>,
        format: Format,
        commands: Vec<ActuationCommand>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            format: format.into(),
            actuation_commands: commands,
            ..Default::default()
        }
    }

    /// Outbound message carrying a single actuation response.
    ///
    /// `format` is the raw tag of the inbound message and is copied verbatim,
    /// including values this version does not know.
    pub fn response(device_id: impl Into<String>, format: i32, response: ActuationResponse) -> Self {
        Self {
            device_id: device_id.into(),
            format,
            actuation_responses: vec![response],
            ..Default::default()
        }
    }

    /// Outbound message carrying a single exception record; `format` as for
    /// [`EdgeMessage::response`]
    pub fn exception(device_id: impl Into<String>, format: i32, exception: ExceptionRecord) -> Self {
        Self {
            device_id: device_id.into(),
            format,
            exceptions: vec![exception],
            ..Default::default()
        }
    }
}

impl ActuationCommand {
    pub fn new(
        actuator_id: impl Into<String>,
        actuation_id: impl Into<String>,
        value_string: impl Into<String>,
    ) -> Self {
        Self {
            actuator_id: actuator_id.into(),
            actuation_id: actuation_id.into(),
            value_string: value_string.into(),
        }
    }
}

impl ChangeAction {
    /// Whether this action should (re-)register the device
    pub fn requires_registration(self) -> bool {
        matches!(self, ChangeAction::Created | ChangeAction::Updated)
    }
}
