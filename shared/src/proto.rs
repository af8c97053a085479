//! Wire types exchanged between the agent and the device-provider service.
//!
//! Declared directly with the prost derives so no protoc step is needed at
//! build time. Tags are stable; append new fields, never renumber.

use std::collections::HashMap;

/// Frame header carried by every envelope
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Header {
    /// Device provider this session belongs to
    #[prost(string, tag = "1")]
    pub provider_id: String,
    #[prost(uint64, tag = "2")]
    pub sequence_id: u64,
    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,
    #[prost(enumeration = "MessageType", tag = "4")]
    pub msg_type: i32,
}

/// Top-level frame payload
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(oneof = "envelope::Payload", tags = "2, 3, 4, 5, 6, 7, 8")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        Hello(super::Hello),
        #[prost(message, tag = "3")]
        Heartbeat(super::Heartbeat),
        #[prost(message, tag = "4")]
        ProviderChanged(super::DeviceProviderChangedNotification),
        #[prost(message, tag = "5")]
        DeviceChanged(super::DeviceChangedNotification),
        #[prost(message, tag = "6")]
        RegistrationRequest(super::DeviceRegistrationRequest),
        #[prost(message, tag = "7")]
        RegistrationResponse(super::DeviceRegistrationResponse),
        #[prost(message, tag = "8")]
        EdgeMessage(super::EdgeMessage),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    MsgUnknown = 0,
    MsgHello = 1,
    MsgHeartbeat = 2,
    MsgProviderChanged = 3,
    MsgDeviceChanged = 4,
    MsgRegistrationRequest = 5,
    MsgRegistrationResponse = 6,
    MsgEdgeMessage = 7,
}

/// Lifecycle action carried by change notifications
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ChangeAction {
    Unspecified = 0,
    Created = 1,
    Updated = 2,
    Deleted = 3,
}

/// Edge message encoding version. Opaque to the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Format {
    Unspecified = 0,
    Rec31 = 1,
}

/// First frame sent by the agent after connecting
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Hello {
    #[prost(string, tag = "1")]
    pub provider_id: String,
    /// Session credential previously issued by the service, empty on first contact
    #[prost(bytes = "vec", tag = "2")]
    pub credential: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Heartbeat {
    #[prost(uint64, tag = "1")]
    pub uptime_ms: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceProviderChangedNotification {
    #[prost(enumeration = "ChangeAction", tag = "1")]
    pub action: i32,
    #[prost(string, tag = "2")]
    pub provider_id: String,
    #[prost(bytes = "vec", tag = "3")]
    pub credential: Vec<u8>,
    #[prost(map = "string, string", tag = "4")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceChangedNotification {
    #[prost(enumeration = "ChangeAction", tag = "1")]
    pub action: i32,
    #[prost(string, tag = "2")]
    pub alias_id: String,
    #[prost(string, tag = "3")]
    pub device_id: String,
    #[prost(map = "string, string", tag = "4")]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActuatorDescriptor {
    #[prost(string, tag = "1")]
    pub popular_name: String,
    #[prost(string, tag = "2")]
    pub littera: String,
    #[prost(string, tag = "3")]
    pub alias_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceRegistrationRequest {
    #[prost(string, tag = "1")]
    pub popular_name: String,
    #[prost(string, tag = "2")]
    pub littera: String,
    #[prost(string, tag = "3")]
    pub alias_id: String,
    #[prost(map = "string, string", tag = "4")]
    pub source: HashMap<String, String>,
    #[prost(message, repeated, tag = "5")]
    pub actuators: Vec<ActuatorDescriptor>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceRegistrationResponse {
    #[prost(string, tag = "1")]
    pub alias_id: String,
    #[prost(string, tag = "2")]
    pub device_id: String,
    #[prost(bool, tag = "3")]
    pub accepted: bool,
    #[prost(string, tag = "4")]
    pub message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActuationCommand {
    #[prost(string, tag = "1")]
    pub actuator_id: String,
    #[prost(string, tag = "2")]
    pub actuation_id: String,
    #[prost(string, tag = "3")]
    pub value_string: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActuationResponse {
    #[prost(string, tag = "1")]
    pub actuator_id: String,
    #[prost(string, tag = "2")]
    pub actuation_id: String,
    #[prost(string, tag = "3")]
    pub response_code: String,
    #[prost(uint64, tag = "4")]
    pub response_time_ms: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExceptionRecord {
    #[prost(string, tag = "1")]
    pub origin: String,
    #[prost(string, tag = "2")]
    pub id: String,
    #[prost(string, tag = "3")]
    pub exception: String,
    #[prost(uint64, tag = "4")]
    pub exception_time_ms: u64,
    #[prost(uint32, tag = "5")]
    pub retry: u32,
}

/// Batched envelope of commands (inbound) or outcomes (outbound) for one device
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EdgeMessage {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(enumeration = "Format", tag = "2")]
    pub format: i32,
    #[prost(message, repeated, tag = "3")]
    pub actuation_commands: Vec<ActuationCommand>,
    #[prost(message, repeated, tag = "4")]
    pub actuation_responses: Vec<ActuationResponse>,
    #[prost(message, repeated, tag = "5")]
    pub exceptions: Vec<ExceptionRecord>,
}
