//! Recording gateway for tests

use super::traits::{CommunicationError, ProviderGateway};
use async_trait::async_trait;
use edge_agent_shared::{DeviceRegistrationRequest, EdgeMessage};
use std::sync::Mutex;

type FailPredicate = Box<dyn Fn(&EdgeMessage) -> bool + Send + Sync>;

/// Gateway that records every submission and can refuse selected messages
pub struct RecordingGateway {
    attempted: Mutex<Vec<EdgeMessage>>,
    delivered: Mutex<Vec<EdgeMessage>>,
    registrations: Mutex<Vec<DeviceRegistrationRequest>>,
    fail_when: Option<FailPredicate>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            attempted: Mutex::new(Vec::new()),
            delivered: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
            fail_when: None,
        }
    }

    /// Fail `send_message` with `NotConnected` for messages matching `predicate`
    pub fn failing_when(predicate: impl Fn(&EdgeMessage) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::new()
        }
    }

    /// Every message passed to `send_message`, including refused ones
    pub fn attempted_messages(&self) -> Vec<EdgeMessage> {
        self.attempted.lock().unwrap().clone()
    }

    /// Messages accepted by `send_message`
    pub fn sent_messages(&self) -> Vec<EdgeMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<DeviceRegistrationRequest> {
        self.registrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderGateway for RecordingGateway {
    async fn register_device(
        &self,
        request: DeviceRegistrationRequest,
    ) -> Result<(), CommunicationError> {
        self.registrations.lock().unwrap().push(request);
        Ok(())
    }

    async fn send_message(&self, message: EdgeMessage) -> Result<(), CommunicationError> {
        self.attempted.lock().unwrap().push(message.clone());
        if self.fail_when.as_ref().is_some_and(|fail| fail(&message)) {
            return Err(CommunicationError::NotConnected);
        }
        self.delivered.lock().unwrap().push(message);
        Ok(())
    }
}
