//! Dispatcher - routes provider events to their handlers

use crate::actuation::{ActuationExecutor, Actuator, ExecutorConfig};
use crate::gateway::ProviderGateway;
use crate::registration::{DeviceClaimer, RegistrationWorkflow};
use edge_agent_shared::{
    DeviceChangedNotification, DeviceProviderChangedNotification, DeviceRegistrationResponse,
    EdgeMessage,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Inbound items delivered by the provider gateway
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    ProviderChanged(DeviceProviderChangedNotification),
    DeviceChanged(DeviceChangedNotification),
    RegistrationResponse(DeviceRegistrationResponse),
    EdgeMessage(EdgeMessage),
}

/// Handles every inbound provider event.
///
/// None of the handlers return errors: each one is a closed failure domain
/// and failures end up in the log.
pub struct Dispatcher {
    registration: RegistrationWorkflow,
    executor: ActuationExecutor,
}

impl Dispatcher {
    /// Create a dispatcher owning its actuation pool
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        actuator: Arc<dyn Actuator>,
        claimer: Arc<dyn DeviceClaimer>,
        executor_config: ExecutorConfig,
    ) -> Self {
        Self {
            registration: RegistrationWorkflow::new(gateway.clone(), claimer),
            executor: ActuationExecutor::new(gateway, actuator, executor_config),
        }
    }

    /// Route one event to its handler
    pub async fn dispatch(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::ProviderChanged(notification) => {
                self.on_provider_changed(&notification)
            }
            ProviderEvent::DeviceChanged(notification) => {
                self.on_device_changed(&notification).await
            }
            ProviderEvent::RegistrationResponse(response) => {
                self.on_registration_response(&response)
            }
            ProviderEvent::EdgeMessage(message) => self.on_edge_message(message),
        }
    }

    /// Provider lifecycle notification. Logged only.
    pub fn on_provider_changed(&self, notification: &DeviceProviderChangedNotification) {
        info!(
            action = ?notification.action(),
            provider_id = %notification.provider_id,
            credential_len = notification.credential.len(),
            metadata = ?notification.metadata,
            "#on_provider_changed"
        );
    }

    /// Device lifecycle notification. Created/updated devices get registered.
    pub async fn on_device_changed(&self, notification: &DeviceChangedNotification) {
        let action = notification.action();
        info!(
            ?action,
            alias_id = %notification.alias_id,
            device_id = %notification.device_id,
            metadata = ?notification.metadata,
            "#on_device_changed"
        );

        if !action.requires_registration() {
            debug!(?action, "No registration needed");
            return;
        }

        if let Err(e) = self.registration.register(notification).await {
            error!(
                alias_id = %notification.alias_id,
                "Couldn't process the device changed action: {:#}", e
            );
        }
    }

    /// Answer to an earlier registration request. Logged only.
    pub fn on_registration_response(&self, response: &DeviceRegistrationResponse) {
        if response.accepted {
            info!(
                alias_id = %response.alias_id,
                device_id = %response.device_id,
                "#on_registration_response: accepted"
            );
        } else {
            warn!(
                alias_id = %response.alias_id,
                message = %response.message,
                "#on_registration_response: rejected"
            );
        }
    }

    /// Inbound edge message. Schedules its commands and returns immediately.
    pub fn on_edge_message(&self, message: EdgeMessage) {
        let device_id = message.device_id.clone();
        let scheduled = self.executor.submit(message);
        info!(%device_id, scheduled, "#on_edge_message");
    }

    /// Number of actuation commands still running
    pub fn in_flight(&self) -> usize {
        self.executor.in_flight()
    }

    /// Wait for in-flight actuations and release the pool
    pub async fn shutdown(&self) {
        self.executor.shutdown().await;
    }
}
