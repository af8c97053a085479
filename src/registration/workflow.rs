//! Registration workflow - turns device notifications into registration requests

use super::claimer::{DeviceClaim, DeviceClaimer};
use crate::gateway::ProviderGateway;
use anyhow::{Context, Result};
use edge_agent_shared::{ActuatorDescriptor, DeviceChangedNotification, DeviceRegistrationRequest};
use std::sync::Arc;
use tracing::info;

/// Builds and submits device registrations. Fire-and-forget: no retry, no
/// pending state.
pub struct RegistrationWorkflow {
    gateway: Arc<dyn ProviderGateway>,
    claimer: Arc<dyn DeviceClaimer>,
}

impl RegistrationWorkflow {
    pub fn new(gateway: Arc<dyn ProviderGateway>, claimer: Arc<dyn DeviceClaimer>) -> Self {
        Self { gateway, claimer }
    }

    /// Claim the device and submit its registration request
    pub async fn register(
        &self,
        notification: &DeviceChangedNotification,
    ) -> Result<DeviceRegistrationRequest> {
        let claim = self
            .claimer
            .claim(notification)
            .await
            .with_context(|| format!("Failed to claim device {}", notification.alias_id))?;

        let request = build_request(&notification.alias_id, claim);

        self.gateway
            .register_device(request.clone())
            .await
            .with_context(|| format!("Failed to submit registration for {}", request.alias_id))?;

        info!(
            alias_id = %request.alias_id,
            actuators = request.actuators.len(),
            "Device registration submitted"
        );
        Ok(request)
    }
}

/// Actuator aliases are scoped under the device alias: `<device>/<actuator>`
pub fn build_request(alias_id: &str, claim: DeviceClaim) -> DeviceRegistrationRequest {
    let actuators = claim
        .actuators
        .iter()
        .map(|name| ActuatorDescriptor {
            popular_name: name.clone(),
            littera: name.clone(),
            alias_id: format!("{}/{}", alias_id, name),
        })
        .collect();

    DeviceRegistrationRequest {
        popular_name: claim.popular_name,
        littera: claim.littera,
        alias_id: alias_id.to_string(),
        source: claim.source,
        actuators,
    }
}
