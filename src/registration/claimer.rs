//! Device claiming: what the agent knows about a newly announced device

use anyhow::{bail, Result};
use async_trait::async_trait;
use edge_agent_shared::DeviceChangedNotification;
use std::collections::HashMap;

/// Registration data obtained for a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceClaim {
    pub popular_name: String,
    pub littera: String,
    /// Contextual key/value metadata forwarded with the registration
    pub source: HashMap<String, String>,
    /// Names of the device's actuators
    pub actuators: Vec<String>,
}

/// Resolves a device notification into registration data.
///
/// A real deployment resolves the alias against a third-party directory; the
/// agent only depends on this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceClaimer: Send + Sync {
    async fn claim(&self, notification: &DeviceChangedNotification) -> Result<DeviceClaim>;
}

/// Claimer that describes every device the same way, from configuration
#[derive(Debug, Clone)]
pub struct StaticClaimer {
    source: HashMap<String, String>,
    actuators: Vec<String>,
}

impl StaticClaimer {
    pub fn new(source: HashMap<String, String>, actuators: Vec<String>) -> Self {
        Self { source, actuators }
    }
}

#[async_trait]
impl DeviceClaimer for StaticClaimer {
    async fn claim(&self, notification: &DeviceChangedNotification) -> Result<DeviceClaim> {
        if notification.alias_id.is_empty() {
            bail!("Device notification carries no alias id");
        }

        let name = format!("Endpoint {}", notification.alias_id);

        // Notification metadata wins over configured defaults
        let mut source = self.source.clone();
        source.extend(
            notification
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(DeviceClaim {
            popular_name: name.clone(),
            littera: name,
            source,
            actuators: self.actuators.clone(),
        })
    }
}
