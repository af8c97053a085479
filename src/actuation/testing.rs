//! Scriptable actuator for tests

use super::actuator::{Actuator, ActuatorError};
use async_trait::async_trait;
use edge_agent_shared::now_ms;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

/// What a scripted actuator does when called
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Succeed after the given number of milliseconds
    Delay(u64),
    /// Never return
    Hang,
    Panic,
    /// Block until `open_gate` is called, then succeed
    Gate,
}

pub struct ScriptedActuator {
    behaviors: HashMap<String, Behavior>,
    default: Behavior,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<(String, String)>>,
    completed: Mutex<HashMap<String, u64>>,
    gate: watch::Sender<bool>,
}

impl ScriptedActuator {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            behaviors: HashMap::new(),
            default: Behavior::Succeed,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(HashMap::new()),
            gate,
        }
    }

    pub fn with(mut self, actuator_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(actuator_id.to_string(), behavior);
        self
    }

    pub fn with_default(mut self, behavior: Behavior) -> Self {
        self.default = behavior;
        self
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Highest number of simultaneous calls observed
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// (actuator id, value) pairs in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// When the call for `actuator_id` returned, in ms since epoch
    pub fn completed_at(&self, actuator_id: &str) -> Option<u64> {
        self.completed.lock().unwrap().get(actuator_id).copied()
    }
}

#[async_trait]
impl Actuator for ScriptedActuator {
    async fn actuate(&self, actuator_id: &str, value: &str) -> Result<(), ActuatorError> {
        self.calls
            .lock()
            .unwrap()
            .push((actuator_id.to_string(), value.to_string()));

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let behavior = self
            .behaviors
            .get(actuator_id)
            .copied()
            .unwrap_or(self.default);

        let result = match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(ActuatorError::Rejected(value.to_string())),
            Behavior::Delay(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("actuator {} exploded", actuator_id),
            Behavior::Gate => {
                let mut rx = self.gate.subscribe();
                let _ = rx.wait_for(|open| *open).await;
                Ok(())
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed
            .lock()
            .unwrap()
            .insert(actuator_id.to_string(), now_ms());
        result
    }
}
