//! Actuation executor - runs each command of an edge message independently

use super::actuator::{Actuator, ActuatorError};
use crate::gateway::ProviderGateway;
use edge_agent_shared::{
    outcome, ActuationCommand, ActuationResponse, EdgeMessage, ExceptionRecord,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Limits applied to actuator calls
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of actuator calls in flight at once
    pub max_concurrent_actuations: usize,
    /// Upper bound for a single actuator call
    pub actuation_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_actuations: 64,
            actuation_timeout: Duration::from_secs(30),
        }
    }
}

/// Executes actuation commands and reports one outcome per command.
///
/// Every command runs in its own task on a pool owned by the executor. Tasks
/// are spawned immediately; the semaphore only gates the actuator call, so
/// `submit` never waits.
pub struct ActuationExecutor {
    gateway: Arc<dyn ProviderGateway>,
    actuator: Arc<dyn Actuator>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    actuation_timeout: Duration,
}

impl ActuationExecutor {
    /// Create a new actuation executor
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        actuator: Arc<dyn Actuator>,
        config: ExecutorConfig,
    ) -> Self {
        let max = config.max_concurrent_actuations.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            gateway,
            actuator,
            permits: Arc::new(Semaphore::new(max)),
            tracker: TaskTracker::new(),
            actuation_timeout: config.actuation_timeout,
        }
    }

    /// Schedule every command of `message`, in message order.
    ///
    /// Returns the number of commands scheduled. After [`shutdown`] the
    /// actuator is no longer called: each command is answered with an
    /// exception instead.
    ///
    /// [`shutdown`]: ActuationExecutor::shutdown
    pub fn submit(&self, message: EdgeMessage) -> usize {
        let format = message.format;
        let device_id: Arc<str> = Arc::from(message.device_id);
        let count = message.actuation_commands.len();

        let rejected = self.tracker.is_closed();
        if rejected && count > 0 {
            warn!(%device_id, count, "Executor is shut down, rejecting commands");
        }

        for command in message.actuation_commands {
            let task = ActuationTask {
                gateway: self.gateway.clone(),
                actuator: self.actuator.clone(),
                permits: self.permits.clone(),
                actuation_timeout: self.actuation_timeout,
                device_id: device_id.clone(),
                format,
                command,
            };
            if rejected {
                self.tracker.spawn(task.reject());
            } else {
                self.tracker.spawn(task.run());
            }
        }

        count
    }

    /// Number of commands not yet fully reported
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait for every in-flight command to finish
    pub async fn shutdown(&self) {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight actuations");
        }
        self.tracker.wait().await;
    }
}

/// One command's call -> build outcome -> submit outcome lifecycle
struct ActuationTask {
    gateway: Arc<dyn ProviderGateway>,
    actuator: Arc<dyn Actuator>,
    permits: Arc<Semaphore>,
    actuation_timeout: Duration,
    device_id: Arc<str>,
    /// Raw tag of the inbound message, echoed on every outcome
    format: i32,
    command: ActuationCommand,
}

impl ActuationTask {
    async fn run(self) {
        info!(
            device_id = %self.device_id,
            actuator_id = %self.command.actuator_id,
            actuation_id = %self.command.actuation_id,
            value = %self.command.value_string,
            "Executing actuation"
        );

        match self.invoke().await {
            Ok(()) => self.report_success().await,
            Err(e) => {
                warn!(
                    actuator_id = %self.command.actuator_id,
                    actuation_id = %self.command.actuation_id,
                    "Actuation failed: {}", e
                );
                self.report_exception(outcome::ACTUATOR_CALL_FAILED).await;
            }
        }
    }

    async fn reject(self) {
        self.report_exception(outcome::ACTUATOR_CALL_FAILED).await;
    }

    /// Call the actuator; errors, timeouts and panics all count as failure
    async fn invoke(&self) -> Result<(), ActuatorError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ActuatorError::Unavailable(self.command.actuator_id.clone()))?;

        let call = AssertUnwindSafe(
            self.actuator
                .actuate(&self.command.actuator_id, &self.command.value_string),
        )
        .catch_unwind();

        match timeout(self.actuation_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ActuatorError::Panicked),
            Err(_) => Err(ActuatorError::Timeout(
                self.actuation_timeout.as_millis() as u64,
            )),
        }
    }

    async fn report_success(&self) {
        let response = ActuationResponse::success(&self.command);
        let message = EdgeMessage::response(&*self.device_id, self.format, response);

        match self.gateway.send_message(message).await {
            Ok(()) => {
                debug!(
                    actuation_id = %self.command.actuation_id,
                    "Actuation response sent"
                );
            }
            Err(e) => {
                error!(
                    actuation_id = %self.command.actuation_id,
                    "Could not send actuation response: {}", e
                );
                self.report_exception(outcome::RESPONSE_NOT_SENT).await;
            }
        }
    }

    /// Send a single exception record. Keyed by the actuator id, not the device id.
    async fn report_exception(&self, text: &str) {
        let exception =
            ExceptionRecord::actuator(&self.command.actuator_id, text, outcome::DEFAULT_RETRY);
        let message =
            EdgeMessage::exception(self.command.actuator_id.clone(), self.format, exception);

        if let Err(e) = self.gateway.send_message(message).await {
            error!(
                actuator_id = %self.command.actuator_id,
                "Could not send actuation exception: {}", e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::testing::{Behavior, ScriptedActuator};
    use crate::gateway::testing::RecordingGateway;
    use edge_agent_shared::{now_ms, Format};
    use std::collections::HashSet;

    fn executor(
        gateway: Arc<RecordingGateway>,
        actuator: Arc<ScriptedActuator>,
        config: ExecutorConfig,
    ) -> ActuationExecutor {
        ActuationExecutor::new(gateway, actuator, config)
    }

    fn two_commands() -> EdgeMessage {
        EdgeMessage::commands(
            "dev-42",
            Format::Rec31,
            vec![
                ActuationCommand::new("A1", "X1", "10"),
                ActuationCommand::new("A2", "X2", "20"),
            ],
        )
    }

    #[tokio::test]
    async fn test_mixed_success_and_failure() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A2", Behavior::Fail));
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        assert_eq!(exec.submit(two_commands()), 2);
        exec.shutdown().await;

        let sent = gateway.sent_messages();
        assert_eq!(sent.len(), 2);

        let responses: Vec<_> = sent.iter().flat_map(|m| m.actuation_responses.clone()).collect();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].actuator_id, "A1");
        assert_eq!(responses[0].actuation_id, "X1");
        assert_eq!(responses[0].response_code, "success");

        let exceptions: Vec<_> = sent.iter().flat_map(|m| m.exceptions.clone()).collect();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].origin, "actuator");
        assert_eq!(exceptions[0].id, "A2");
        assert_eq!(exceptions[0].exception, "Could not call actuator.");
        assert_eq!(exceptions[0].retry, 1);
    }

    #[tokio::test]
    async fn test_outcome_messages_are_unbatched_and_keyed() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A2", Behavior::Fail));
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        exec.submit(two_commands());
        exec.shutdown().await;

        for msg in gateway.sent_messages() {
            assert!(msg.actuation_commands.is_empty());
            assert_eq!(msg.actuation_responses.len() + msg.exceptions.len(), 1);
            assert_eq!(msg.format, Format::Rec31 as i32);
            if msg.exceptions.is_empty() {
                assert_eq!(msg.device_id, "dev-42");
            } else {
                // Exception messages are keyed by the failing actuator
                assert_eq!(msg.device_id, "A2");
            }
        }
    }

    #[tokio::test]
    async fn test_one_outcome_per_command() {
        for n in [0usize, 1, 25] {
            let gateway = Arc::new(RecordingGateway::new());
            let actuator = Arc::new(ScriptedActuator::new().with("A3", Behavior::Fail));
            let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

            let commands = (0..n)
                .map(|i| ActuationCommand::new(format!("A{}", i), format!("X{}", i), i.to_string()))
                .collect();
            assert_eq!(exec.submit(EdgeMessage::commands("dev", Format::Rec31, commands)), n);
            exec.shutdown().await;

            let sent = gateway.sent_messages();
            assert_eq!(sent.len(), n);

            let reported: HashSet<String> = sent
                .iter()
                .flat_map(|m| {
                    m.actuation_responses
                        .iter()
                        .map(|r| r.actuator_id.clone())
                        .chain(m.exceptions.iter().map(|e| e.id.clone()))
                        .collect::<Vec<_>>()
                })
                .collect();
            let expected: HashSet<String> = (0..n).map(|i| format!("A{}", i)).collect();
            assert_eq!(reported, expected);
        }
    }

    #[tokio::test]
    async fn test_response_time_set_after_call() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A1", Behavior::Delay(20)));
        let exec = executor(gateway.clone(), actuator.clone(), ExecutorConfig::default());

        exec.submit(EdgeMessage::commands(
            "dev-42",
            Format::Rec31,
            vec![ActuationCommand::new("A1", "X1", "10")],
        ));
        exec.shutdown().await;

        let completed_at = actuator.completed_at("A1").expect("call completed");
        let sent = gateway.sent_messages();
        assert!(sent[0].actuation_responses[0].response_time_ms >= completed_at);
    }

    #[tokio::test]
    async fn test_failed_response_send_reports_exception_once() {
        let gateway = Arc::new(RecordingGateway::failing_when(|m| {
            !m.actuation_responses.is_empty()
        }));
        let actuator = Arc::new(ScriptedActuator::new());
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        exec.submit(EdgeMessage::commands(
            "dev-42",
            Format::Rec31,
            vec![ActuationCommand::new("A1", "X1", "10")],
        ));
        exec.shutdown().await;

        let attempts = gateway.attempted_messages();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].actuation_responses.len(), 1);

        let delivered = gateway.sent_messages();
        assert_eq!(delivered.len(), 1);
        let exception = &delivered[0].exceptions[0];
        assert_eq!(exception.id, "A1");
        assert_eq!(exception.origin, "actuator");
        assert_eq!(exception.retry, 1);
        assert_eq!(exception.exception, "Could not send actuation response.");
    }

    #[tokio::test]
    async fn test_failed_exception_send_is_not_retried() {
        let gateway = Arc::new(RecordingGateway::failing_when(|_| true));
        let actuator = Arc::new(ScriptedActuator::new().with("A2", Behavior::Fail));
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        exec.submit(two_commands());
        exec.shutdown().await;

        // A1: response + follow-up exception, A2: exception only
        assert_eq!(gateway.attempted_messages().len(), 3);
        assert!(gateway.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_hung_actuator_times_out() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A1", Behavior::Hang));
        let config = ExecutorConfig {
            actuation_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let exec = executor(gateway.clone(), actuator, config);

        exec.submit(two_commands());
        exec.shutdown().await;

        let sent = gateway.sent_messages();
        assert_eq!(sent.len(), 2);
        let exception = sent
            .iter()
            .find_map(|m| m.exceptions.first())
            .expect("timeout reported");
        assert_eq!(exception.id, "A1");
        assert!(sent.iter().any(|m| m
            .actuation_responses
            .first()
            .is_some_and(|r| r.actuator_id == "A2")));
    }

    #[tokio::test]
    async fn test_panicking_actuator_reports_exception() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A1", Behavior::Panic));
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        exec.submit(two_commands());
        exec.shutdown().await;

        let sent = gateway.sent_messages();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|m| m.exceptions.first().is_some_and(|e| e.id == "A1")));
        assert!(sent.iter().any(|m| m
            .actuation_responses
            .first()
            .is_some_and(|r| r.actuator_id == "A2")));
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with_default(Behavior::Delay(10)));
        let config = ExecutorConfig {
            max_concurrent_actuations: 2,
            ..Default::default()
        };
        let exec = executor(gateway.clone(), actuator.clone(), config);

        let commands = (0..10)
            .map(|i| ActuationCommand::new(format!("A{}", i), format!("X{}", i), "1"))
            .collect();
        exec.submit(EdgeMessage::commands("dev", Format::Rec31, commands));
        exec.shutdown().await;

        assert_eq!(gateway.sent_messages().len(), 10);
        assert!(actuator.max_concurrent() <= 2);
        assert!(actuator.max_concurrent() >= 1);
    }

    #[tokio::test]
    async fn test_submit_does_not_wait_for_actuators() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with_default(Behavior::Gate));
        let exec = executor(gateway.clone(), actuator.clone(), ExecutorConfig::default());

        let started = now_ms();
        assert_eq!(exec.submit(two_commands()), 2);
        assert!(now_ms() - started < 1000);
        assert_eq!(exec.in_flight(), 2);
        assert!(gateway.sent_messages().is_empty());

        actuator.open_gate();
        exec.shutdown().await;

        assert_eq!(exec.in_flight(), 0);
        assert_eq!(gateway.sent_messages().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_format_tag_is_echoed() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new().with("A2", Behavior::Fail));
        let exec = executor(gateway.clone(), actuator, ExecutorConfig::default());

        let mut message = two_commands();
        message.format = 7;
        exec.submit(message);
        exec.shutdown().await;

        let sent = gateway.sent_messages();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.format == 7));
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_are_rejected() {
        let gateway = Arc::new(RecordingGateway::new());
        let actuator = Arc::new(ScriptedActuator::new());
        let exec = executor(gateway.clone(), actuator.clone(), ExecutorConfig::default());

        exec.shutdown().await;
        assert_eq!(exec.submit(two_commands()), 2);
        exec.shutdown().await;

        assert!(actuator.calls().is_empty());
        let sent = gateway.sent_messages();
        assert_eq!(sent.len(), 2);
        let mut ids: Vec<_> = sent
            .iter()
            .flat_map(|m| m.exceptions.iter().map(|e| e.id.clone()))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["A1".to_string(), "A2".to_string()]);
        assert!(sent.iter().all(|m| m.actuation_responses.is_empty()));
    }
}
