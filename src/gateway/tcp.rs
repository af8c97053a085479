//! TCP provider gateway with persistent connection and automatic reconnection

use super::traits::{CommunicationError, ProviderGateway};
use crate::dispatch::ProviderEvent;
use crate::vault::{SecretStore, Sealer};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use edge_agent_shared::{
    codec::{CodecError, EnvelopeCodec},
    envelope::Payload,
    ChangeAction, DeviceProviderChangedNotification, DeviceRegistrationRequest, EdgeMessage,
    Envelope, Heartbeat, Hello,
};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events emitted by the gateway
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// Session established with the provider service
    Connected { address: String },
    /// Session lost
    Disconnected { reason: String },
    /// Connection attempt failed, a retry follows
    ConnectionFailed { reason: String },
    /// Inbound item for the dispatcher
    Received(ProviderEvent),
}

/// Receiving side of the gateway's event stream.
///
/// Unbounded so the connection task never waits on the consumer: the
/// consumer may itself be waiting on an outbound write.
pub type GatewayEvents = mpsc::UnboundedReceiver<GatewayEvent>;

/// Configuration for the TCP gateway
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Identity of this device provider; also keys its vault credential
    pub provider_id: Uuid,
    /// Provider service address
    pub address: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Interval between heartbeats while connected
    pub heartbeat_interval: Duration,
    /// Upper bound for queueing and writing one submitted frame
    pub send_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider_id: Uuid::nil(),
            address: "127.0.0.1:7400".into(),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// Gateway speaking the length-prefixed envelope protocol over TCP.
///
/// Submissions from any number of tasks are funnelled through one channel
/// into the single connection writer. Each submission resolves once its
/// frame has been written, or with the reason it was not.
pub struct TcpGateway {
    provider_id: String,
    sequence_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
    outbound_tx: mpsc::Sender<Outbound>,
    send_timeout: Duration,
    shutdown: CancellationToken,
}

impl TcpGateway {
    /// Start the connection loop and return the gateway with its event stream.
    ///
    /// `sealer` carries the vault passphrase; the session credential is only
    /// ever stored sealed with it.
    pub fn start(
        config: GatewayConfig,
        vault: Arc<dyn SecretStore>,
        sealer: Sealer,
    ) -> (Self, GatewayEvents) {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(256);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<GatewayEvent>();
        let sequence_id = Arc::new(AtomicU64::new(0));
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let session = Session {
            credentials: CredentialKeeper::new(config.provider_id, vault, sealer),
            config: config.clone(),
            sequence_id: sequence_id.clone(),
            connected: connected.clone(),
            event_tx,
        };
        let token = shutdown.clone();
        tokio::spawn(async move {
            connection_loop(session, outbound_rx, token).await;
        });

        let gateway = Self {
            provider_id: config.provider_id.to_string(),
            sequence_id,
            connected,
            outbound_tx,
            send_timeout: config.send_timeout,
            shutdown,
        };
        (gateway, event_rx)
    }

    /// Whether a session with the provider service is currently up
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stop the connection loop
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn submit(&self, payload: Payload) -> Result<(), CommunicationError> {
        if !self.is_connected() {
            return Err(CommunicationError::NotConnected);
        }

        let seq = self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (ack, written) = oneshot::channel();
        let outbound = Outbound {
            envelope: Envelope::wrap(&self.provider_id, seq, payload),
            ack,
        };

        let delivery = async {
            self.outbound_tx
                .send(outbound)
                .await
                .map_err(|_| CommunicationError::ChannelClosed)?;
            written.await.map_err(|_| CommunicationError::ChannelClosed)?
        };

        timeout(self.send_timeout, delivery)
            .await
            .map_err(|_| CommunicationError::Timeout(self.send_timeout.as_millis() as u64))?
    }
}

#[async_trait]
impl ProviderGateway for TcpGateway {
    async fn register_device(
        &self,
        request: DeviceRegistrationRequest,
    ) -> Result<(), CommunicationError> {
        self.submit(Payload::RegistrationRequest(request)).await
    }

    async fn send_message(&self, message: EdgeMessage) -> Result<(), CommunicationError> {
        self.submit(Payload::EdgeMessage(message)).await
    }
}

/// A submitted envelope waiting for the connection writer
struct Outbound {
    envelope: Envelope,
    ack: oneshot::Sender<Result<(), CommunicationError>>,
}

impl Outbound {
    /// Write the envelope and report the result to the submitter.
    ///
    /// Returns `Err` only when the connection itself failed; an envelope that
    /// cannot be encoded is refused without touching the stream.
    async fn deliver<W>(self, sink: &mut FramedWrite<W, EnvelopeCodec>) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        // Submitter timed out; writing now would report an outcome twice
        if self.ack.is_closed() {
            debug!("Dropping frame abandoned by its submitter");
            return Ok(());
        }

        match sink.send(self.envelope).await {
            Ok(()) => {
                let _ = self.ack.send(Ok(()));
                Ok(())
            }
            Err(e) if e.is_transport() => {
                let _ = self
                    .ack
                    .send(Err(CommunicationError::ConnectionLost(e.to_string())));
                Err(e)
            }
            Err(e) => {
                let _ = self.ack.send(Err(CommunicationError::Encode(e)));
                Ok(())
            }
        }
    }

    fn fail(self, reason: &str) {
        let _ = self
            .ack
            .send(Err(CommunicationError::ConnectionLost(reason.to_string())));
    }
}

/// Fail every frame still queued when a session ends
fn fail_pending(outbound_rx: &mut mpsc::Receiver<Outbound>, reason: &str) -> usize {
    let mut failed = 0;
    while let Ok(outbound) = outbound_rx.try_recv() {
        outbound.fail(reason);
        failed += 1;
    }
    failed
}

/// Loads and persists the provider session credential, sealed
struct CredentialKeeper {
    provider_id: Uuid,
    vault: Arc<dyn SecretStore>,
    sealer: Sealer,
}

impl CredentialKeeper {
    fn new(provider_id: Uuid, vault: Arc<dyn SecretStore>, sealer: Sealer) -> Self {
        Self {
            provider_id,
            vault,
            sealer,
        }
    }

    /// Stored credential, or empty when there is none or it cannot be opened
    async fn load(&self) -> Vec<u8> {
        let sealed = match self.vault.load(self.provider_id).await {
            Some(sealed) => sealed,
            None => return Vec::new(),
        };

        let sealer = self.sealer.clone();
        match tokio::task::spawn_blocking(move || sealer.open(&sealed)).await {
            Ok(Ok(credential)) => credential,
            Ok(Err(e)) => {
                warn!(provider_id = %self.provider_id, "Stored credential unusable: {}", e);
                Vec::new()
            }
            Err(e) => {
                error!(provider_id = %self.provider_id, "Credential unseal task failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn store(&self, credential: Vec<u8>) {
        let sealer = self.sealer.clone();
        match tokio::task::spawn_blocking(move || sealer.seal(&credential)).await {
            Ok(Ok(sealed)) => self.vault.save(self.provider_id, &sealed).await,
            Ok(Err(e)) => {
                error!(provider_id = %self.provider_id, "Couldn't seal credential: {}", e);
            }
            Err(e) => {
                error!(provider_id = %self.provider_id, "Credential seal task failed: {}", e);
            }
        }
    }

    /// Apply a provider notification addressed to this provider
    async fn apply(&self, notification: &DeviceProviderChangedNotification) {
        if !notification.provider_id.is_empty()
            && notification.provider_id != self.provider_id.to_string()
        {
            return;
        }

        if notification.action() == ChangeAction::Deleted {
            info!(provider_id = %self.provider_id, "Provider deleted, dropping credential");
            self.vault.delete(self.provider_id).await;
        } else if !notification.credential.is_empty() {
            debug!(provider_id = %self.provider_id, "Storing provider credential");
            self.store(notification.credential.clone()).await;
        }
    }
}

/// State shared by every connection attempt
struct Session {
    config: GatewayConfig,
    credentials: CredentialKeeper,
    sequence_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<GatewayEvent>,
}

impl Session {
    fn envelope(&self, payload: Payload) -> Envelope {
        let seq = self.sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
        Envelope::wrap(&self.config.provider_id.to_string(), seq, payload)
    }

    fn emit(&self, event: GatewayEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Convert an inbound envelope into a dispatcher event
    async fn inbound(&self, envelope: Envelope) -> Option<ProviderEvent> {
        match envelope.payload {
            Some(Payload::ProviderChanged(notification)) => {
                self.credentials.apply(&notification).await;
                Some(ProviderEvent::ProviderChanged(notification))
            }
            Some(Payload::DeviceChanged(notification)) => {
                Some(ProviderEvent::DeviceChanged(notification))
            }
            Some(Payload::RegistrationResponse(response)) => {
                Some(ProviderEvent::RegistrationResponse(response))
            }
            Some(Payload::EdgeMessage(message)) => Some(ProviderEvent::EdgeMessage(message)),
            Some(Payload::Heartbeat(hb)) => {
                debug!("Provider heartbeat: uptime={}ms", hb.uptime_ms);
                None
            }
            Some(other) => {
                debug!("Unhandled payload type {:?}", other.message_type());
                None
            }
            None => {
                warn!("Received envelope without payload");
                None
            }
        }
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    session: Session,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    shutdown: CancellationToken,
) {
    let config = session.config.clone();
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => break,
            attempt = timeout(config.connect_timeout, TcpStream::connect(&config.address)) => attempt,
        };

        match attempt {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;

                let result = tokio::select! {
                    _ = shutdown.cancelled() => Ok(()),
                    result = handle_connection(stream, &session, &mut outbound_rx) => result,
                };
                session.connected.store(false, Ordering::SeqCst);

                let failed = fail_pending(&mut outbound_rx, "session ended");
                if failed > 0 {
                    warn!(failed, "Queued frames dropped with the session");
                }

                match result {
                    Ok(()) => break,
                    Err(reason) => {
                        session.emit(GatewayEvent::Disconnected {
                            reason: reason.to_string(),
                        });
                    }
                }
            }
            Ok(Err(e)) => {
                session.emit(GatewayEvent::ConnectionFailed {
                    reason: format!("{}: {}", config.address, e),
                });
            }
            Err(_) => {
                session.emit(GatewayEvent::ConnectionFailed {
                    reason: format!("{}: connect timed out", config.address),
                });
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }

    info!("Provider gateway stopped");
}

/// Handle an active connection.
///
/// Returns `Ok(())` when the gateway itself went away, `Err` when the
/// connection was lost.
async fn handle_connection(
    stream: TcpStream,
    session: &Session,
    outbound_rx: &mut mpsc::Receiver<Outbound>,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let mut inbound = FramedRead::new(reader, EnvelopeCodec::new());
    let mut outbound = FramedWrite::new(writer, EnvelopeCodec::new());

    let hello = Hello {
        provider_id: session.config.provider_id.to_string(),
        credential: session.credentials.load().await,
    };
    outbound.send(session.envelope(Payload::Hello(hello))).await?;

    session.connected.store(true, Ordering::SeqCst);
    session.emit(GatewayEvent::Connected {
        address: session.config.address.clone(),
    });

    let mut heartbeat = interval(session.config.heartbeat_interval);
    let start_time = Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let uptime_ms = start_time.elapsed().as_millis() as u64;
                outbound
                    .send(session.envelope(Payload::Heartbeat(Heartbeat { uptime_ms })))
                    .await?;
            }

            submitted = outbound_rx.recv() => {
                match submitted {
                    Some(frame) => frame.deliver(&mut outbound).await?,
                    None => return Ok(()),
                }
            }

            frame = inbound.next() => {
                match frame {
                    Some(Ok(envelope)) => {
                        if let Some(event) = session.inbound(envelope).await {
                            session.emit(GatewayEvent::Received(event));
                        }
                    }
                    Some(Err(e)) => return Err(anyhow!("Read error: {}", e)),
                    None => return Err(anyhow!("Provider service closed connection")),
                }
            }
        }
    }
}
