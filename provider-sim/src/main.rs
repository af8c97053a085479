//! Provider simulator
//!
//! Plays the remote device-provider service for local development: greets
//! the agent, announces a device, accepts its registration, sends it a batch
//! of actuation commands and logs every outcome that comes back.

use anyhow::Result;
use edge_agent_shared::{
    codec::EnvelopeCodec,
    envelope::Payload,
    ActuationCommand, ChangeAction, DeviceChangedNotification, DeviceProviderChangedNotification,
    DeviceRegistrationResponse, EdgeMessage, Envelope, Format,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEMO_DEVICE_ALIAS: &str = "dev-42";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let address = std::env::args().nth(1).unwrap_or_else(|| "0.0.0.0:7400".into());
    let listener = TcpListener::bind(&address).await?;
    info!("Provider simulator listening on {}", address);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Agent connected from: {}", addr);

        tokio::spawn(async move {
            let mut session = SimSession::new(Framed::new(socket, EnvelopeCodec::new()));

            while let Some(frame) = session.frames.next().await {
                match frame {
                    Ok(envelope) => {
                        if let Err(e) = session.handle(envelope).await {
                            error!("Failed to answer {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Bad frame from {}: {}", addr, e);
                        break;
                    }
                }
            }
            info!("Agent disconnected: {}", addr);
        });
    }
}

/// One connected agent
struct SimSession {
    frames: Framed<TcpStream, EnvelopeCodec>,
    sequence_id: u64,
    credential_issued: bool,
}

impl SimSession {
    fn new(frames: Framed<TcpStream, EnvelopeCodec>) -> Self {
        Self {
            frames,
            sequence_id: 0,
            credential_issued: false,
        }
    }

    async fn send(&mut self, payload: Payload) -> Result<()> {
        self.sequence_id += 1;
        self.frames
            .send(Envelope::wrap("provider-sim", self.sequence_id, payload))
            .await?;
        Ok(())
    }

    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        let header = match &envelope.header {
            Some(h) => h.clone(),
            None => {
                warn!("Received envelope without header");
                return Ok(());
            }
        };

        match envelope.payload {
            Some(Payload::Hello(hello)) => {
                info!(
                    "[{}] HELLO: stored credential {} bytes",
                    hello.provider_id,
                    hello.credential.len()
                );

                let credential = if hello.credential.is_empty() && !self.credential_issued {
                    self.credential_issued = true;
                    format!("session-{}", header.timestamp_ms).into_bytes()
                } else {
                    Vec::new()
                };
                self.send(Payload::ProviderChanged(DeviceProviderChangedNotification {
                    action: ChangeAction::Updated.into(),
                    provider_id: hello.provider_id,
                    credential,
                    metadata: HashMap::new(),
                }))
                .await?;

                self.send(Payload::DeviceChanged(DeviceChangedNotification {
                    action: ChangeAction::Created.into(),
                    alias_id: DEMO_DEVICE_ALIAS.into(),
                    device_id: String::new(),
                    metadata: HashMap::from([("vendor".to_string(), "sim".to_string())]),
                }))
                .await?;
            }
            Some(Payload::Heartbeat(hb)) => {
                debug!("[{}] HEARTBEAT: uptime={}ms", header.provider_id, hb.uptime_ms);
            }
            Some(Payload::RegistrationRequest(req)) => {
                info!(
                    "[{}] REGISTRATION: alias={} actuators={:?}",
                    header.provider_id,
                    req.alias_id,
                    req.actuators.iter().map(|a| &a.alias_id).collect::<Vec<_>>()
                );

                let device_id = format!("device-{}", req.alias_id);
                self.send(Payload::RegistrationResponse(DeviceRegistrationResponse {
                    alias_id: req.alias_id.clone(),
                    device_id: device_id.clone(),
                    accepted: true,
                    message: String::new(),
                }))
                .await?;

                let commands = vec![
                    ActuationCommand::new("A1", "X1", "10"),
                    ActuationCommand::new("A2", "X2", "20"),
                ];
                self.send(Payload::EdgeMessage(EdgeMessage::commands(
                    device_id,
                    Format::Rec31,
                    commands,
                )))
                .await?;
            }
            Some(Payload::EdgeMessage(msg)) => {
                for resp in &msg.actuation_responses {
                    info!(
                        "[{}] RESPONSE: actuator={} actuation={} code={}",
                        msg.device_id, resp.actuator_id, resp.actuation_id, resp.response_code
                    );
                }
                for exc in &msg.exceptions {
                    warn!(
                        "[{}] EXCEPTION: origin={} id={} retry={} {}",
                        msg.device_id, exc.origin, exc.id, exc.retry, exc.exception
                    );
                }
            }
            Some(other) => {
                warn!(
                    "[{}] Unexpected {:?} from agent",
                    header.provider_id,
                    other.message_type()
                );
            }
            None => {
                debug!("[{}] {:?}: (no payload)", header.provider_id, header.msg_type());
            }
        }

        Ok(())
    }
}
