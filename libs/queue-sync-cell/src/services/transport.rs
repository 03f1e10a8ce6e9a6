use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::IdentityProvider;
use shared_config::AppConfig;

use crate::error::QueueSyncError;
use crate::models::{ChannelId, QueueUpdate};
use crate::services::stomp::{StompCommand, StompFrame};

/// Opens sessions on the realtime queue channel.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, channel: ChannelId) -> Result<Box<dyn RealtimeSession>, QueueSyncError>;
}

/// One live subscription to a channel.
///
/// `next_update` resolves to `Ok(None)` once the server ends the stream.
/// It must be safe to drop a pending `next_update` future.
#[async_trait]
pub trait RealtimeSession: Send {
    async fn next_update(&mut self) -> Result<Option<QueueUpdate>, QueueSyncError>;

    async fn close(&mut self) -> Result<(), QueueSyncError>;
}

impl std::fmt::Debug for dyn RealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RealtimeSession")
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where the CONNECT frame's bearer token comes from.
#[derive(Clone)]
enum BearerToken {
    Fixed(String),
    /// Read on every connect, so a re-login is picked up by the next reconnect.
    Identity(Arc<IdentityProvider>),
}

impl BearerToken {
    fn current(&self) -> Option<String> {
        match self {
            BearerToken::Fixed(token) => Some(token.clone()),
            BearerToken::Identity(provider) => provider.token(),
        }
    }
}

/// STOMP-over-websocket connector for the clinic's `/ws` endpoint.
#[derive(Clone)]
pub struct StompConnector {
    url: String,
    host: String,
    config: AppConfig,
    bearer: Option<BearerToken>,
}

impl StompConnector {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            url: config.realtime_url.clone(),
            host: host_of(&config.realtime_url),
            config: config.clone(),
            bearer: None,
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.bearer = token.map(BearerToken::Fixed);
        self
    }

    pub fn with_identity(mut self, identity: Arc<IdentityProvider>) -> Self {
        self.bearer = Some(BearerToken::Identity(identity));
        self
    }

    async fn send_frame(stream: &mut WsStream, frame: &StompFrame) -> Result<(), QueueSyncError> {
        stream.send(Message::text(frame.encode())).await?;
        Ok(())
    }

    async fn await_connected(stream: &mut WsStream) -> Result<StompFrame, QueueSyncError> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Some(frame) = StompFrame::parse(text.as_str())? {
                        return Ok(frame);
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(QueueSyncError::Handshake(
                        "socket closed before CONNECTED".to_string(),
                    ))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(QueueSyncError::Handshake(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl RealtimeConnector for StompConnector {
    async fn connect(&self, channel: ChannelId) -> Result<Box<dyn RealtimeSession>, QueueSyncError> {
        debug!("Opening realtime socket at {}", self.url);

        let (mut stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| QueueSyncError::Handshake(e.to_string()))?;

        let mut connect = StompFrame::new(StompCommand::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", self.host.as_str())
            .with_header("heart-beat", "0,0");
        if let Some(token) = self.bearer.as_ref().and_then(BearerToken::current) {
            connect = connect.with_header("Authorization", format!("Bearer {}", token));
        }
        Self::send_frame(&mut stream, &connect).await?;

        let reply = Self::await_connected(&mut stream).await?;
        match reply.command {
            StompCommand::Connected => {
                debug!("STOMP session established (version {})", reply.get("version").unwrap_or("1.0"));
            }
            StompCommand::Error => {
                let reason = reply.get("message").unwrap_or(reply.body.as_str()).to_string();
                return Err(QueueSyncError::Handshake(reason));
            }
            other => {
                return Err(QueueSyncError::Handshake(format!("expected CONNECTED, got {}", other)));
            }
        }

        let subscription_id = format!("sub-{}", Uuid::new_v4());
        let destination = self.config.topic_for(&channel.to_string());
        let subscribe = StompFrame::new(StompCommand::Subscribe)
            .with_header("id", subscription_id.as_str())
            .with_header("destination", destination.as_str())
            .with_header("ack", "auto");
        Self::send_frame(&mut stream, &subscribe).await?;

        info!("Subscribed to {}", destination);

        Ok(Box::new(StompSession {
            stream,
            subscription_id,
            destination,
            closed: false,
        }))
    }
}

pub struct StompSession {
    stream: WsStream,
    subscription_id: String,
    destination: String,
    closed: bool,
}

#[async_trait]
impl RealtimeSession for StompSession {
    async fn next_update(&mut self) -> Result<Option<QueueUpdate>, QueueSyncError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            let Some(frame) = StompFrame::parse(text.as_str())? else {
                continue;
            };

            match frame.command {
                StompCommand::Message => {
                    if frame.get("subscription").is_some_and(|id| id != self.subscription_id) {
                        debug!("Ignoring message for foreign subscription on {}", self.destination);
                        continue;
                    }
                    match serde_json::from_str::<QueueUpdate>(&frame.body) {
                        Ok(update) => return Ok(Some(update)),
                        Err(e) => {
                            warn!("Skipping malformed queue update on {}: {}", self.destination, e);
                        }
                    }
                }
                StompCommand::Error => {
                    let reason = frame.get("message").unwrap_or(frame.body.as_str()).to_string();
                    return Err(QueueSyncError::Transport(reason));
                }
                other => debug!("Ignoring {} frame", other),
            }
        }
    }

    async fn close(&mut self) -> Result<(), QueueSyncError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let unsubscribe = StompFrame::new(StompCommand::Unsubscribe)
            .with_header("id", self.subscription_id.as_str());
        let disconnect = StompFrame::new(StompCommand::Disconnect)
            .with_header("receipt", format!("close-{}", self.subscription_id));

        for frame in [unsubscribe, disconnect] {
            if let Err(e) = self.stream.send(Message::text(frame.encode())).await {
                debug!("Socket already gone while closing {}: {}", self.destination, e);
                return Ok(());
            }
        }

        if let Err(e) = self.stream.close(None).await {
            debug!("Websocket close for {} failed: {}", self.destination, e);
        }
        info!("Unsubscribed from {}", self.destination);
        Ok(())
    }
}

/// Value for the STOMP `host` header, taken from the socket URL authority.
fn host_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .split(['/', '?'])
        .next()
        .unwrap_or_default()
        .to_string()
}
