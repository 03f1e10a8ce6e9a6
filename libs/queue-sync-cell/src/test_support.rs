//! In-process realtime broker for exercising subscriptions without a socket.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::QueueSyncError;
use crate::models::{ChannelId, QueueUpdate};
use crate::services::transport::{RealtimeConnector, RealtimeSession};

enum Signal {
    Update(QueueUpdate),
    Fail(String),
}

struct SessionEntry {
    channel: ChannelId,
    tx: mpsc::UnboundedSender<Signal>,
}

#[derive(Default)]
struct BrokerState {
    sessions: Vec<SessionEntry>,
    connect_attempts: usize,
    fail_next: usize,
    hang_next: usize,
}

enum ConnectPlan {
    Accept(mpsc::UnboundedReceiver<Signal>),
    Refuse,
    Hang,
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a counter value; returns how many live sessions received it.
    pub fn publish(&self, channel: ChannelId, current_queue_number: i64) -> usize {
        let message = if current_queue_number < 0 { "Queue is empty" } else { "Next patient please" };
        self.publish_update(
            channel,
            QueueUpdate {
                doctor_id: Some(channel.0),
                current_queue_number,
                message: Some(message.to_string()),
            },
        )
    }

    pub fn publish_update(&self, channel: ChannelId, update: QueueUpdate) -> usize {
        let mut state = self.lock();
        state.sessions.retain(|entry| !entry.tx.is_closed());
        state
            .sessions
            .iter()
            .filter(|entry| entry.channel == channel)
            .filter(|entry| entry.tx.send(Signal::Update(update.clone())).is_ok())
            .count()
    }

    /// Break every live session on `channel` with a transport error.
    pub fn drop_connections(&self, channel: ChannelId) {
        let mut state = self.lock();
        for entry in state.sessions.iter().filter(|entry| entry.channel == channel) {
            let _ = entry.tx.send(Signal::Fail("connection reset by test broker".to_string()));
        }
        state.sessions.retain(|entry| entry.channel != channel);
    }

    /// End every live session on `channel` cleanly, as a server shutdown would.
    pub fn close_connections(&self, channel: ChannelId) {
        self.lock().sessions.retain(|entry| entry.channel != channel);
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// The next `count` connects never complete.
    pub fn hang_next_connects(&self, count: usize) {
        self.lock().hang_next = count;
    }

    pub fn connect_attempts(&self) -> usize {
        self.lock().connect_attempts
    }

    pub fn active_sessions(&self, channel: ChannelId) -> usize {
        self.lock()
            .sessions
            .iter()
            .filter(|entry| entry.channel == channel && !entry.tx.is_closed())
            .count()
    }
}

#[async_trait]
impl RealtimeConnector for InMemoryBroker {
    async fn connect(&self, channel: ChannelId) -> Result<Box<dyn RealtimeSession>, QueueSyncError> {
        let plan = {
            let mut state = self.lock();
            state.connect_attempts += 1;
            if state.fail_next > 0 {
                state.fail_next -= 1;
                ConnectPlan::Refuse
            } else if state.hang_next > 0 {
                state.hang_next -= 1;
                ConnectPlan::Hang
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                state.sessions.push(SessionEntry { channel, tx });
                ConnectPlan::Accept(rx)
            }
        };

        match plan {
            ConnectPlan::Accept(rx) => Ok(Box::new(InMemorySession { rx })),
            ConnectPlan::Refuse => Err(QueueSyncError::Handshake("refused by test broker".to_string())),
            ConnectPlan::Hang => std::future::pending().await,
        }
    }
}

struct InMemorySession {
    rx: mpsc::UnboundedReceiver<Signal>,
}

#[async_trait]
impl RealtimeSession for InMemorySession {
    async fn next_update(&mut self) -> Result<Option<QueueUpdate>, QueueSyncError> {
        match self.rx.recv().await {
            Some(Signal::Update(update)) => Ok(Some(update)),
            Some(Signal::Fail(reason)) => Err(QueueSyncError::Transport(reason)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), QueueSyncError> {
        self.rx.close();
        Ok(())
    }
}
