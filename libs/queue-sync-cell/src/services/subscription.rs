//! Live counter subscription.
//!
//! A [`LiveCounterSubscription`] owns one background driver per open
//! channel. The driver connects, pumps counter updates to the registered
//! listeners, and reconnects with capped exponential backoff until the
//! subscription is closed or the attempt budget runs out.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;

use crate::error::QueueSyncError;
use crate::models::{ChannelId, ConnectionState, CounterState, QueueUpdate};
use crate::services::transport::{RealtimeConnector, RealtimeSession};

const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub type UpdateListener = Box<dyn FnMut(CounterState) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed attempts tolerated before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            initial_backoff: config.reconnect_initial_backoff,
            max_backoff: config.reconnect_max_backoff,
            max_attempts: config.reconnect_max_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug)]
struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
    failures: u32,
}

impl Backoff {
    fn new(policy: ReconnectPolicy) -> Self {
        let current = policy.initial_backoff;
        Self {
            policy,
            current,
            failures: 0,
        }
    }

    fn reset(&mut self) {
        self.current = self.policy.initial_backoff;
        self.failures = 0;
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if let Some(max) = self.policy.max_attempts {
            if self.failures > max {
                return None;
            }
        }

        let base = self.current;
        self.current = (self.current * 2).min(self.policy.max_backoff);

        let jitter_ceiling = base.as_millis() as u64 / 5;
        let jitter = if jitter_ceiling > 0 {
            rand::thread_rng().gen_range(0..=jitter_ceiling)
        } else {
            0
        };
        Some(base + Duration::from_millis(jitter))
    }
}

#[derive(Default)]
struct Shared {
    listeners: Mutex<Vec<UpdateListener>>,
    latest: Mutex<Option<CounterState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum PumpExit {
    Shutdown,
    Closed,
    Failed(QueueSyncError),
}

struct Driver {
    channel: ChannelId,
    connector: Arc<dyn RealtimeConnector>,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    shared: Arc<Shared>,
}

impl Driver {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Connection {} -> {}", current, next);
            *current = next;
            true
        });
    }

    #[instrument(name = "counter_subscription", skip_all, fields(channel = %self.channel))]
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut backoff = Backoff::new(self.policy.clone());

        loop {
            self.set_state(ConnectionState::Connecting);

            let attempt = timeout(self.policy.connect_timeout, self.connector.connect(self.channel));
            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = attempt => outcome,
            };

            match outcome {
                Ok(Ok(mut session)) => {
                    backoff.reset();
                    self.set_state(ConnectionState::Connected);

                    match self.pump(session.as_mut(), &mut shutdown).await {
                        PumpExit::Shutdown => {
                            if let Err(e) = session.close().await {
                                debug!("Session close failed: {}", e);
                            }
                            break;
                        }
                        PumpExit::Closed => info!("Channel closed by server"),
                        PumpExit::Failed(e) => warn!("Connection lost: {}", e),
                    }
                    self.set_state(ConnectionState::Disconnected);
                }
                Ok(Err(e)) => {
                    warn!("Connect failed: {}", e);
                    self.set_state(ConnectionState::Error);
                }
                Err(_) => {
                    let err = QueueSyncError::ConnectTimeout {
                        timeout_ms: self.policy.connect_timeout.as_millis() as u64,
                    };
                    warn!("{}", err);
                    self.set_state(ConnectionState::Error);
                }
            }

            let Some(delay) = backoff.next_delay() else {
                warn!("Giving up after {} consecutive failures", backoff.failures - 1);
                self.set_state(ConnectionState::Error);
                return;
            };

            debug!("Reconnecting in {:?}", delay);
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    async fn pump(
        &self,
        session: &mut dyn RealtimeSession,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> PumpExit {
        loop {
            tokio::select! {
                biased;
                _ = &mut *shutdown => return PumpExit::Shutdown,
                next = session.next_update() => match next {
                    Ok(Some(update)) => self.deliver(update),
                    Ok(None) => return PumpExit::Closed,
                    Err(e) => return PumpExit::Failed(e),
                },
            }
        }
    }

    fn deliver(&self, update: QueueUpdate) {
        if let Some(doctor_id) = update.doctor_id {
            if doctor_id != self.channel.0 {
                warn!("Dropping update for channel {} delivered on {}", doctor_id, self.channel);
                return;
            }
        }

        let counter = update.counter();
        debug!("Counter update: {}", counter);

        *lock(&self.shared.latest) = Some(counter);
        for listener in lock(&self.shared.listeners).iter_mut() {
            listener(counter);
        }
    }
}

struct ActiveSubscription {
    channel: ChannelId,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Keeps one channel open and fans its counter updates out to listeners.
///
/// Listeners run on the driver task, in registration order, and survive
/// `close`/`open` cycles. A listener must not register further listeners.
pub struct LiveCounterSubscription {
    connector: Arc<dyn RealtimeConnector>,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    state: Arc<watch::Sender<ConnectionState>>,
    active: Option<ActiveSubscription>,
}

impl LiveCounterSubscription {
    pub fn new(connector: Arc<dyn RealtimeConnector>, policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            policy,
            shared: Arc::new(Shared::default()),
            state: Arc::new(state),
            active: None,
        }
    }

    /// Start streaming `channel`. Reopening the channel that is already
    /// live is a no-op; any other channel replaces the current one.
    pub async fn open(&mut self, channel: ChannelId) {
        if let Some(active) = &self.active {
            if active.channel == channel && !active.task.is_finished() {
                debug!("Channel {} already open", channel);
                return;
            }
        }

        self.close().await;
        *lock(&self.shared.latest) = None;
        self.state.send_replace(ConnectionState::Connecting);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let driver = Driver {
            channel,
            connector: Arc::clone(&self.connector),
            policy: self.policy.clone(),
            state: Arc::clone(&self.state),
            shared: Arc::clone(&self.shared),
        };
        let task = tokio::spawn(driver.run(shutdown_rx));

        info!("Opened counter subscription for channel {}", channel);
        self.active = Some(ActiveSubscription {
            channel,
            shutdown: Some(shutdown_tx),
            task,
        });
    }

    /// Register a listener for every subsequent counter update.
    pub fn on_update<F>(&self, listener: F)
    where
        F: FnMut(CounterState) + Send + 'static,
    {
        lock(&self.shared.listeners).push(Box::new(listener));
    }

    /// Stop streaming. Safe to call repeatedly; no listener fires after it returns.
    pub async fn close(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        if let Some(shutdown) = active.shutdown.take() {
            let _ = shutdown.send(());
        }

        if timeout(CLOSE_GRACE, &mut active.task).await.is_err() {
            warn!("Subscription driver for {} did not stop in time, aborting", active.channel);
            active.task.abort();
            let _ = (&mut active.task).await;
        }

        self.state.send_replace(ConnectionState::Disconnected);
        info!("Closed counter subscription for channel {}", active.channel);
    }

    pub fn channel(&self) -> Option<ChannelId> {
        self.active.as_ref().map(|active| active.channel)
    }

    pub fn is_open(&self) -> bool {
        self.active.as_ref().is_some_and(|active| !active.task.is_finished())
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Most recent counter seen on the open channel.
    pub fn latest(&self) -> Option<CounterState> {
        *lock(&self.shared.latest)
    }
}

impl Drop for LiveCounterSubscription {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}
