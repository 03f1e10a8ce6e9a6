use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_models::Session;
use shared_utils::jwt::decode_token;

use crate::error::AuthError;
use crate::services::store::TokenStore;

/// Holds the signed-in identity derived from the persisted token and
/// notifies registered observers whenever it changes.
pub struct IdentityProvider {
    store: Arc<dyn TokenStore>,
    state: watch::Sender<Option<Session>>,
}

impl IdentityProvider {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let initial = read_session(store.as_ref());
        let (state, _) = watch::channel(initial);
        Self { store, state }
    }

    pub fn current(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|session| session.token.clone())
    }

    /// Register for change notifications. The receiver observes every
    /// sign-in, sign-out and external token change.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Re-read the persisted token. Returns true when the identity changed.
    pub fn reload(&self) -> bool {
        let next = read_session(self.store.as_ref());
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            match self.state.borrow().as_ref() {
                Some(session) => info!("Identity changed to {} ({})", session.identity.subject, session.role()),
                None => info!("Identity cleared"),
            }
        }
        changed
    }

    pub fn sign_in(&self, token: &str) -> Result<Session, AuthError> {
        let identity = decode_token(token).map_err(AuthError::InvalidToken)?;
        self.store.save(token)?;
        self.reload();

        Ok(Session {
            token: token.trim().to_string(),
            identity,
        })
    }

    pub fn sign_out(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        self.reload();
        Ok(())
    }

    /// Poll the store so that writes made by other processes surface as
    /// change notifications. The task ends once the provider is dropped.
    pub fn spawn_store_watcher(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let provider: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(provider) = provider.upgrade() else {
                    debug!("Identity provider dropped, stopping token watcher");
                    break;
                };
                provider.reload();
            }
        })
    }
}

fn read_session(store: &dyn TokenStore) -> Option<Session> {
    let token = match store.load() {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read persisted token: {}", e);
            return None;
        }
    };

    match decode_token(&token) {
        Ok(identity) => Some(Session { token, identity }),
        Err(e) => {
            warn!("Ignoring persisted token: {}", e);
            None
        }
    }
}
