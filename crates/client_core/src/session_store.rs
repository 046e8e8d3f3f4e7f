use std::sync::Arc;

use shared::domain::Session;
use storage::{load_json, save_json, KeyValueStore};
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

/// Key of the persisted session record.
pub const SESSION_STORAGE_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("failed to persist session: {0:#}")]
    Persistence(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Session),
    SignedOut,
}

/// Placeholder authentication state, written through to a key-value store.
///
/// Any non-empty credentials are accepted; nothing is sent over the network.
/// The in-memory session and the persisted record are updated together: if
/// the write fails the in-memory state is rolled back and the call fails.
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            current: RwLock::new(None),
            events,
        }
    }

    /// Builds a store and restores any persisted session.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let session_store = Self::new(store);
        session_store.restore().await;
        session_store
    }

    /// Reads the persisted record once. Read or decode failures leave the
    /// store signed out.
    pub async fn restore(&self) -> bool {
        let restored = match load_json::<Session>(self.store.as_ref(), SESSION_STORAGE_KEY).await
        {
            Ok(Some(session)) if !session.email.is_empty() => Some(session),
            Ok(Some(_)) => {
                warn!("ignoring stored session without an email");
                None
            }
            Ok(None) => {
                debug!("no stored session");
                None
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to restore stored session");
                None
            }
        };

        let mut current = self.current.write().await;
        *current = restored.clone();
        drop(current);

        match restored {
            Some(session) => {
                info!(email = %session.email, "restored stored session");
                let _ = self.events.send(SessionEvent::SignedIn(session));
                true
            }
            None => false,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        require("email", email)?;
        require("password", password)?;
        self.establish(Session::new(email)).await
    }

    /// Like [`SessionStore::login`], additionally requiring a name. The name
    /// is kept on the session and persisted alongside the email.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, AuthError> {
        require("email", email)?;
        require("password", password)?;
        require("name", name)?;
        self.establish(Session::new(email).with_display_name(name))
            .await
    }

    /// Clears the session in memory and in storage. Never fails; a storage
    /// error is logged.
    pub async fn logout(&self) {
        let mut current = self.current.write().await;
        let previous = current.take();

        if let Err(err) = self.store.remove(SESSION_STORAGE_KEY).await {
            error!(error = %format!("{err:#}"), "failed to remove stored session");
        }
        drop(current);

        if let Some(session) = previous {
            info!(email = %session.email, "signed out");
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    async fn establish(&self, session: Session) -> Result<Session, AuthError> {
        let mut current = self.current.write().await;
        let previous = current.replace(session.clone());

        if let Err(err) = save_json(self.store.as_ref(), SESSION_STORAGE_KEY, &session).await {
            error!(error = %format!("{err:#}"), email = %session.email, "failed to store session");
            *current = previous;
            return Err(AuthError::Persistence(err));
        }
        drop(current);

        info!(email = %session.email, "signed in");
        let _ = self.events.send(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        return Err(AuthError::MissingField(field));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/session_store_tests.rs"]
mod tests;
