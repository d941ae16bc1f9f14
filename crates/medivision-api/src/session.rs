// Client-side session: the bearer token and the login state machine.
//
//   Anonymous --send OTP--> OtpPending --verify ok--> Authenticated
//   Authenticated --logout / 401--> Anonymous
//
// Authenticated is derived from the presence of a token. There is no expiry
// check; the server decides when a token is dead.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use medivision_core::storage::{Store, TOKEN_KEY};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    OtpPending { email: String },
    Authenticated,
}

#[derive(Debug, Default)]
struct Inner {
    token: Option<String>,
    pending_email: Option<String>,
}

/// Owns the session token. The token is cached in memory and mirrored to
/// the store; a failed write only loses persistence across restarts.
pub struct Session {
    store: Arc<Store>,
    inner: Mutex<Inner>,
}

impl Session {
    /// Restore any token persisted by a previous run.
    pub fn new(store: Arc<Store>) -> Self {
        let token = match store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Failed to read stored session token: {:#}", e);
                None
            }
        };
        Self {
            store,
            inner: Mutex::new(Inner {
                token,
                pending_email: None,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> Option<String> {
        self.inner().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner().token.is_some()
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner();
        match (&inner.token, &inner.pending_email) {
            (Some(_), _) => SessionState::Authenticated,
            (None, Some(email)) => SessionState::OtpPending {
                email: email.clone(),
            },
            (None, None) => SessionState::Anonymous,
        }
    }

    /// Record that an OTP was dispatched to `email`.
    pub fn begin_otp(&self, email: &str) {
        self.inner().pending_email = Some(email.to_string());
    }

    /// Store `token` exactly as given and enter the authenticated state.
    pub fn set_token(&self, token: &str) {
        {
            let mut inner = self.inner();
            inner.token = Some(token.to_string());
            inner.pending_email = None;
        }
        if let Err(e) = self.store.set(TOKEN_KEY, token) {
            warn!("Failed to persist session token: {:#}", e);
        }
    }

    /// Forget the token and any pending OTP.
    pub fn clear(&self) {
        let had_token = {
            let mut inner = self.inner();
            inner.pending_email = None;
            inner.token.take().is_some()
        };
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            warn!("Failed to remove stored session token: {:#}", e);
        }
        if had_token {
            info!("Session cleared");
        }
    }
}
