use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::store::TokenStore;
use super::token::{decode_claims, Claims, TokenError};

/// Who is logged in. Derived from the token's subject claim, never typed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Process started, persisted token not yet looked at.
    Uninitialized,
    Anonymous,
    Authenticated {
        token: String,
        identity: Identity,
        expires_at: Option<DateTime<Utc>>,
    },
}

/// Single source of truth for "is someone logged in, and who".
///
/// Reads go through the accessors; the only mutators are [`login`],
/// [`logout`] and the one-shot [`initialize`].
///
/// [`login`]: SessionManager::login
/// [`logout`]: SessionManager::logout
/// [`initialize`]: SessionManager::initialize
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    state: SessionState,
}

impl SessionManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            state: SessionState::Uninitialized,
        }
    }

    /// Restore the session from the persisted slot. Runs once; later calls
    /// are ignored.
    pub fn initialize(&mut self) {
        self.initialize_at(Utc::now());
    }

    fn initialize_at(&mut self, now: DateTime<Utc>) {
        if !self.is_loading() {
            debug!("Session already initialized");
            return;
        }

        // Every branch assigns a settled state, which is what ends loading.
        self.state = match self.restore(now) {
            Some(state) => state,
            None => SessionState::Anonymous,
        };
        debug!(authenticated = self.is_authenticated(), "Session initialized");
    }

    fn restore(&self, now: DateTime<Utc>) -> Option<SessionState> {
        let stored = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No persisted token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                return None;
            }
        };

        let claims = match decode_claims(&stored) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Failed to process persisted token, discarding");
                self.erase_persisted();
                return None;
            }
        };

        if claims.is_expired_at(now) {
            info!(exp = ?claims.exp, "Persisted token expired, discarding");
            self.erase_persisted();
            return None;
        }

        match Self::authenticated(stored, &claims) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %e, "Persisted token unusable, discarding");
                self.erase_persisted();
                None
            }
        }
    }

    /// Adopt a freshly issued token. No expiry check; the token was just
    /// minted by the backend.
    ///
    /// Fails without changing anything if the subject can't be decoded.
    pub fn login(&mut self, token: &str) -> Result<Identity, TokenError> {
        let claims = decode_claims(token)?;
        let identity = Identity {
            email: claims.subject()?.to_string(),
        };

        if let Err(e) = self.store.save(token) {
            warn!(error = %e, "Failed to persist token");
        }
        info!(email = %identity.email, "Logged in");
        self.state = SessionState::Authenticated {
            token: token.to_string(),
            identity: identity.clone(),
            expires_at: claims.expires_at(),
        };
        Ok(identity)
    }

    /// Drop the token locally. No network call.
    pub fn logout(&mut self) {
        self.erase_persisted();
        self.state = SessionState::Anonymous;
        info!("Logged out");
    }

    /// Token for an outgoing request.
    ///
    /// Expiry is checked here as well as at startup, so a token that runs
    /// out mid-session downgrades the session instead of being sent.
    pub fn bearer_token(&mut self) -> Option<&str> {
        self.bearer_token_at(Utc::now())
    }

    fn bearer_token_at(&mut self, now: DateTime<Utc>) -> Option<&str> {
        let expired = match &self.state {
            SessionState::Authenticated {
                expires_at: Some(exp),
                ..
            } => now >= *exp,
            _ => false,
        };
        if expired {
            info!("Session token expired");
            self.logout();
        }
        self.token()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn token(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { token, .. } => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            SessionState::Authenticated { expires_at, .. } => *expires_at,
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, SessionState::Uninitialized)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    fn authenticated(token: String, claims: &Claims) -> Result<SessionState, TokenError> {
        let email = claims.subject()?.to_string();
        Ok(SessionState::Authenticated {
            token,
            identity: Identity { email },
            expires_at: claims.expires_at(),
        })
    }

    fn erase_persisted(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to erase persisted token");
        }
    }
}
