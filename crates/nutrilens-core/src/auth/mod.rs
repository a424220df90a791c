//! Authentication module for the client-side session.
//!
//! This module provides:
//! - `SessionManager`: the token, the identity derived from it, and the
//!   loading flag, restored once at startup
//! - `TokenStore`: the durable `authToken` slot (file, OS keyring or memory)
//! - `decode_claims`: unverified JWT payload decoding
//!
//! Signatures are never checked here; the backend does that on every request.

pub mod session;
pub mod store;
pub mod token;

pub use session::{Identity, SessionManager, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore, TOKEN_SLOT};
pub use token::{decode_claims, Claims, TokenError};
