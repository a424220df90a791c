//! NutriLens client core.
//!
//! Session handling, the backend API client and the wire models shared by
//! every NutriLens front end.

pub mod api;
pub mod auth;
pub mod busy;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ErrorKind, LabelImage};
pub use auth::{Identity, SessionManager, SessionState, TokenStore};
pub use busy::{BusyFlag, BusyGuard};
pub use config::{Config, TokenStoreKind};
