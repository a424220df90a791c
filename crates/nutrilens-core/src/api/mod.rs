//! REST API client module for the NutriLens backend.
//!
//! This module provides the `ApiClient` for account creation, login,
//! label analysis and health-profile storage.
//!
//! Authenticated endpoints take the bearer token issued by `POST /token`.
//! Calls that need one are refused locally when no token is set.

pub mod client;
pub mod error;

pub use client::{ApiClient, LabelImage};
pub use error::{ApiError, ErrorKind};
