//! API client for communicating with the NutriLens backend.
//!
//! This module provides the `ApiClient` struct for account creation, login,
//! label analysis and profile storage. Requests are issued once; nothing is
//! retried.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{AnalysisResult, HealthProfile};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Label analysis runs a model server-side, so allow a slow response.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const SIGNUP_FALLBACK: &str = "Failed to create account.";
const ANALYZE_FALLBACK: &str = "Failed to get a response from the server.";
const PROFILE_FETCH_FALLBACK: &str = "Failed to fetch profile data.";
const PROFILE_UPDATE_FALLBACK: &str = "Failed to update profile.";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct NewUser<'a> {
    email: &'a str,
    password: &'a str,
}

/// An image of a food label ready for upload.
#[derive(Debug, Clone)]
pub struct LabelImage {
    file_name: String,
    mime: &'static str,
    bytes: Vec<u8>,
}

impl LabelImage {
    /// Read an image from disk. Only PNG, JPEG and WEBP are accepted.
    pub fn from_path(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "label".to_string());
        let mime = Self::mime_for(&file_name)?;
        let bytes = std::fs::read(path)?;
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ApiError> {
        let file_name = file_name.into();
        let mime = Self::mime_for(&file_name)?;
        Ok(Self {
            file_name,
            mime,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn mime_for(file_name: &str) -> Result<&'static str, ApiError> {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok("image/png"),
            "jpg" | "jpeg" => Ok("image/jpeg"),
            "webp" => Ok("image/webp"),
            _ => Err(ApiError::UnsupportedImage(file_name.to_string())),
        }
    }
}

/// API client for the NutriLens backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against `base_url` (e.g. `http://localhost:8000`)
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: Option<String>) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token, or a local refusal before anything goes on the wire.
    fn bearer(&self, action: &'static str) -> Result<&str, ApiError> {
        self.token.as_deref().ok_or(ApiError::NotLoggedIn(action))
    }

    /// Check if response is successful, mapping the error body if not.
    async fn check_response(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %ApiError::truncate_body(&body), "Request rejected");
            Err(ApiError::from_status(status, &body, fallback))
        }
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    // ===== Accounts =====

    /// Exchange email and password for an access token.
    /// Any non-2xx answer is reported as bad credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/token"))
            .form(&[("username", email), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Login rejected");
            return Err(ApiError::InvalidCredentials);
        }

        let token: TokenResponse = Self::parse_json(response).await?;
        Ok(token.access_token)
    }

    /// Register a new account.
    pub async fn signup(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/users/"))
            .json(&NewUser { email, password })
            .send()
            .await?;

        Self::check_response(response, SIGNUP_FALLBACK).await?;
        Ok(())
    }

    // ===== Analysis =====

    /// Upload a label photo and get the backend's assessment.
    pub async fn analyze_label(&self, image: LabelImage) -> Result<AnalysisResult, ApiError> {
        let token = self.bearer("perform an analysis")?;

        debug!(file = %image.file_name, bytes = image.len(), "Uploading label");
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name.clone())
            .mime_str(image.mime)
            .map_err(|_| ApiError::UnsupportedImage(image.file_name.clone()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("/analyze-label/"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let response = Self::check_response(response, ANALYZE_FALLBACK).await?;
        Self::parse_json(response).await
    }

    // ===== Profile =====

    /// Fetch the health profile. `Ok(None)` means none has been saved yet.
    pub async fn fetch_profile(&self) -> Result<Option<HealthProfile>, ApiError> {
        let token = self.bearer("view your profile")?;

        let response = self
            .client
            .get(self.url("/profile/"))
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No profile found");
            return Ok(None);
        }

        let response = Self::check_response(response, PROFILE_FETCH_FALLBACK).await?;
        Self::parse_json(response).await.map(Some)
    }

    /// Create or replace the health profile.
    pub async fn update_profile(&self, profile: &HealthProfile) -> Result<(), ApiError> {
        let token = self.bearer("update your profile")?;

        let response = self
            .client
            .put(self.url("/profile/"))
            .bearer_auth(token)
            .json(profile)
            .send()
            .await?;

        Self::check_response(response, PROFILE_UPDATE_FALLBACK).await?;
        Ok(())
    }
}
