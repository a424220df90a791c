//! Application context shared by every command.
//!
//! `App` owns the session and the API client; commands borrow it and never
//! touch the session except through `login`/`logout`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use nutrilens_core::models::{
    ActivityLevel, AnalysisResult, Gender, HealthProfile, PrimaryGoal, ProfileForm,
};
use nutrilens_core::{
    ApiClient, ApiError, BusyFlag, BusyGuard, Config, LabelImage, SessionManager, TokenStore,
};

/// Field overrides for `profile set`; `None` keeps the current value.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub age: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
    pub primary_goal: Option<PrimaryGoal>,
    pub health_conditions: Option<String>,
    pub allergies: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.weight.is_none()
            && self.height.is_none()
            && self.gender.is_none()
            && self.activity_level.is_none()
            && self.primary_goal.is_none()
            && self.health_conditions.is_none()
            && self.allergies.is_none()
    }

    pub fn apply(&self, form: &mut ProfileForm) {
        if let Some(ref age) = self.age {
            form.age = age.clone();
        }
        if let Some(ref weight) = self.weight {
            form.weight = weight.clone();
        }
        if let Some(ref height) = self.height {
            form.height = height.clone();
        }
        if let Some(gender) = self.gender {
            form.gender = gender.as_str().to_string();
        }
        if let Some(level) = self.activity_level {
            form.activity_level = level.as_str().to_string();
        }
        if let Some(goal) = self.primary_goal {
            form.primary_goal = goal.as_str().to_string();
        }
        if let Some(ref conditions) = self.health_conditions {
            form.health_conditions = conditions.clone();
        }
        if let Some(ref allergies) = self.allergies {
            form.allergies = allergies.clone();
        }
    }
}

/// Main application state container
pub struct App {
    pub config: Config,
    /// Where `last_email` is recorded; `None` keeps it in memory only.
    config_path: Option<PathBuf>,
    session: SessionManager,
    api: ApiClient,

    // One backend request at a time. A front end that drives the App from
    // several tasks clones this flag to disable its submit controls.
    busy: BusyFlag,
}

impl App {
    /// Build the context and restore any persisted session.
    pub fn new(config: Config) -> Result<Self> {
        let store = config
            .open_token_store()
            .context("Failed to open token store")?;
        let mut app = Self::with_store(config, store)?;
        match Config::config_path() {
            Ok(path) => app.config_path = Some(path),
            Err(e) => warn!(error = %e, "No config directory, last email won't be saved"),
        }
        Ok(app)
    }

    pub fn with_store(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let api = ApiClient::new(config.api_base_url())?;
        debug!(base_url = api.base_url(), store = %config.token_store, "API client configured");

        let mut session = SessionManager::new(store);
        session.initialize();

        Ok(Self {
            config,
            config_path: None,
            session,
            api,
            busy: BusyFlag::new(),
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    fn begin(&self) -> Result<BusyGuard> {
        self.busy
            .try_acquire()
            .ok_or_else(|| anyhow::anyhow!("Another request is already in progress"))
    }

    /// API client carrying the current (unexpired) token, if any.
    fn authed_api(&mut self) -> ApiClient {
        let token = self.session.bearer_token().map(str::to_string);
        self.api.with_token(token)
    }

    /// A 401 means the backend no longer accepts our token: drop it locally.
    fn note_failure(&mut self, err: &ApiError) {
        if err.is_session_expired() {
            warn!("Backend rejected the session token");
            self.session.logout();
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn signup(&mut self, email: &str, password: &str) -> Result<()> {
        let _busy = self.begin()?;

        self.api.signup(email, password).await.map_err(|e| {
            error!(error = %e, "Signup failed");
            e
        })?;
        info!(email, "Account created");
        Ok(())
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<String> {
        let _busy = self.begin()?;

        let token = self.api.login(email, password).await.map_err(|e| {
            error!(error = %e, "Login failed");
            e
        })?;
        let identity = self
            .session
            .login(&token)
            .context("Server issued a token without a usable subject")?;

        self.config.last_email = Some(email.to_string());
        if let Some(ref path) = self.config_path {
            if let Err(e) = Config::remember_email_at(path, email) {
                warn!(error = %e, "Failed to save config");
            }
        }
        Ok(identity.email)
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    pub async fn analyze(&mut self, image_path: &Path) -> Result<AnalysisResult> {
        let _busy = self.begin()?;

        let api = self.authed_api();
        if !self.session.is_authenticated() {
            return Err(ApiError::NotLoggedIn("perform an analysis").into());
        }

        let image = LabelImage::from_path(image_path)?;
        match api.analyze_label(image).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(error = %e, "Analysis failed");
                self.note_failure(&e);
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Profile
    // =========================================================================

    pub async fn fetch_profile(&mut self) -> Result<Option<HealthProfile>> {
        let _busy = self.begin()?;
        self.load_profile().await
    }

    async fn load_profile(&mut self) -> Result<Option<HealthProfile>> {
        let api = self.authed_api();
        match api.fetch_profile().await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                error!(error = %e, "Profile fetch failed");
                self.note_failure(&e);
                Err(e.into())
            }
        }
    }

    /// Merge `changes` over the saved profile (or the form defaults) and save.
    pub async fn update_profile(&mut self, changes: &ProfileChanges) -> Result<HealthProfile> {
        let _busy = self.begin()?;
        let current = self.load_profile().await?;

        let mut form = match current {
            Some(ref profile) => ProfileForm::from_profile(profile),
            None => ProfileForm::default(),
        };
        changes.apply(&mut form);
        let profile = form.to_profile()?;

        let api = self.authed_api();
        match api.update_profile(&profile).await {
            Ok(()) => {
                info!("Profile updated");
                Ok(profile)
            }
            Err(e) => {
                error!(error = %e, "Profile update failed");
                self.note_failure(&e);
                Err(e.into())
            }
        }
    }
}

// =========================================================================
// Prompts
// =========================================================================

pub fn prompt_email(default: Option<&str>) -> Result<String> {
    match default {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), default) {
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => Err(anyhow::anyhow!("Email is required")),
        (false, _) => Ok(input.to_string()),
    }
}

pub fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        return Err(anyhow::anyhow!("Password is required"));
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nutrilens_core::auth::MemoryTokenStore;
    use nutrilens_core::{ErrorKind, SessionState, TokenStoreKind};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Nothing listens here; any request that reaches the wire fails.
    const DEAD_URL: &str = "http://127.0.0.1:9";

    /// `{"sub":"a@b.com","exp":4102444800}` (year 2100), unsigned.
    const LIVE_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJhQGIuY29tIiwiZXhwIjo0MTAyNDQ0ODAwfQ.sig";

    /// `{"sub":"a@b.com","exp":1000000000}` (2001), unsigned.
    const EXPIRED_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJhQGIuY29tIiwiZXhwIjoxMDAwMDAwMDAwfQ.sig";

    fn app_at(url: &str, store: Arc<MemoryTokenStore>) -> App {
        let config = Config {
            api_base_url: Some(url.to_string()),
            ..Default::default()
        };
        App::with_store(config, store).expect("app")
    }

    fn app_with(store: Arc<MemoryTokenStore>) -> App {
        app_at(DEAD_URL, store)
    }

    /// Answer one request with a canned response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.expect("read");
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.expect("write");
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    /// Headers seen and `Content-Length` bytes of body read.
    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn test_analyze_rejected_when_logged_out() {
        let mut app = app_with(Arc::new(MemoryTokenStore::new()));
        assert!(!app.session().is_loading());

        // The image doesn't exist: the login check must come first.
        let err = app
            .analyze(Path::new("/nonexistent/label.png"))
            .await
            .expect_err("logged out");
        let api_err = err.downcast_ref::<ApiError>().expect("api error");
        assert!(matches!(api_err, ApiError::NotLoggedIn(_)));
        assert!(err.to_string().contains("must be logged in"));
    }

    #[tokio::test]
    async fn test_analyze_with_expired_session_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut app = app_with(store.clone());
        // login() doesn't check expiry, so this is a session that ran out.
        app.session.login(EXPIRED_TOKEN).expect("decodes");
        assert!(app.session().is_authenticated());
        assert_eq!(store.get().as_deref(), Some(EXPIRED_TOKEN));

        let err = app
            .analyze(Path::new("/nonexistent/label.png"))
            .await
            .expect_err("expired");
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::NotLoggedIn(_))
        ));
        assert_eq!(app.session().state(), &SessionState::Anonymous);
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn test_rejected_token_clears_session() {
        let (url, server) =
            serve_once("401 Unauthorized", r#"{"detail":"Could not validate credentials"}"#).await;
        let store = Arc::new(MemoryTokenStore::with_token(LIVE_TOKEN));
        let mut app = app_at(&url, store.clone());
        assert!(app.session().is_authenticated());

        let err = app.fetch_profile().await.expect_err("rejected");
        let api_err = err.downcast_ref::<ApiError>().expect("api error");
        assert!(api_err.is_session_expired());

        assert_eq!(app.session().state(), &SessionState::Anonymous);
        assert_eq!(app.session().token(), None);
        assert_eq!(store.get(), None);

        let request = server.await.expect("server");
        assert!(request.starts_with("GET /profile/ "));
        assert!(request.contains(LIVE_TOKEN));
    }

    #[tokio::test]
    async fn test_other_rejections_keep_session() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let store = Arc::new(MemoryTokenStore::with_token(LIVE_TOKEN));
        let mut app = app_at(&url, store.clone());

        let err = app.fetch_profile().await.expect_err("server error");
        assert_eq!(err.to_string(), "boom");
        assert!(app.session().is_authenticated());
        assert_eq!(store.get().as_deref(), Some(LIVE_TOKEN));
        server.await.expect("server");
    }

    #[tokio::test]
    async fn test_login_keeps_overrides_out_of_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        Config::default().save_to(&path).expect("seed config");

        let (url, server) = serve_once(
            "200 OK",
            r#"{"access_token":"eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJhQGIuY29tIiwiZXhwIjo0MTAyNDQ0ODAwfQ.sig","token_type":"bearer"}"#,
        )
        .await;
        // As if run with `--api-url <url> --store memory`.
        let config = Config {
            api_base_url: Some(url.clone()),
            token_store: TokenStoreKind::Memory,
            last_email: None,
        };
        let mut app = App::with_store(config, Arc::new(MemoryTokenStore::new())).expect("app");
        app.config_path = Some(path.clone());

        let who = app.login("a@b.com", "pw").await.expect("login");
        assert_eq!(who, "a@b.com");
        assert_eq!(app.config.last_email.as_deref(), Some("a@b.com"));
        server.await.expect("server");

        let stored = Config::load_from(&path).expect("load");
        assert_eq!(
            stored,
            Config {
                api_base_url: None,
                token_store: TokenStoreKind::File,
                last_email: Some("a@b.com".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_second_request_refused_while_busy() {
        let mut app = app_with(Arc::new(MemoryTokenStore::with_token(LIVE_TOKEN)));

        let held = app.busy().clone().try_acquire().expect("free");
        let err = app.fetch_profile().await.expect_err("busy");
        assert!(err.to_string().contains("already in progress"));
        assert!(app.session().is_authenticated());

        drop(held);
        assert!(!app.busy().is_busy());
        let err = app.fetch_profile().await.expect_err("nothing listening");
        let api_err = err.downcast_ref::<ApiError>().expect("api error");
        assert_eq!(api_err.kind(), ErrorKind::Network);
        assert!(!app.busy().is_busy());
    }

    #[tokio::test]
    async fn test_garbage_persisted_token_is_dropped() {
        let store = Arc::new(MemoryTokenStore::with_token("not-a-jwt"));
        let app = app_with(store.clone());
        assert!(!app.session().is_authenticated());
        assert_eq!(store.get(), None);
    }

    #[tokio::test]
    async fn test_login_unreachable_server() {
        let mut app = app_with(Arc::new(MemoryTokenStore::new()));
        let err = app.login("a@b.com", "pw").await.expect_err("no server");
        let api_err = err.downcast_ref::<ApiError>().expect("api error");
        assert_eq!(api_err.kind(), ErrorKind::Network);
        assert!(!app.session().is_authenticated());
    }

    #[test]
    fn test_profile_changes_apply() {
        let mut form = ProfileForm::default();
        let changes = ProfileChanges {
            age: Some("33".into()),
            activity_level: Some(ActivityLevel::VeryActive),
            allergies: Some(String::new()),
            ..Default::default()
        };
        assert!(!changes.is_empty());
        assert!(ProfileChanges::default().is_empty());

        form.allergies = "gluten".into();
        changes.apply(&mut form);
        assert_eq!(form.age, "33");
        assert_eq!(form.activity_level, "Very Active");
        assert_eq!(form.gender, "Male");
        // An explicit empty value clears the field.
        assert_eq!(form.allergies, "");
    }
}
