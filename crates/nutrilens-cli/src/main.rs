//! NutriLens CLI - food label analysis from the terminal.
//!
//! Log in, upload a photo of a nutrition label, and read the backend's
//! personalized assessment. The health profile used for personalization
//! can be viewed and edited here too.

mod app;
mod format;
mod render;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nutrilens_core::auth::SessionState;
use nutrilens_core::config::TokenStoreKind;
use nutrilens_core::models::{ActivityLevel, Gender, PrimaryGoal};
use nutrilens_core::{ApiError, Config, ErrorKind};

use app::{prompt_email, prompt_password, App, ProfileChanges};

#[derive(Parser)]
#[command(name = "nutrilens", version, about = "Understand your food: AI analysis of nutrition labels")]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true, env = "NUTRILENS_API_URL")]
    api_url: Option<String>,

    /// Where to keep the session token
    #[arg(long, global = true, env = "NUTRILENS_TOKEN_STORE", value_parser = parse_store)]
    store: Option<TokenStoreKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        email: Option<String>,
    },
    /// Log in and keep the session for later commands
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Analyze a photo of a food label (PNG, JPG, or WEBP)
    Analyze {
        image: PathBuf,
        /// Print the raw analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or edit the health profile used to personalize analyses
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Show the saved profile
    Show,
    /// Change profile fields; unspecified fields keep their value
    Set(ProfileArgs),
}

#[derive(Args)]
struct ProfileArgs {
    /// Age in years (empty string clears it)
    #[arg(long)]
    age: Option<String>,
    /// Weight in kg
    #[arg(long)]
    weight: Option<String>,
    /// Height in cm
    #[arg(long)]
    height: Option<String>,
    /// Male, Female or Other
    #[arg(long, value_parser = parse_choice::<Gender>)]
    gender: Option<Gender>,
    /// Sedentary, Light, Moderate, Active or "Very Active"
    #[arg(long, value_parser = parse_choice::<ActivityLevel>)]
    activity: Option<ActivityLevel>,
    /// "Maintain Weight", "Lose Weight" or "Gain Muscle"
    #[arg(long, value_parser = parse_choice::<PrimaryGoal>)]
    goal: Option<PrimaryGoal>,
    /// Free-text health conditions
    #[arg(long)]
    conditions: Option<String>,
    /// Free-text allergies
    #[arg(long)]
    allergies: Option<String>,
}

impl From<ProfileArgs> for ProfileChanges {
    fn from(args: ProfileArgs) -> Self {
        Self {
            age: args.age,
            weight: args.weight,
            height: args.height,
            gender: args.gender,
            activity_level: args.activity,
            primary_goal: args.goal,
            health_conditions: args.conditions,
            allergies: args.allergies,
        }
    }
}

fn parse_store(s: &str) -> Result<TokenStoreKind, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn parse_choice<T>(s: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse().map_err(|e: T::Err| e.to_string())
}

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines when dropped.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn load_config(cli: &Cli) -> Config {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(ref url) = cli.api_url {
        config.api_base_url = Some(url.clone());
    }
    if let Some(store) = cli.store {
        config.token_store = store;
    }
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing();
    info!("NutriLens CLI starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "Command failed");
            eprintln!("Error: {}", user_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// The message shown for a failed command: API errors speak for themselves
/// (plus a hint where the user can act), anything else gets its full
/// context chain.
fn user_message(err: &anyhow::Error) -> String {
    let Some(api) = err.downcast_ref::<ApiError>() else {
        return format!("{:#}", err);
    };
    match api.kind() {
        ErrorKind::Network => format!("{} Check --api-url or NUTRILENS_API_URL.", api),
        ErrorKind::Authentication if matches!(api, ApiError::NotLoggedIn(_)) => {
            format!("{} Run `nutrilens login` first.", api)
        }
        ErrorKind::Authentication | ErrorKind::Rejected | ErrorKind::Local => api.to_string(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli);
    let mut app = App::new(config)?;

    match cli.command {
        Command::Signup { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_email(None)?,
            };
            let password = password_from_env_or_prompt()?;
            println!("Creating account...");
            app.signup(&email, &password).await?;
            println!("Account created successfully! Log in with `nutrilens login`.");
        }
        Command::Login { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_email(app.config.last_email.as_deref())?,
            };
            let password = password_from_env_or_prompt()?;
            println!("Logging in...");
            let who = app.login(&email, &password).await?;
            println!("Login successful! Welcome, {}.", who);
        }
        Command::Logout => {
            app.logout();
            println!("Logged out.");
        }
        Command::Whoami => whoami(&app),
        Command::Analyze { image, json } => {
            eprintln!("Analyzing {}...", image.display());
            let result = app.analyze(&image).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render::analysis(&result));
            }
        }
        Command::Profile(ProfileCommand::Show) => {
            let profile = app.fetch_profile().await?;
            print!("{}", render::profile(profile.as_ref()));
        }
        Command::Profile(ProfileCommand::Set(args)) => {
            let changes = ProfileChanges::from(args);
            if changes.is_empty() {
                return Err(anyhow::anyhow!(
                    "Nothing to change; pass at least one field (see `nutrilens profile set --help`)"
                ));
            }
            println!("Updating profile...");
            let saved = app.update_profile(&changes).await?;
            println!("Profile updated successfully!\n");
            print!("{}", render::profile(Some(&saved)));
        }
    }
    Ok(())
}

fn whoami(app: &App) {
    match app.session().state() {
        SessionState::Authenticated {
            identity,
            expires_at,
            ..
        } => {
            match expires_at {
                Some(exp) => println!(
                    "Logged in as {} (session expires in {})",
                    identity.email,
                    format::format_remaining(*exp - Utc::now())
                ),
                None => println!("Logged in as {}", identity.email),
            }
        }
        _ => println!("Not logged in. Sign up or log in to unlock personalized insights."),
    }
}

/// `NUTRILENS_PASSWORD` lets scripts log in without a terminal.
fn password_from_env_or_prompt() -> Result<String> {
    match std::env::var("NUTRILENS_PASSWORD") {
        Ok(password) if !password.is_empty() => Ok(password),
        _ => prompt_password(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_profile_set() {
        let cli = Cli::try_parse_from([
            "nutrilens",
            "profile",
            "set",
            "--age",
            "30",
            "--activity",
            "very active",
            "--goal",
            "lose_weight",
        ])
        .expect("parses");

        match cli.command {
            Command::Profile(ProfileCommand::Set(args)) => {
                let changes = ProfileChanges::from(args);
                assert_eq!(changes.age.as_deref(), Some("30"));
                assert_eq!(changes.activity_level, Some(ActivityLevel::VeryActive));
                assert_eq!(changes.primary_goal, Some(PrimaryGoal::LoseWeight));
                assert_eq!(changes.gender, None);
            }
            _ => panic!("expected profile set"),
        }
    }

    #[test]
    fn test_rejects_unknown_choice() {
        assert!(Cli::try_parse_from(["nutrilens", "profile", "set", "--gender", "robot"]).is_err());
        assert!(Cli::try_parse_from(["nutrilens", "--store", "sqlite", "whoami"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "nutrilens",
            "analyze",
            "label.jpg",
            "--json",
            "--api-url",
            "https://api.example.com",
            "--store",
            "memory",
        ])
        .expect("parses");
        assert_eq!(cli.api_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(cli.store, Some(TokenStoreKind::Memory));
        assert!(matches!(cli.command, Command::Analyze { json: true, .. }));
    }

    #[test]
    fn test_user_message() {
        let err: anyhow::Error = ApiError::InvalidCredentials.into();
        assert_eq!(user_message(&err), "Incorrect email or password.");

        let err: anyhow::Error = ApiError::NotLoggedIn("perform an analysis").into();
        assert_eq!(
            user_message(&err),
            "You must be logged in to perform an analysis. Run `nutrilens login` first."
        );

        let err: anyhow::Error = ApiError::Rejected {
            status: 400,
            detail: "Email already registered".into(),
        }
        .into();
        assert_eq!(user_message(&err), "Email already registered");

        let err = anyhow::anyhow!("inner").context("outer");
        assert_eq!(user_message(&err), "outer: inner");
    }

    #[tokio::test]
    async fn test_user_message_network_hint() {
        let client = nutrilens_core::ApiClient::new("http://127.0.0.1:9").expect("client");
        let err: anyhow::Error = client.login("a@b.com", "pw").await.expect_err("offline").into();
        assert_eq!(
            user_message(&err),
            "Could not connect to the server. Check --api-url or NUTRILENS_API_URL."
        );
    }
}
