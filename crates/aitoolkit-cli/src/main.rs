//! aitoolkit - command line front end for the AI toolkit account.
//!
//! Hydrates the stored session at boot, then runs one account operation
//! (login, registration, OTP, password reset, profile) or evaluates the
//! route guard for a navigation target.

use std::io::{self, Write};

use aitoolkit_core::auth::guard::requirement_for_path;
use aitoolkit_core::auth::{evaluate, AuthOutcome, GuardDecision, Route, SessionManager, SessionState};
use aitoolkit_core::config::{Config, CredentialBackend};
use aitoolkit_core::utils::password_issues;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "aitoolkit", about = "Sign in to the AI toolkit and manage your account")]
struct Cli {
    /// Backend base URL (overrides config)
    #[arg(long)]
    api_url: Option<String>,

    /// Where to keep the session: file, keyring or memory
    #[arg(long)]
    store: Option<CredentialBackend>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show who is signed in
    Status,
    /// Sign in and store the session
    Login {
        #[arg(long)]
        username: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create an account; an OTP is emailed for verification
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Submit even if the password misses the strength hints
        #[arg(long)]
        skip_checks: bool,
    },
    /// Confirm a registration with the emailed code
    VerifyOtp {
        #[arg(long)]
        email: String,
        code: String,
    },
    /// Send a fresh verification code
    ResendOtp {
        #[arg(long)]
        email: String,
    },
    /// Email a password reset code
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using the emailed code
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        skip_checks: bool,
    },
    /// Fetch account details from the backend
    Profile,
    /// Permanently delete the account and its history
    DeleteAccount {
        #[arg(long)]
        yes: bool,
    },
    /// Decide what navigating to PATH shows for the current session
    Open { path: String },
    /// Print the bearer token for authenticated requests
    Token,
    /// List the application routes and whether they need a session
    Routes,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env_overrides()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(backend) = cli.store {
        config.credential_backend = backend;
    }
    debug!(api = %config.api_base_url, backend = ?config.credential_backend, "Config loaded");

    let session = config.session_manager()?;
    let state = session.hydrate();
    debug!(?state, "Session resolved");

    match cli.command {
        Command::Status => status(&session),
        Command::Login { username } => login(&session, &config, username).await,
        Command::Logout => {
            session.logout();
            println!("Logged out.");
            Ok(())
        }
        Command::Register {
            username,
            email,
            skip_checks,
        } => {
            let password = prompt_new_password(skip_checks)?;
            let outcome = session.register(&username, &email, &password).await;
            let email = report(outcome, "Registered. Check your email for the OTP.")?;
            if let Some(email) = email {
                println!("Verify with: aitoolkit verify-otp --email {} <code>", email);
            }
            Ok(())
        }
        Command::VerifyOtp { email, code } => {
            report(session.verify_otp(&email, &code).await, "Email verified.")?;
            Ok(())
        }
        Command::ResendOtp { email } => {
            report(session.resend_otp(&email).await, "OTP resent.")?;
            Ok(())
        }
        Command::ForgotPassword { email } => {
            report(session.forgot_password(&email).await, "Reset code sent.")?;
            Ok(())
        }
        Command::ResetPassword {
            email,
            code,
            skip_checks,
        } => {
            let password = prompt_new_password(skip_checks)?;
            let outcome = session.reset_password(&email, &code, &password).await;
            report(outcome, "Password reset. You can now log in.")?;
            Ok(())
        }
        Command::Profile => {
            if let Some(profile) = report(session.refresh_profile().await, "")? {
                println!("Username: {}", profile.username);
                println!("Email:    {}", profile.email);
                println!("Records:  {}", profile.records);
            }
            Ok(())
        }
        Command::DeleteAccount { yes } => {
            if !yes && !confirm("Delete your account and all history? [y/N]: ")? {
                println!("Cancelled.");
                return Ok(());
            }
            report(session.delete_account().await, "Account deleted.")?;
            Ok(())
        }
        Command::Open { path } => open(&session, &path),
        Command::Token => match session.token() {
            Some(token) => {
                println!("{}", token);
                Ok(())
            }
            None => Err(anyhow::anyhow!("Not logged in")),
        },
        Command::Routes => {
            for route in Route::ALL {
                println!("{:<12} {:<22} {:?}", route.path(), route.title(), route.requirement());
            }
            Ok(())
        }
    }
}

fn status(session: &SessionManager) -> Result<()> {
    match session.state() {
        SessionState::Authenticated(user) => {
            println!("Logged in as {}", user.display_name());
            if let (Some(expires_at), Some(days)) = (session.expires_at(), session.days_until_expiry()) {
                println!(
                    "Session stored until {} ({} days left)",
                    expires_at.format("%Y-%m-%d %H:%M UTC"),
                    days
                );
            }
        }
        SessionState::Anonymous => println!("Not logged in."),
        SessionState::Unresolved => println!("Session not loaded yet."),
    }
    Ok(())
}

async fn login(session: &SessionManager, config: &Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.last_username.clone()) {
        Some(name) => name,
        None => prompt_line("Username: ")?,
    };
    let password = rpassword::prompt_password("Password: ")?;

    let outcome = session.login(&username, &password).await;
    let user = report(outcome, "")?;
    if let Some(user) = user {
        println!("Logged in as {}", user.display_name());
    }

    if let Err(e) = Config::remember_username(&username) {
        warn!(error = %e, "Failed to save username to config");
    }
    info!("Login complete");
    Ok(())
}

fn open(session: &SessionManager, path: &str) -> Result<()> {
    let requirement = requirement_for_path(path);
    match evaluate(&session.state(), requirement) {
        GuardDecision::Loading => println!("Loading..."),
        GuardDecision::Render => {
            let title = Route::from_path(path).map(|r| r.title()).unwrap_or("Page");
            println!("{} ({})", title, path);
        }
        GuardDecision::Redirect { to, replace } => {
            debug!(to, replace, "Guard redirect");
            println!("Login required, redirecting to {}", to);
        }
    }
    Ok(())
}

/// Print an outcome; failures become an error so the exit status is non-zero
fn report<T>(outcome: AuthOutcome<T>, success_text: &str) -> Result<Option<T>> {
    if outcome.success {
        match outcome.message.as_deref() {
            Some(message) => println!("{}", message),
            None if !success_text.is_empty() => println!("{}", success_text),
            None => {}
        }
    }
    outcome.into_result().map_err(|message| anyhow::anyhow!(message))
}

fn prompt_new_password(skip_checks: bool) -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let issues = password_issues(&password);
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        if !skip_checks {
            anyhow::bail!("Password does not meet the strength hints (use --skip-checks to submit anyway)");
        }
    }
    let confirmation = rpassword::prompt_password("Confirm password: ")?;
    if confirmation != password {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read input")?;
    Ok(input.trim().to_string())
}

fn confirm(prompt: &str) -> Result<bool> {
    let answer = prompt_line(prompt)?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

// ============================================================================
// Tests
// ============================================================================
