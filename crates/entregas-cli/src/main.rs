//! entregas - command-line client for the Entregas Plus courier backend.
//!
//! Logs in, keeps the session token in the configured credential store, and
//! issues authenticated requests against the API.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use entregas_core::api::{ApiClient, Method, ReqwestTransport, RequestDescriptor, StatusCode};
use entregas_core::auth::{AuthFlow, AuthOutcome, ConfiguredStore, CredentialStore, FileStore};
use entregas_core::Config;
use serde_json::Value;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Password source for non-interactive use
const PASSWORD_ENV: &str = "ENTREGAS_PASSWORD";

const USAGE: &str = "\
Usage: entregas <command>

Commands:
  login [EMAIL]                     Log in and store the session token
  verify <EMAIL> <CODE>             Confirm a new account with the emailed code
  logout                            End the session and forget the token
  status                            Show configuration and session state
  me                                Show the logged-in courier's profile
  request <METHOD> <PATH> [BODY]    Send an authenticated request (BODY is JSON)";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load().context("Failed to load configuration")?;
    let store = ConfiguredStore::open(&config).context("Failed to open credential store")?;
    let client = ApiClient::from_config(&config, store).context("Failed to build HTTP client")?;
    let flow = AuthFlow::new(client);
    info!(base_url = %config.base_url, command = %command, "entregas starting");

    match command.as_str() {
        "login" => login(&flow, &config, args.get(1).cloned()).await,
        "verify" => verify(&flow, &args[1..]).await,
        "logout" => {
            flow.logout().await.context("Failed to log out")?;
            println!("Logged out.");
            Ok(())
        }
        "status" => status(&flow, &config).await,
        "me" => {
            let user = flow.profile().await.context("Failed to fetch profile")?;
            println!("{} <{}> (id {})", user.name, user.email, user.id);
            Ok(())
        }
        "request" => request(&flow, &args[1..]).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command {:?}\n\n{}", other, USAGE),
    }
}

type Flow = AuthFlow<ConfiguredStore, ReqwestTransport>;

async fn login(flow: &Flow, config: &Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let mut outcome = flow
        .login(&email, &password)
        .await
        .context("Login failed")?;

    if let AuthOutcome::TwoFactorRequired { email: sent_to } = &outcome {
        println!("A verification code was sent to {}", sent_to);
        let code = prompt("Code: ")?;
        outcome = flow
            .verify_two_factor(sent_to, &code)
            .await
            .context("Two-factor verification failed")?;
    }

    Config::remember_email(&email).context("Failed to save configuration")?;
    report(outcome)
}

async fn verify(flow: &Flow, args: &[String]) -> Result<()> {
    let (Some(email), Some(code)) = (args.first(), args.get(1)) else {
        bail!("verify needs an EMAIL and a CODE\n\n{}", USAGE);
    };
    let outcome = flow
        .verify_registration(email, code)
        .await
        .context("Verification failed")?;
    report(outcome)
}

fn report(outcome: AuthOutcome) -> Result<()> {
    match outcome {
        AuthOutcome::LoggedIn { user: Some(user) } => {
            println!("Logged in as {} <{}>", user.name, user.email)
        }
        AuthOutcome::LoggedIn { user: None } => println!("Logged in."),
        AuthOutcome::TwoFactorRequired { email } => {
            bail!("The server still wants a two-factor code for {}", email)
        }
        AuthOutcome::VerificationRequired { email } => {
            println!("Account {} is not verified yet.", email);
            println!("Run `entregas verify {} <CODE>` with the code you received.", email);
        }
    }
    Ok(())
}

async fn status(flow: &Flow, config: &Config) -> Result<()> {
    let store = flow.client().store();
    println!("Backend:     {}", config.base_url);
    println!("Timeout:     {} ms", config.timeout_ms);
    println!("Auth scheme: {}", config.auth_scheme.as_str());
    println!("Profile:     {}", config.profile);
    println!("Credentials: {}", store.backend());

    match store.get().await.context("Failed to read credential store")? {
        Some(token) => {
            print!("Session:     active ({})", token);
            if let ConfiguredStore::File(file) = store {
                print_stored_at(file).await?;
            }
            println!();
        }
        None => println!("Session:     none"),
    }
    Ok(())
}

async fn print_stored_at(file: &FileStore) -> Result<()> {
    if let Some(record) = file.record().await.context("Failed to read session file")? {
        print!(", stored {}", record.stored_at.format("%Y-%m-%d %H:%M UTC"));
    }
    Ok(())
}

async fn request(flow: &Flow, args: &[String]) -> Result<()> {
    let (Some(method), Some(path)) = (args.first(), args.get(1)) else {
        bail!("request needs a METHOD and a PATH\n\n{}", USAGE);
    };
    let method: Method = method.parse()?;
    let mut descriptor = RequestDescriptor::new(method, path.as_str());
    if let Some(body) = args.get(2) {
        let body: Value = serde_json::from_str(body).context("BODY is not valid JSON")?;
        descriptor = descriptor.with_body(body);
    }

    let response = flow.client().send(descriptor).await?;
    println!("{}", response.status);

    let text = response.text();
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }

    if response.status == StatusCode::UNAUTHORIZED {
        eprintln!("Session rejected by the server. Run `entregas login` again.");
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No value entered");
    }
    Ok(line)
}
