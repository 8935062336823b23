//! jobdesk - command-line host for the job marketplace client.
//!
//! Wires the core request pipeline to a terminal: business errors are
//! printed to stderr, payloads are printed as pretty JSON on stdout.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobdesk_core::api::ApiClient;
use jobdesk_core::config::Config;
use jobdesk_core::models::RegisterRequest;
use jobdesk_core::notify::NotificationSink;

// ============================================================================
// Constants
// ============================================================================

/// Prefix for rolling log files when a log directory is configured
const LOG_FILE_PREFIX: &str = "jobdesk.log";

const USAGE: &str = "\
Usage: jobdesk [--log-file <dir>] <command>

Commands:
  login <email>               Sign in (prompts for password)
  register <email> <name>     Create an account (prompts for password)
  verify-otp <email> <code>   Confirm a one-time code
  status                      Show the stored session
  refresh                     Rotate the session tokens now
  get <path>                  GET an endpoint and print its payload
  post <path> <json>          POST a JSON body and print the payload
  logout                      Forget the stored session";

/// Prints user notifications to the terminal
struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn notify(&self, message: &str) {
        eprintln!("! {}", message);
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr unless a log directory is given, in which case they
/// are written to a daily rolling file. The returned guard must be held
/// until exit so buffered lines are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_override = take_flag(&mut args, "--log-file")?;

    let mut config = Config::load()?;
    config.apply_env_overrides();

    let log_dir = log_override.map(PathBuf::from).or_else(|| config.log_dir.clone());
    let _guard = init_tracing(log_dir.as_deref());
    info!(api = %config.api_base_url, "jobdesk starting");

    let Some(command) = args.first().cloned() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let client = ApiClient::from_config(&config, Arc::new(TerminalSink))?;

    match (command.as_str(), rest) {
        ("login", [email]) => {
            let password = rpassword::prompt_password("Password: ")
                .context("Failed to read password")?;
            client.auth().login(email, &password).await?;
            config.last_email = Some(email.clone());
            config.save()?;
            println!("Logged in as {}", email);
        }
        ("register", [email, name]) => {
            let password = rpassword::prompt_password("Password: ")
                .context("Failed to read password")?;
            let request = RegisterRequest {
                email: email.clone(),
                password,
                full_name: name.clone(),
                phone_number: None,
            };
            client.auth().register(&request).await?;
            config.last_email = Some(email.clone());
            config.save()?;
            println!("Registered {}", email);
        }
        ("verify-otp", [email, code]) => {
            client.auth().verify_otp(email, code).await?;
            println!("Verified {}", email);
        }
        ("status", []) => print_status(&client, &config),
        ("refresh", []) => match client.credentials().refresh().await {
            Some(_) => println!("Session refreshed"),
            None => bail!("Session could not be refreshed; please log in again"),
        },
        ("get", [path]) => {
            let payload: serde_json::Value = client.gateway().get(path).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        ("post", [path, body]) => {
            let body: serde_json::Value =
                serde_json::from_str(body).context("Request body is not valid JSON")?;
            let payload: serde_json::Value = client.gateway().post(path, &body).await?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        ("logout", []) => {
            client.auth().logout()?;
            println!("Logged out");
        }
        _ => bail!("Unrecognized command\n\n{}", USAGE),
    }

    Ok(())
}

fn print_status(client: &ApiClient, config: &Config) {
    let credentials = client.credentials();
    println!("API:      {}", config.api_base_url);
    println!("Platform: {}", config.platform);
    if let Some(ref email) = config.last_email {
        println!("Account:  {}", email);
    }
    if !credentials.has_session() {
        println!("Session:  none");
        return;
    }
    match credentials.expires_at() {
        Some(expiry) if credentials.is_expired() => {
            println!("Session:  expired at {}", expiry.to_rfc3339())
        }
        Some(expiry) => println!("Session:  valid until {}", expiry.to_rfc3339()),
        None => println!("Session:  no expiration recorded (treated as expired)"),
    }
}

/// Remove `--flag <value>` from the argument list, returning the value
fn take_flag(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} requires a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}
