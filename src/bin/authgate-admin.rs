//! Operator CLI for gateway users and signing secrets.
//!
//! Works directly against the persistent user store the server is configured
//! with, so a disabled user or a moved `denyAuthBefore` cutoff takes effect on
//! the next guarded request.
//!
//! ```bash
//! authgate-admin --storage-backend postgres --database-url postgres://... show 1234567
//! authgate-admin disable 1234567
//! authgate-admin deny-auth-before 1234567 --at 2026-01-01T00:00:00Z
//! AUTHZ_SIGNING_SECRETS=... authgate-admin generate-secret
//! ```
//!
//! Exit codes: 0 on success, 1 on general errors, 2 when the user does not exist.

use anyhow::{Result, bail};
use authgate::authz::{SigningSecretSet, generate_secret};
use authgate::errors::StorageError;
use authgate::storage::{AccessChange, ServerUser, StorageBackend, UserStore};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::process;
use std::sync::Arc;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "authgate-admin",
    about = "Administer identity gateway users and signing secrets",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Storage backend holding users
    #[arg(long, env = "STORAGE_BACKEND", default_value = "postgres")]
    storage_backend: String,

    /// Connection string for the storage backend
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Print a user record
    Show(UserArgs),
    /// Deny every current and future token of a user
    Disable(UserArgs),
    /// Allow a disabled user to authenticate again
    Enable(UserArgs),
    /// Deny authentication until a point in time
    DenyAuthBefore(DenyAuthBeforeArgs),
    /// Generate a signing secret and print the rotated secret list
    GenerateSecret(GenerateSecretArgs),
}

#[derive(Args)]
struct UserArgs {
    /// User id, the identity token subject
    user_id: String,
}

#[derive(Args)]
struct DenyAuthBeforeArgs {
    /// User id, the identity token subject
    user_id: String,

    /// RFC 3339 cutoff, defaults to now
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    /// Remove the cutoff instead of setting it
    #[arg(long, conflicts_with = "at")]
    clear: bool,
}

#[derive(Args)]
struct GenerateSecretArgs {
    /// Secret length in characters
    #[arg(long, default_value_t = 48)]
    length: usize,

    /// Current newest-first secret list to rotate
    #[arg(long, env = "AUTHZ_SIGNING_SECRETS", hide_env_values = true)]
    current: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(()) => process::exit(0),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = match err.downcast_ref::<StorageError>() {
                Some(StorageError::NotFound(_)) => 2,
                _ => 1,
            };
            process::exit(code);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::GenerateSecret(args) => generate(args),
        Commands::Show(args) => {
            let store = open_store(cli).await?;
            let user = load_user(store.as_ref(), &args.user_id).await?;
            print_user(cli, &user)
        }
        Commands::Disable(args) => {
            update(cli, &args.user_id, AccessChange::Enabled(false)).await
        }
        Commands::Enable(args) => update(cli, &args.user_id, AccessChange::Enabled(true)).await,
        Commands::DenyAuthBefore(args) => {
            let cutoff = if args.clear {
                None
            } else {
                Some(args.at.unwrap_or_else(Utc::now))
            };
            update(cli, &args.user_id, AccessChange::DenyAuthBefore(cutoff)).await
        }
    }
}

async fn open_store(cli: &Cli) -> Result<Arc<dyn UserStore>> {
    let backend = StorageBackend::parse(&cli.storage_backend, cli.database_url.as_deref())?;
    if !backend.is_persistent() {
        bail!("the memory backend lives inside the server process and cannot be administered");
    }
    Ok(backend.open().await?)
}

async fn load_user(store: &dyn UserStore, user_id: &str) -> Result<ServerUser> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("user {}", user_id)).into())
}

async fn update(cli: &Cli, user_id: &str, change: AccessChange) -> Result<()> {
    let store = open_store(cli).await?;
    let user = store
        .update_access(user_id, change)
        .await
        .map_err(|err| match err {
            StorageError::NotFound(_) => StorageError::NotFound(format!("user {}", user_id)),
            other => other,
        })?;
    print_user(cli, &user)
}

fn print_user(cli: &Cli, user: &ServerUser) -> Result<()> {
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(user)?
    } else {
        serde_json::to_string(user)?
    };
    println!("{}", rendered);
    Ok(())
}

fn generate(args: &GenerateSecretArgs) -> Result<()> {
    let secret = generate_secret(args.length);
    match args.current.as_deref().filter(|value| !value.is_empty()) {
        Some(current) => {
            let rotated = SigningSecretSet::try_from(current.to_string())?.rotate(secret)?;
            println!("AUTHZ_SIGNING_SECRETS={}", rotated.to_env_value());
        }
        None => println!("{}", secret),
    }
    Ok(())
}
