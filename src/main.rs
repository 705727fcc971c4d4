use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use squash_credentials::config::{load_config, CredentialsConfig};
use squash_credentials::credentials::{CredentialStore, ManageableCredentials, ServerId};
use tracing::info;

/// Administration of application-level credentials for external servers.
#[derive(Parser)]
#[command(name = "squash-credentials", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "SQUASH_CREDENTIALS_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether an encryption secret is configured
    Status,
    /// List server ids with stored credentials
    List,
    /// Store basic credentials for a server
    StoreBasic {
        #[arg(long)]
        server_id: ServerId,
        #[arg(long)]
        username: String,
        /// Environment variable holding the password
        #[arg(long, default_value = "SQUASH_SERVER_PASSWORD")]
        password_env: String,
    },
    /// Store an API token for a server
    StoreToken {
        #[arg(long)]
        server_id: ServerId,
        /// Environment variable holding the token
        #[arg(long, default_value = "SQUASH_SERVER_TOKEN")]
        token_env: String,
    },
    /// Show the kind of credentials stored for a server
    Show {
        #[arg(long)]
        server_id: ServerId,
    },
    /// Delete the credentials of a server
    Delete {
        #[arg(long)]
        server_id: ServerId,
    },
}

fn read_secret_env(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{} is not set", name))?;
    if value.is_empty() {
        bail!("{} is empty", name);
    }
    Ok(value)
}

fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squash_credentials=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CredentialsConfig::default(),
    };
    config.apply_env_overrides();

    info!(database = %config.store.database_path, "Opening credential store");
    let store = CredentialStore::new(&config.store.database_path, config.store.secret.as_deref())
        .context("Failed to initialize credential store")?;

    match cli.command {
        Command::Status => {
            if store.is_secret_configured() {
                println!("encryption secret: configured");
            } else {
                println!("encryption secret: MISSING (set SQUASH_CREDENTIALS_SECRET)");
            }
            println!("stored servers: {}", store.list_server_ids()?.len());
        }
        Command::List => {
            for server_id in store.list_server_ids()? {
                println!("{}", server_id);
            }
        }
        Command::StoreBasic {
            server_id,
            username,
            password_env,
        } => {
            let password = read_secret_env(&password_env)?;
            store.store_credentials(server_id, &ManageableCredentials::Basic { username, password })?;
            println!("stored basic credentials for server {}", server_id);
        }
        Command::StoreToken {
            server_id,
            token_env,
        } => {
            let token = read_secret_env(&token_env)?;
            store.store_credentials(server_id, &ManageableCredentials::Token { token })?;
            println!("stored token for server {}", server_id);
        }
        Command::Show { server_id } => match store.unsecured_find_credentials(server_id)? {
            Some(credentials) => println!("server {}: {}", server_id, credentials.kind()),
            None => println!("server {}: no credentials", server_id),
        },
        Command::Delete { server_id } => {
            if store.delete_credentials(server_id)? {
                println!("deleted credentials of server {}", server_id);
            } else {
                println!("server {} had no credentials", server_id);
            }
        }
    }

    Ok(())
}
