//! Fleet CLI - operator tools
//!
//! Usage:
//!   fleet hash-password [--password <pw>]
//!   fleet sign-token --sub <user-id> --role <admin|driver>
//!   fleet inspect-token <token>
//!   fleet geocode <address>...

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fleet_api::auth::{token, Claims, CredentialHasher, TokenCodec};
use fleet_core::{AuthConfig, Role};
use fleet_geocode::{GeocodeOrchestrator, MapboxClient};
use std::io::BufRead;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Fleet dispatch operator tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password the way the server stores it
    HashPassword {
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign a bearer token
    SignToken {
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
        /// Subject user id
        #[arg(long)]
        sub: String,
        #[arg(long, default_value = "driver")]
        role: Role,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        email_or_phone: Option<String>,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl: i64,
    },
    /// Verify a bearer token and print its claims
    InspectToken {
        token: String,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Geocode addresses through Mapbox
    Geocode {
        #[arg(required = true)]
        addresses: Vec<String>,
        #[arg(long, env = "MAPBOX_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "MAPBOX_BASE_URL", default_value = "https://api.mapbox.com")]
        base_url: String,
    },
}

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("empty password");
    }
    Ok(password)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => {
            let password = read_password(password)?;
            let hasher = CredentialHasher::from_config(&AuthConfig::default())?;
            println!("{}", hasher.hash(&password).await?);
        }
        Commands::SignToken {
            secret,
            sub,
            role,
            full_name,
            email_or_phone,
            ttl,
        } => {
            if ttl <= 0 {
                bail!("ttl must be positive");
            }
            let iat = Utc::now().timestamp();
            let claims = Claims {
                sub,
                role,
                full_name,
                email_or_phone,
                must_change_password: false,
                iat,
                exp: iat + ttl,
            };
            println!("{}", token::sign(&claims, secret.as_bytes())?);
        }
        Commands::InspectToken { token, secret } => {
            let codec = TokenCodec::new(secret, 0);
            let claims = codec.verify(&token)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
        Commands::Geocode {
            addresses,
            access_token,
            base_url,
        } => {
            let addresses =
                fleet_geocode::normalize_addresses(&serde_json::json!(addresses))?;
            let client = MapboxClient::with_base_url(&access_token, &base_url);
            let orchestrator = GeocodeOrchestrator::new(Arc::new(client));
            let report = orchestrator.geocode(&addresses).await?;
            tracing::info!(outcome = ?report.outcome(), "geocode finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
