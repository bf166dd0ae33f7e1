//! # boss-oidc CLI
//!
//! Verifies Keycloak access tokens with the configured realm keys and shows
//! what a login would produce.

use std::{
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use bossoidc_auth::{
    AccessToken, Claims, ClaimsPolicy, KeySetResolver, KeySetSource, OidcAuthenticator,
    StaticKeySetSource, TokenVerifier, extract_roles, jwt, validation::token_audience,
};
use bossoidc_config::{OidcConfig, load};
use bossoidc_observe::{LogConfig, init_logging};
use bossoidc_store::MemoryUserStore;
use clap::{Parser, Subcommand};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "bossoidc")]
#[command(about = "Keycloak token verification for boss-oidc", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "BOSSOIDC_CONFIG", default_value = "bossoidc.toml")]
    config: PathBuf,

    /// Read the key set from a JWKS file instead of the configured endpoint
    #[arg(long, global = true)]
    jwks_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a token's header and payload without verifying it
    Inspect {
        /// Compact JWS; read from stdin when omitted
        token: Option<String>,
    },
    /// Verify a token and evaluate the claims policy
    Verify {
        /// Compact JWS; read from stdin when omitted
        token: Option<String>,
        /// Userinfo JSON document to check the required claims against
        #[arg(long)]
        userinfo: Option<PathBuf>,
    },
    /// Run a full login against an empty in-memory user store
    Login {
        /// Compact JWS; read from stdin when omitted
        token: Option<String>,
        /// Userinfo JSON document (session flow)
        #[arg(long)]
        userinfo: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", args.config.display(), e);
            std::process::exit(1);
        },
    };
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        std::process::exit(1);
    }

    init_logging(LogConfig::from_level_and_format(
        &config.observability.log_level,
        &config.observability.log_format,
    )?)?;
    tracing::debug!(
        config = %args.config.display(),
        endpoint = %config.jwks_endpoint,
        "Configuration loaded"
    );

    let key_source = args.jwks_file.as_deref().map(static_source).transpose()?;

    match args.command {
        Command::Inspect { token } => inspect(&read_token(token)?),
        Command::Verify { token, userinfo } => {
            verify(&config, key_source, &read_token(token)?, userinfo.as_deref()).await
        },
        Command::Login { token, userinfo } => {
            login(config, key_source, &read_token(token)?, userinfo.as_deref()).await
        },
    }
}

fn inspect(token: &str) -> Result<()> {
    let header = jwt::decode_jwt_header(token)?;
    let claims = jwt::decode_unverified_claims(token)?;

    print_json(&json!({
        "header": header,
        "claims": claims,
        "verified": false,
    }))
}

async fn verify(
    config: &OidcConfig,
    key_source: Option<Arc<dyn KeySetSource>>,
    token: &str,
    userinfo: Option<&Path>,
) -> Result<()> {
    let resolver = match key_source {
        Some(source) => {
            KeySetResolver::new(source).with_single_key_fallback(config.single_key_fallback)
        },
        None => KeySetResolver::from_config(config)?,
    };
    let claims = TokenVerifier::new(resolver).verify(token).await?;

    let policy = ClaimsPolicy::from_config(config);
    let userinfo = userinfo.map(read_claims).transpose()?;
    let claims_check = match policy.verify_claims(userinfo.as_ref().unwrap_or(&claims)) {
        Ok(()) => json!({ "passed": true }),
        Err(e) => json!({ "passed": false, "error": e.to_string() }),
    };

    print_json(&json!({
        "claims": claims,
        "roles": extract_roles(&claims),
        "audience": token_audience(&claims),
        "audience_trusted": policy.audience_is_trusted(&claims),
        "required_claims": claims_check,
    }))
}

async fn login(
    config: OidcConfig,
    key_source: Option<Arc<dyn KeySetSource>>,
    token: &str,
    userinfo: Option<&Path>,
) -> Result<()> {
    let userinfo = userinfo.map(read_claims).transpose()?;
    let authenticator = OidcAuthenticator::builder()
        .config(config)
        .store(Arc::new(MemoryUserStore::new()))
        .maybe_key_source(key_source)
        .build()?;

    let user = authenticator
        .authenticate(&AccessToken::Bearer(token.to_string()), userinfo.as_ref())
        .await?;

    match user {
        Some(user) => print_json(&json!({ "authenticated": true, "user": user })),
        None => print_json(&json!({ "authenticated": false, "reason": "untrusted audience" })),
    }
}

fn read_token(token: Option<String>) -> Result<String> {
    let token = match token {
        Some(token) => token,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("Failed to read token from stdin")?;
            buf
        },
    };

    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("No token given");
    }
    Ok(token.to_string())
}

fn read_claims(path: &Path) -> Result<Claims> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Claims::from_value(value)?)
}

fn static_source(path: &Path) -> Result<Arc<dyn KeySetSource>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Arc::new(StaticKeySetSource::from_json(&text)?))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
