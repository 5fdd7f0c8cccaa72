//! ID Token Verifier - Entry Point
//!
//! Serves the verify endpoint over HTTP.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use id_token_verifier::{Config, VerifyServer};

#[derive(Parser, Debug)]
#[command(name = "id-token-verifier")]
#[command(about = "Verify endpoint for OpenID Connect ID tokens")]
#[command(version)]
struct Cli {
    /// OAuth client id; tokens must name it as their audience
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    client_id: String,

    /// Expected token issuer
    #[arg(long, env = "OIDC_ISSUER")]
    issuer: Option<String>,

    /// JWKS endpoint of the identity provider
    #[arg(long, env = "JWKS_URL")]
    jwks_url: Option<String>,

    /// HTTP server port
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Path of the verify endpoint
    #[arg(long, env = "VERIFY_PATH")]
    verify_path: Option<String>,

    /// Do not mount the verify endpoint (health probes only)
    #[arg(long)]
    disable_verify: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(Config, u16)> {
        let mut config = Config::new(self.client_id);
        if let Some(issuer) = self.issuer {
            config.issuer = issuer;
        }
        if let Some(jwks_url) = self.jwks_url {
            config.jwks_url = jwks_url;
        }
        if let Some(path) = self.verify_path {
            config.verify_path = path;
        }
        config.enable_server_verify = !self.disable_verify;

        config.validate()?;
        Ok((config, self.port))
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ID token verifier");

    let (config, port) = cli.into_config()?;

    tracing::info!(
        issuer = %config.issuer,
        jwks_url = %config.jwks_url,
        verify_path = %config.verify_path,
        enabled = config.enable_server_verify,
        "Loaded configuration"
    );

    let server = VerifyServer::from_config(config)?;
    server.run_http(port).await?;

    Ok(())
}
