//! Configuration for the ID token verification service.

use std::time::Duration;

/// Provider and transport constants.
pub mod api {
    use std::time::Duration;

    /// Google's JSON Web Key Set endpoint.
    pub const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

    /// Issuer claim used by Google Identity Services.
    pub const GOOGLE_ISSUER: &str = "https://accounts.google.com";

    /// Route the verify endpoint is mounted on.
    pub const VERIFY_PATH: &str = "/api/auth/google/verify";

    /// Request timeout for a single HTTP attempt.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Upper bound on one key-set fetch, retries included.
    pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

    /// How long a fetched key set is trusted before it is reloaded (1 hour).
    pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

    /// Minimum spacing between forced refreshes triggered by unknown key ids.
    pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

    /// Tolerated clock skew for `iat`, `nbf` and `exp`.
    pub const CLOCK_SKEW: Duration = Duration::from_secs(60);

    /// Retries for transient JWKS fetch failures.
    pub const JWKS_MAX_RETRIES: u32 = 2;

    /// Maximum idle connections kept per host.
    pub const MAX_KEEPALIVE: usize = 4;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client id; the audience every token must carry.
    pub client_id: String,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Remote JWKS endpoint.
    pub jwks_url: String,

    /// Route for the verify endpoint.
    pub verify_path: String,

    /// Whether the HTTP verify endpoint is mounted.
    pub enable_server_verify: bool,

    /// Per-attempt request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Overall bound on a key-set fetch.
    pub fetch_timeout: Duration,

    /// Key-set cache TTL.
    pub jwks_cache_ttl: Duration,

    /// Minimum interval between forced key-set refreshes.
    pub min_refresh_interval: Duration,

    /// Clock skew tolerance for time-based claims.
    pub clock_skew: Duration,

    /// Retries for transient JWKS failures.
    pub jwks_max_retries: u32,
}

impl Config {
    /// Create a configuration for Google Identity Services with the given client id.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            issuer: api::GOOGLE_ISSUER.to_string(),
            jwks_url: api::GOOGLE_JWKS_URL.to_string(),
            verify_path: api::VERIFY_PATH.to_string(),
            enable_server_verify: true,
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            fetch_timeout: api::FETCH_TIMEOUT,
            jwks_cache_ttl: api::JWKS_CACHE_TTL,
            min_refresh_interval: api::MIN_REFRESH_INTERVAL,
            clock_skew: api::CLOCK_SKEW,
            jwks_max_retries: api::JWKS_MAX_RETRIES,
        }
    }

    /// Create a test configuration pointing the JWKS endpoint at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            client_id: "client-123".to_string(),
            issuer: api::GOOGLE_ISSUER.to_string(),
            jwks_url: format!("{}/oauth2/v3/certs", base_url),
            verify_path: api::VERIFY_PATH.to_string(),
            enable_server_verify: true,
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(2),
            jwks_cache_ttl: Duration::from_secs(300),
            min_refresh_interval: Duration::ZERO, // Every unknown kid may refresh
            clock_skew: api::CLOCK_SKEW,
            jwks_max_retries: 0,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// `GOOGLE_CLIENT_ID` is required; `OIDC_ISSUER`, `JWKS_URL`, `VERIFY_PATH`
    /// and `ENABLE_SERVER_VERIFY` override the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the client id is missing or a variable is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .map_err(|_| anyhow::anyhow!("GOOGLE_CLIENT_ID is not set"))?;

        let mut config = Self::new(client_id);
        if let Ok(issuer) = std::env::var("OIDC_ISSUER") {
            config.issuer = issuer;
        }
        if let Ok(jwks_url) = std::env::var("JWKS_URL") {
            config.jwks_url = jwks_url;
        }
        if let Ok(path) = std::env::var("VERIFY_PATH") {
            config.verify_path = path;
        }
        if let Ok(flag) = std::env::var("ENABLE_SERVER_VERIFY") {
            config.enable_server_verify = parse_flag(&flag)
                .ok_or_else(|| anyhow::anyhow!("ENABLE_SERVER_VERIFY must be true or false"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values that would make verification unsound.
    ///
    /// # Errors
    ///
    /// Returns error on an empty client id or issuer, an unparseable JWKS URL,
    /// or a verify path that does not start with `/`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.client_id.trim().is_empty() {
            anyhow::bail!("client id must not be empty");
        }
        if self.issuer.trim().is_empty() {
            anyhow::bail!("issuer must not be empty");
        }
        url::Url::parse(&self.jwks_url)
            .map_err(|e| anyhow::anyhow!("invalid JWKS URL '{}': {e}", self.jwks_url))?;
        if !self.verify_path.starts_with('/') {
            anyhow::bail!("verify path must start with '/'");
        }
        Ok(())
    }

    /// Clock skew in whole seconds.
    #[must_use]
    pub const fn leeway_secs(&self) -> i64 {
        self.clock_skew.as_secs() as i64
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
