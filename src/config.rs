//! Configuration for altprod
//!
//! CLI arguments and environment variable handling using clap.
//! Every option has an environment fallback so a `.env` file is enough
//! to run the service.

use clap::{Parser, ValueEnum};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use uuid::Uuid;

/// Secret used when running in development without ACCESS_TOKEN_SECRET
const DEV_TOKEN_SECRET: &str = "dev-only-insecure-secret-do-not-deploy-0000";

/// Minimum secret length accepted in production
pub const MIN_SECRET_LEN: usize = 32;

/// Alternative product information system server
#[derive(Parser, Debug, Clone)]
#[command(name = "altprod")]
#[command(about = "Boycott queries, product recommendations and reviews over HTTP")]
pub struct Args {
    /// Unique node identifier for this server instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Deployment mode; controls cookie security attributes
    #[arg(long = "environment", env = "NODE_ENV", value_enum, default_value_t = DeploymentMode::Development)]
    pub mode: DeploymentMode,

    /// Store configuration
    #[command(flatten)]
    pub store: StoreArgs,

    /// Secret used to sign access tokens (required in production)
    #[arg(long, env = "ACCESS_TOKEN_SECRET")]
    pub access_token_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "TOKEN_EXPIRY_SECONDS", default_value = "3600")]
    pub token_expiry_seconds: u64,

    /// Comma-separated list of origins allowed to make credentialed requests
    #[arg(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:5173,http://localhost:5174"
    )]
    pub cors_origins: String,

    /// Require a valid token on the per-user listing routes
    #[arg(long, env = "PROTECT_USER_ROUTES", default_value = "false")]
    pub protect_user_routes: bool,

    /// Page size of the recent queries view
    #[arg(long, env = "RECENT_QUERIES_LIMIT", default_value = "8")]
    pub recent_queries_limit: i64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Document store configuration
#[derive(Parser, Debug, Clone)]
pub struct StoreArgs {
    /// Which store backs the service
    #[arg(long = "store-backend", env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Mongo)]
    pub backend: StoreBackend,

    /// Full MongoDB URI; overrides the URI composed from DB_USER/DB_PASS/MONGODB_HOST
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// MongoDB user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// MongoDB password
    #[arg(long, env = "DB_PASS")]
    pub db_pass: Option<String>,

    /// MongoDB SRV host (cluster address)
    #[arg(long, env = "MONGODB_HOST", default_value = "localhost")]
    pub mongodb_host: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "queryDB")]
    pub mongodb_db: String,

    /// Upper bound on any single store operation, in milliseconds
    #[arg(long = "store-timeout-ms", env = "STORE_TIMEOUT_MS", default_value = "5000")]
    pub timeout_ms: u64,
}

/// Deployment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentMode::Production => write!(f, "production"),
            DeploymentMode::Development => write!(f, "development"),
        }
    }
}

/// Which document store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl StoreArgs {
    /// Effective MongoDB connection URI
    pub fn connection_uri(&self) -> String {
        if let Some(ref uri) = self.mongodb_uri {
            return uri.clone();
        }

        match (&self.db_user, &self.db_pass) {
            (Some(user), Some(pass)) => format!(
                "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
                urlencoding::encode(user),
                urlencoding::encode(pass),
                self.mongodb_host
            ),
            _ => format!("mongodb://{}:27017", self.mongodb_host),
        }
    }

    /// Connection URI with credentials masked, for logging
    pub fn redacted_uri(&self) -> String {
        let uri = self.connection_uri();
        match (uri.find("://"), uri.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
            }
            _ => uri,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.mode == DeploymentMode::Production
    }

    /// Get effective token secret (uses a built-in secret in development)
    pub fn token_secret(&self) -> Option<String> {
        match (&self.access_token_secret, self.mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, DeploymentMode::Development) => Some(DEV_TOKEN_SECRET.to_string()),
            (None, DeploymentMode::Production) => None,
        }
    }

    /// Parsed CORS allow-list
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production() {
            match &self.access_token_secret {
                None => {
                    return Err("ACCESS_TOKEN_SECRET is required in production mode".to_string())
                }
                Some(secret) if secret.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "ACCESS_TOKEN_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.token_expiry_seconds == 0 {
            return Err("TOKEN_EXPIRY_SECONDS must be greater than zero".to_string());
        }

        if self.recent_queries_limit <= 0 {
            return Err("RECENT_QUERIES_LIMIT must be positive".to_string());
        }

        if self.store.timeout_ms == 0 {
            return Err("STORE_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.store.backend == StoreBackend::Mongo
            && self.store.db_user.is_some() != self.store.db_pass.is_some()
        {
            return Err("DB_USER and DB_PASS must be set together".to_string());
        }

        Ok(())
    }
}
