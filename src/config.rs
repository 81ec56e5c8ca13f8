use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_AUTH_URL: &str = "https://login.apigee.com/oauth/token";
pub const DEFAULT_BASE_URL: &str = "https://api.enterprise.apigee.com";

/// Public client pair of the platform's own CLI
pub const DEFAULT_CLIENT_ID: &str = "edgecli";
pub const DEFAULT_CLIENT_SECRET: &str = "edgeclisecret";

/// Apigee management API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Identity endpoint issuing access tokens
    #[arg(long, env = "APIGEE_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,

    /// Management API base URL
    #[arg(short = 'b', long, env = "APIGEE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Organization name
    #[arg(short = 'o', long, env = "APIGEE_ORG")]
    pub org: Option<String>,

    /// Account username (email)
    #[arg(short = 'u', long, env = "APIGEE_USERNAME")]
    pub username: Option<String>,

    /// Account password
    #[arg(short = 'p', long, env = "APIGEE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// OAuth client id presented to the identity endpoint
    #[arg(long, env = "APIGEE_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// OAuth client secret presented to the identity endpoint
    #[arg(long, env = "APIGEE_CLIENT_SECRET", default_value = DEFAULT_CLIENT_SECRET, hide_env_values = true)]
    pub client_secret: String,

    /// Items requested per page when listing
    #[arg(long, env = "APIGEE_PAGE_SIZE", default_value = "1000")]
    pub page_size: usize,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "300")]
    pub http_timeout: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, env = "HTTP_CONNECT_TIMEOUT", default_value = "30")]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List every item of an organization resource
    List {
        /// Resource path under the organization, e.g. `developers`
        resource: String,

        /// Key wrapping the entity array; enables `expand=true`
        #[arg(long)]
        envelope: Option<String>,

        /// Entity field used as the pagination cursor
        #[arg(long, default_value = "name")]
        cursor_field: String,
    },

    /// Fetch one entity
    Get { resource: String, name: String },

    /// Import a zip bundle, e.g. `import apis weather ./weather.zip`
    Import {
        resource: String,
        name: String,
        archive: PathBuf,
    },

    /// Obtain an access token and report its lifetime
    Token,
}

#[derive(Clone)]
pub struct Config {
    // Endpoints
    pub auth_url: String,
    pub base_url: String,
    pub organization: String,

    // Account
    pub username: String,
    pub password: String,

    // Identity client
    pub client_id: String,
    pub client_secret: String,

    // Listing
    pub page_size: usize,

    // HTTP client
    pub http_request_timeout: u64,
    pub http_connect_timeout: u64,

    pub log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("auth_url", &self.auth_url)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("page_size", &self.page_size)
            .field("http_request_timeout", &self.http_request_timeout)
            .field("http_connect_timeout", &self.http_connect_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration with priority: CLI > ENV (.env included) > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_args(CliArgs::parse())
    }

    /// Fold parsed arguments into a configuration and the requested command
    pub fn from_args(args: CliArgs) -> Result<(Self, Command)> {
        let config = Config {
            auth_url: args.auth_url,
            base_url: args.base_url,

            organization: args
                .org
                .context("APIGEE_ORG is required (use -o or set APIGEE_ORG env var)")?,

            username: args
                .username
                .context("APIGEE_USERNAME is required (use -u or set APIGEE_USERNAME env var)")?,

            password: args
                .password
                .context("APIGEE_PASSWORD is required (use -p or set APIGEE_PASSWORD env var)")?,

            client_id: args.client_id,
            client_secret: args.client_secret,
            page_size: args.page_size,
            http_request_timeout: args.http_timeout,
            http_connect_timeout: args.connect_timeout,
            log_level: args.log_level,
        };

        Ok((config, args.command))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("APIGEE_PAGE_SIZE must be greater than zero");
        }

        for (name, value) in [
            ("APIGEE_ORG", &self.organization),
            ("APIGEE_USERNAME", &self.username),
            ("APIGEE_PASSWORD", &self.password),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        validate_http_url("APIGEE_AUTH_URL", &self.auth_url)?;
        validate_http_url("APIGEE_BASE_URL", &self.base_url)?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_request_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http_connect_timeout)
    }
}

/// Require an absolute http(s) URL
fn validate_http_url(name: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", name, value))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("{} must use http or https, got {}", name, other),
    }
}
