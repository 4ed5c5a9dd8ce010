use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".review-relay.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid server port {value:?}: expected an integer between 0 and 65535")]
    InvalidPort { value: String },

    #[error("Invalid {field}: must be at least 1 second")]
    InvalidTimeout { field: &'static str },

    #[error("GitHub token not provided (pass it as the first argument or set GITHUB_TOKEN)")]
    MissingToken,

    #[error("Pull request URL not provided (pass it as the second argument or set PULL_REQUEST_URL)")]
    MissingPullRequestUrl,
}

/// Top-level configuration loaded from .review-relay.toml.
///
/// Every field has a default, so the relay runs with no file at all as long
/// as a token and a pull request URL arrive from the environment or the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub review: ReviewConfig,

    #[serde(default)]
    pub emitter: EmitterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the webhook receiver listens on
    pub port: u16,
    /// Route accepting GitHub webhook deliveries
    pub webhook_path: String,
    /// Upper bound on the graceful drain after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            webhook_path: "/webhook/github".to_string(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// Base URL of the REST API
    pub api_base_url: String,
    /// Sent as User-Agent, which the GitHub API requires
    pub user_agent: String,
    /// Client-level timeout applied to every request
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base_url: "https://api.github.com".to_string(),
            user_agent: "review-relay".to_string(),
            timeout_secs: 30,
        }
    }
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Diff position attached to every placeholder comment
    pub position: u32,
    /// Placeholder comment body
    pub body: String,
    /// Whether the rendered review is posted back to the pull request
    pub post_comments: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            position: 1,
            body: "Please review this file.".to_string(),
            post_comments: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Send the synthesized pull request event at start-up
    pub enabled: bool,
    /// Webhook receiver; defaults to this process's own webhook route
    pub target_url: Option<String>,
    /// Value of the X-Hub-Signature-256 header
    pub signature: String,
    pub head_sha: String,
    pub base_sha: String,
    /// Pull request the demo event describes. Falls back to PULL_REQUEST_URL.
    pub pull_request_url: Option<String>,
    /// Timeout for the delivery request. The receiver answers before the
    /// review runs, so this stays independent of `github.timeout_secs`.
    pub timeout_secs: u64,
}

impl EmitterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_url: None,
            signature: "sha256=dummy".to_string(),
            head_sha: "abc123".to_string(),
            base_sha: "def456".to_string(),
            pull_request_url: None,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from `path`, then fill in values from the
    /// environment. Returns the default config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a specific path without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every request fail immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "github.timeout_secs",
            });
        }
        if self.emitter.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                field: "emitter.timeout_secs",
            });
        }
        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// GITHUB_TOKEN and PULL_REQUEST_URL only fill values the file left unset;
    /// SERVER_PORT always wins over the file.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.github.token.is_none() {
            self.github.token = lookup("GITHUB_TOKEN");
        }

        if self.emitter.pull_request_url.is_none() {
            self.emitter.pull_request_url = lookup("PULL_REQUEST_URL");
        }

        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value: port.clone() })?;
        }

        Ok(())
    }

    pub fn github_token(&self) -> Result<&str, ConfigError> {
        self.github
            .token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)
    }

    pub fn pull_request_url(&self) -> Result<&str, ConfigError> {
        self.emitter
            .pull_request_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingPullRequestUrl)
    }

    /// Where the demo emitter delivers its event. Without an explicit
    /// target this is the webhook route on `bound_port`, the port the
    /// listener actually got (which differs from `server.port` when that is 0).
    pub fn emitter_target_url(&self, bound_port: u16) -> String {
        match &self.emitter.target_url {
            Some(url) => url.clone(),
            None => format!(
                "http://127.0.0.1:{}{}",
                bound_port, self.server.webhook_path
            ),
        }
    }
}
