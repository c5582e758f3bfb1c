//! Process settings
//!
//! Supplied by CLI arguments with environment-variable fallbacks.

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Connection and server settings shared by `serve` and `replay`
#[derive(Args, Clone)]
pub struct Settings {
    /// Rule file
    #[arg(long = "config", env = "ACTION_CONFIG", default_value = "config/config.yaml")]
    pub rules_path: PathBuf,

    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Jira base URL, e.g. https://mozit-test.atlassian.net
    #[arg(long, env = "JIRA_BASE_URL")]
    pub jira_base_url: String,

    /// Jira account used for API calls (enables basic auth)
    #[arg(long, env = "JIRA_USERNAME")]
    pub jira_username: Option<String>,

    #[arg(long, env = "JIRA_API_KEY", hide_env_values = true)]
    pub jira_api_key: String,

    /// Bugzilla base URL, e.g. https://bugzilla.mozilla.org
    #[arg(long, env = "BUGZILLA_BASE_URL")]
    pub bugzilla_base_url: String,

    #[arg(long, env = "BUGZILLA_API_KEY", hide_env_values = true)]
    pub bugzilla_api_key: String,

    /// Key inbound webhook and admin requests must present
    #[arg(long, env = "JBI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Transport retries per tracker call
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,
}

impl Settings {
    /// Socket address to bind
    pub fn bind_addr(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| crate::BridgeError::Config(format!("Invalid bind address: {}", e)))
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("rules_path", &self.rules_path)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jira_base_url", &self.jira_base_url)
            .field("jira_username", &self.jira_username)
            .field("jira_api_key", &"<redacted>")
            .field("bugzilla_base_url", &self.bugzilla_base_url)
            .field("bugzilla_api_key", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
