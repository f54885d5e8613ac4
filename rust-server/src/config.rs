//! Configuration module for environment variable parsing.

use std::env;

use tracing::warn;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Base URL the tracking endpoints are reachable at, embedded in
    /// every outgoing body (redirect links and open pixel). No
    /// trailing slash.
    pub public_base_url: String,

    /// Display name used when a send account carries no from_name
    pub default_from_name: String,

    /// Bearer token granting the administrative role (development
    /// convenience for the bundled authenticator)
    pub admin_api_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let default_base = format!("http://localhost:{port}");
        let public_base_url = match env::var("PUBLIC_BASE_URL") {
            Ok(raw) => normalize_base_url(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Invalid PUBLIC_BASE_URL, using default");
                default_base.clone()
            }),
            Err(_) => default_base,
        };

        Config {
            port,
            public_base_url,
            default_from_name: env::var("DEFAULT_FROM_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "CRM".to_string()),
            admin_api_token: env::var("ADMIN_API_TOKEN").ok(),
        }
    }
}

/// Validate an absolute http(s) base URL and trim any trailing slash.
fn normalize_base_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    Some(raw.trim_end_matches('/').to_string())
}
