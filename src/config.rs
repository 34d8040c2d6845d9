use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use url::Url;

/// The SSO login entry point, pre-bound to the portal as its service.
const DEFAULT_LOGIN_URL: &str = "https://login.pens.ac.id/cas/login?service=https%3A%2F%2Fonline.mis.pens.ac.id%2Findex.php%3FLogin%3D1%26halAwal%3D1";
const DEFAULT_PORTAL_URL: &str = "https://online.mis.pens.ac.id/";

/// Which `SessionStore` implementation to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// The application's configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The store backend.
    pub store_backend: StoreBackend,
    /// The SSO login URL.
    pub login_url: Url,
    /// The portal root. Always ends with `/`.
    pub portal_url: Url,
    /// The page read after login, and on each session check, to find the
    /// user's identity.
    pub portal_home_path: String,
    /// The name of the portal's session cookie.
    pub portal_session_cookie: String,
    /// The proxy all upstream traffic goes through, if any.
    pub proxy_url: Option<String>,
    /// The address to listen on.
    pub bind_addr: SocketAddr,
    /// The institution's UTC offset, used for the daily cache boundary.
    pub utc_offset: FixedOffset,
    /// The timeout for each upstream request.
    pub upstream_timeout: Duration,
    /// The deadline for a whole inbound request.
    pub request_timeout: Duration,
    /// Whether cookies issued to callers are marked `Secure`.
    pub secure_cookies: bool,
    /// Browser origins allowed to call the API with credentials.
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "redis".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "redis" => StoreBackend::Redis,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND must be 'redis' or 'memory', got '{}'", other),
        };

        let login_url = Url::parse(
            &env::var("LOGIN_URL").unwrap_or_else(|_| DEFAULT_LOGIN_URL.to_string()),
        )
        .context("LOGIN_URL must be a valid URL")?;

        let portal_url = parse_portal_url(
            &env::var("PORTAL_URL").unwrap_or_else(|_| DEFAULT_PORTAL_URL.to_string()),
        )?;

        let offset_hours: i32 = env::var("UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .context("Invalid UTC_OFFSET_HOURS")?;
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .context("UTC_OFFSET_HOURS must be between -23 and 23")?;

        Ok(Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            store_backend,
            login_url,
            portal_url,
            portal_home_path: env::var("PORTAL_HOME_PATH")
                .unwrap_or_else(|_| "mEntry_Logbook_KP1.php".to_string()),
            portal_session_cookie: env::var("PORTAL_SESSION_COOKIE")
                .unwrap_or_else(|_| "PHPSESSID".to_string()),
            proxy_url: env::var("PROXY_URL").ok().filter(|url| !url.is_empty()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            utc_offset,
            upstream_timeout: Duration::from_secs(
                env::var("UPSTREAM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid UPSTREAM_TIMEOUT_SECS")?,
            ),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_SECS")?,
            ),
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Parses the portal root, adding the trailing slash `Url::join` relies on.
pub fn parse_portal_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).context("PORTAL_URL must be a valid URL")?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
impl Config {
    /// A configuration pointing both the SSO service and the portal at a
    /// local mock server.
    pub fn for_upstream(base: &str) -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_backend: StoreBackend::Memory,
            login_url: Url::parse(&format!("{}cas/login?service=portal", base)).unwrap(),
            portal_url: parse_portal_url(&format!("{}portal", base)).unwrap(),
            portal_home_path: "mEntry_Logbook_KP1.php".to_string(),
            portal_session_cookie: "PHPSESSID".to_string(),
            proxy_url: None,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            utc_offset: FixedOffset::east_opt(7 * 3600).unwrap(),
            upstream_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            secure_cookies: false,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}
