use reqwest::header;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};

/// The process-wide client for authenticated portal reads.
///
/// Holds no cookie store: the caller's session travels on each request as an
/// explicit `Cookie` header, so one pooled client serves every user. Logins
/// never go through this client (see `services::handshake`).
#[derive(Clone)]
pub struct PortalClient {
    http: reqwest::Client,
    base: Url,
    session_cookie: String,
}

impl PortalClient {
    /// Builds the shared client from the configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.upstream_timeout);

        match &config.proxy_url {
            Some(url) => {
                tracing::info!("Using proxy for portal requests: '{}'", url);
                builder = builder.proxy(reqwest::Proxy::all(url)?);
            }
            None => tracing::info!("Not using proxy for portal requests"),
        }

        Ok(Self {
            http: builder.build()?,
            base: config.portal_url.clone(),
            session_cookie: config.portal_session_cookie.clone(),
        })
    }

    /// Resolves a portal page path against the portal root.
    pub fn page_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid portal path '{}': {}", path, e)))
    }

    /// Fetches a portal page as the owner of `session`.
    ///
    /// Only transport failures and error statuses are reported. An expired
    /// session still comes back as a 200 page, which callers have to inspect.
    ///
    /// # Arguments
    ///
    /// * `path` - The page, relative to the portal root.
    /// * `query` - The query parameters.
    /// * `session` - The portal session cookie value.
    ///
    /// # Returns
    ///
    /// A `Result` containing the page body.
    pub async fn fetch_page(
        &self,
        path: &str,
        query: &[(&str, String)],
        session: &str,
    ) -> Result<String> {
        let url = self.page_url(path)?;
        tracing::debug!("GET {}", url);

        let body = self
            .http
            .get(url)
            .query(query)
            .header(header::COOKIE, format!("{}={}", self.session_cookie, session))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(body)
    }
}
