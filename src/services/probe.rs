use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::error::{AppError, Result};
use crate::models::session::SubjectKey;
use crate::services::handshake::read_landing_page;
use crate::services::portal::PortalClient;

/// What the portal says about a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The portal rendered its expired-session page.
    Expired,
    /// The session is live and the portal shows it as belonging to this subject.
    Live(SubjectKey),
}

/// The fragment the portal renders in place of data once a session is gone.
///
/// The portal answers 200 either way; this database error leaking into a
/// `<select>` is the only sign the session has expired.
const EXPIRED_MARKER: &str = "option[value='ociexecute(): ORA-00936: missing expression']";

static EXPIRED_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(EXPIRED_MARKER).expect("expiry marker is a valid selector"));

/// Whether a parsed portal page is the expired-session page.
pub fn document_looks_expired(doc: &Html) -> bool {
    doc.select(&EXPIRED_SELECTOR).next().is_some()
}

/// Whether a raw portal page is the expired-session page.
pub fn looks_expired(body: &str) -> bool {
    document_looks_expired(&Html::parse_document(body))
}

/// Checks whether the portal still accepts `session`, and whose it is.
///
/// # Arguments
///
/// * `portal` - The shared portal client.
/// * `home_path` - The page that prints the logged-in identity.
/// * `session` - The portal session cookie value.
///
/// # Returns
///
/// The `ProbeOutcome`. Transport failures and a live page without a readable
/// identity are errors, never `Expired`.
pub async fn probe(portal: &PortalClient, home_path: &str, session: &str) -> Result<ProbeOutcome> {
    let body = portal.fetch_page(home_path, &[], session).await?;

    if looks_expired(&body) {
        tracing::debug!("Session probe result: expired");
        return Ok(ProbeOutcome::Expired);
    }

    let landing = read_landing_page(&body).map_err(|e| AppError::Markup(e.to_string()))?;
    tracing::debug!("Session probe result: live for {}", landing.subject);
    Ok(ProbeOutcome::Live(landing.subject))
}
