use chrono::FixedOffset;
use sha2::{Digest, Sha256};

use crate::clock::{Clock, next_local_midnight};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::cache::CacheKey;
use crate::models::session::{AuthenticatedSession, Credentials, SubjectKey};
use crate::repositories::store::SessionStore;
use crate::services::handshake;

/// How a caller's portal session compares with the subject's liveness marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// The marker was written for this very session.
    Matches,
    /// No session of the subject was confirmed today.
    Missing,
    /// The marker belongs to another session.
    Mismatch,
}

/// A one-way fingerprint of a portal session, stored as the marker's value.
pub fn session_fingerprint(session: &str) -> String {
    hex::encode(Sha256::digest(session.as_bytes()))
}

/// Logs in to the portal.
///
/// # Arguments
///
/// * `config` - The application's configuration.
/// * `credentials` - The user's credentials.
///
/// # Returns
///
/// A `Result` containing the `AuthenticatedSession`. Rejected credentials are
/// `AppError::Authentication`; anything else is an infrastructure failure.
pub async fn login(config: &Config, credentials: Credentials) -> Result<AuthenticatedSession> {
    let session = handshake::handshake(config, credentials).await.map_err(|e| {
        let err = AppError::from(e);
        if err.is_infrastructure() {
            tracing::warn!("Portal login flow broke: {}", err);
        } else {
            tracing::info!("Portal refused the credentials");
        }
        err
    })?;

    tracing::info!("Portal login succeeded for subject {}", session.subject);
    Ok(session)
}

/// Drops every cache entry of `subject`, including its liveness marker.
///
/// Never fails: a store error is logged and the logout goes ahead.
pub async fn logout(store: &dyn SessionStore, subject: &SubjectKey) {
    match store.delete_subject(subject).await {
        Ok(removed) => tracing::debug!("Removed {} cache entries for {}", removed, subject),
        Err(e) => tracing::warn!("Cache cleanup failed on logout for {}: {}", subject, e),
    }
}

/// Drops every cache entry of `subject` and reports how many were removed.
pub async fn invalidate(store: &dyn SessionStore, subject: &SubjectKey) -> Result<u64> {
    let removed = store.delete_subject(subject).await?;
    tracing::info!("Invalidated {} cache entries for {}", removed, subject);
    Ok(removed)
}

/// Compares `session` with the session last confirmed live for `subject` today.
///
/// Only a `Marker::Matches` lets a request skip the portal. The subject comes
/// from a caller-chosen cookie, so the marker alone proves nothing.
pub async fn check_marker(
    store: &dyn SessionStore,
    subject: &SubjectKey,
    session: &str,
) -> Result<Marker> {
    let marker = match store.get(&CacheKey::liveness(subject)).await? {
        None => Marker::Missing,
        Some(stored) if stored == session_fingerprint(session) => Marker::Matches,
        Some(_) => Marker::Mismatch,
    };
    Ok(marker)
}

/// Records that `session` is live for `subject`, until the next local midnight.
///
/// Best-effort: a store error is logged and otherwise ignored.
pub async fn mark_alive(
    store: &dyn SessionStore,
    subject: &SubjectKey,
    session: &str,
    clock: &dyn Clock,
    offset: FixedOffset,
) {
    let expires_at = next_local_midnight(clock.now(), offset);
    let fingerprint = session_fingerprint(session);

    if let Err(e) = store.set(&CacheKey::liveness(subject), &fingerprint, expires_at).await {
        tracing::warn!("Failed to write liveness marker for {}: {}", subject, e);
    }
}
