use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::{AppError, Result};
use crate::models::academic::AcademicPeriod;

/// The longest subject key accepted from the portal or from a cookie.
const SUBJECT_KEY_MAX_LEN: usize = 32;

/// A user's portal credentials.
///
/// Consumed by value by the handshake and never persisted. The secret is wiped
/// from memory on drop.
pub struct Credentials {
    pub identifier: String,
    pub secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(identifier: String, secret: String) -> Self {
        Self {
            identifier,
            secret: Zeroizing::new(secret),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The state handed out by the login form and required to submit credentials.
///
/// Lives for one handshake attempt. Both fields are mandatory: the SSO service
/// rejects a submission that lacks either of them.
#[derive(Debug, Clone)]
pub struct LoginToken {
    /// The pre-auth session id (`JSESSIONID`).
    pub pre_auth_session: String,
    /// The hidden `lt` form token.
    pub form_token: String,
}

/// The stable per-user identifier printed on the portal after login.
///
/// This is the cache isolation boundary, so it is restricted to ASCII
/// alphanumerics. That keeps it free of glob metacharacters and key separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    /// Parses a subject key.
    ///
    /// # Arguments
    ///
    /// * `raw` - The raw key, as scraped from the portal or read from a cookie.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SubjectKey`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw.is_empty() || raw.len() > SUBJECT_KEY_MAX_LEN {
            return Err(AppError::Validation(
                "Subject key must be between 1 and 32 characters".to_string(),
            ));
        }

        if !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Validation(
                "Subject key can only contain letters and digits".to_string(),
            ));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated portal cookie, with the attributes it is re-issued with.
#[derive(Clone)]
pub struct SessionCookie {
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub domain: Option<String>,
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("value", &"<redacted>")
            .field("http_only", &self.http_only)
            .field("secure", &self.secure)
            .field("domain", &self.domain)
            .finish()
    }
}

/// The outcome of a successful handshake.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    /// The portal session cookie.
    pub cookie: SessionCookie,
    /// The display name shown on the portal.
    pub display_name: String,
    /// The subject key shown next to the display name.
    pub subject: SubjectKey,
    /// The period the portal's landing page opens on, when it states one.
    pub current_period: Option<AcademicPeriod>,
    /// The lecture week the landing page opens on, when it states one.
    pub current_week: Option<u8>,
}

/// Per-request session state, resolved from the caller's cookies by
/// `require_auth` and stored in the request extensions.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub subject: SubjectKey,
    pub session_cookie: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_key_accepts_digits() {
        let key = SubjectKey::parse(" 1234567 ").unwrap();
        assert_eq!(key.as_str(), "1234567");
    }

    #[test]
    fn test_subject_key_rejects_glob_and_separator() {
        assert!(SubjectKey::parse("12*").is_err());
        assert!(SubjectKey::parse("12:34").is_err());
        assert!(SubjectKey::parse("").is_err());
        assert!(SubjectKey::parse(&"9".repeat(33)).is_err());
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("jane@example.ac.id".into(), "hunter2".into());
        let debug = format!("{:?}", creds);

        assert!(debug.contains("jane@example.ac.id"));
        assert!(!debug.contains("hunter2"));
    }
}
