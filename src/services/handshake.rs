//! The two-step SSO login against the portal's CAS service.
//!
//! Every attempt runs on its own `LoginClient` with a private cookie jar, so
//! concurrent logins never see each other's cookies. The client is dropped at
//! the end of the attempt.

use regex::Regex;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{StatusCode, header, redirect};
use scraper::Html;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::extractors::html::{selector, text_of};
use crate::models::academic::AcademicPeriod;
use crate::models::session::{AuthenticatedSession, Credentials, LoginToken, SessionCookie, SubjectKey};

/// The pre-auth cookie issued by the login form.
const PRE_AUTH_COOKIE: &str = "JSESSIONID";
/// CAS redirects through the portal at most this many times after login.
const MAX_LOGIN_REDIRECTS: usize = 3;

/// `<label>: <display name> (<subject key>)`, where the label is optional.
static IDENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^:(]*:)?\s*(.+?)\s*\(\s*([^()\s]+)\s*\)\s*$").expect("identity pattern compiles")
});

/// `showSomething(2024, 1)` or `showSomething(2024, 1, 5)` in the landing
/// page's `onload` handler. The optional third argument is the lecture week.
static PERIOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\w+\(\s*(\d{4})\s*,\s*(\d+)(?:\s*,\s*(\d+))?").expect("period pattern compiles")
});

/// Why a login attempt failed.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("{stage} returned HTTP {status}")]
    UnexpectedStatus {
        stage: &'static str,
        status: StatusCode,
    },

    #[error("login form did not provide {0}")]
    MissingLoginToken(&'static str),

    /// The SSO service rejected the credentials, with its message.
    #[error("{0}")]
    Rejected(String),

    #[error("portal did not issue a '{0}' cookie")]
    MissingSessionCookie(String),

    #[error("logged-in identity not found on the landing page")]
    IdentityNotFound,

    #[error("malformed subject key '{0}'")]
    MalformedSubject(String),

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Markup(String),
}

impl From<crate::extractors::ExtractError> for HandshakeError {
    fn from(err: crate::extractors::ExtractError) -> Self {
        HandshakeError::Markup(err.to_string())
    }
}

/// An HTTP client scoped to one login attempt.
struct LoginClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
}

impl LoginClient {
    fn new(config: &Config) -> Result<Self, HandshakeError> {
        let jar = Arc::new(Jar::default());

        let policy = redirect::Policy::custom(|attempt| {
            tracing::debug!("Login redirect to: {}", attempt.url());
            if attempt.previous().len() >= MAX_LOGIN_REDIRECTS {
                return attempt.stop();
            }
            attempt.follow()
        });

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .redirect(policy)
            .timeout(config.upstream_timeout);

        if let Some(url) = &config.proxy_url {
            tracing::debug!("Using proxy for login request: '{}'", url);
            builder = builder.proxy(reqwest::Proxy::all(url)?);
        }

        Ok(Self {
            http: builder.build()?,
            jar,
        })
    }

    /// The value of cookie `name` the jar would send to `url`.
    fn cookie_for(&self, url: &Url, name: &str) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let header = header.to_str().ok()?;

        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

/// Logs in to the portal with `credentials`.
///
/// # Arguments
///
/// * `config` - The application's configuration (URLs, proxy, cookie names).
/// * `credentials` - The user's credentials. Consumed, and wiped on return.
///
/// # Returns
///
/// A `Result` containing the `AuthenticatedSession`. A rejection by the SSO
/// service is `HandshakeError::Rejected`; every other error means the login
/// flow itself broke.
pub async fn handshake(
    config: &Config,
    credentials: Credentials,
) -> Result<AuthenticatedSession, HandshakeError> {
    let client = LoginClient::new(config)?;

    let token = fetch_login_token(&client, &config.login_url).await?;
    tracing::debug!("Login form token obtained");

    submit_credentials(&client, &config.login_url, credentials, token).await?;
    tracing::debug!("Credentials accepted by SSO");

    let session = client
        .cookie_for(&config.portal_url, &config.portal_session_cookie)
        .ok_or_else(|| HandshakeError::MissingSessionCookie(config.portal_session_cookie.clone()))?;

    let landing_url = config
        .portal_url
        .join(&config.portal_home_path)
        .map_err(|e| HandshakeError::Markup(format!("invalid portal home path: {}", e)))?;

    let res = client.http.get(landing_url).send().await?;
    if res.status() != StatusCode::OK {
        return Err(HandshakeError::UnexpectedStatus {
            stage: "landing page",
            status: res.status(),
        });
    }
    let body = res.text().await?;

    let landing = read_landing_page(&body)?;
    tracing::debug!("Portal identity resolved for subject {}", landing.subject);

    Ok(AuthenticatedSession {
        cookie: SessionCookie {
            value: session,
            http_only: true,
            secure: config.secure_cookies,
            domain: config.portal_url.host_str().map(str::to_string),
        },
        display_name: landing.display_name,
        subject: landing.subject,
        current_period: landing.current_period,
        current_week: landing.current_week,
    })
}

/// Step one: load the login form and collect its pre-auth cookie and `lt` token.
async fn fetch_login_token(client: &LoginClient, login_url: &Url) -> Result<LoginToken, HandshakeError> {
    let res = client.http.get(login_url.clone()).send().await?;

    if res.status() != StatusCode::OK {
        return Err(HandshakeError::UnexpectedStatus {
            stage: "login form",
            status: res.status(),
        });
    }

    let pre_auth_session = res
        .cookies()
        .find(|cookie| cookie.name() == PRE_AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or(HandshakeError::MissingLoginToken(PRE_AUTH_COOKIE))?;

    let body = res.text().await?;
    let form_token = {
        let doc = Html::parse_document(&body);
        let lt = selector("[name=lt]")?;
        doc.select(&lt)
            .next()
            .and_then(|input| input.value().attr("value"))
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or(HandshakeError::MissingLoginToken("lt"))?
    };

    Ok(LoginToken {
        pre_auth_session,
        form_token,
    })
}

/// Step two: post the credentials bound to the form token.
async fn submit_credentials(
    client: &LoginClient,
    login_url: &Url,
    credentials: Credentials,
    token: LoginToken,
) -> Result<(), HandshakeError> {
    let params = [
        ("username", credentials.identifier.as_str()),
        ("password", credentials.secret.as_str()),
        ("lt", token.form_token.as_str()),
        ("_eventId", "submit"),
        ("submit", "LOGIN"),
    ];

    let res = client
        .http
        .post(login_url.clone())
        .form(&params)
        .header(header::COOKIE, format!("{}={}", PRE_AUTH_COOKIE, token.pre_auth_session))
        .header(header::REFERER, login_url.as_str())
        .header(header::ORIGIN, login_url.origin().ascii_serialization())
        .send()
        .await?;

    if res.status() != StatusCode::OK {
        return Err(HandshakeError::UnexpectedStatus {
            stage: "credential submission",
            status: res.status(),
        });
    }

    let body = res.text().await?;
    let doc = Html::parse_document(&body);
    let errors = selector(".errors")?;

    if let Some(message) = doc.select(&errors).map(text_of).find(|text| !text.is_empty()) {
        tracing::debug!("SSO rejected the credentials: {}", message);
        return Err(HandshakeError::Rejected(message));
    }

    Ok(())
}

/// What the portal's landing page says about the logged-in user.
#[derive(Debug)]
pub(crate) struct LandingPage {
    pub display_name: String,
    pub subject: SubjectKey,
    pub current_period: Option<AcademicPeriod>,
    pub current_week: Option<u8>,
}

/// Reads the identity line and the current period and week off the landing page.
pub(crate) fn read_landing_page(body: &str) -> Result<LandingPage, HandshakeError> {
    let doc = Html::parse_document(body);
    let user_links = selector(".userout a")?;

    let (display_name, raw_subject) = doc
        .select(&user_links)
        .map(text_of)
        .find_map(|text| {
            let captures = IDENTITY_PATTERN.captures(&text)?;
            Some((captures[1].to_string(), captures[2].to_string()))
        })
        .ok_or(HandshakeError::IdentityNotFound)?;

    let subject = SubjectKey::parse(&raw_subject)
        .map_err(|_| HandshakeError::MalformedSubject(raw_subject.clone()))?;

    let body_selector = selector("body")?;
    let captures = doc
        .select(&body_selector)
        .next()
        .and_then(|body| body.value().attr("onload"))
        .and_then(|onload| PERIOD_PATTERN.captures(onload));

    let current_period = captures.as_ref().and_then(|captures| {
        Some(AcademicPeriod {
            year: captures[1].parse().ok()?,
            semester: captures[2].parse().ok()?,
        })
    });
    let current_week = captures
        .as_ref()
        .and_then(|captures| captures.get(3))
        .and_then(|week| week.as_str().parse().ok());

    Ok(LandingPage {
        display_name,
        subject,
        current_period,
        current_week,
    })
}
