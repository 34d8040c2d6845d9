use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    error::{AppError, Result},
    models::session::{SessionContext, SubjectKey},
    services::auth::{self as auth_service, Marker},
    services::probe::{self, ProbeOutcome},
    state::AppState,
};

/// The cookie carrying the caller's portal session.
pub const SESSION_COOKIE: &str = "session_id";
/// The cookie carrying the caller's subject key.
pub const SUBJECT_COOKIE: &str = "subject_key";

/// Extracts the caller's identity from the request cookies.
///
/// # Arguments
///
/// * `cookies` - The request cookies.
///
/// # Returns
///
/// An `Option` containing the `SessionContext` if both cookies are present
/// and well-formed.
fn extract_session(cookies: &Cookies) -> Option<SessionContext> {
    let session_cookie = cookies
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())?;

    let subject = cookies
        .get(SUBJECT_COOKIE)
        .and_then(|cookie| SubjectKey::parse(cookie.value()).ok())?;

    Some(SessionContext {
        subject,
        session_cookie,
    })
}

/// A middleware that requires a live portal session owned by the caller's
/// subject.
///
/// A liveness marker written today for this very session lets the request
/// through without contacting the portal. Otherwise the portal's home page is
/// read with the caller's session and must name the subject from the cookie.
/// A dead session evicts the subject's cache, unless a different session of
/// the subject is live today.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response` or an `AppError`.
pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    tracing::debug!("🔐 Checking authentication...");

    let ctx = extract_session(&cookies).ok_or_else(|| {
        tracing::debug!("❌ Missing or malformed session cookies");
        AppError::Unauthorized
    })?;

    let store = state.store.as_ref();
    let marker = auth_service::check_marker(store, &ctx.subject, &ctx.session_cookie).await?;

    if marker == Marker::Matches {
        tracing::debug!("✅ Liveness marker matches for {}", ctx.subject);
    } else {
        let outcome = probe::probe(
            &state.portal,
            &state.config.portal_home_path,
            &ctx.session_cookie,
        )
        .await?;

        match outcome {
            ProbeOutcome::Live(owner) if owner == ctx.subject => {
                tracing::debug!("✅ Session probe passed for {}", ctx.subject);
                auth_service::mark_alive(
                    store,
                    &ctx.subject,
                    &ctx.session_cookie,
                    state.clock.as_ref(),
                    state.config.utc_offset,
                )
                .await;
            }
            ProbeOutcome::Live(owner) => {
                tracing::warn!("❌ Session of {} presented for subject {}", owner, ctx.subject);
                return Err(AppError::Unauthorized);
            }
            ProbeOutcome::Expired if marker == Marker::Missing => {
                tracing::info!("❌ Portal session expired for {}", ctx.subject);
                auth_service::logout(store, &ctx.subject).await;
                return Err(AppError::Unauthorized);
            }
            ProbeOutcome::Expired => {
                tracing::info!("❌ Dead session presented for {}, which has a live one", ctx.subject);
                return Err(AppError::Unauthorized);
            }
        }
    }

    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}
