use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    middleware_layer::auth::{SESSION_COOKIE, SUBJECT_COOKIE},
    models::academic::AcademicPeriod,
    models::session::{SessionContext, SubjectKey},
    services::auth as auth_service,
    state::AppState,
    validation::{auth::LoginRequest, extract::ValidatedJson},
};

/// How long the gateway's cookies live. The portal session itself may die
/// sooner; `require_auth` notices when it does.
const COOKIE_MAX_AGE_DAYS: i64 = 1;

/// The profile returned on login.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub subject_key: String,
    pub current_period: Option<AcademicPeriod>,
    pub week: Option<u8>,
}

/// The response payload for login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub data: Profile,
}

/// The response payload for logout.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// The response payload for cache invalidation.
#[derive(Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub removed: u64,
}

/// Creates an http-only cookie with the given name, value, and max age.
fn create_secure_cookie(name: &'static str, value: String, max_age_days: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    cookie.set_http_only(true);
    if secure {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_days * 86400));
    cookie.set_path("/");

    cookie
}

/// Creates an already-expired cookie that makes the browser drop `name`.
fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_max_age(Duration::seconds(0));
    cookie.set_path("/");
    cookie
}

/// Handles portal login.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for: {}", payload.email);

    let session = auth_service::login(&state.config, payload.into_credentials()).await?;

    auth_service::mark_alive(
        state.store.as_ref(),
        &session.subject,
        &session.cookie.value,
        state.clock.as_ref(),
        state.config.utc_offset,
    )
    .await;

    cookies.add(create_secure_cookie(
        SESSION_COOKIE,
        session.cookie.value.clone(),
        COOKIE_MAX_AGE_DAYS,
        state.config.secure_cookies,
    ));
    cookies.add(create_secure_cookie(
        SUBJECT_COOKIE,
        session.subject.to_string(),
        COOKIE_MAX_AGE_DAYS,
        state.config.secure_cookies,
    ));
    tracing::info!("✅ User logged in: {}", session.subject);

    let response = LoginResponse {
        success: true,
        data: Profile {
            name: session.display_name,
            subject_key: session.subject.to_string(),
            current_period: session.current_period,
            week: session.current_week,
        },
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles logout.
///
/// Works without a live session: whatever the cookies name is evicted and the
/// cookies are cleared either way.
#[axum::debug_handler]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let subject = cookies
        .get(SUBJECT_COOKIE)
        .and_then(|cookie| SubjectKey::parse(cookie.value()).ok());

    if let Some(subject) = subject {
        tracing::info!("👋 Logout for subject: {}", subject);
        auth_service::logout(state.store.as_ref(), &subject).await;
    }

    cookies.remove(expired_cookie(SESSION_COOKIE));
    cookies.remove(expired_cookie(SUBJECT_COOKIE));

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles explicit cache invalidation for the caller.
#[axum::debug_handler]
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<Response> {
    let removed = auth_service::invalidate(state.store.as_ref(), &ctx.subject).await?;

    let response = InvalidateResponse {
        success: true,
        removed,
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
