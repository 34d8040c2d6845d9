use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use anyhow::Context;
use http::{Method, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod clock;
mod config;
mod error;
mod state;

mod extractors;

mod models {
    pub mod academic;
    pub mod cache;
    pub mod session;
}

mod repositories {
    pub mod memory_store;
    pub mod redis_store;
    pub mod store;
}

mod services {
    pub mod auth;
    pub mod handshake;
    pub mod pipeline;
    pub mod portal;
    pub mod probe;
}

mod handlers {
    pub mod academic;
    pub mod auth;
}

mod middleware_layer {
    pub mod auth;
}

mod validation {
    pub mod auth;
    pub mod extract;
}

#[cfg(test)]
mod test_support;

use config::Config;
use state::AppState;

/// Login attempts one peer may burst before being throttled.
const LOGIN_BURST: u32 = 5;
/// Seconds after which one throttled login attempt is given back.
const LOGIN_REPLENISH_SECS: u64 = 6;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let app = build_router(state)?;

    tracing::info!("🚀 Server listening on http://{}", config.bind_addr);
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Assembles the HTTP surface around `state`.
///
/// Spawns the task that prunes the login rate limiter, so it has to run
/// inside a Tokio runtime.
fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origins = state
        .config
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .expose_headers([header::HeaderName::from_static("x-cache")])
        .max_age(Duration::from_secs(86400));

    let login_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(LOGIN_REPLENISH_SECS)
            .burst_size(LOGIN_BURST)
            .use_headers()
            .finish()
            .context("Invalid login rate limit")?,
    );

    let limiter = login_governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            tracing::debug!("🧹 Pruning login rate limiter ({} peers)", limiter.len());
            limiter.retain_recent();
        }
    });

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(GovernorLayer::new(login_governor_conf))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/cache/invalidate", post(handlers::auth::invalidate_cache))
        .route("/api/academic/absen", get(handlers::academic::attendance))
        .route("/api/academic/frs", get(handlers::academic::study_plan))
        .route("/api/academic/jadwal", get(handlers::academic::schedule))
        .route("/api/academic/nilai", get(handlers::academic::grades))
        .route("/api/academic/logbook", get(handlers::academic::logbook))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(login_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors);

    Ok(app)
}
