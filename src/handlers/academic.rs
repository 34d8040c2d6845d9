use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    error::Result,
    extractors::{
        AttendanceExtractor, GradesExtractor, LogbookExtractor, PageExtractor, ScheduleExtractor,
        StudyPlanExtractor,
    },
    models::academic::{AcademicPeriod, LogbookQuery, ResourceQuery},
    models::session::SessionContext,
    state::AppState,
    validation::extract::ValidatedQuery,
};

/// Tells callers whether the record came from the cache.
const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// The response payload for academic records.
#[derive(Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

async fn serve<E: PageExtractor, Q: ResourceQuery>(
    state: &AppState,
    ctx: &SessionContext,
    extractor: E,
    query: Q,
) -> Result<Response> {
    let fetched = state.pipeline.fetch_resource(ctx, &extractor, &query).await?;

    tracing::debug!(
        "📚 {} {} for {}: {}",
        extractor.kind(),
        query.key_segments(),
        ctx.subject,
        fetched.status.as_header()
    );

    let response = DataResponse {
        success: true,
        data: fetched.record,
    };

    Ok((
        StatusCode::OK,
        [(X_CACHE, fetched.status.as_header())],
        Json(response),
    )
        .into_response())
}

/// Handles `GET /api/academic/absen`.
#[axum::debug_handler]
pub async fn attendance(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    ValidatedQuery(period): ValidatedQuery<AcademicPeriod>,
) -> Result<Response> {
    serve(&state, &ctx, AttendanceExtractor, period).await
}

/// Handles `GET /api/academic/frs`.
#[axum::debug_handler]
pub async fn study_plan(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    ValidatedQuery(period): ValidatedQuery<AcademicPeriod>,
) -> Result<Response> {
    serve(&state, &ctx, StudyPlanExtractor, period).await
}

/// Handles `GET /api/academic/jadwal`.
#[axum::debug_handler]
pub async fn schedule(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    ValidatedQuery(period): ValidatedQuery<AcademicPeriod>,
) -> Result<Response> {
    serve(&state, &ctx, ScheduleExtractor, period).await
}

/// Handles `GET /api/academic/nilai`.
#[axum::debug_handler]
pub async fn grades(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    ValidatedQuery(period): ValidatedQuery<AcademicPeriod>,
) -> Result<Response> {
    serve(&state, &ctx, GradesExtractor, period).await
}

/// Handles `GET /api/academic/logbook`, one week of the internship logbook.
#[axum::debug_handler]
pub async fn logbook(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    ValidatedQuery(query): ValidatedQuery<LogbookQuery>,
) -> Result<Response> {
    serve(&state, &ctx, LogbookExtractor, query).await
}
