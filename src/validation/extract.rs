use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use garde::Validate;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// Runs the `garde` rules of `value`.
///
/// # Returns
///
/// `AppError::Validation` listing every violated rule.
pub fn validate<T>(value: &T) -> Result<()>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| AppError::Validation(report.to_string().trim().to_string()))
}

/// A query string that has been deserialized and validated.
///
/// Missing or non-numeric fields are rejected here, before any handler code
/// (and any upstream request) runs.
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::Validation(e.body_text()))?;

        validate(&value)?;
        Ok(Self(value))
    }
}

/// A JSON body that has been deserialized and validated.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    T::Context: Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        validate(&value)?;
        Ok(Self(value))
    }
}
