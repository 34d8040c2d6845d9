//! Page extractors: pure transforms from a portal page to a typed record.
//!
//! Each page kind has one `PageExtractor`. Markup details stay inside the
//! extractor, so a layout change on the portal touches only that file.

use scraper::Html;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::models::cache::ResourceKind;
use crate::services::probe::document_looks_expired;

pub mod attendance;
pub mod grades;
pub mod html;
pub mod logbook;
pub mod schedule;
pub mod study_plan;

pub use attendance::AttendanceExtractor;
pub use grades::GradesExtractor;
pub use logbook::LogbookExtractor;
pub use schedule::ScheduleExtractor;
pub use study_plan::StudyPlanExtractor;

/// Why a page could not be turned into a record.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The page is the portal's expired-session page.
    #[error("portal session expired")]
    Expired,

    /// The page does not have the shape the extractor expects.
    #[error("{0}")]
    Markup(String),
}

/// Turns one kind of portal page into a record.
pub trait PageExtractor: Send + Sync {
    /// The record this extractor produces.
    type Record: Serialize + DeserializeOwned + Send + Sync;

    /// The page kind this extractor reads.
    fn kind(&self) -> ResourceKind;

    /// Reads the record's fields out of a page known not to be expired.
    fn extract(&self, doc: &Html) -> Result<Self::Record, ExtractError>;
}

/// Parses `body` and runs `extractor` on it, checking for session expiry first.
pub fn extract_page<E>(extractor: &E, body: &str) -> Result<E::Record, ExtractError>
where
    E: PageExtractor + ?Sized,
{
    let doc = Html::parse_document(body);

    if document_looks_expired(&doc) {
        tracing::debug!("{} page carries the expired-session marker", extractor.kind());
        return Err(ExtractError::Expired);
    }

    extractor.extract(&doc)
}
