use scraper::Html;

use crate::extractors::html::{cell_texts, period_options, rows_after_header};
use crate::extractors::{ExtractError, PageExtractor};
use crate::models::academic::{GradeRow, GradesRecord};
use crate::models::cache::ResourceKind;

/// Reads `nilai_sem.php`: one row per course with its final grade.
pub struct GradesExtractor;

impl PageExtractor for GradesExtractor {
    type Record = GradesRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Grades
    }

    fn extract(&self, doc: &Html) -> Result<GradesRecord, ExtractError> {
        let options = period_options(doc)?;

        let courses = rows_after_header(doc, "Kode", 0)?
            .into_iter()
            .map(cell_texts)
            .filter(|cells| cells.len() >= 3)
            .map(|cells| {
                let mut cells = cells.into_iter();
                GradeRow {
                    code: cells.next().unwrap_or_default(),
                    course: cells.next().unwrap_or_default(),
                    grade: cells.next().unwrap_or_default(),
                }
            })
            .collect();

        Ok(GradesRecord { options, courses })
    }
}
