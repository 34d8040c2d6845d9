use scraper::Html;

use crate::extractors::html::{cell_texts, period_options, rows_after_header};
use crate::extractors::{ExtractError, PageExtractor};
use crate::models::academic::{AttendanceRecord, AttendanceRow};
use crate::models::cache::ResourceKind;

/// Reads `absen.php`.
///
/// The table has two header rows (column titles, then week numbers), followed
/// by one row per course: code, name, one cell per week, attendance percentage.
pub struct AttendanceExtractor;

impl PageExtractor for AttendanceExtractor {
    type Record = AttendanceRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Attendance
    }

    fn extract(&self, doc: &Html) -> Result<AttendanceRecord, ExtractError> {
        let options = period_options(doc)?;

        let courses = rows_after_header(doc, "Kode", 1)?
            .into_iter()
            .map(cell_texts)
            .filter(|cells| cells.len() >= 3)
            .map(|mut cells| {
                let attendance = cells.pop().unwrap_or_default();
                let mut cells = cells.into_iter();
                let code = cells.next().unwrap_or_default();
                let course = cells.next().unwrap_or_default();

                AttendanceRow {
                    code,
                    course,
                    weeks: cells.collect(),
                    attendance,
                }
            })
            .collect();

        Ok(AttendanceRecord { options, courses })
    }
}
