use scraper::Html;

use crate::extractors::html::{cells, labelled_value, period_options, rows_after_header, selector, text_of};
use crate::extractors::{ExtractError, PageExtractor};
use crate::models::academic::{ScheduleDay, ScheduleRecord, ScheduledCourse};
use crate::models::cache::ResourceKind;

/// Reads `jadwal_kul.php`, the weekly class schedule.
///
/// One row per day. The second cell holds a `div` per session whose text lines
/// are the course name, `lecturer - time`, and the room.
pub struct ScheduleExtractor;

impl PageExtractor for ScheduleExtractor {
    type Record = ScheduleRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Schedule
    }

    fn extract(&self, doc: &Html) -> Result<ScheduleRecord, ExtractError> {
        let options = period_options(doc)?;
        let class = labelled_value(doc, "Kelas")?.unwrap_or_default();
        let session_divs = selector("div")?;

        let days = rows_after_header(doc, "Hari", 0)?
            .into_iter()
            .filter_map(|row| {
                let row_cells = cells(row);
                let day = text_of(*row_cells.first()?);
                let slot = row_cells.get(1)?;

                let sessions = slot
                    .select(&session_divs)
                    .map(|session| {
                        let lines: Vec<&str> = session
                            .text()
                            .map(str::trim)
                            .filter(|line| !line.is_empty())
                            .collect();
                        let (lecturer, time) = lines
                            .get(1)
                            .and_then(|line| line.split_once(" - "))
                            .unwrap_or((lines.get(1).copied().unwrap_or_default(), ""));

                        ScheduledCourse {
                            course: lines.first().copied().unwrap_or_default().to_string(),
                            lecturer: lecturer.trim().to_string(),
                            time: time.trim().to_string(),
                            room: lines.get(2).copied().unwrap_or_default().to_string(),
                        }
                    })
                    .collect();

                Some(ScheduleDay { day, sessions })
            })
            .collect();

        Ok(ScheduleRecord {
            options,
            class,
            days,
        })
    }
}
