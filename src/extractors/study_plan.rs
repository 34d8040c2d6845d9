use scraper::{ElementRef, Html};

use crate::extractors::html::{cell_texts, labelled_value, period_options, rows_after_header, selector, text_of};
use crate::extractors::{ExtractError, PageExtractor};
use crate::models::academic::{
    CreditAllowance, DateRange, GradePoints, StudyPlanDeadlines, StudyPlanRecord, StudyPlanRow,
};
use crate::models::cache::ResourceKind;

/// Reads `FRS_mbkm.php`, the study plan (FRS) page.
///
/// Besides the course table, the page header carries the advisor, the credit
/// allowance, the grade points and the filling/change/drop windows.
pub struct StudyPlanExtractor;

impl PageExtractor for StudyPlanExtractor {
    type Record = StudyPlanRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::StudyPlan
    }

    fn extract(&self, doc: &Html) -> Result<StudyPlanRecord, ExtractError> {
        let options = period_options(doc)?;

        let advisor = labelled_value(doc, "Dosen Wali")?.unwrap_or_default();

        let credits = {
            let numbers: Vec<u16> = numbers(&labelled_value(doc, "SKS")?.unwrap_or_default());
            CreditAllowance {
                limit: numbers.first().copied().unwrap_or_default(),
                remaining: numbers.get(1).copied().unwrap_or_default(),
            }
        };

        let gpa = {
            let numbers: Vec<f32> = numbers(&labelled_value(doc, "IP")?.unwrap_or_default());
            GradePoints {
                cumulative: numbers.first().copied().unwrap_or_default(),
                semester: numbers.get(1).copied().unwrap_or_default(),
            }
        };

        let deadlines = deadlines(doc)?;

        let courses = rows_after_header(doc, "No", 0)?
            .into_iter()
            .map(cell_texts)
            .filter(|cells| cells.len() >= 8)
            .map(|cells| {
                // The leading cell is the row number.
                let mut cells = cells.into_iter().skip(1);
                let mut next = || cells.next().unwrap_or_default();
                StudyPlanRow {
                    code: next(),
                    group: next(),
                    course: next(),
                    lecturer: next(),
                    credits: next(),
                    class: next(),
                    approved: next(),
                }
            })
            .collect();

        Ok(StudyPlanRecord {
            options,
            advisor,
            credits,
            gpa,
            deadlines,
            courses,
        })
    }
}

/// The numeric tokens of a cell such as `Batas : 24 Sisa : 4`.
fn numbers<T: std::str::FromStr>(text: &str) -> Vec<T> {
    text.split(|c: char| c.is_whitespace() || c == ':')
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// The three `from sd to` windows in the "Tanggal Penting" cell, in page order.
fn deadlines(doc: &Html) -> Result<StudyPlanDeadlines, ExtractError> {
    let cells = selector("td")?;
    let italics = selector("i")?;

    let ranges: Vec<DateRange> = doc
        .select(&cells)
        .find(|cell| text_of(*cell).to_ascii_lowercase().starts_with("tanggal penting"))
        .and_then(|label| label.next_siblings().filter_map(ElementRef::wrap).find(|c| c.value().name() == "td"))
        .map(|value| {
            value
                .select(&italics)
                .map(text_of)
                .filter_map(|text| {
                    let (from, to) = text.split_once(" sd ")?;
                    Some(DateRange {
                        from: from.trim().to_string(),
                        to: to.trim().to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut ranges = ranges.into_iter();
    Ok(StudyPlanDeadlines {
        filling: ranges.next().unwrap_or_default(),
        changes: ranges.next().unwrap_or_default(),
        drop: ranges.next().unwrap_or_default(),
    })
}
