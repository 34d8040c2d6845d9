use scraper::{ElementRef, Html, Selector};

use crate::extractors::html::{cells, option_values, rows_after_header, selector, text_of};
use crate::extractors::{ExtractError, PageExtractor};
use crate::models::academic::{LogbookCourse, LogbookEntry, LogbookOptions, LogbookRecord, Placement};
use crate::models::cache::ResourceKind;

/// Reads `entry_logbook_kp1.php`: one week of the internship logbook.
///
/// The page is an entry form. Besides the week's entries it carries the
/// placement details, the courses an activity can be logged against and the
/// notes left by the supervisor and the company.
pub struct LogbookExtractor;

impl PageExtractor for LogbookExtractor {
    type Record = LogbookRecord;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Logbook
    }

    fn extract(&self, doc: &Html) -> Result<LogbookRecord, ExtractError> {
        let week_select = selector("#minggu")?;
        if doc.select(&week_select).next().is_none() {
            return Err(ExtractError::Markup("logbook week selector not found".to_string()));
        }

        let options = LogbookOptions {
            years: option_values(doc, "#tahun option")?,
            semesters: option_values(doc, "#cbSemester option")?,
            weeks: option_values(doc, "#minggu option")?,
        };

        let placement = Placement {
            name: inline_value(doc, "Nama")?,
            student_number: inline_value(doc, "NRP")?,
            supervisor: inline_value(doc, "Pembimbing")?,
            company: inline_value(doc, "Tempat KP")?,
            period: inline_value(doc, "Tanggal KP")?,
        };

        let courses = {
            let options = selector("#matakuliah option")?;
            doc.select(&options)
                .filter_map(|option| {
                    // The leading "-- Pilih --" option has an empty value.
                    let value = option.value().attr("value")?.trim().parse().ok()?;
                    Some(LogbookCourse {
                        name: text_of(option),
                        value,
                    })
                })
                .collect()
        };

        let links = selector("a")?;
        let images = selector("img")?;
        let entries = rows_after_header(doc, "No", 0)?
            .into_iter()
            .filter_map(|row| entry(row, &links, &images))
            .collect();

        Ok(LogbookRecord {
            options,
            placement,
            registration: hidden_value(doc, "#kp_daftar")?,
            student_id: hidden_value(doc, "#mahasiswa")?,
            courses,
            entries,
            lecturer_note: note(doc, "Catatan Dosen"),
            company_note: note(doc, "Catatan Perusahaan"),
        })
    }
}

/// One row of the entries table.
fn entry(row: ElementRef<'_>, links: &Selector, images: &Selector) -> Option<LogbookEntry> {
    let cells = cells(row);
    if cells.len() < 9 {
        return None;
    }

    let href = |cell: ElementRef<'_>| {
        cell.select(links)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim().to_string())
    };

    // An upload slot with nothing in it still renders an empty anchor.
    let progress_file = cells[6]
        .select(links)
        .next()
        .filter(|a| !text_of(*a).is_empty())
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string());

    let print_link = href(cells[8]).unwrap_or_default();
    let id = print_link.rsplit('=').next().unwrap_or_default().to_string();

    Some(LogbookEntry {
        id,
        date: text_of(cells[1]),
        start: text_of(cells[2]),
        end: text_of(cells[3]),
        activity: text_of(cells[4]),
        course: text_of(cells[5]),
        progress_file,
        photo_file: href(cells[7]).unwrap_or_default(),
        print_link,
        deletable: cells.get(9).is_some_and(|cell| cell.select(images).next().is_some()),
    })
}

/// The value of a `Label : value` cell, or empty when the page has no such cell.
fn inline_value(doc: &Html, label: &str) -> Result<String, ExtractError> {
    let cells_selector = selector("td")?;

    Ok(doc
        .select(&cells_selector)
        .map(text_of)
        .find_map(|text| {
            let (key, value) = text.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(label)
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default())
}

/// The `value` attribute of the hidden input matched by `css`.
fn hidden_value(doc: &Html, css: &str) -> Result<String, ExtractError> {
    let input = selector(css)?;
    Ok(doc
        .select(&input)
        .next()
        .and_then(|el| el.value().attr("value"))
        .unwrap_or_default()
        .trim()
        .to_string())
}

/// The text under a one-column note table, empty when the note is absent.
fn note(doc: &Html, heading: &str) -> String {
    rows_after_header(doc, heading, 0)
        .ok()
        .and_then(|rows| rows.into_iter().next())
        .map(text_of)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::extract_page;
    use crate::test_support::{EXPIRED_PAGE, GRADES_PAGE, LOGBOOK_PAGE};

    #[test]
    fn test_extracts_options_and_placement() {
        let record = extract_page(&LogbookExtractor, LOGBOOK_PAGE).unwrap();

        assert_eq!(record.options.years, vec![2023, 2024]);
        assert_eq!(record.options.semesters, vec![1, 2]);
        assert_eq!(record.options.weeks, vec![1, 2, 3]);
        assert_eq!(record.placement.name, "Jane Doe");
        assert_eq!(record.placement.student_number, "1234567");
        assert_eq!(record.placement.company, "PT Nusantara Digital");
        assert_eq!(record.placement.period, "01-07-2024 s/d 31-08-2024");
        assert_eq!(record.registration, "KP-881");
        assert_eq!(record.student_id, "55120");
    }

    #[test]
    fn test_course_list_skips_placeholder() {
        let record = extract_page(&LogbookExtractor, LOGBOOK_PAGE).unwrap();

        assert_eq!(
            record.courses,
            vec![
                LogbookCourse { name: "Kerja Praktek".into(), value: 4101 },
                LogbookCourse { name: "Etika Profesi".into(), value: 4102 },
            ]
        );
    }

    #[test]
    fn test_extracts_entries() {
        let record = extract_page(&LogbookExtractor, LOGBOOK_PAGE).unwrap();
        assert_eq!(record.entries.len(), 2);

        let first = &record.entries[0];
        assert_eq!(first.id, "31");
        assert_eq!(first.date, "15-07-2024");
        assert_eq!(first.start, "08:00");
        assert_eq!(first.activity, "Instalasi server staging");
        assert_eq!(first.progress_file.as_deref(), Some("files/progres_31.pdf"));
        assert_eq!(first.photo_file, "files/foto_31.jpg");
        assert!(first.deletable);

        let second = &record.entries[1];
        assert_eq!(second.id, "32");
        assert_eq!(second.progress_file, None);
        assert!(!second.deletable);
    }

    #[test]
    fn test_extracts_notes() {
        let record = extract_page(&LogbookExtractor, LOGBOOK_PAGE).unwrap();

        assert_eq!(record.lecturer_note, "Lanjutkan dokumentasi.");
        assert_eq!(record.company_note, "Kinerja baik.");
    }

    #[test]
    fn test_other_page_is_markup_error() {
        assert!(matches!(
            extract_page(&LogbookExtractor, GRADES_PAGE),
            Err(ExtractError::Markup(_))
        ));
    }

    #[test]
    fn test_expired_page_is_expired() {
        assert!(matches!(
            extract_page(&LogbookExtractor, EXPIRED_PAGE),
            Err(ExtractError::Expired)
        ));
    }
}
