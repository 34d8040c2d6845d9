use scraper::{ElementRef, Html, Selector};

use crate::extractors::ExtractError;
use crate::models::academic::PeriodOptions;

/// Parses a CSS selector, reporting failures as markup errors.
pub fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Markup(format!("bad selector '{}': {}", css, e)))
}

/// The element's text with runs of whitespace (including `&nbsp;`) collapsed.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `td`/`th` cells directly under a table row.
pub fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
        .collect()
}

/// The text of every cell in a row.
pub fn cell_texts(row: ElementRef<'_>) -> Vec<String> {
    cells(row).into_iter().map(text_of).collect()
}

/// The rows following the header row whose first cell reads `first_header`.
///
/// Portal tables have no ids or classes, so the header text is the anchor.
/// `skip` drops extra header rows (for example a row of week numbers).
pub fn rows_after_header<'a>(
    doc: &'a Html,
    first_header: &str,
    skip: usize,
) -> Result<Vec<ElementRef<'a>>, ExtractError> {
    let rows = selector("tr")?;

    let header = doc
        .select(&rows)
        .find(|row| {
            cells(*row)
                .first()
                .is_some_and(|cell| text_of(*cell).eq_ignore_ascii_case(first_header))
        })
        .ok_or_else(|| ExtractError::Markup(format!("table headed '{}' not found", first_header)))?;

    Ok(header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|row| row.value().name() == "tr")
        .skip(skip)
        .filter(|row| !cells(*row).is_empty())
        .collect())
}

/// The text of the cell following the first cell that starts with `label`.
pub fn labelled_value(doc: &Html, label: &str) -> Result<Option<String>, ExtractError> {
    let cells_selector = selector("td")?;
    let label = label.to_ascii_lowercase();

    Ok(doc
        .select(&cells_selector)
        .find(|cell| text_of(*cell).to_ascii_lowercase().starts_with(&label))
        .and_then(|cell| cell.next_siblings().filter_map(ElementRef::wrap).find(|c| c.value().name() == "td"))
        .map(text_of))
}

/// The year and term choices of the page's period selector.
///
/// Every data page renders this selector, so its absence means the page is not
/// the one that was asked for.
pub fn period_options(doc: &Html) -> Result<PeriodOptions, ExtractError> {
    let year_select = selector("select[name=valTahun]")?;
    if doc.select(&year_select).next().is_none() {
        return Err(ExtractError::Markup("period selector not found".to_string()));
    }

    Ok(PeriodOptions {
        years: option_values(doc, "select[name=valTahun] option")?,
        semesters: option_values(doc, "select[name=valSemester] option")?,
    })
}

/// The parsable `value` attributes of the options matched by `css`.
pub fn option_values<T: std::str::FromStr>(doc: &Html, css: &str) -> Result<Vec<T>, ExtractError> {
    let options = selector(css)?;
    Ok(doc
        .select(&options)
        .filter_map(|option| option.value().attr("value"))
        .filter_map(|value| value.trim().parse().ok())
        .collect())
}
