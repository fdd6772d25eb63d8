//! Index table parsing
//!
//! The index is one HTML table. Data rows carry seven cells in a fixed order:
//! issue, date, HTML link, PGN link, CBV link, game count, story count.

use crate::error::{Error, ParseError, Result};
use crate::types::{IssueRecord, Ordinal};
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// Cells a data row must have
pub const MIN_CELLS: usize = 7;

const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Rows parsed from one index page
#[derive(Debug, Default)]
pub struct ParsedIndex {
    /// Valid records with their row position, in page order
    pub rows: Vec<(usize, IssueRecord)>,
    /// Rows with a data layout whose mandatory columns could not be parsed
    pub rejected: Vec<(usize, ParseError)>,
}

/// Compiled selectors for the index layout
#[derive(Clone)]
pub struct IndexParser {
    table: Selector,
    row: Selector,
    cell: Selector,
    anchor: Selector,
}

impl IndexParser {
    /// Compile the selectors
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td, th")?,
            anchor: selector("a[href]")?,
        })
    }

    /// Parse the first table of `html`, resolving relative links against `base`
    pub fn parse(&self, html: &str, base: &Url) -> Result<ParsedIndex> {
        let document = Html::parse_document(html);
        let table = document
            .select(&self.table)
            .next()
            .ok_or(Error::Parse(ParseError::NoTable))?;

        let mut parsed = ParsedIndex::default();
        let mut seen = HashSet::new();

        for (row, tr) in table.select(&self.row).enumerate() {
            let cells: Vec<ElementRef<'_>> = tr.select(&self.cell).collect();

            // Header and spacer rows
            if cells.len() < MIN_CELLS || cells.iter().all(|c| c.value().name() == "th") {
                continue;
            }

            match self.parse_row(row, &cells, base) {
                Ok(record) => {
                    if seen.insert(record.ordinal) {
                        parsed.rows.push((row, record));
                    } else {
                        parsed.rejected.push((
                            row,
                            ParseError::DuplicateOrdinal {
                                row,
                                ordinal: record.ordinal.get(),
                            },
                        ));
                    }
                }
                Err(e) => parsed.rejected.push((row, e)),
            }
        }

        Ok(parsed)
    }

    fn parse_row(
        &self,
        row: usize,
        cells: &[ElementRef<'_>],
        base: &Url,
    ) -> std::result::Result<IssueRecord, ParseError> {
        let label = cell_text(&cells[0]);
        let ordinal = parse_ordinal(&label).ok_or_else(|| ParseError::MissingOrdinal {
            row,
            text: label.clone(),
        })?;

        let date_text = cell_text(&cells[1]);
        let date = parse_date(&date_text).ok_or(ParseError::InvalidDate {
            row,
            value: date_text,
        })?;

        Ok(IssueRecord {
            ordinal,
            label,
            date,
            detail_link: self.cell_link(&cells[2], base),
            archive_link: self.cell_link(&cells[3], base),
            companion_link: self.cell_link(&cells[4], base),
            games: parse_count(&cell_text(&cells[5])),
            stories: parse_count(&cell_text(&cells[6])),
        })
    }

    fn cell_link(&self, cell: &ElementRef<'_>, base: &Url) -> Option<String> {
        let href = cell
            .select(&self.anchor)
            .next()?
            .value()
            .attr("href")?
            .trim();
        if href.is_empty() {
            return None;
        }
        base.join(href).ok().map(String::from)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("invalid selector {css:?}: {e}")))
}

/// Visible text of a cell with whitespace collapsed
fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// The pattern is a literal; compiling it cannot fail
#[allow(clippy::unwrap_used)]
fn digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").unwrap())
}

/// First run of digits in the issue cell
pub fn parse_ordinal(text: &str) -> Option<Ordinal> {
    digits()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
        .map(Ordinal)
}

/// Publication date in any of the layouts the index has used
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Count cells are only trusted when they are plain digits; anything else is "not reported"
pub fn parse_count(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}
