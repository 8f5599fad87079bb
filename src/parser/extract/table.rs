use std::sync::LazyLock;

use regex::Regex;

use super::{annotate, clean, clean_material};
use crate::model::{CandidateRecord, ShapeHint, Strategy};
use crate::normalize;
use crate::parser::blocks::{Block, Row, Table};
use crate::parser::Page;

const MIN_DISC_COLUMNS: usize = 3;
const MIN_ANNULAR_COLUMNS: usize = 4;

static DIAMETER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+(?:\.\d+)?\s*mm\b").unwrap());
static HEADER_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:part|cat(?:alog)?\b|item|no\.|#|product|sku|description)").unwrap()
});
/// "60 x 20 mm" in a dimensions column that has no O.D./I.D. markers of its own.
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(\d+(?:\.\d+)?)\s*(?:(?i:mm|inch(?:es)?)|"|”|″)?\s*[x×/]\s*(\d+(?:\.\d+)?)\s*((?i:mm|inch(?:es)?)|"|”|″)?"#,
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Disc,
    Annular,
}

impl TableKind {
    fn min_columns(self) -> usize {
        match self {
            TableKind::Disc => MIN_DISC_COLUMNS,
            TableKind::Annular => MIN_ANNULAR_COLUMNS,
        }
    }
}

/// What the headings above a table say about it.
#[derive(Debug, Clone, Default)]
struct HeadingContext {
    diameter: Option<String>,
    ring: bool,
}

impl HeadingContext {
    /// `ring` describes only the latest heading; `diameter` persists until
    /// the next "<n> mm" heading.
    fn observe(&mut self, heading: &str) {
        self.ring = normalize::has_ring_markers(heading);
        if self.ring {
            return;
        }
        if let Some(m) = DIAMETER_HEADING_RE.find(heading) {
            self.diameter = Some(m.as_str().to_string());
        }
    }
}

/// Candidates from every table on the page. Disc rows take their diameter
/// from the nearest preceding "<n> mm" heading, or `declared_diameter`
/// until one shows up.
pub fn extract<'a>(
    page: &'a Page,
    declared_diameter: Option<&str>,
) -> impl Iterator<Item = CandidateRecord> + 'a {
    let initial = HeadingContext {
        diameter: declared_diameter.map(str::to_string),
        ring: false,
    };
    page.blocks
        .iter()
        .scan(initial, |ctx, block| {
            Some(match block {
                Block::Heading(text) => {
                    ctx.observe(text);
                    None
                }
                Block::Table(table) => Some((ctx.clone(), table)),
            })
        })
        .flatten()
        .flat_map(|(ctx, table)| table_candidates(table, ctx))
}

fn table_candidates(table: &Table, ctx: HeadingContext) -> impl Iterator<Item = CandidateRecord> + '_ {
    let ring_header = table
        .rows
        .iter()
        .filter(|r| is_header(r))
        .any(|r| normalize::has_ring_markers(&r.text()));
    let kind = if ctx.ring || ring_header {
        TableKind::Annular
    } else {
        TableKind::Disc
    };
    table
        .rows
        .iter()
        .filter(|r| !is_header(r))
        .filter_map(move |row| parse_row(row, kind, ctx.diameter.as_deref()))
}

/// `<th>` rows, rows opening with a column label, and rows with no digit
/// in any cell ("Code | Material | Purity").
fn is_header(row: &Row) -> bool {
    row.header
        || row
            .cells
            .first()
            .is_some_and(|c| HEADER_LABEL_RE.is_match(c.trim()))
        || !row.cells.iter().any(|c| c.chars().any(|ch| ch.is_ascii_digit()))
}

fn parse_row(row: &Row, kind: TableKind, diameter: Option<&str>) -> Option<CandidateRecord> {
    if row.cells.len() < kind.min_columns() {
        return None;
    }
    let part = row.cells[0].trim();
    let material = clean_material(&row.cells[1]);
    if part.is_empty() && material.is_none() {
        return None;
    }

    let text = row.text();
    let mut c = CandidateRecord::new(part, Strategy::Table, &text);
    c.material = material;
    c.purity = clean(&row.cells[2]);

    match kind {
        TableKind::Disc => {
            c.shape = ShapeHint::Disc;
            c.diameter = diameter.map(str::to_string);
            c.thickness = row.cells.get(3).and_then(|s| clean(s));
        }
        TableKind::Annular => {
            c.shape = ShapeHint::Annular;
            if let Some((outer, inner)) = ring_dimensions(&row.cells[3]) {
                c.outer_diameter = Some(outer);
                c.inner_diameter = Some(inner);
            }
            c.thickness = row.cells.get(4).and_then(|s| clean(s));
        }
    }

    annotate(&mut c, &text);
    Some(c)
}

fn ring_dimensions(cell: &str) -> Option<(String, String)> {
    if let Some(pair) = normalize::ring_pair(cell) {
        return Some(pair);
    }
    let caps = PAIR_RE.captures(cell)?;
    let unit = caps.get(3).map(|m| m.as_str()).unwrap_or("mm");
    Some((format!("{}{}", &caps[1], unit), format!("{}{}", &caps[2], unit)))
}
