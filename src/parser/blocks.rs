use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static STRUCTURE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6, table").unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Elements whose text never belongs to the catalog body.
const SKIPPED_TEXT_PARENTS: &[&str] = &["script", "style", "noscript", "title", "template"];

#[derive(Debug, Clone)]
pub enum Block {
    Heading(String),
    Table(Table),
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone)]
pub struct Row {
    pub cells: Vec<String>,
    /// Every cell is a `<th>`.
    pub header: bool,
}

impl Row {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Headings and top-level tables, in document order.
pub fn classify(html: &Html) -> Vec<Block> {
    html.select(&STRUCTURE_SEL)
        .filter_map(|el| {
            let name = el.value().name();
            if name == "table" {
                if inside_table(el) {
                    return None;
                }
                return Some(Block::Table(read_table(el)));
            }
            let text = element_text(el);
            if text.is_empty() {
                None
            } else {
                Some(Block::Heading(text))
            }
        })
        .collect()
}

fn read_table(table: ElementRef) -> Table {
    let rows = table
        .select(&ROW_SEL)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&CELL_SEL).collect();
            if cells.is_empty() {
                return None;
            }
            let header = cells.iter().all(|c| c.value().name() == "th");
            Some(Row {
                cells: cells.into_iter().map(element_text).collect(),
                header,
            })
        })
        .collect();
    Table { rows }
}

fn inside_table(el: ElementRef) -> bool {
    el.ancestors()
        .any(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
}

/// Text of an element with whitespace collapsed.
pub fn element_text(el: ElementRef) -> String {
    collapse(&el.text().collect::<Vec<_>>().join(" "))
}

/// The whole document as one line of text, scripts and styles excluded.
pub fn flatten_text(html: &Html) -> String {
    let mut out = String::new();
    for node in html.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| SKIPPED_TEXT_PARENTS.contains(&name));
        if !skipped {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse(&out)
}

pub fn title(html: &Html) -> Option<String> {
    html.select(&TITLE_SEL)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

pub(crate) fn collapse(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}
