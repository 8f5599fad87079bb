use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::model::{CandidateRecord, Strategy, UNKNOWN_MATERIAL};
use crate::parser::blocks::collapse;
use crate::parser::Page;

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr, li, p, div, dd").unwrap());
/// A 4-5 digit token that is not part of a price, decimal or longer number.
static BARE_PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\d.,$])(\d{4,5})(?:$|[^\d.,])").unwrap());

/// Last-resort scan: every row-like element whose own text carries a bare
/// part number becomes a candidate with material "Unknown" and no
/// measurements.
pub fn extract(page: &Page) -> impl Iterator<Item = CandidateRecord> + '_ {
    page.html
        .select(&ROW_SEL)
        .filter_map(|el| {
            let text = own_text(el);
            let caps = BARE_PART_RE.captures(&text)?;
            let part = caps.get(1)?.as_str().to_string();
            Some((part, text))
        })
        .map(|(part, text)| {
            let mut c = CandidateRecord::new(&part, Strategy::DomFallback, &text);
            c.material = Some(UNKNOWN_MATERIAL.to_string());
            c
        })
}

/// Text of `el` minus the text of nested row-like elements, which are
/// scanned on their own.
fn own_text(el: ElementRef) -> String {
    let mut parts = Vec::new();
    collect_own(el, &mut parts);
    collapse(&parts.join(" "))
}

fn collect_own<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push(&**text);
        } else if let Some(child) = ElementRef::wrap(child) {
            if !ROW_SEL.matches(&child) {
                collect_own(child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(html: &str) -> Vec<String> {
        let page = Page::parse(html);
        extract(&page).map(|c| c.part_number).collect()
    }

    #[test]
    fn leaf_rows_only() {
        let p = parts("<div><ul><li>Item 91234 gold</li><li>Item 91235</li></ul></div>");
        assert_eq!(p, vec!["91234", "91235"]);
    }

    #[test]
    fn container_text_beside_nested_rows() {
        let p = parts("<ul><li>91234 <span>Gold</span><p>see 91235 below</p></li></ul>");
        assert_eq!(p, vec!["91234", "91235"]);
    }

    #[test]
    fn prices_and_decimals_are_not_parts() {
        assert!(parts("<p>$1200 or 1,250.00 or 0.12345</p>").is_empty());
    }

    #[test]
    fn long_numbers_are_not_parts() {
        assert!(parts("<p>Call 5551234567</p>").is_empty());
    }

    #[test]
    fn repeats_are_left_to_reconciliation() {
        assert_eq!(parts("<p>91234</p><p>see 91234 again</p>"), vec!["91234", "91234"]);
    }

    #[test]
    fn fallback_record_shape() {
        let page = Page::parse("<p>Stock no. 91234 available</p>");
        let c: Vec<_> = extract(&page).collect();
        assert_eq!(c[0].material.as_deref(), Some(UNKNOWN_MATERIAL));
        assert_eq!(c[0].strategy, Strategy::DomFallback);
        assert_eq!(c[0].diameter, None);
        assert_eq!(c[0].raw_excerpt, "Stock no. 91234 available");
    }
}
