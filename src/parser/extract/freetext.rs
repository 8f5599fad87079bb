use std::sync::LazyLock;

use regex::{Captures, Match, Regex};

use super::{annotate, clean_material};
use crate::model::{CandidateRecord, ShapeHint, Strategy};
use crate::normalize::{self, MEASURE};

/// `<part> <description with "Target"> [each] <price | price on request>`
static ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<part>\d{4,6}[A-Z]?)\s+(?P<desc>[^$]{0,200}?\b(?i:target)\b[^$]{0,200}?)\s*(?:(?i:each|ea\.?)\s*)?(?P<price>\$\s?\d[\d,]*(?:\.\d{1,2})?|(?i:price\s+on\s+request))",
    )
    .unwrap()
});
static PART_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4,6}[A-Z]?)\s+").unwrap());
static TARGET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\btarget\b").unwrap());
static DIMENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\d\s*(?:mm|"|”|″|inch|µm|μm)|Ø|⌀|\bO\.?\s?D\b"#).unwrap()
});
static PURITY_PCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b9\d(?:\.\d+)?\s*%").unwrap());
static PURITY_N_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\dN\d?\b").unwrap());
static DIAMETER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:Ø|⌀|ø)\s*(?P<glyph>{MEASURE})|(?P<word>{MEASURE})\s*(?i:dia(?:meter)?\b\.?)"
    ))
    .unwrap()
});
static THICKNESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[\s\d)"”″]|(?i:mm))[x×]\s*(\d+(?:\.\d+)?\s*(?:(?i:mm|µm|μm|um|microns?)|"|”|″))"#,
    )
    .unwrap()
});

/// Candidates from the flattened page text.
pub fn extract(text: &str) -> impl Iterator<Item = CandidateRecord> + '_ {
    ENTRY_RE.captures_iter(text).filter_map(|caps| parse_entry(&caps))
}

fn parse_entry(caps: &Captures) -> Option<CandidateRecord> {
    let whole = caps.get(0)?;
    let (part, start, desc) = reanchor(caps.name("part")?, caps.name("desc")?);
    if !DIMENSION_RE.is_match(desc) {
        return None;
    }
    let target_at = TARGET_RE.find(desc)?.start();
    let material = clean_material(&desc[..target_at])?;

    let excerpt = &whole.as_str()[start - whole.start()..];
    let mut c = CandidateRecord::new(part, Strategy::FreeText, excerpt);
    c.material = Some(material);
    c.purity = PURITY_PCT_RE
        .find(desc)
        .or_else(|| PURITY_N_RE.find(desc))
        .map(|m| m.as_str().to_string());

    if let Some((outer, inner)) = normalize::ring_pair(desc) {
        c.shape = ShapeHint::Annular;
        c.outer_diameter = Some(outer);
        c.inner_diameter = Some(inner);
    } else if let Some(d) = DIAMETER_RE.captures(desc) {
        c.shape = ShapeHint::Disc;
        c.diameter = d
            .name("glyph")
            .or_else(|| d.name("word"))
            .map(|m| m.as_str().trim().to_string());
    }
    c.thickness = THICKNESS_RE.captures(desc).map(|t| t[1].trim().to_string());

    let price = &caps["price"];
    if price.starts_with('$') {
        c.price = Some(price.to_string());
    }
    annotate(&mut c, excerpt);
    Some(c)
}

/// The lazy description can swallow earlier entries that had no price.
/// Restart on the last part number that still has a "Target" after it.
/// Returns the part number, its offset in the haystack and the description.
fn reanchor<'t>(part: Match<'t>, desc: Match<'t>) -> (&'t str, usize, &'t str) {
    let text = desc.as_str();
    let last = PART_RE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(1)?, caps.get(0)?.end())))
        .filter(|(_, rest)| TARGET_RE.is_match(&text[*rest..]))
        .last();
    match last {
        Some((inner, rest)) => (inner.as_str(), desc.start() + inner.start(), &text[rest..]),
        None => (part.as_str(), part.start(), text),
    }
}
