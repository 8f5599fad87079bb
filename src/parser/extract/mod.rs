pub mod fallback;
pub mod freetext;
pub mod table;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Page;
use crate::model::CandidateRecord;

static NEW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bnew\b!?").unwrap());
static BACKING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbonded\s+to\s+(?:an?\s+)?(?P<bonded>[a-z]+)|\b(?P<plate>[a-z]+)\s+backing\s+plate\b")
        .unwrap()
});
static ALLOY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d+)?)\s*([:/])\s*(\d{1,3}(?:\.\d+)?)\b").unwrap());
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?\d[\d,]*(?:\.\d{1,2})?").unwrap());
static ON_REQUEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)price\s+on\s+request|\bP\.?O\.?R\.?\b|\bcall\s+for\s+price").unwrap());
static COMPOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/|oxide|nitride|carbide|fluoride|sulfide|selenide|telluride|boride|silicide|\balloy\b")
        .unwrap()
});
static PROCESS_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:sputter(?:ing)?|evaporation|coater)\s*$").unwrap());

const NOTE_NEW: &str = "new product";
const NOTE_COMPOUND: &str = "compound material";
const NOTE_ON_REQUEST: &str = "price on request";

/// Words that sit in front of "backing plate" without naming its metal.
const BACKING_FILLERS: &[&str] = &["with", "a", "an", "the", "and", "includes", "including", "plus", "incl"];
const BACKING_NEGATIONS: &[&str] = &["no", "without"];

/// Run every strategy over one page. The DOM scan only runs when the table
/// and free-text strategies came back empty.
pub fn extract_all(page: &Page, declared_diameter: Option<&str>) -> Vec<CandidateRecord> {
    let mut candidates: Vec<CandidateRecord> = table::extract(page, declared_diameter).collect();
    candidates.extend(freetext::extract(&page.text));
    if candidates.is_empty() {
        debug!("No structured candidates, scanning DOM rows");
        candidates.extend(fallback::extract(page));
    }
    candidates
}

/// Trimmed cell or fragment, `None` for blanks and placeholder dashes.
pub(crate) fn clean(s: &str) -> Option<String> {
    let t = s.trim().trim_matches(|c: char| c == ',' || c == ';' || c == ':').trim();
    match t {
        "" | "-" | "–" | "—" | "n/a" | "N/A" => None,
        _ => Some(t.to_string()),
    }
}

/// Material name with "NEW!" markers and process words removed.
pub(crate) fn clean_material(s: &str) -> Option<String> {
    let without_new = NEW_RE.replace_all(s, " ");
    let trimmed = without_new.trim().trim_end_matches(|c: char| c == ',' || c == '-').trim();
    let stripped = PROCESS_SUFFIX_RE.replace(trimmed, "");
    clean(&stripped)
}

/// Fill backing plate, alloy ratio, price and note flags from the text a
/// candidate was cut from. Call after `material` is set.
pub(crate) fn annotate(candidate: &mut CandidateRecord, text: &str) {
    candidate.backing_plate = backing_plate(text);
    candidate.alloy_ratio = alloy_ratio(text);
    if candidate.price.is_none() {
        candidate.price = PRICE_RE.find(text).map(|m| m.as_str().to_string());
    }

    let mut notes = Vec::new();
    if NEW_RE.is_match(text) {
        notes.push(NOTE_NEW);
    }
    let compound = candidate.alloy_ratio.is_some()
        || candidate.material.as_deref().is_some_and(|m| COMPOUND_RE.is_match(m));
    if compound {
        notes.push(NOTE_COMPOUND);
    }
    if candidate.price.is_none() && ON_REQUEST_RE.is_match(text) {
        notes.push(NOTE_ON_REQUEST);
    }
    for note in notes {
        if !candidate.notes.iter().any(|n| n == note) {
            candidate.notes.push(note.to_string());
        }
    }
}

fn backing_plate(text: &str) -> Option<String> {
    let caps = BACKING_RE.captures(text)?;
    let word = caps.name("bonded").or_else(|| caps.name("plate"))?.as_str();
    let lower = word.to_lowercase();
    if BACKING_NEGATIONS.contains(&lower.as_str()) {
        None
    } else if BACKING_FILLERS.contains(&lower.as_str()) {
        Some("Yes".to_string())
    } else {
        Some(word.to_string())
    }
}

/// "80/20" or "60:40" style composition. Parts must add up to 100 so
/// fractions like 1/4 are not taken for an alloy.
fn alloy_ratio(text: &str) -> Option<String> {
    ALLOY_RE.captures_iter(text).find_map(|caps| {
        let a: f64 = caps[1].parse().ok()?;
        let b: f64 = caps[3].parse().ok()?;
        if (a + b - 100.0).abs() < 0.5 {
            Some(format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
        } else {
            None
        }
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Strategy, UNKNOWN_MATERIAL};

    fn page(fixture: &str) -> Page {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        Page::parse(&html)
    }

    #[test]
    fn disc_table_page_uses_table_strategy() {
        let c = extract_all(&page("disc_table"), None);
        assert!(!c.is_empty());
        assert!(c.iter().all(|x| x.strategy == Strategy::Table));
    }

    #[test]
    fn free_text_page_skips_fallback() {
        let c = extract_all(&page("free_text"), None);
        assert!(!c.is_empty());
        assert!(c.iter().all(|x| x.strategy != Strategy::DomFallback));
    }

    #[test]
    fn bare_page_falls_back_to_dom() {
        let c = extract_all(&page("bare_rows"), None);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].strategy, Strategy::DomFallback);
        assert_eq!(c[0].part_number, "91234");
        assert_eq!(c[0].material.as_deref(), Some(UNKNOWN_MATERIAL));
    }

    #[test]
    fn mixed_page_runs_both_structured_strategies() {
        let c = extract_all(&page("mixed"), None);
        assert!(c.iter().any(|x| x.strategy == Strategy::Table));
        assert!(c.iter().any(|x| x.strategy == Strategy::FreeText));
        assert!(c.iter().all(|x| x.strategy != Strategy::DomFallback));
    }

    #[test]
    fn clean_placeholders() {
        assert_eq!(clean("  Gold "), Some("Gold".to_string()));
        assert_eq!(clean(" - "), None);
        assert_eq!(clean(""), None);
    }

    #[test]
    fn material_cleanup() {
        assert_eq!(clean_material("NEW! Gold").as_deref(), Some("Gold"));
        assert_eq!(clean_material("Gold Sputter").as_deref(), Some("Gold"));
        assert_eq!(clean_material("Gold/Palladium,").as_deref(), Some("Gold/Palladium"));
        assert_eq!(clean_material("New"), None);
    }

    #[test]
    fn annotations() {
        let mut c = CandidateRecord::new("94000", Strategy::FreeText, "");
        c.material = Some("Gold/Palladium".to_string());
        annotate(&mut c, "NEW! Gold/Palladium 60/40 Target on Copper backing plate $950.00");
        assert_eq!(c.backing_plate.as_deref(), Some("Copper"));
        assert_eq!(c.alloy_ratio.as_deref(), Some("60/40"));
        assert_eq!(c.price.as_deref(), Some("$950.00"));
        assert_eq!(c.notes, vec![NOTE_NEW, NOTE_COMPOUND]);
    }

    #[test]
    fn price_on_request_note() {
        let mut c = CandidateRecord::new("94001", Strategy::FreeText, "");
        c.material = Some("Platinum".to_string());
        annotate(&mut c, "Platinum Target Ø57mm price on request, with backing plate");
        assert_eq!(c.price, None);
        assert_eq!(c.notes, vec![NOTE_ON_REQUEST]);
        assert_eq!(c.backing_plate.as_deref(), Some("Yes"));
    }

    #[test]
    fn fractions_are_not_alloys() {
        assert_eq!(alloy_ratio("1/4\" thick"), None);
        assert_eq!(alloy_ratio("Au:Pd 60:40"), Some("60:40".to_string()));
    }
}
