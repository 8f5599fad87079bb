//! Unit and notation normalization for raw vendor fragments.
//!
//! Every function here is total: input it cannot read yields `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Geometry, ShapeHint};

const MM_PER_INCH: f64 = 25.4;

/// A number with an optional length unit, as vendors write it next to O.D./I.D.
pub(crate) const MEASURE: &str = r#"\d+(?:\.\d+)?\s*(?:(?i:mm|inch(?:es)?)|"|”|″)?"#;

static MM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*mm\b").unwrap());
/// Decimal or fractional inches: `2.5"`, `1/8"`, `2-1/2 inch`.
static INCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:(?:(?P<whole>\d+)[\s-])?(?P<num>\d+)/(?P<den>\d+)|(?P<dec>\d+(?:\.\d+)?))\s*(?:"|”|″|''|inch(?:es)?\b)"#,
    )
    .unwrap()
});
static MICRON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:µm|μm|um\b|microns?\b)").unwrap());
static BARE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?\s*%").unwrap());
static SHORTHAND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d)\s?N(\d)?\b").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)").unwrap());
static OD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<pre>{MEASURE})\s*O\.?\s?D(?:\.|\b)|\bO\.?\s?D\.?\s*:?\s*(?P<post>{MEASURE})"
    ))
    .unwrap()
});
static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?P<pre>{MEASURE})\s*I\.?\s?D(?:\.|\b)|\bI\.?\s?D\.?\s*:?\s*(?P<post>{MEASURE})"
    ))
    .unwrap()
});

/// Length and geometry normalization. `strict_units` turns off the
/// bare-numeral fallback, so "62" alone is no longer read as 62 mm.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    pub strict_units: bool,
}

impl Normalizer {
    pub fn new(strict_units: bool) -> Self {
        Normalizer { strict_units }
    }

    /// Diameter or any other length, in millimeters.
    pub fn length_mm(&self, raw: &str) -> Option<f64> {
        first_number(&MM_RE, raw)
            .or_else(|| inches(raw).map(|v| v * MM_PER_INCH))
            .or_else(|| self.bare_number(raw))
            .filter(|v| *v > 0.0)
    }

    /// Thickness in millimeters. Accepts micron units on top of `length_mm`.
    pub fn thickness_mm(&self, raw: &str) -> Option<f64> {
        first_number(&MM_RE, raw)
            .or_else(|| first_number(&MICRON_RE, raw).map(|v| v / 1000.0))
            .or_else(|| inches(raw).map(|v| v * MM_PER_INCH))
            .or_else(|| self.bare_number(raw))
            .filter(|v| *v > 0.0)
    }

    /// Resolve the final geometry. A complete O.D./I.D. pair always wins and
    /// clears the single diameter; a ring with half its pair missing is Other.
    pub fn geometry(
        &self,
        hint: ShapeHint,
        diameter: Option<&str>,
        outer: Option<&str>,
        inner: Option<&str>,
    ) -> Geometry {
        let outer = outer.and_then(|r| self.length_mm(r));
        let inner = inner.and_then(|r| self.length_mm(r));
        if let (Some(outer_mm), Some(inner_mm)) = (outer, inner) {
            return Geometry::Annular { outer_mm, inner_mm };
        }
        if hint == ShapeHint::Annular {
            return Geometry::Other;
        }
        match diameter.and_then(|r| self.length_mm(r)) {
            Some(diameter_mm) => Geometry::Disc { diameter_mm },
            None => Geometry::Other,
        }
    }

    fn bare_number(&self, raw: &str) -> Option<f64> {
        if self.strict_units {
            return None;
        }
        BARE_RE.find(raw)?.as_str().parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurityReading {
    Percent(String),
    /// "kN" shorthand with k below 2, which has no percentage form.
    OutOfDomain(u32),
    Unrecognized,
}

pub fn read_purity(raw: &str) -> PurityReading {
    if let Some(m) = PERCENT_RE.find(raw) {
        return PurityReading::Percent(m.as_str().to_string());
    }
    let Some(caps) = SHORTHAND_RE.captures(raw) else {
        return PurityReading::Unrecognized;
    };
    let Some(nines) = caps[1].chars().next().and_then(|c| c.to_digit(10)) else {
        return PurityReading::Unrecognized;
    };
    if nines < 2 {
        return PurityReading::OutOfDomain(nines);
    }
    let extra = "9".repeat((nines - 2) as usize);
    let tail = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if extra.is_empty() && tail.is_empty() {
        PurityReading::Percent("99%".to_string())
    } else {
        PurityReading::Percent(format!("99.{}{}%", extra, tail))
    }
}

/// "$1,200.00" -> 1200.0. "Price on request" and friends yield `None`.
pub fn price(raw: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(raw)?;
    caps[1].replace(',', "").parse().ok()
}

/// Raw (outer, inner) fragments when both an O.D. and an I.D. marker are present.
pub fn ring_pair(text: &str) -> Option<(String, String)> {
    let outer = marked_measure(&OD_RE, text)?;
    let inner = marked_measure(&ID_RE, text)?;
    Some((outer, inner))
}

pub fn has_ring_markers(text: &str) -> bool {
    static OD_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bO\.?\s?D(?:\.|\b)").unwrap());
    static ID_MARK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bI\.?\s?D(?:\.|\b)").unwrap());
    OD_MARK.is_match(text) && ID_MARK.is_match(text)
}

fn marked_measure(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    caps.name("pre")
        .or_else(|| caps.name("post"))
        .map(|m| m.as_str().trim().to_string())
}

fn first_number(re: &Regex, raw: &str) -> Option<f64> {
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}

fn inches(raw: &str) -> Option<f64> {
    let caps = INCH_RE.captures(raw)?;
    if let Some(dec) = caps.name("dec") {
        return dec.as_str().parse().ok();
    }
    let num: f64 = caps.name("num")?.as_str().parse().ok()?;
    let den: f64 = caps.name("den")?.as_str().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    let whole: f64 = match caps.name("whole") {
        Some(w) => w.as_str().parse().ok()?,
        None => 0.0,
    };
    Some(whole + num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purity(raw: &str) -> Option<String> {
        match read_purity(raw) {
            PurityReading::Percent(p) => Some(p),
            _ => None,
        }
    }

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 0.01)
    }

    #[test]
    fn millimeters_pass_through() {
        let n = Normalizer::default();
        assert_eq!(n.length_mm("62mm"), Some(62.0));
        assert_eq!(n.length_mm("Ø57 mm"), Some(57.0));
    }

    #[test]
    fn inches_convert() {
        let n = Normalizer::default();
        assert!(close(n.length_mm("2\""), 50.8));
        assert!(close(n.length_mm("2.4\""), 60.96));
        assert!(close(n.length_mm("3 inch"), 76.2));
        assert!(close(n.length_mm("2″"), 50.8));
    }

    #[test]
    fn fractional_inches() {
        let n = Normalizer::default();
        assert!(close(n.thickness_mm("1/8\""), 3.175));
        assert!(close(n.length_mm("2-1/2\""), 63.5));
        assert!(close(n.length_mm("2 1/2 inch"), 63.5));
    }

    #[test]
    fn bare_numeral_is_assumed_mm() {
        assert_eq!(Normalizer::default().length_mm("75"), Some(75.0));
        assert_eq!(Normalizer::new(true).length_mm("75"), None);
        assert_eq!(Normalizer::new(true).length_mm("75mm"), Some(75.0));
    }

    #[test]
    fn unreadable_length_is_none() {
        let n = Normalizer::default();
        assert_eq!(n.length_mm("n/a"), None);
        assert_eq!(n.length_mm(""), None);
    }

    #[test]
    fn thickness_units() {
        let n = Normalizer::default();
        assert!(close(n.thickness_mm("150 μm"), 0.15));
        assert!(close(n.thickness_mm("150µm"), 0.15));
        assert!(close(n.thickness_mm("250 microns"), 0.25));
        assert_eq!(n.thickness_mm("0.1mm"), Some(0.1));
        assert!(close(n.thickness_mm("0.125\""), 3.175));
    }

    #[test]
    fn thickness_must_be_positive() {
        assert_eq!(Normalizer::default().thickness_mm("0 mm"), None);
    }

    #[test]
    fn purity_percent_verbatim() {
        assert_eq!(purity("99.99%").as_deref(), Some("99.99%"));
        assert_eq!(purity("Au 99.95 %").as_deref(), Some("99.95 %"));
    }

    #[test]
    fn purity_shorthand() {
        assert_eq!(purity("4N").as_deref(), Some("99.99%"));
        assert_eq!(purity("5N").as_deref(), Some("99.999%"));
        assert_eq!(purity("3N").as_deref(), Some("99.9%"));
        assert_eq!(purity("2N").as_deref(), Some("99%"));
        assert_eq!(purity("4N5").as_deref(), Some("99.995%"));
    }

    #[test]
    fn purity_below_two_nines() {
        assert_eq!(read_purity("1N"), PurityReading::OutOfDomain(1));
        assert_eq!(purity("1N"), None);
        assert_eq!(read_purity("high purity"), PurityReading::Unrecognized);
    }

    #[test]
    fn prices() {
        assert_eq!(price("$1,200.00"), Some(1200.0));
        assert_eq!(price("each $85"), Some(85.0));
        assert_eq!(price("Price on request"), None);
    }

    #[test]
    fn ring_pair_both_orders() {
        assert_eq!(
            ring_pair("(60mm O.D. / 20mm I.D.)"),
            Some(("60mm".to_string(), "20mm".to_string()))
        );
        assert_eq!(
            ring_pair("O.D. 3\" x I.D. 1\""),
            Some(("3\"".to_string(), "1\"".to_string()))
        );
        assert_eq!(ring_pair("60mm O.D. only"), None);
        assert_eq!(ring_pair("GOLD DISC"), None);
    }

    #[test]
    fn ring_markers() {
        assert!(has_ring_markers("Dimensions (O.D. / I.D.)"));
        assert!(!has_ring_markers("Diameter"));
    }

    #[test]
    fn annular_clears_diameter() {
        let n = Normalizer::default();
        let g = n.geometry(ShapeHint::Annular, Some("57mm"), Some("60mm"), Some("20mm"));
        assert_eq!(g, Geometry::Annular { outer_mm: 60.0, inner_mm: 20.0 });
        assert_eq!(g.diameter_mm(), None);
    }

    #[test]
    fn disc_needs_a_diameter() {
        let n = Normalizer::default();
        assert_eq!(
            n.geometry(ShapeHint::Disc, Some("62mm"), None, None),
            Geometry::Disc { diameter_mm: 62.0 }
        );
        assert_eq!(n.geometry(ShapeHint::Disc, None, None, None), Geometry::Other);
        assert_eq!(n.geometry(ShapeHint::Annular, None, Some("60mm"), None), Geometry::Other);
    }
}
