use serde::Serialize;

/// Upper bound on the audit snippet kept with every candidate.
pub const MAX_EXCERPT_CHARS: usize = 240;

pub const UNKNOWN_MATERIAL: &str = "Unknown";

/// Which extraction strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Table,
    FreeText,
    DomFallback,
}

impl Strategy {
    /// Lower rank wins when two candidates share a part number.
    pub fn rank(self) -> u8 {
        match self {
            Strategy::Table => 0,
            Strategy::FreeText => 1,
            Strategy::DomFallback => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Table => "table",
            Strategy::FreeText => "free_text",
            Strategy::DomFallback => "dom_fallback",
        }
    }
}

/// Shape as seen by an extractor, before any measurement is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeHint {
    Disc,
    Annular,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Disc,
    Annular,
    Other,
}

impl Shape {
    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Disc => "disc",
            Shape::Annular => "annular",
            Shape::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Shape> {
        match s {
            "disc" => Some(Shape::Disc),
            "annular" => Some(Shape::Annular),
            "other" => Some(Shape::Other),
            _ => None,
        }
    }
}

/// Unvalidated output of one strategy. Every field is the raw vendor text.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub part_number: String,
    pub shape: ShapeHint,
    pub material: Option<String>,
    pub purity: Option<String>,
    pub diameter: Option<String>,
    pub outer_diameter: Option<String>,
    pub inner_diameter: Option<String>,
    pub thickness: Option<String>,
    pub backing_plate: Option<String>,
    pub alloy_ratio: Option<String>,
    pub price: Option<String>,
    pub notes: Vec<String>,
    pub raw_excerpt: String,
    pub strategy: Strategy,
}

impl CandidateRecord {
    pub fn new(part_number: &str, strategy: Strategy, excerpt: &str) -> Self {
        CandidateRecord {
            part_number: part_number.trim().to_string(),
            shape: ShapeHint::Unknown,
            material: None,
            purity: None,
            diameter: None,
            outer_diameter: None,
            inner_diameter: None,
            thickness: None,
            backing_plate: None,
            alloy_ratio: None,
            price: None,
            notes: Vec::new(),
            raw_excerpt: excerpt_of(excerpt),
            strategy,
        }
    }
}

/// Measured footprint of a target. Encodes "diameter xor outer/inner pair".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Geometry {
    Disc { diameter_mm: f64 },
    Annular { outer_mm: f64, inner_mm: f64 },
    Other,
}

impl Geometry {
    pub fn shape(&self) -> Shape {
        match self {
            Geometry::Disc { .. } => Shape::Disc,
            Geometry::Annular { .. } => Shape::Annular,
            Geometry::Other => Shape::Other,
        }
    }

    pub fn diameter_mm(&self) -> Option<f64> {
        match self {
            Geometry::Disc { diameter_mm } => Some(*diameter_mm),
            _ => None,
        }
    }

    pub fn outer_mm(&self) -> Option<f64> {
        match self {
            Geometry::Annular { outer_mm, .. } => Some(*outer_mm),
            _ => None,
        }
    }

    pub fn inner_mm(&self) -> Option<f64> {
        match self {
            Geometry::Annular { inner_mm, .. } => Some(*inner_mm),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub part_number: String,
    pub material: String,
    pub purity: Option<String>,
    pub geometry: Geometry,
    pub thickness_mm: Option<f64>,
    pub backing_plate: Option<String>,
    pub alloy_ratio: Option<String>,
    pub price: Option<f64>,
    pub notes: Vec<String>,
    pub raw_excerpt: String,
    pub strategy: Strategy,
}

impl NormalizedRecord {
    pub fn shape(&self) -> Shape {
        self.geometry.shape()
    }
}

fn excerpt_of(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= MAX_EXCERPT_CHARS {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(MAX_EXCERPT_CHARS).collect();
        format!("{}...", truncated)
    }
}
