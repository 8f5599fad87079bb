use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use crate::attribution::{self, SourceInfo};
use crate::db::{self, CatalogStore};
use crate::error::IngestError;
use crate::model::{CandidateRecord, NormalizedRecord, Shape, Strategy};
use crate::normalize::Normalizer;
use crate::parser::{extract, Page};
use crate::reconcile;
use crate::writer::{self, WriteTally};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Diameter for tables that sit under no "<n> mm" heading.
    pub declared_diameter: Option<String>,
    pub strict_units: bool,
    pub sample_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            declared_diameter: None,
            strict_units: false,
            sample_size: 3,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyCounts {
    pub table: usize,
    pub free_text: usize,
    pub dom_fallback: usize,
}

impl StrategyCounts {
    fn tally(candidates: &[CandidateRecord]) -> Self {
        let mut counts = StrategyCounts::default();
        for c in candidates {
            match c.strategy {
                Strategy::Table => counts.table += 1,
                Strategy::FreeText => counts.free_text += 1,
                Strategy::DomFallback => counts.dom_fallback += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source: SourceInfo,
    pub source_id: i64,
    pub fetched_at: String,
    pub candidates: usize,
    pub by_strategy: StrategyCounts,
    pub normalized: usize,
    pub dropped_missing_material: usize,
    pub dropped_missing_key: usize,
    pub purity_out_of_domain: usize,
    #[serde(flatten)]
    pub writes: WriteTally,
    pub sample: Vec<NormalizedRecord>,
}

impl IngestReport {
    pub fn print(&self) {
        println!("Source:     {} ({})", self.source.vendor, self.source.url);
        if let Some(title) = &self.source.title {
            println!("Title:      {}", title);
        }
        println!(
            "Candidates: {} ({} table, {} free text, {} DOM fallback)",
            self.candidates,
            self.by_strategy.table,
            self.by_strategy.free_text,
            self.by_strategy.dom_fallback,
        );
        println!(
            "Records:    {} normalized, {} without material, {} without part number",
            self.normalized, self.dropped_missing_material, self.dropped_missing_key,
        );
        if self.purity_out_of_domain > 0 {
            println!("Purity:     {} unreadable N-grades stored as null", self.purity_out_of_domain);
        }
        println!(
            "Saved {} inserted, {} updated, {} failed.",
            self.writes.inserted, self.writes.updated, self.writes.failed,
        );

        if !self.sample.is_empty() {
            println!("\n--- Sample ---");
            for r in &self.sample {
                println!("  {}", describe(r));
            }
        }
    }
}

fn describe(r: &NormalizedRecord) -> String {
    let size = match r.geometry.shape() {
        Shape::Disc => format!("Ø{} mm", fmt_mm(r.geometry.diameter_mm())),
        Shape::Annular => format!(
            "{} / {} mm",
            fmt_mm(r.geometry.outer_mm()),
            fmt_mm(r.geometry.inner_mm())
        ),
        Shape::Other => "-".to_string(),
    };
    format!(
        "{:<8} | {:<20} | {:<8} | {:<8} | {:<14} | t={} mm | {}",
        r.part_number,
        r.material,
        r.purity.as_deref().unwrap_or("-"),
        r.shape().as_str(),
        size,
        fmt_mm(r.thickness_mm),
        r.strategy.as_str(),
    )
}

pub fn fmt_mm(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{:.3}", v).trim_end_matches('0').trim_end_matches('.').to_string(),
        None => "-".to_string(),
    }
}

/// One ingestion run: extract, reconcile, attribute, write.
pub fn ingest<S: CatalogStore + ?Sized>(
    store: &S,
    source: &SourceInfo,
    content: &str,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let page = Page::parse(content);
    let candidates = extract::extract_all(&page, options.declared_diameter.as_deref());
    if candidates.is_empty() {
        return Err(IngestError::NoCandidates {
            url: source.url.clone(),
        });
    }
    let by_strategy = StrategyCounts::tally(&candidates);
    let candidate_count = candidates.len();
    debug!(?by_strategy, "Extracted {} candidates", candidate_count);

    let normalizer = Normalizer::new(options.strict_units);
    let reconciled = reconcile::reconcile(candidates, &normalizer);

    let source = SourceInfo {
        title: source.title.clone().or_else(|| page.title.clone()),
        ..source.clone()
    };
    let attribution = attribution::attribute(store, &source, Utc::now())?;
    let writes = writer::write_all(store, &reconciled.records, &attribution);
    info!(
        inserted = writes.inserted,
        updated = writes.updated,
        failed = writes.failed,
        "Ingested {}",
        source.url
    );

    Ok(IngestReport {
        source,
        source_id: attribution.source_id,
        fetched_at: db::timestamp(attribution.fetched_at),
        candidates: candidate_count,
        by_strategy,
        normalized: reconciled.records.len(),
        dropped_missing_material: reconciled.dropped_missing_material,
        dropped_missing_key: reconciled.dropped_missing_key,
        purity_out_of_domain: reconciled.purity_out_of_domain,
        writes,
        sample: reconciled
            .records
            .into_iter()
            .take(options.sample_size)
            .collect(),
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    fn source() -> SourceInfo {
        SourceInfo {
            vendor: "Acme Coatings".to_string(),
            url: "https://acme.example/targets".to_string(),
            title: None,
        }
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn run(conn: &Connection, content: &str) -> IngestReport {
        ingest(conn, &source(), content, &IngestOptions::default()).unwrap()
    }

    #[test]
    fn disc_row_under_diameter_heading() {
        let conn = memory();
        run(
            &conn,
            "<h2>62mm</h2><table><tr><td>91700</td><td>Gold</td><td>99.99%</td><td>0.1mm</td></tr></table>",
        );
        let t = db::fetch_target(&conn, "91700").unwrap().unwrap();
        assert_eq!(t.shape, Shape::Disc);
        assert_eq!(t.material, "Gold");
        assert_eq!(t.purity.as_deref(), Some("99.99%"));
        assert_eq!(t.diameter_mm, Some(62.0));
        assert_eq!(t.thickness_mm, Some(0.1));
        assert_eq!(t.outer_diameter_mm, None);
        assert_eq!(t.inner_diameter_mm, None);
    }

    #[test]
    fn annular_free_text_entry() {
        let conn = memory();
        run(
            &conn,
            "<p>93000 Gold Target, 99.99% Au (60mm O.D. / 20mm I.D.) each $1,200.00</p>",
        );
        let t = db::fetch_target(&conn, "93000").unwrap().unwrap();
        assert_eq!(t.shape, Shape::Annular);
        assert_eq!(t.outer_diameter_mm, Some(60.0));
        assert_eq!(t.inner_diameter_mm, Some(20.0));
        assert_eq!(t.diameter_mm, None);
        assert_eq!(t.price, Some(1200.0));
        assert_eq!(t.strategy, "free_text");
    }

    #[test]
    fn bare_row_falls_back_to_unknown_material() {
        let conn = memory();
        let report = run(&conn, &fixture("bare_rows"));
        assert_eq!(report.by_strategy.dom_fallback, 1);
        let t = db::fetch_target(&conn, "91234").unwrap().unwrap();
        assert_eq!(t.material, "Unknown");
        assert_eq!(t.shape, Shape::Other);
        assert_eq!(t.diameter_mm, None);
        assert_eq!(t.outer_diameter_mm, None);
        assert_eq!(t.inner_diameter_mm, None);
        assert_eq!(t.thickness_mm, None);
        assert_eq!(t.purity, None);
    }

    #[test]
    fn second_run_only_updates() {
        let conn = memory();
        let html = fixture("disc_table");
        let first = run(&conn, &html);
        assert!(first.writes.inserted > 0);
        assert_eq!(first.writes.updated, 0);
        let before = db::fetch_target(&conn, "91700").unwrap().unwrap();

        let second = run(&conn, &html);
        assert_eq!(second.writes.inserted, 0);
        assert_eq!(second.writes.updated, first.writes.inserted);
        assert_eq!(second.writes.failed, 0);

        let after = db::fetch_target(&conn, "91700").unwrap().unwrap();
        assert_eq!(after.material, before.material);
        assert_eq!(after.diameter_mm, before.diameter_mm);
        assert_eq!(after.thickness_mm, before.thickness_mm);
        assert_eq!(after.price, before.price);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn table_wins_over_free_text() {
        let conn = memory();
        let report = run(&conn, &fixture("mixed"));
        assert!(report.by_strategy.table > 0);
        assert!(report.by_strategy.free_text > 0);
        let t = db::fetch_target(&conn, "94100").unwrap().unwrap();
        assert_eq!(t.material, "Gold");
        assert_eq!(t.strategy, "table");
        let only_text = db::fetch_target(&conn, "94200").unwrap().unwrap();
        assert_eq!(only_text.strategy, "free_text");
    }

    #[test]
    fn one_record_per_part_number() {
        let conn = memory();
        let report = run(&conn, &fixture("mixed"));
        assert!(report.candidates > report.normalized);
        let stats = db::get_stats(&conn).unwrap();
        assert_eq!(stats.targets, report.normalized);
    }

    #[test]
    fn repeated_runs_touch_one_source() {
        let conn = memory();
        let html = fixture("disc_table");
        let first = run(&conn, &html);
        let second = run(&conn, &html);
        assert_eq!(first.source_id, second.source_id);
        let sources = db::fetch_sources(&conn).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].last_fetched_at, second.fetched_at);
        assert!(second.fetched_at >= first.fetched_at);
    }

    #[test]
    fn page_title_fills_missing_source_title() {
        let conn = memory();
        let report = run(&conn, &fixture("disc_table"));
        assert_eq!(report.source.title.as_deref(), Some("Sputtering Targets | Acme Coatings"));
        let sources = db::fetch_sources(&conn).unwrap();
        assert_eq!(sources[0].title, report.source.title);
    }

    #[test]
    fn empty_page_is_fatal_and_writes_nothing() {
        let conn = memory();
        let err = ingest(&conn, &source(), "<p>Nothing to see</p>", &IngestOptions::default())
            .unwrap_err();
        assert!(matches!(err, IngestError::NoCandidates { .. }));
        assert!(db::fetch_sources(&conn).unwrap().is_empty());
    }

    #[test]
    fn invalid_source_is_fatal() {
        let conn = memory();
        let mut bad = source();
        bad.vendor = String::new();
        let html = fixture("disc_table");
        let err = ingest(&conn, &bad, &html, &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidSource(_)));
        assert_eq!(db::get_stats(&conn).unwrap().targets, 0);
    }

    #[test]
    fn declared_diameter_and_strict_units() {
        let conn = memory();
        let options = IngestOptions {
            declared_diameter: Some("2\"".to_string()),
            strict_units: true,
            sample_size: 1,
        };
        let html = "<table><tr><td>95000</td><td>Copper</td><td>3N</td><td>250</td></tr></table>";
        let report = ingest(&conn, &source(), html, &options).unwrap();
        assert_eq!(report.sample.len(), 1);
        let t = db::fetch_target(&conn, "95000").unwrap().unwrap();
        assert!(t.diameter_mm.is_some_and(|d| (d - 50.8).abs() < 0.01));
        assert_eq!(t.purity.as_deref(), Some("99.9%"));
        assert_eq!(t.thickness_mm, None);
    }

    #[test]
    fn report_serializes_flat_counts() {
        let conn = memory();
        let report = run(&conn, &fixture("disc_table"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["inserted"], report.writes.inserted);
        assert_eq!(json["by_strategy"]["table"], report.by_strategy.table);
        assert!(json["sample"].as_array().is_some_and(|s| s.len() <= 3));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(fmt_mm(Some(62.0)), "62");
        assert_eq!(fmt_mm(Some(50.8)), "50.8");
        assert_eq!(fmt_mm(Some(0.001)), "0.001");
        assert_eq!(fmt_mm(None), "-");
    }
}
