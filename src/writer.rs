use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;

use crate::attribution::Attribution;
use crate::db::{CatalogStore, WriteOutcome};
use crate::model::NormalizedRecord;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteTally {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Idempotent write of one record under the run's source.
pub fn upsert<S: CatalogStore + ?Sized>(
    store: &S,
    record: &NormalizedRecord,
    attribution: &Attribution,
) -> anyhow::Result<WriteOutcome> {
    store.upsert_target(record, attribution.source_id, Utc::now())
}

/// Write every record in order. A failed record is logged and counted; the
/// loop carries on with the next one.
pub fn write_all<S: CatalogStore + ?Sized>(
    store: &S,
    records: &[NormalizedRecord],
    attribution: &Attribution,
) -> WriteTally {
    let pb = ProgressBar::new(records.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut tally = WriteTally::default();
    for record in records {
        match upsert(store, record, attribution) {
            Ok(WriteOutcome::Inserted) => tally.inserted += 1,
            Ok(WriteOutcome::Updated) => tally.updated += 1,
            Err(e) => {
                warn!(part_number = %record.part_number, "Upsert failed: {:#}", e);
                tally.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::SourceInfo;
    use crate::db;
    use crate::model::{Geometry, Strategy};
    use chrono::DateTime;
    use rusqlite::Connection;

    /// Refuses one part number and passes everything else to SQLite.
    struct RefusingStore {
        inner: Connection,
        refused: &'static str,
    }

    impl CatalogStore for RefusingStore {
        fn upsert_source(&self, source: &SourceInfo, fetched_at: DateTime<Utc>) -> anyhow::Result<i64> {
            self.inner.upsert_source(source, fetched_at)
        }

        fn upsert_target(
            &self,
            record: &NormalizedRecord,
            source_id: i64,
            now: DateTime<Utc>,
        ) -> anyhow::Result<WriteOutcome> {
            if record.part_number == self.refused {
                anyhow::bail!("disk full");
            }
            self.inner.upsert_target(record, source_id, now)
        }
    }

    fn record(part: &str) -> NormalizedRecord {
        NormalizedRecord {
            part_number: part.to_string(),
            material: "Gold".to_string(),
            purity: None,
            geometry: Geometry::Other,
            thickness_mm: None,
            backing_plate: None,
            alloy_ratio: None,
            price: None,
            notes: Vec::new(),
            raw_excerpt: String::new(),
            strategy: Strategy::Table,
        }
    }

    fn attribution(conn: &Connection) -> Attribution {
        let source = SourceInfo {
            vendor: "Acme".to_string(),
            url: "https://acme.example".to_string(),
            title: None,
        };
        crate::attribution::attribute(conn, &source, Utc::now()).unwrap()
    }

    #[test]
    fn counts_inserts_then_updates() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let a = attribution(&conn);
        let records = vec![record("1"), record("2")];
        let first = write_all(&conn, &records, &a);
        assert_eq!(first, WriteTally { inserted: 2, updated: 0, failed: 0 });
        let second = write_all(&conn, &records, &a);
        assert_eq!(second, WriteTally { inserted: 0, updated: 2, failed: 0 });
    }

    #[test]
    fn failure_does_not_stop_the_run() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let a = attribution(&conn);
        let store = RefusingStore { inner: conn, refused: "2" };
        let tally = write_all(&store, &[record("1"), record("2"), record("3")], &a);
        assert_eq!(tally, WriteTally { inserted: 2, updated: 0, failed: 1 });
        assert!(db::fetch_target(&store.inner, "3").unwrap().is_some());
        assert!(db::fetch_target(&store.inner, "2").unwrap().is_none());
    }
}
