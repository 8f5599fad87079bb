use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::attribution::SourceInfo;
use crate::model::{NormalizedRecord, Shape};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS page_cache (
            url        TEXT PRIMARY KEY,
            body       TEXT NOT NULL,
            status     INTEGER NOT NULL,
            fetched_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sources (
            id              INTEGER PRIMARY KEY,
            vendor          TEXT NOT NULL,
            url             TEXT NOT NULL,
            title           TEXT,
            last_fetched_at TEXT NOT NULL,
            UNIQUE(vendor, url)
        );

        CREATE TABLE IF NOT EXISTS targets (
            id                INTEGER PRIMARY KEY,
            source_id         INTEGER REFERENCES sources(id) ON DELETE SET NULL,
            part_number       TEXT UNIQUE NOT NULL,
            shape             TEXT NOT NULL CHECK(shape IN ('disc','annular','other')),
            material          TEXT NOT NULL,
            purity            TEXT,
            diameter_mm       REAL,
            outer_diameter_mm REAL,
            inner_diameter_mm REAL,
            thickness_mm      REAL CHECK(thickness_mm IS NULL OR thickness_mm > 0),
            backing_plate     TEXT,
            alloy_ratio       TEXT,
            price             REAL,
            notes             TEXT NOT NULL DEFAULT '[]',
            raw_excerpt       TEXT NOT NULL,
            strategy          TEXT NOT NULL CHECK(strategy IN ('table','free_text','dom_fallback')),
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            CHECK (
                (shape = 'disc' AND diameter_mm IS NOT NULL
                    AND outer_diameter_mm IS NULL AND inner_diameter_mm IS NULL)
             OR (shape = 'annular' AND diameter_mm IS NULL
                    AND outer_diameter_mm IS NOT NULL AND inner_diameter_mm IS NOT NULL)
             OR (shape = 'other' AND diameter_mm IS NULL
                    AND outer_diameter_mm IS NULL AND inner_diameter_mm IS NULL)
            )
        );
        CREATE INDEX IF NOT EXISTS idx_targets_source ON targets(source_id);
        CREATE INDEX IF NOT EXISTS idx_targets_material ON targets(material);
        ",
    )?;
    Ok(())
}

/// RFC 3339 with microseconds, so text order matches time order.
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `now`, pushed past `previous` when the clock has not moved on.
fn advance(previous: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let Ok(prev) = DateTime::parse_from_rfc3339(previous) else {
        return now;
    };
    let prev = prev.with_timezone(&Utc);
    if now.timestamp_micros() > prev.timestamp_micros() {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}

// ── Store contract ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
}

/// What the ingestion core needs from a catalog store: a keyed upsert for
/// sources and one for targets, each atomic on its own.
pub trait CatalogStore {
    fn upsert_source(&self, source: &SourceInfo, fetched_at: DateTime<Utc>) -> Result<i64>;

    fn upsert_target(
        &self,
        record: &NormalizedRecord,
        source_id: i64,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome>;
}

impl CatalogStore for Connection {
    fn upsert_source(&self, source: &SourceInfo, fetched_at: DateTime<Utc>) -> Result<i64> {
        let id = self
            .query_row(
                "INSERT INTO sources (vendor, url, title, last_fetched_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(vendor, url) DO UPDATE SET
                     title = COALESCE(excluded.title, sources.title),
                     last_fetched_at = excluded.last_fetched_at
                 RETURNING id",
                rusqlite::params![source.vendor, source.url, source.title, timestamp(fetched_at)],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert source {} {}", source.vendor, source.url))?;
        Ok(id)
    }

    fn upsert_target(
        &self,
        record: &NormalizedRecord,
        source_id: i64,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome> {
        let tx = self.unchecked_transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT updated_at FROM targets WHERE part_number = ?1",
                [&record.part_number],
                |row| row.get(0),
            )
            .optional()?;
        let notes = serde_json::to_string(&record.notes)?;
        let g = &record.geometry;

        let outcome = match previous {
            None => {
                let ts = timestamp(now);
                tx.execute(
                    "INSERT INTO targets
                     (source_id, part_number, shape, material, purity, diameter_mm,
                      outer_diameter_mm, inner_diameter_mm, thickness_mm, backing_plate,
                      alloy_ratio, price, notes, raw_excerpt, strategy, created_at, updated_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?16)",
                    rusqlite::params![
                        source_id, record.part_number, record.shape().as_str(), record.material,
                        record.purity, g.diameter_mm(), g.outer_mm(), g.inner_mm(),
                        record.thickness_mm, record.backing_plate, record.alloy_ratio,
                        record.price, notes, record.raw_excerpt, record.strategy.as_str(), ts,
                    ],
                )?;
                WriteOutcome::Inserted
            }
            Some(prev) => {
                let ts = timestamp(advance(&prev, now));
                tx.execute(
                    "UPDATE targets SET
                         source_id = ?1, shape = ?3, material = ?4, purity = ?5,
                         diameter_mm = ?6, outer_diameter_mm = ?7, inner_diameter_mm = ?8,
                         thickness_mm = ?9, backing_plate = ?10, alloy_ratio = ?11,
                         price = ?12, notes = ?13, raw_excerpt = ?14, strategy = ?15,
                         updated_at = ?16
                     WHERE part_number = ?2",
                    rusqlite::params![
                        source_id, record.part_number, record.shape().as_str(), record.material,
                        record.purity, g.diameter_mm(), g.outer_mm(), g.inner_mm(),
                        record.thickness_mm, record.backing_plate, record.alloy_ratio,
                        record.price, notes, record.raw_excerpt, record.strategy.as_str(), ts,
                    ],
                )?;
                WriteOutcome::Updated
            }
        };
        tx.commit()?;
        Ok(outcome)
    }
}

// ── Page cache ──

pub fn cached_page(conn: &Connection, url: &str) -> Result<Option<String>> {
    let body = conn
        .query_row("SELECT body FROM page_cache WHERE url = ?1", [url], |row| row.get(0))
        .optional()?;
    Ok(body)
}

pub fn save_page(conn: &Connection, url: &str, body: &str, status: u16) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO page_cache (url, body, status, fetched_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![url, body, status, timestamp(Utc::now())],
    )?;
    Ok(())
}

// ── Lookups ──

pub struct SourceRow {
    pub id: i64,
    pub vendor: String,
    pub url: String,
    pub title: Option<String>,
    pub last_fetched_at: String,
}

pub fn fetch_sources(conn: &Connection) -> Result<Vec<SourceRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, vendor, url, title, last_fetched_at FROM sources ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SourceRow {
                id: row.get(0)?,
                vendor: row.get(1)?,
                url: row.get(2)?,
                title: row.get(3)?,
                last_fetched_at: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct TargetRow {
    pub part_number: String,
    pub shape: Shape,
    pub material: String,
    pub purity: Option<String>,
    pub diameter_mm: Option<f64>,
    pub outer_diameter_mm: Option<f64>,
    pub inner_diameter_mm: Option<f64>,
    pub thickness_mm: Option<f64>,
    pub backing_plate: Option<String>,
    pub alloy_ratio: Option<String>,
    pub price: Option<f64>,
    pub notes: Vec<String>,
    pub raw_excerpt: String,
    pub strategy: String,
    pub vendor: Option<String>,
    pub source_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn fetch_target(conn: &Connection, part_number: &str) -> Result<Option<TargetRow>> {
    let row = conn
        .query_row(
            "SELECT t.part_number, t.shape, t.material, t.purity, t.diameter_mm,
                    t.outer_diameter_mm, t.inner_diameter_mm, t.thickness_mm,
                    t.backing_plate, t.alloy_ratio, t.price, t.notes, t.raw_excerpt,
                    t.strategy, s.vendor, s.url, t.created_at, t.updated_at
             FROM targets t
             LEFT JOIN sources s ON s.id = t.source_id
             WHERE t.part_number = ?1",
            [part_number],
            |row| {
                let shape: String = row.get(1)?;
                let notes: String = row.get(11)?;
                Ok(TargetRow {
                    part_number: row.get(0)?,
                    shape: Shape::parse(&shape).unwrap_or(Shape::Other),
                    material: row.get(2)?,
                    purity: row.get(3)?,
                    diameter_mm: row.get(4)?,
                    outer_diameter_mm: row.get(5)?,
                    inner_diameter_mm: row.get(6)?,
                    thickness_mm: row.get(7)?,
                    backing_plate: row.get(8)?,
                    alloy_ratio: row.get(9)?,
                    price: row.get(10)?,
                    notes: serde_json::from_str(&notes).unwrap_or_default(),
                    raw_excerpt: row.get(12)?,
                    strategy: row.get(13)?,
                    vendor: row.get(14)?,
                    source_url: row.get(15)?,
                    created_at: row.get(16)?,
                    updated_at: row.get(17)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

// ── Stats ──

pub struct Stats {
    pub sources: usize,
    pub targets: usize,
    pub cached_pages: usize,
    pub by_shape: Vec<(String, usize)>,
    pub by_strategy: Vec<(String, usize)>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let sources: usize = conn.query_row("SELECT COUNT(*) FROM sources", [], |r| r.get(0))?;
    let targets: usize = conn.query_row("SELECT COUNT(*) FROM targets", [], |r| r.get(0))?;
    let cached_pages: usize =
        conn.query_row("SELECT COUNT(*) FROM page_cache", [], |r| r.get(0))?;
    Ok(Stats {
        sources,
        targets,
        cached_pages,
        by_shape: group_counts(conn, "shape")?,
        by_strategy: group_counts(conn, "strategy")?,
    })
}

fn group_counts(conn: &Connection, column: &str) -> Result<Vec<(String, usize)>> {
    let sql = format!(
        "SELECT {0}, COUNT(*) FROM targets GROUP BY {0} ORDER BY COUNT(*) DESC, {0}",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
