use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::db::CatalogStore;
use crate::error::IngestError;

/// Where a page came from. Keyed on (vendor, url).
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub vendor: String,
    pub url: String,
    pub title: Option<String>,
}

/// The source identity and fetch time shared by every target of one run.
#[derive(Debug, Clone, Copy)]
pub struct Attribution {
    pub source_id: i64,
    pub fetched_at: DateTime<Utc>,
}

/// Insert the source or touch its last-fetched time. Call once per run,
/// before any target is written.
pub fn attribute<S: CatalogStore + ?Sized>(
    store: &S,
    source: &SourceInfo,
    fetched_at: DateTime<Utc>,
) -> Result<Attribution, IngestError> {
    if source.vendor.trim().is_empty() {
        return Err(IngestError::InvalidSource("vendor is empty".to_string()));
    }
    if source.url.trim().is_empty() {
        return Err(IngestError::InvalidSource("url is empty".to_string()));
    }
    let source_id = store
        .upsert_source(source, fetched_at)
        .map_err(IngestError::Attribution)?;
    info!(source_id, vendor = %source.vendor, url = %source.url, "Attributed source");
    Ok(Attribution {
        source_id,
        fetched_at,
    })
}
