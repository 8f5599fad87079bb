use std::path::Path;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::db;
use crate::error::IngestError;
use crate::settings::Settings;

/// Page body for `url`, from the page cache unless `refresh` is set.
pub async fn retrieve(
    conn: &Connection,
    settings: &Settings,
    url: &str,
    refresh: bool,
) -> Result<String, IngestError> {
    if !refresh {
        match db::cached_page(conn, url) {
            Ok(Some(body)) => {
                info!("Using cached copy of {}", url);
                return Ok(body);
            }
            Ok(None) => {}
            Err(e) => warn!("Page cache lookup failed for {}: {}", url, e),
        }
    }

    let failed = |reason: String| IngestError::Retrieval {
        url: url.to_string(),
        reason,
    };
    let client = reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let t0 = Instant::now();
    let resp = client.get(url).send().await.map_err(|e| failed(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(failed(format!("HTTP {}", status)));
    }
    let body = resp.text().await.map_err(|e| failed(e.to_string()))?;
    info!(
        "Fetched {} ({} bytes) in {}ms",
        url,
        body.len(),
        t0.elapsed().as_millis()
    );

    if let Err(e) = db::save_page(conn, url, &body, status.as_u16()) {
        warn!("Failed to cache {}: {}", url, e);
    }
    Ok(body)
}

pub fn read_file(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|e| IngestError::Retrieval {
        url: path.display().to_string(),
        reason: e.to_string(),
    })
}
