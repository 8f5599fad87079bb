use std::collections::HashMap;

use tracing::warn;

use crate::model::{CandidateRecord, NormalizedRecord};
use crate::normalize::{self, Normalizer, PurityReading};

/// Output of one reconciliation pass plus the per-record drops it made.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub records: Vec<NormalizedRecord>,
    pub dropped_missing_material: usize,
    pub dropped_missing_key: usize,
    pub purity_out_of_domain: usize,
}

/// Collapse candidates to one record per part number.
///
/// Within a part number the lowest strategy rank wins; between candidates of
/// the same rank the one produced last wins. Records keep the order in which
/// their part number first appeared.
pub fn reconcile<I>(candidates: I, normalizer: &Normalizer) -> Reconciled
where
    I: IntoIterator<Item = CandidateRecord>,
{
    let mut out = Reconciled::default();
    let mut order: Vec<String> = Vec::new();
    let mut winners: HashMap<String, CandidateRecord> = HashMap::new();

    for candidate in candidates {
        if candidate.part_number.is_empty() {
            out.dropped_missing_key += 1;
            continue;
        }
        match winners.get_mut(&candidate.part_number) {
            Some(current) => {
                if candidate.strategy.rank() <= current.strategy.rank() {
                    *current = candidate;
                }
            }
            None => {
                order.push(candidate.part_number.clone());
                winners.insert(candidate.part_number.clone(), candidate);
            }
        }
    }
    if out.dropped_missing_key > 0 {
        warn!("Dropped {} candidates without a part number", out.dropped_missing_key);
    }

    for key in order {
        let Some(winner) = winners.remove(&key) else {
            continue;
        };
        let purity = match winner.purity.as_deref().map(normalize::read_purity) {
            Some(PurityReading::Percent(p)) => Some(p),
            Some(PurityReading::OutOfDomain(nines)) => {
                warn!(part_number = %key, "Purity {}N has no percentage form, storing null", nines);
                out.purity_out_of_domain += 1;
                None
            }
            _ => None,
        };
        match normalize_winner(winner, purity, normalizer) {
            Some(record) => out.records.push(record),
            None => {
                warn!(part_number = %key, "Dropping record without material");
                out.dropped_missing_material += 1;
            }
        }
    }
    out
}

fn normalize_winner(
    c: CandidateRecord,
    purity: Option<String>,
    normalizer: &Normalizer,
) -> Option<NormalizedRecord> {
    let material = c
        .material
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())?
        .to_string();
    let geometry = normalizer.geometry(
        c.shape,
        c.diameter.as_deref(),
        c.outer_diameter.as_deref(),
        c.inner_diameter.as_deref(),
    );
    Some(NormalizedRecord {
        part_number: c.part_number,
        material,
        purity,
        geometry,
        thickness_mm: c.thickness.as_deref().and_then(|t| normalizer.thickness_mm(t)),
        backing_plate: c.backing_plate,
        alloy_ratio: c.alloy_ratio,
        price: c.price.as_deref().and_then(normalize::price),
        notes: c.notes,
        raw_excerpt: c.raw_excerpt,
        strategy: c.strategy,
    })
}
