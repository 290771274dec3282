//! A/Z pairing engine
//!
//! Groups side records by fiber identity and classifies every group
//! before any comparison runs: a well-formed pair, an unmatched
//! singleton, or an ambiguous duplicate. Classification is explicit so
//! downstream reporting can account for every record it was given.

use std::collections::HashMap;

use crate::types::{FiberPair, FiberRecord, PairOutcome, Side};

/// Group records by `fiber_id` and classify each group.
///
/// Outcomes come back in the order fiber ids first appear in `records`,
/// which keeps a whole run's output deterministic for a given input set.
pub fn pair_records(records: Vec<FiberRecord>) -> Vec<PairOutcome> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<FiberRecord>> = HashMap::new();

    for record in records {
        if !groups.contains_key(&record.fiber_id) {
            order.push(record.fiber_id.clone());
        }
        groups
            .entry(record.fiber_id.clone())
            .or_default()
            .push(record);
    }

    order
        .into_iter()
        .filter_map(|fiber_id| groups.remove(&fiber_id))
        .map(classify_group)
        .collect()
}

/// Classify one fiber id's records. Groups always hold at least one
/// record; an empty group cannot be built by `pair_records`.
fn classify_group(records: Vec<FiberRecord>) -> PairOutcome {
    let a_count = records.iter().filter(|r| r.side == Side::A).count();
    let z_count = records.iter().filter(|r| r.side == Side::Z).count();

    if a_count > 1 || z_count > 1 {
        return PairOutcome::AmbiguousDuplicate {
            fiber_id: records[0].fiber_id.clone(),
            a_count,
            z_count,
            records,
        };
    }

    let mut a = None;
    let mut z = None;
    for record in records {
        match record.side {
            Side::A => a = Some(record),
            Side::Z => z = Some(record),
        }
    }

    match (a, z) {
        (Some(a), Some(z)) => PairOutcome::Paired(FiberPair { a, z }),
        (Some(single), None) | (None, Some(single)) => PairOutcome::UnmatchedSingleton(single),
        (None, None) => unreachable!("fiber groups are never empty"),
    }
}
