use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::*;
use crate::key::{normalize_day, RecordKey};
use crate::store::{LabelStore, ThresholdStore};

/// Aggregates the labels of a record into a verdict.
///
/// The result does not depend on the order of the labels. A fraction equal to
/// the threshold counts as good.
pub fn compute_consensus(labels: &[Label], threshold: Threshold) -> Consensus {
    let total = labels.len();
    if total == 0 {
        return Consensus {
            verdict: Verdict::Insufficient,
            good_fraction: 0.0,
            good_count: 0,
            total: 0,
        };
    }
    let good_count = labels
        .iter()
        .filter(|l| l.label == LabelValue::Good)
        .count();
    let good_fraction = good_count as f64 / total as f64;
    let verdict = if good_fraction >= threshold.value() {
        Verdict::Good
    } else {
        Verdict::Bad
    };
    Consensus {
        verdict,
        good_fraction,
        good_count,
        total,
    }
}

/// Reads a snapshot of the labels of a record and computes its consensus.
pub fn consensus_for_record<S: LabelStore + ?Sized>(
    store: &S,
    key: &RecordKey,
    threshold: Threshold,
) -> Result<Consensus, LabelingError> {
    let labels = store.labels_for_record(key)?;
    let c = compute_consensus(&labels, threshold);
    debug!("consensus_for_record: {}: {:?}", key, c);
    Ok(c)
}

/// Admin path: validates the raw input and overwrites the shared threshold.
///
/// The store is left untouched when the input is rejected.
pub fn update_threshold<S: ThresholdStore + ?Sized>(
    store: &mut S,
    raw: &str,
) -> Result<Threshold, LabelingError> {
    let threshold = match Threshold::parse(raw) {
        Ok(t) => t,
        Err(e) => {
            warn!("update_threshold: rejected input {:?}", raw);
            return Err(e);
        }
    };
    store.write_threshold(threshold)?;
    info!("update_threshold: threshold set to {}", threshold.value());
    Ok(threshold)
}

/// Groups labels by record and computes the consensus of each group.
///
/// When `launch_date` is given, labels whose day only holds a time of day are
/// attached to that date first.
pub fn consensus_by_record(
    labels: &[Label],
    threshold: Threshold,
    launch_date: Option<&str>,
) -> BTreeMap<RecordKey, Consensus> {
    let mut grouped: BTreeMap<RecordKey, Vec<Label>> = BTreeMap::new();
    for l in labels {
        let mut key = l.record_key.clone();
        key.day = normalize_day(&key.day, launch_date);
        grouped.entry(key).or_default().push(l.clone());
    }
    info!(
        "consensus_by_record: {} labels over {} records",
        labels.len(),
        grouped.len()
    );
    grouped
        .into_iter()
        .map(|(k, ls)| {
            let c = compute_consensus(&ls, threshold);
            (k, c)
        })
        .collect()
}

/// The loaded records that reached a good consensus, in record order.
///
/// Labels for records that are not loaded are ignored.
pub fn good_records<'a>(
    records: &'a [Record],
    consensus: &BTreeMap<RecordKey, Consensus>,
) -> Vec<(&'a Record, Consensus)> {
    records
        .iter()
        .filter_map(|r| match consensus.get(&r.key()) {
            Some(c) if c.verdict == Verdict::Good => Some((r, *c)),
            _ => None,
        })
        .collect()
}

pub fn summarize(
    consensus: &BTreeMap<RecordKey, Consensus>,
    num_good_records: usize,
    threshold: Threshold,
) -> AnalysisSummary {
    let analysed = consensus.len();
    let average_good_fraction = if analysed == 0 {
        None
    } else {
        Some(consensus.values().map(|c| c.good_fraction).sum::<f64>() / analysed as f64)
    };
    AnalysisSummary {
        threshold,
        analysed,
        good: num_good_records,
        bad: analysed.saturating_sub(num_good_records),
        average_good_fraction,
    }
}
