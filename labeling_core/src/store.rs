//! The storage seams of the labeling tool.
//!
//! The campaign data lives in a shared realtime store. The core only sees it
//! through the traits below; `MemoryStore` is the in-process implementation.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::config::*;
use crate::key::RecordKey;
use crate::tally::ScoreMatrix;

/// Append-only collection of labels.
pub trait LabelStore {
    /// Appends a label and returns the identifier generated for it.
    fn push_label(&mut self, label: Label) -> Result<LabelId, LabelingError>;

    fn labels_for_user(&self, user: &UserId) -> Result<Vec<Label>, LabelingError>;

    /// A point-in-time snapshot of all the labels given to a record.
    fn labels_for_record(&self, key: &RecordKey) -> Result<Vec<Label>, LabelingError>;

    fn all_labels(&self) -> Result<Vec<Label>, LabelingError>;
}

/// The shared consensus threshold.
pub trait ThresholdStore {
    fn read_threshold(&self) -> Result<Threshold, LabelingError>;

    fn write_threshold(&mut self, threshold: Threshold) -> Result<(), LabelingError>;
}

/// Win counts of the pairwise comparisons.
pub trait VoteStore {
    /// Adds one win of `winner` over `loser` as a single store operation and
    /// returns the new count.
    fn increment(&mut self, winner: ItemId, loser: ItemId) -> Result<u64, LabelingError>;

    fn score_matrix(&self) -> Result<ScoreMatrix, LabelingError>;
}

/// Generates the opaque identifier of the `counter`-th pushed label.
pub fn push_id(counter: u64, label: &Label) -> LabelId {
    let digest = sha256::digest(format!(
        "{:016}{}{}{}{}",
        counter,
        label.user_id.0,
        label.record_key.legacy_string(),
        label.label.as_str(),
        label.timestamp
    ));
    LabelId(format!("-{}", &digest[..19]))
}

/// Keeps everything in memory. Useful for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    labels: BTreeMap<LabelId, (u64, Label)>,
    pushed: u64,
    threshold: Option<Threshold>,
    votes: ScoreMatrix,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn with_threshold(threshold: Threshold) -> MemoryStore {
        MemoryStore {
            threshold: Some(threshold),
            ..MemoryStore::default()
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    fn filtered<F: Fn(&Label) -> bool>(&self, f: F) -> Vec<Label> {
        // Insertion order, not identifier order.
        let mut res: Vec<&(u64, Label)> = self.labels.values().filter(|(_, l)| f(l)).collect();
        res.sort_by_key(|(seq, _)| *seq);
        res.into_iter().map(|(_, l)| l.clone()).collect()
    }
}

impl LabelStore for MemoryStore {
    fn push_label(&mut self, label: Label) -> Result<LabelId, LabelingError> {
        let id = push_id(self.pushed, &label);
        debug!("push_label: {:?} -> {:?}", id, label);
        self.labels.insert(id.clone(), (self.pushed, label));
        self.pushed += 1;
        Ok(id)
    }

    fn labels_for_user(&self, user: &UserId) -> Result<Vec<Label>, LabelingError> {
        Ok(self.filtered(|l| l.user_id == *user))
    }

    fn labels_for_record(&self, key: &RecordKey) -> Result<Vec<Label>, LabelingError> {
        Ok(self.filtered(|l| l.record_key == *key))
    }

    fn all_labels(&self) -> Result<Vec<Label>, LabelingError> {
        Ok(self.filtered(|_| true))
    }
}

impl ThresholdStore for MemoryStore {
    fn read_threshold(&self) -> Result<Threshold, LabelingError> {
        Ok(self.threshold.unwrap_or_default())
    }

    fn write_threshold(&mut self, threshold: Threshold) -> Result<(), LabelingError> {
        self.threshold = Some(threshold);
        Ok(())
    }
}

impl VoteStore for MemoryStore {
    fn increment(&mut self, winner: ItemId, loser: ItemId) -> Result<u64, LabelingError> {
        Ok(self.votes.record_win(winner, loser))
    }

    fn score_matrix(&self) -> Result<ScoreMatrix, LabelingError> {
        Ok(self.votes.clone())
    }
}

/// The distinct record keys appearing in a list of labels.
pub fn labeled_keys(labels: &[Label]) -> BTreeSet<RecordKey> {
    labels.iter().map(|l| l.record_key.clone()).collect()
}
