// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use crate::key::RecordKey;

/// One labelable unit: a time series, optionally with a geolocation trace.
#[derive(PartialEq, Debug, Clone)]
pub struct Record {
    pub day: String,
    pub station: String,
    pub satellite: String,
    pub data: Vec<f64>,
    pub lat: Option<Vec<f64>>,
    pub lon: Option<Vec<f64>>,
}

impl Record {
    /// The identity of this record. Two records with the same day, station and
    /// satellite are considered the same record.
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.day, &self.station, &self.satellite)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

/// The opaque identifier given by a store to a label entry.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct LabelId(pub String);

/// The judgment of a user on a record.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum LabelValue {
    Good,
    Bad,
}

impl LabelValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelValue::Good => "good",
            LabelValue::Bad => "bad",
        }
    }

    pub fn parse(s: &str) -> Option<LabelValue> {
        match s {
            "good" => Some(LabelValue::Good),
            "bad" => Some(LabelValue::Bad),
            _ => None,
        }
    }
}

/// A single labeling decision. Labels are append-only.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Label {
    pub user_id: UserId,
    pub record_key: RecordKey,
    pub label: LabelValue,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

/// An item of the pairwise comparison catalogue. Items are numbered from 1.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct ItemId(pub u32);

// ******** Output data structures *********

/// The outcome of the consensus computation for one record.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Verdict {
    Good,
    Bad,
    /// No label has been recorded yet.
    Insufficient,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Consensus {
    pub verdict: Verdict,
    pub good_fraction: f64,
    pub good_count: usize,
    pub total: usize,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct AnalysisSummary {
    pub threshold: Threshold,
    /// Number of records that received at least one label.
    pub analysed: usize,
    pub good: usize,
    pub bad: usize,
    pub average_good_fraction: Option<f64>,
}

/// Errors that prevent an operation from completing.
#[derive(PartialEq, Debug, Clone)]
pub enum LabelingError {
    /// There is no record to select from.
    EmptyRecordSet,
    /// The threshold is not a number between 0 and 1.
    InvalidThreshold(String),
    /// An item cannot be compared with itself.
    SameItem(ItemId),
    /// Pairwise comparisons need at least two items.
    NotEnoughItems(u32),
    UnknownItem(ItemId),
    /// The backing store rejected the operation.
    Store(String),
}

impl Error for LabelingError {}

impl Display for LabelingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelingError::EmptyRecordSet => write!(f, "no record available for labeling"),
            LabelingError::InvalidThreshold(s) => {
                write!(f, "invalid threshold {:?}: expected a number in [0, 1]", s)
            }
            LabelingError::SameItem(id) => write!(f, "item {} cannot be voted against itself", id.0),
            LabelingError::NotEnoughItems(n) => {
                write!(f, "pairwise voting needs at least 2 items, got {}", n)
            }
            LabelingError::UnknownItem(id) => write!(f, "unknown item {}", id.0),
            LabelingError::Store(msg) => write!(f, "store error: {}", msg),
        }
    }
}

// ********* Configuration **********

/// The fraction of "good" labels a record needs to be considered good.
///
/// Always within `[0, 1]`.
#[derive(PartialEq, PartialOrd, Debug, Clone, Copy)]
pub struct Threshold(f64);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(0.5);

    pub fn new(value: f64) -> Result<Threshold, LabelingError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(LabelingError::InvalidThreshold(value.to_string()));
        }
        Ok(Threshold(value))
    }

    /// Parses the textual input of the admin control.
    pub fn parse(raw: &str) -> Result<Threshold, LabelingError> {
        let value = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| LabelingError::InvalidThreshold(raw.to_string()))?;
        Threshold::new(value).map_err(|_| LabelingError::InvalidThreshold(raw.to_string()))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::DEFAULT
    }
}
