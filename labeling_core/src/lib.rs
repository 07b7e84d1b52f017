//! Core logic of a crowd labeling campaign.
//!
//! Users are shown records one at a time and judge them good or bad; the
//! judgments of all users are aggregated into a consensus against a shared
//! threshold. A companion game asks users to pick their favourite among two
//! catalogue items, and the votes are tallied into a ranking.
//!
//! All the state lives in explicit objects (a [`selector::SessionState`] per
//! user session, and the stores behind the traits of [`store`]).

mod config;
pub mod consensus;
pub mod key;
pub mod manual;
pub mod selector;
pub mod store;
pub mod submitter;
pub mod tally;

pub use crate::config::*;
pub use crate::consensus::{compute_consensus, consensus_by_record, update_threshold};
pub use crate::key::RecordKey;
pub use crate::selector::{select_next, LabelingSession, Selection, SessionState};
pub use crate::store::{LabelStore, MemoryStore, ThresholdStore, VoteStore};
pub use crate::submitter::submit;
pub use crate::tally::{rank, record_win, ScoreMatrix};
