use std::collections::HashSet;

use log::{debug, warn};
use rand::Rng;

use crate::config::*;
use crate::key::RecordKey;
use crate::store::LabelStore;
use crate::submitter::submit;

/// What a labeling session remembers between rounds.
///
/// Nothing in here is persisted.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SessionState {
    labeled_keys: HashSet<RecordKey>,
    current_index: Option<usize>,
}

impl SessionState {
    pub fn new() -> SessionState {
        SessionState::default()
    }

    pub fn labeled_keys(&self) -> &HashSet<RecordKey> {
        &self.labeled_keys
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn mark_labeled(&mut self, key: RecordKey) {
        self.labeled_keys.insert(key);
    }

    /// Pre-seeds the session with the previous labels of the user.
    ///
    /// Keys of records that are not loaded are ignored.
    pub fn seed_from_labels(&mut self, labels: &[Label], records: &[Record]) {
        let loaded: HashSet<RecordKey> = records.iter().map(|r| r.key()).collect();
        let before = self.labeled_keys.len();
        for l in labels {
            if loaded.contains(&l.record_key) {
                self.labeled_keys.insert(l.record_key.clone());
            }
        }
        debug!(
            "seed_from_labels: {} labels, {} new keys",
            labels.len(),
            self.labeled_keys.len() - before
        );
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Selection {
    /// Position of the record in the loaded record set.
    pub index: usize,
    /// The seen-set was cleared before this pick.
    pub recycled: bool,
}

/// Picks a record that was not labeled yet during this session, uniformly at
/// random.
///
/// Once every record was labeled, the session forgets what it has seen and the
/// pick is done over the full set; the returned selection is then flagged as
/// recycled. Apart from recycling the state is not modified.
pub fn select_next<R: Rng + ?Sized>(
    records: &[Record],
    state: &mut SessionState,
    rng: &mut R,
) -> Result<Selection, LabelingError> {
    if records.is_empty() {
        return Err(LabelingError::EmptyRecordSet);
    }
    let mut recycled = false;
    let mut unlabeled = unlabeled_indices(records, &state.labeled_keys);
    if unlabeled.is_empty() {
        warn!(
            "select_next: all {} entries labeled once, recycling",
            records.len()
        );
        state.labeled_keys.clear();
        recycled = true;
        unlabeled = (0..records.len()).collect();
    }
    let index = unlabeled[rng.gen_range(0..unlabeled.len())];
    debug!(
        "select_next: picked {} among {} candidates",
        index,
        unlabeled.len()
    );
    Ok(Selection { index, recycled })
}

fn unlabeled_indices(records: &[Record], labeled: &HashSet<RecordKey>) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| !labeled.contains(&r.key()))
        .map(|(idx, _)| idx)
        .collect()
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Phase {
    Idle,
    Showing(usize),
    Submitting(usize),
}

/// A record presented to the user.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Round<'a> {
    pub record: &'a Record,
    pub recycled: bool,
}

/// The labeling loop of one user: select, show, decide, submit, and again.
pub struct LabelingSession {
    records: Vec<Record>,
    state: SessionState,
    phase: Phase,
    user: Option<UserId>,
}

impl LabelingSession {
    pub fn new(records: Vec<Record>, user: Option<UserId>) -> LabelingSession {
        LabelingSession {
            records,
            state: SessionState::new(),
            phase: Phase::Idle,
            user,
        }
    }

    /// Starts the session from the labels the user gave in earlier sessions.
    pub fn resume<S: LabelStore + ?Sized>(
        records: Vec<Record>,
        user: Option<UserId>,
        store: &S,
    ) -> Result<LabelingSession, LabelingError> {
        let mut session = LabelingSession::new(records, user);
        if let Some(u) = session.user.clone() {
            let previous = store.labels_for_user(&u)?;
            session.state.seed_from_labels(&previous, &session.records);
        }
        Ok(session)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// Shows a record. While a record is shown, the same record is returned.
    pub fn start_round<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Round<'_>, LabelingError> {
        if let Phase::Showing(index) = self.phase {
            return Ok(Round {
                record: &self.records[index],
                recycled: false,
            });
        }
        let sel = select_next(&self.records, &mut self.state, rng)?;
        self.state.current_index = Some(sel.index);
        self.phase = Phase::Showing(sel.index);
        Ok(Round {
            record: &self.records[sel.index],
            recycled: sel.recycled,
        })
    }

    /// Submits the decision on the shown record and marks it as labeled.
    ///
    /// Returns `Ok(None)` when no record is shown, or when the label was not
    /// stored because the session has no user.
    pub fn decide<S: LabelStore + ?Sized>(
        &mut self,
        label: LabelValue,
        store: &mut S,
        timestamp: i64,
    ) -> Result<Option<LabelId>, LabelingError> {
        let index = match self.phase {
            Phase::Showing(index) => index,
            _ => return Ok(None),
        };
        self.phase = Phase::Submitting(index);
        let record = &self.records[index];
        let res = submit(store, record, label, self.user.as_ref(), timestamp);
        if res.is_err() {
            // The record stays on screen, the decision can be made again.
            self.phase = Phase::Showing(index);
            return res;
        }
        self.state.mark_labeled(record.key());
        self.phase = Phase::Idle;
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                day: "01/16/2025 07:00:00".to_string(),
                station: format!("ST{:02}", i),
                satellite: "G07".to_string(),
                data: vec![i as f64, 1.0],
                lat: None,
                lon: None,
            })
            .collect()
    }

    #[test]
    fn empty_record_set_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = SessionState::new();
        assert_eq!(
            select_next(&[], &mut state, &mut rng),
            Err(LabelingError::EmptyRecordSet)
        );
    }

    #[test]
    fn never_picks_labeled_records() {
        init();
        let rs = records(5);
        let mut rng = StdRng::seed_from_u64(42);
        let mut state = SessionState::new();
        state.mark_labeled(rs[1].key());
        state.mark_labeled(rs[3].key());
        for _ in 0..200 {
            let sel = select_next(&rs, &mut state, &mut rng).unwrap();
            assert!(!sel.recycled);
            assert!(sel.index != 1 && sel.index != 3);
        }
        assert_eq!(state.labeled_keys().len(), 2);
    }

    #[test]
    fn recycles_once_everything_is_labeled() {
        let rs = records(3);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = SessionState::new();
        for _ in 0..3 {
            let sel = select_next(&rs, &mut state, &mut rng).unwrap();
            assert!(!sel.recycled);
            state.mark_labeled(rs[sel.index].key());
        }
        assert_eq!(state.labeled_keys().len(), 3);
        let sel = select_next(&rs, &mut state, &mut rng).unwrap();
        assert!(sel.recycled);
        assert!(sel.index < 3);
        assert!(state.labeled_keys().is_empty());
    }

    #[test]
    fn three_rounds_then_recycle() {
        init();
        let mut rng = StdRng::seed_from_u64(11);
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(records(3), Some(UserId("u1".to_string())));
        let decisions = [LabelValue::Good, LabelValue::Bad, LabelValue::Good];
        let mut seen = HashSet::new();
        for (i, d) in decisions.iter().enumerate() {
            let round = session.start_round(&mut rng).unwrap();
            assert!(!round.recycled);
            seen.insert(round.record.key());
            assert!(session.decide(*d, &mut store, i as i64).unwrap().is_some());
            assert_eq!(session.phase(), Phase::Idle);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(session.state().labeled_keys().len(), 3);
        assert_eq!(store.len(), 3);

        let round = session.start_round(&mut rng).unwrap();
        assert!(round.recycled);
        assert!(session.state().labeled_keys().is_empty());
    }

    #[test]
    fn showing_keeps_the_same_record() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut session = LabelingSession::new(records(10), None);
        let first = session.start_round(&mut rng).unwrap().record.key();
        let again = session.start_round(&mut rng).unwrap().record.key();
        assert_eq!(first, again);
        assert_eq!(
            session.state().current_index(),
            Some(session.records().iter().position(|r| r.key() == first).unwrap())
        );
    }

    #[test]
    fn decide_without_record_does_nothing() {
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(records(2), Some(UserId("u1".to_string())));
        assert_eq!(session.decide(LabelValue::Good, &mut store, 0), Ok(None));
        assert!(store.is_empty());
    }

    #[test]
    fn anonymous_session_still_advances() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut store = MemoryStore::new();
        let mut session = LabelingSession::new(records(2), None);
        session.start_round(&mut rng).unwrap();
        assert_eq!(session.decide(LabelValue::Bad, &mut store, 0), Ok(None));
        assert!(store.is_empty());
        assert_eq!(session.state().labeled_keys().len(), 1);
    }

    #[test]
    fn resume_skips_previously_labeled() {
        let rs = records(3);
        let mut store = MemoryStore::new();
        let user = UserId("u1".to_string());
        submit(&mut store, &rs[0], LabelValue::Good, Some(&user), 1).unwrap();
        submit(&mut store, &rs[2], LabelValue::Bad, Some(&user), 2).unwrap();
        // Another user and an unknown record do not count.
        submit(&mut store, &rs[1], LabelValue::Bad, Some(&UserId("u2".to_string())), 3).unwrap();
        store
            .push_label(Label {
                user_id: user.clone(),
                record_key: RecordKey::new("other", "X", "Y"),
                label: LabelValue::Good,
                timestamp: 4,
            })
            .unwrap();

        let mut session = LabelingSession::resume(rs, Some(user), &store).unwrap();
        assert_eq!(session.state().labeled_keys().len(), 2);
        let mut rng = StdRng::seed_from_u64(0);
        let round = session.start_round(&mut rng).unwrap();
        assert_eq!(round.record.station, "ST01");
        assert!(!round.recycled);
    }
}
