use log::{debug, info};

use crate::config::*;
use crate::store::LabelStore;

/// Appends the decision of a user on a record to the label store.
///
/// Without a user identity nothing is written and `Ok(None)` is returned.
/// Previous labels of the same user for the same record are kept.
pub fn submit<S: LabelStore + ?Sized>(
    store: &mut S,
    record: &Record,
    label: LabelValue,
    user: Option<&UserId>,
    timestamp: i64,
) -> Result<Option<LabelId>, LabelingError> {
    let user_id = match user {
        Some(u) => u.clone(),
        None => {
            debug!("submit: no user identity, skipping {}", record.key());
            return Ok(None);
        }
    };
    let id = store.push_label(Label {
        user_id,
        record_key: record.key(),
        label,
        timestamp,
    })?;
    info!("submit: {} -> {} ({})", record.key(), label.as_str(), id.0);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::RecordKey;
    use crate::store::MemoryStore;

    fn record() -> Record {
        Record {
            day: "d1".to_string(),
            station: "S1".to_string(),
            satellite: "G01".to_string(),
            data: vec![0.5],
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn missing_user_is_a_silent_no_op() {
        let mut store = MemoryStore::new();
        let res = submit(&mut store, &record(), LabelValue::Good, None, 10);
        assert_eq!(res, Ok(None));
        assert!(store.is_empty());
    }

    #[test]
    fn repeated_submissions_are_all_kept() {
        let mut store = MemoryStore::new();
        let user = UserId("anon-1".to_string());
        submit(&mut store, &record(), LabelValue::Good, Some(&user), 10).unwrap();
        submit(&mut store, &record(), LabelValue::Bad, Some(&user), 11).unwrap();
        let ls = store
            .labels_for_record(&RecordKey::new("d1", "S1", "G01"))
            .unwrap();
        assert_eq!(ls.len(), 2);
        assert_eq!(ls[0].label, LabelValue::Good);
        assert_eq!(ls[1].label, LabelValue::Bad);
        assert_eq!(ls[1].timestamp, 11);
    }
}
