// A store kept in a JSON file that mirrors the realtime database tree.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use labeling_core::store::push_id;
use labeling_core::*;
use serde::{Deserialize, Serialize};

use crate::labeler::*;

/// Marks a winner bucket in the vote tree. It carries no count.
pub const INIT_MARKER: &str = "init";

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
struct StoreTree {
    #[serde(default)]
    labels: BTreeMap<String, LabelEntry>,
    #[serde(default)]
    config: ConfigEntry,
    #[serde(default)]
    votes: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
struct LabelEntry {
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(default)]
    day: String,
    #[serde(default)]
    station: String,
    #[serde(default)]
    satellite: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    timestamp: i64,
    /// Older exports only carry the `day|station|satellite` key.
    #[serde(rename = "entryKey", default, skip_serializing_if = "Option::is_none")]
    entry_key: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    threshold: Option<f64>,
}

impl LabelEntry {
    fn from_label(label: &Label) -> LabelEntry {
        LabelEntry {
            user_id: label.user_id.0.clone(),
            day: label.record_key.day.clone(),
            station: label.record_key.station.clone(),
            satellite: label.record_key.satellite.clone(),
            label: label.label.as_str().to_string(),
            timestamp: label.timestamp,
            entry_key: None,
        }
    }

    fn to_label(&self, id: &str) -> Option<Label> {
        let label = match LabelValue::parse(&self.label) {
            Some(v) => v,
            None => {
                warn!("Label {}: unknown label value {:?}, skipping", id, self.label);
                return None;
            }
        };
        let record_key = match &self.entry_key {
            Some(k) if self.day.is_empty() => match RecordKey::from_legacy(k) {
                Some(key) => key,
                None => {
                    warn!("Label {}: cannot read entry key {:?}, skipping", id, k);
                    return None;
                }
            },
            _ => RecordKey::new(self.day.trim(), self.station.trim(), self.satellite.trim()),
        };
        Some(Label {
            user_id: UserId(self.user_id.clone()),
            record_key,
            label,
            timestamp: self.timestamp,
        })
    }
}

fn store_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> LabelingError + '_ {
    move |e| LabelingError::Store(format!("{}: {}", path.display(), e))
}

/// The labels, the threshold and the votes of a campaign, in one JSON file.
///
/// Reads see the content of the file as of the last open or change. Every
/// change holds an exclusive lock on `<store>.lock`, applies itself to the
/// current content of the file and writes it back before returning, so several
/// sessions can share the same file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tree: StoreTree,
    pushed: u64,
}

impl JsonFileStore {
    /// Opens the store. A missing file is an empty store.
    pub fn open(path: &str) -> LabelerResult<JsonFileStore> {
        let p = PathBuf::from(path);
        let tree: StoreTree = if p.exists() {
            let contents = fs::read_to_string(&p).context(OpeningFileSnafu { path })?;
            serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?
        } else {
            info!("Store {:?} does not exist yet, starting empty", path);
            StoreTree::default()
        };
        debug!(
            "JsonFileStore::open: {} labels, {} vote buckets",
            tree.labels.len(),
            tree.votes.len()
        );
        Ok(JsonFileStore {
            path: p,
            pushed: tree.labels.len() as u64,
            tree,
        })
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn read_tree(&self) -> Result<StoreTree, LabelingError> {
        if !self.path.exists() {
            return Ok(StoreTree::default());
        }
        let contents = fs::read_to_string(&self.path).map_err(store_error(&self.path))?;
        serde_json::from_str(&contents).map_err(store_error(&self.path))
    }

    fn write_tree(&self, tree: &StoreTree) -> Result<(), LabelingError> {
        let contents = serde_json::to_string_pretty(tree).map_err(store_error(&self.path))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(store_error(&self.path))?;
        fs::rename(&tmp, &self.path).map_err(store_error(&self.path))?;
        Ok(())
    }

    /// Applies one change to the latest content of the file, under the lock.
    ///
    /// The in-memory copy is only replaced once the file is written.
    fn update<T, F>(&mut self, change: F) -> Result<T, LabelingError>
    where
        F: FnOnce(&mut StoreTree) -> T,
    {
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(store_error(&self.path))?;
        FileExt::lock_exclusive(&lock).map_err(store_error(&self.path))?;
        let mut tree = self.read_tree()?;
        let res = change(&mut tree);
        self.write_tree(&tree)?;
        self.tree = tree;
        // The lock is released when the file is closed.
        drop(lock);
        Ok(res)
    }

    fn labels_where<F: Fn(&Label) -> bool>(&self, f: F) -> Vec<Label> {
        let mut res: Vec<Label> = self
            .tree
            .labels
            .iter()
            .filter_map(|(id, e)| e.to_label(id))
            .filter(|l| f(l))
            .collect();
        res.sort_by_key(|l| l.timestamp);
        res
    }
}

impl LabelStore for JsonFileStore {
    fn push_label(&mut self, label: Label) -> Result<LabelId, LabelingError> {
        let mut pushed = self.pushed;
        let id = self.update(|tree| {
            let mut id = push_id(pushed, &label);
            while tree.labels.contains_key(&id.0) {
                pushed += 1;
                id = push_id(pushed, &label);
            }
            pushed += 1;
            tree.labels.insert(id.0.clone(), LabelEntry::from_label(&label));
            id
        })?;
        self.pushed = pushed;
        Ok(id)
    }

    fn labels_for_user(&self, user: &UserId) -> Result<Vec<Label>, LabelingError> {
        Ok(self.labels_where(|l| l.user_id == *user))
    }

    fn labels_for_record(&self, key: &RecordKey) -> Result<Vec<Label>, LabelingError> {
        Ok(self.labels_where(|l| l.record_key == *key))
    }

    fn all_labels(&self) -> Result<Vec<Label>, LabelingError> {
        Ok(self.labels_where(|_| true))
    }
}

impl ThresholdStore for JsonFileStore {
    fn read_threshold(&self) -> Result<Threshold, LabelingError> {
        match self.tree.config.threshold {
            Some(t) => Threshold::new(t).map_err(store_error(&self.path)),
            None => Ok(Threshold::DEFAULT),
        }
    }

    fn write_threshold(&mut self, threshold: Threshold) -> Result<(), LabelingError> {
        self.update(|tree| tree.config.threshold = Some(threshold.value()))
    }
}

impl VoteStore for JsonFileStore {
    fn increment(&mut self, winner: ItemId, loser: ItemId) -> Result<u64, LabelingError> {
        self.update(|tree| {
            let bucket = tree.votes.entry(winner.0.to_string()).or_insert_with(|| {
                let mut b = BTreeMap::new();
                b.insert(INIT_MARKER.to_string(), 0);
                b
            });
            let cell = bucket.entry(loser.0.to_string()).or_insert(0);
            *cell += 1;
            *cell
        })
    }

    fn score_matrix(&self) -> Result<ScoreMatrix, LabelingError> {
        let mut m = ScoreMatrix::new();
        for (w, bucket) in self.tree.votes.iter() {
            let winner = match w.parse::<u32>() {
                Ok(x) => ItemId(x),
                Err(_) => {
                    warn!("Votes: ignoring bucket {:?}", w);
                    continue;
                }
            };
            m.insert_bucket(winner);
            for (l, count) in bucket.iter() {
                if l == INIT_MARKER {
                    continue;
                }
                match l.parse::<u32>() {
                    Ok(x) => m.set(winner, ItemId(x), *count),
                    Err(_) => warn!("Votes: ignoring cell {:?} of bucket {:?}", l, w),
                }
            }
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> String {
        let p = std::env::temp_dir().join(format!("klabel-{}-{}.json", name, std::process::id()));
        let _ = fs::remove_file(&p);
        p.display().to_string()
    }

    fn remove_store(path: &str) {
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(Path::new(path).with_extension("json.lock"));
    }

    fn label(user: &str, station: &str, timestamp: i64) -> Label {
        Label {
            user_id: UserId(user.to_string()),
            record_key: RecordKey::new("d1", station, "G07"),
            label: LabelValue::Good,
            timestamp,
        }
    }

    #[test]
    fn fixture_store() {
        let path = format!("{}/tests/data/store.json", env!("CARGO_MANIFEST_DIR"));
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.read_threshold().unwrap().value(), 0.6);
        let anna = store.labels_for_user(&UserId("anna".to_string())).unwrap();
        assert_eq!(anna.len(), 3);
        // One entry has an unknown label value.
        assert_eq!(store.all_labels().unwrap().len(), 9);
        let legacy = store
            .labels_for_record(&RecordKey::new("01/16/2025 07:05:00", "NRC1", "G08"))
            .unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].user_id, UserId("carl".to_string()));

        // The unknown value is not counted: 2 good out of 3.
        let grouped = consensus_by_record(
            &store.all_labels().unwrap(),
            Threshold::new(0.6).unwrap(),
            Some("01/16/2025"),
        );
        let algo = grouped[&RecordKey::new("01/16/2025 07:03:00", "ALGO", "G07")];
        assert_eq!((algo.good_count, algo.total), (2, 3));
        assert_eq!(algo.verdict, Verdict::Good);

        let m = store.score_matrix().unwrap();
        assert!(m.has_bucket(ItemId(45)));
        assert_eq!(m.get(ItemId(31), ItemId(42)), 3);
        assert_eq!(m.get(ItemId(45), ItemId(1)), 0);
    }

    #[test]
    fn changes_are_written_back() {
        let path = temp_store("roundtrip");
        {
            let mut store = JsonFileStore::open(&path).unwrap();
            assert!(store.all_labels().unwrap().is_empty());
            store
                .push_label(Label {
                    user_id: UserId("anna".to_string()),
                    record_key: RecordKey::new("d1", "ALGO", "G07"),
                    label: LabelValue::Good,
                    timestamp: 42,
                })
                .unwrap();
            store.write_threshold(Threshold::new(0.75).unwrap()).unwrap();
            assert_eq!(record_win(&mut store, ItemId(12), ItemId(34)).unwrap(), 1);
            assert_eq!(record_win(&mut store, ItemId(12), ItemId(34)).unwrap(), 2);
        }
        let store = JsonFileStore::open(&path).unwrap();
        let labels = store.all_labels().unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].record_key, RecordKey::new("d1", "ALGO", "G07"));
        assert_eq!(labels[0].timestamp, 42);
        assert_eq!(store.read_threshold().unwrap().value(), 0.75);
        assert_eq!(store.score_matrix().unwrap().get(ItemId(12), ItemId(34)), 2);

        let raw: JSValue = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["votes"]["12"][INIT_MARKER], json!(0));
        assert_eq!(raw["votes"]["12"]["34"], json!(2));
        remove_store(&path);
    }

    #[test]
    fn sessions_sharing_a_file_keep_each_other_changes() {
        let path = temp_store("shared");
        let mut first = JsonFileStore::open(&path).unwrap();
        let mut second = JsonFileStore::open(&path).unwrap();
        first.push_label(label("anna", "ALGO", 1)).unwrap();
        second.push_label(label("bob", "ALGO", 2)).unwrap();
        assert_eq!(second.all_labels().unwrap().len(), 2);
        assert_eq!(record_win(&mut first, ItemId(1), ItemId(2)).unwrap(), 1);
        assert_eq!(record_win(&mut second, ItemId(1), ItemId(2)).unwrap(), 2);
        first.write_threshold(Threshold::new(0.8).unwrap()).unwrap();
        second.push_label(label("bob", "DRAO", 3)).unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.all_labels().unwrap().len(), 3);
        assert_eq!(store.score_matrix().unwrap().get(ItemId(1), ItemId(2)), 2);
        assert_eq!(store.read_threshold().unwrap().value(), 0.8);
        remove_store(&path);
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let dir = std::env::temp_dir().join(format!("klabel-missing-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("store.json").display().to_string();
        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(
            store.push_label(label("anna", "ALGO", 1)),
            Err(LabelingError::Store(_))
        ));
        assert!(record_win(&mut store, ItemId(3), ItemId(4)).is_err());
        assert!(store.all_labels().unwrap().is_empty());
        assert_eq!(store.score_matrix().unwrap(), ScoreMatrix::new());

        fs::create_dir_all(&dir).unwrap();
        store.push_label(label("anna", "ALGO", 2)).unwrap();
        assert_eq!(record_win(&mut store, ItemId(3), ItemId(4)).unwrap(), 1);
        let reopened = JsonFileStore::open(&path).unwrap();
        let labels = reopened.all_labels().unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].timestamp, 2);
        assert_eq!(reopened.score_matrix().unwrap().get(ItemId(3), ItemId(4)), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_threshold_in_file() {
        let path = temp_store("bad-threshold");
        fs::write(&path, r#"{"config": {"threshold": 3.0}}"#).unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert!(matches!(
            store.read_threshold(),
            Err(LabelingError::Store(_))
        ));
        remove_store(&path);
    }
}
