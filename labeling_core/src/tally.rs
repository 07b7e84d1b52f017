use std::collections::BTreeMap;

use log::{debug, info};
use rand::Rng;

use crate::config::*;
use crate::store::VoteStore;

/// Sparse win counts between catalogue items.
///
/// The outer key is the winner. A winner bucket exists as soon as the item won
/// once, even if the cells inside it are later missing; missing cells count as
/// zero everywhere.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ScoreMatrix {
    buckets: BTreeMap<ItemId, BTreeMap<ItemId, u64>>,
}

impl ScoreMatrix {
    pub fn new() -> ScoreMatrix {
        ScoreMatrix::default()
    }

    /// Records one win and returns the new count of the cell.
    ///
    /// The first win of an item creates its bucket and sets the cell to 1
    /// directly. Afterwards the cell is incremented, starting from 0 if this
    /// particular matchup was never seen.
    pub fn record_win(&mut self, winner: ItemId, loser: ItemId) -> u64 {
        match self.buckets.get_mut(&winner) {
            None => {
                debug!("record_win: creating bucket for {:?}", winner);
                let mut bucket = BTreeMap::new();
                bucket.insert(loser, 1);
                self.buckets.insert(winner, bucket);
                1
            }
            Some(bucket) => {
                let cell = bucket.entry(loser).or_insert(0);
                *cell += 1;
                *cell
            }
        }
    }

    /// The number of wins of `winner` over `loser`.
    pub fn get(&self, winner: ItemId, loser: ItemId) -> u64 {
        self.buckets
            .get(&winner)
            .and_then(|b| b.get(&loser))
            .cloned()
            .unwrap_or(0)
    }

    pub fn has_bucket(&self, winner: ItemId) -> bool {
        self.buckets.contains_key(&winner)
    }

    /// Creates an empty bucket, as found in stores that only hold the marker.
    pub fn insert_bucket(&mut self, winner: ItemId) {
        self.buckets.entry(winner).or_default();
    }

    /// Overwrites a cell. Used when loading a matrix from a store.
    pub fn set(&mut self, winner: ItemId, loser: ItemId, count: u64) {
        self.buckets.entry(winner).or_default().insert(loser, count);
    }
}

/// Stores a vote of one user who preferred `winner` over `loser`.
pub fn record_win<S: VoteStore + ?Sized>(
    store: &mut S,
    winner: ItemId,
    loser: ItemId,
) -> Result<u64, LabelingError> {
    if winner == loser {
        return Err(LabelingError::SameItem(winner));
    }
    let count = store.increment(winner, loser)?;
    debug!("record_win: {:?} beats {:?}: {}", winner, loser, count);
    Ok(count)
}

/// The total number of wins of each item `1..=num_items` against every other
/// item of the catalogue.
pub fn scores(matrix: &ScoreMatrix, num_items: u32) -> Vec<(ItemId, u64)> {
    (1..=num_items)
        .map(|i| {
            let total: u64 = (1..=num_items)
                .map(|j| matrix.get(ItemId(i), ItemId(j)))
                .sum();
            (ItemId(i), total)
        })
        .collect()
}

/// The `top_k` items with the most wins.
///
/// Items with the same score are ordered by increasing id.
pub fn rank(matrix: &ScoreMatrix, num_items: u32, top_k: usize) -> Vec<ItemId> {
    let mut sorted = scores(matrix, num_items);
    // The sort is stable and the scores come in increasing id order.
    sorted.sort_by(|(_, a), (_, b)| b.cmp(a));
    sorted.truncate(top_k);
    info!("rank: top {} of {} items: {:?}", top_k, num_items, sorted);
    sorted.into_iter().map(|(id, _)| id).collect()
}

/// Draws two distinct items uniformly in `1..=num_items`.
pub fn choose_pair<R: Rng + ?Sized>(
    rng: &mut R,
    num_items: u32,
) -> Result<(ItemId, ItemId), LabelingError> {
    if num_items < 2 {
        return Err(LabelingError::NotEnoughItems(num_items));
    }
    let first = rng.gen_range(1..=num_items);
    // Draw among the remaining items and skip over the first one.
    let mut second = rng.gen_range(1..num_items);
    if second >= first {
        second += 1;
    }
    Ok((ItemId(first), ItemId(second)))
}

/// Checks that an item belongs to the catalogue.
pub fn check_item(id: ItemId, num_items: u32) -> Result<ItemId, LabelingError> {
    if id.0 >= 1 && id.0 <= num_items {
        Ok(id)
    } else {
        Err(LabelingError::UnknownItem(id))
    }
}
