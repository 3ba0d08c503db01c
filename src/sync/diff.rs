//! Structural diffs between two ordered collections.
//!
//! A [`DiffResult`] is applied in a fixed order:
//! 1. removals, addressed in the old collection, applied from the back
//! 2. insertions, addressed in the new collection, applied from the front
//! 3. updates, addressed in the collection produced by steps 1-2
//! 4. moves, applied one after another, each `(from, to)` removing at `from`
//!    and inserting at `to` in the collection left by the previous move

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::models::{AssetId, AssetItem, MediaAssetRef};

/// Something that can be matched across two snapshots of a collection.
pub trait Keyed: Clone + PartialEq {
    type Key: Clone + Eq + Hash;

    fn diff_key(&self) -> Self::Key;
}

impl Keyed for MediaAssetRef {
    type Key = AssetId;

    fn diff_key(&self) -> AssetId {
        self.id.clone()
    }
}

impl Keyed for AssetItem {
    /// `None` stands for the live camera tile.
    type Key = Option<AssetId>;

    fn diff_key(&self) -> Option<AssetId> {
        self.key().cloned()
    }
}

/// Index-level changes that turn one collection into another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffResult {
    pub removed: BTreeSet<usize>,
    pub inserted: BTreeSet<usize>,
    pub changed: BTreeSet<usize>,
    pub moves: Vec<(usize, usize)>,
    /// `false` means the presentation must be rebuilt from scratch.
    pub is_incremental: bool,
}

impl DiffResult {
    /// A diff with nothing to do.
    pub fn empty() -> Self {
        Self {
            is_incremental: true,
            ..Self::default()
        }
    }

    /// A full reload.
    pub fn wholesale() -> Self {
        Self::default()
    }

    /// Removal of every item of a collection of `len` items.
    pub fn remove_all(len: usize) -> Self {
        Self {
            removed: (0..len).collect(),
            is_incremental: true,
            ..Self::default()
        }
    }

    /// Insertion of `len` items into an empty collection.
    pub fn insert_all(len: usize) -> Self {
        Self {
            inserted: (0..len).collect(),
            is_incremental: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_incremental
            && self.removed.is_empty()
            && self.inserted.is_empty()
            && self.changed.is_empty()
            && self.moves.is_empty()
    }

    /// Shifts every index by `offset`, used when the diffed collection sits
    /// behind other items in the grid.
    pub fn shifted(mut self, offset: usize) -> Self {
        if offset == 0 {
            return self;
        }
        let shift = |set: BTreeSet<usize>| set.into_iter().map(|i| i + offset).collect();
        self.removed = shift(self.removed);
        self.inserted = shift(self.inserted);
        self.changed = shift(self.changed);
        self.moves = self
            .moves
            .into_iter()
            .map(|(from, to)| (from + offset, to + offset))
            .collect();
        self
    }

    /// Applies the diff to `old`, taking inserted and updated content from
    /// `new`. A wholesale diff yields `new` unchanged.
    ///
    /// Returns `None` when an index falls outside the collection it addresses.
    pub fn apply<T: Keyed>(&self, old: &[T], new: &[T]) -> Option<Vec<T>> {
        if !self.is_incremental {
            return Some(new.to_vec());
        }

        let mut items = old.to_vec();
        for &index in self.removed.iter().rev() {
            if index >= items.len() {
                return None;
            }
            items.remove(index);
        }

        for &index in &self.inserted {
            let item = new.get(index)?;
            if index > items.len() {
                return None;
            }
            items.insert(index, item.clone());
        }

        if !self.changed.is_empty() {
            let by_key: HashMap<T::Key, &T> = new.iter().map(|i| (i.diff_key(), i)).collect();
            for &index in &self.changed {
                let slot = items.get_mut(index)?;
                let updated = by_key.get(&slot.diff_key())?;
                *slot = (*updated).clone();
            }
        }

        for &(from, to) in &self.moves {
            if from >= items.len() || to >= items.len() {
                return None;
            }
            let item = items.remove(from);
            items.insert(to, item);
        }

        Some(items)
    }
}

/// Keeps only the last occurrence of every key, preserving order otherwise.
pub fn dedup_last_wins<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut last: HashMap<T::Key, usize> = HashMap::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        last.insert(item.diff_key(), index);
    }
    if last.len() == items.len() {
        return items;
    }
    items
        .into_iter()
        .enumerate()
        .filter(|(index, item)| last.get(&item.diff_key()) == Some(index))
        .map(|(_, item)| item)
        .collect()
}

/// Number of keys present in both collections.
pub fn shared_count<T: Keyed>(old: &[T], new: &[T]) -> usize {
    let old_keys: HashSet<T::Key> = old.iter().map(Keyed::diff_key).collect();
    new.iter()
        .filter(|item| old_keys.contains(&item.diff_key()))
        .count()
}

/// Computes an incremental diff between two collections with unique keys.
pub fn diff_collections<T: Keyed>(old: &[T], new: &[T]) -> DiffResult {
    let old_index: HashMap<T::Key, usize> = old
        .iter()
        .enumerate()
        .map(|(i, item)| (item.diff_key(), i))
        .collect();
    let new_keys: Vec<T::Key> = new.iter().map(Keyed::diff_key).collect();
    let new_index: HashMap<&T::Key, usize> =
        new_keys.iter().enumerate().map(|(i, k)| (k, i)).collect();

    let mut diff = DiffResult::empty();

    let mut working: Vec<T::Key> = Vec::with_capacity(new.len());
    for (index, item) in old.iter().enumerate() {
        let key = item.diff_key();
        if new_index.contains_key(&key) {
            working.push(key);
        } else {
            diff.removed.insert(index);
        }
    }

    for (index, key) in new_keys.iter().enumerate() {
        if !old_index.contains_key(key) {
            diff.inserted.insert(index);
            working.insert(index, key.clone());
        }
    }

    for (position, key) in working.iter().enumerate() {
        if let (Some(&before), Some(&after)) = (old_index.get(key), new_index.get(key)) {
            if old[before] != new[after] {
                diff.changed.insert(position);
            }
        }
    }

    diff.moves = plan_moves(working, &new_keys);
    diff
}

/// Plans sequential moves that reorder `working` into `target`.
///
/// Items on a longest increasing run of target positions stay put; every other
/// item is moved directly behind its nearest already-placed predecessor.
fn plan_moves<K: Clone + Eq + Hash>(mut working: Vec<K>, target: &[K]) -> Vec<(usize, usize)> {
    let target_pos: HashMap<&K, usize> = target.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let positions: Vec<usize> = working
        .iter()
        .filter_map(|key| target_pos.get(key).copied())
        .collect();
    if positions.len() != working.len() || positions.windows(2).all(|w| w[0] < w[1]) {
        return Vec::new();
    }

    let mut placed: HashSet<K> = longest_increasing_run(&positions)
        .into_iter()
        .map(|i| working[i].clone())
        .collect();

    let mut moves = Vec::new();
    for (t, key) in target.iter().enumerate() {
        if placed.contains(key) {
            continue;
        }
        let Some(from) = working.iter().position(|k| k == key) else {
            continue;
        };
        let item = working.remove(from);
        let to = target[..t]
            .iter()
            .rev()
            .find(|k| placed.contains(*k))
            .and_then(|anchor| working.iter().position(|k| k == anchor))
            .map_or(0, |anchor| anchor + 1);
        working.insert(to, item);
        placed.insert(key.clone());
        moves.push((from, to));
    }
    moves
}

/// Indices of one longest strictly increasing subsequence of `seq`.
fn longest_increasing_run(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        run.push(i);
        cursor = prev[i];
    }
    run.reverse();
    run
}
