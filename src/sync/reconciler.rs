//! Turns two snapshots of the library query into a grid diff.

use tracing::{trace, warn};

use super::diff::{dedup_last_wins, diff_collections, shared_count, DiffResult, Keyed};
use crate::store::ChangeDetails;

/// Computes grid diffs for a run of store-backed items.
///
/// The reconciled items occupy the grid from `offset` on; every index in the
/// produced diff is already translated into grid positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    offset: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(offset: usize) -> Self {
        Self { offset }
    }

    /// Diffs `old` against `new`.
    ///
    /// With `details` from a store notification the store's index sets are
    /// trusted and forwarded, unless they do not fit the two collections, in
    /// which case a wholesale reload is requested. Without `details` items are
    /// matched by key; duplicate keys resolve to their last occurrence.
    pub fn reconcile<T: Keyed>(
        &self,
        old: &[T],
        new: &[T],
        details: Option<&ChangeDetails>,
    ) -> DiffResult {
        let diff = match details {
            Some(details) => Self::from_details(old.len(), new.len(), details),
            None => Self::by_key(old, new),
        };
        diff.shifted(self.offset)
    }

    fn from_details(old_len: usize, new_len: usize, details: &ChangeDetails) -> DiffResult {
        if !details.has_incremental_changes {
            trace!("Store reported a non-incremental change");
            return DiffResult::wholesale();
        }

        if !details_fit(old_len, new_len, details) {
            warn!(
                old_len,
                new_len,
                removed = details.removed.len(),
                inserted = details.inserted.len(),
                "Inconsistent change notification, falling back to full reload"
            );
            return DiffResult::wholesale();
        }

        DiffResult {
            removed: details.removed.clone(),
            inserted: details.inserted.clone(),
            changed: details.changed.clone(),
            moves: details.moves.clone(),
            is_incremental: true,
        }
    }

    fn by_key<T: Keyed>(old: &[T], new: &[T]) -> DiffResult {
        let old = dedup_last_wins(old.to_vec());
        let new = dedup_last_wins(new.to_vec());

        match (old.is_empty(), new.is_empty()) {
            (true, true) => DiffResult::empty(),
            (false, true) => DiffResult::remove_all(old.len()),
            // Reloaded as a whole, but still lists every row as inserted.
            (true, false) => DiffResult {
                is_incremental: false,
                ..DiffResult::insert_all(new.len())
            },
            (false, false) if shared_count(&old, &new) == 0 => {
                trace!(
                    old_len = old.len(),
                    new_len = new.len(),
                    "No shared items, requesting full reload"
                );
                DiffResult::wholesale()
            }
            (false, false) => diff_collections(&old, &new),
        }
    }
}

/// Whether store-reported indexes can describe a transition between
/// collections of these lengths.
fn details_fit(old_len: usize, new_len: usize, details: &ChangeDetails) -> bool {
    let removed_ok = details.removed.iter().all(|&i| i < old_len);
    let inserted_ok = details.inserted.iter().all(|&i| i < new_len);
    let changed_ok = details.changed.iter().all(|&i| i < new_len);
    let moves_ok = details
        .moves
        .iter()
        .all(|&(from, to)| from < new_len && to < new_len);
    let len_ok = old_len.checked_sub(details.removed.len()) == new_len.checked_sub(details.inserted.len());

    removed_ok && inserted_ok && changed_ok && moves_ok && len_ok
}
