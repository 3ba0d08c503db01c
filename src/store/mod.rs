//! Media library contract consumed by the gallery.
//!
//! This module provides:
//! - `MediaStore` - the fetch / subscribe / persist surface the controller needs
//! - `ChangeNotification` - what a store reports after its contents change
//! - `ChangeBroadcaster` - subscriber bookkeeping shared by store implementations
//! - `SqliteMediaStore` - an on-disk library backed by SQLite

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use flume::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::StoreError;
use crate::models::{AccessStatus, AssetId, KindFilter, MediaAssetRef, MediaKind};
use crate::sync::diff::{diff_collections, DiffResult};

pub mod sqlite;

pub use sqlite::SqliteMediaStore;

/// A library query whose result the gallery displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchQuery {
    /// Most recent assets first, at most `limit` of them.
    Recent { kinds: KindFilter, limit: usize },
    /// Exactly these assets, in this order. Unknown ids are skipped.
    Identifiers(Vec<AssetId>),
}

/// Media produced by the camera that is not in the library yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    pub kind: MediaKind,
    pub created_at: i64,
}

/// Store-reported index changes for one query.
///
/// Removed indexes address the previous result, everything else follows the
/// application order documented on [`DiffResult`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeDetails {
    pub removed: BTreeSet<usize>,
    pub inserted: BTreeSet<usize>,
    pub changed: BTreeSet<usize>,
    pub moves: Vec<(usize, usize)>,
    /// `false` when the store could not describe the change incrementally.
    pub has_incremental_changes: bool,
}

impl From<DiffResult> for ChangeDetails {
    fn from(diff: DiffResult) -> Self {
        Self {
            removed: diff.removed,
            inserted: diff.inserted,
            changed: diff.changed,
            moves: diff.moves,
            has_incremental_changes: diff.is_incremental,
        }
    }
}

/// A change to the result of a subscribed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub query: FetchQuery,
    pub details: ChangeDetails,
    pub inserted_objects: Vec<MediaAssetRef>,
    pub removed_objects: Vec<MediaAssetRef>,
    pub fetch_result_after_changes: Vec<MediaAssetRef>,
}

impl ChangeNotification {
    /// Describes the transition from `before` to `after`, or `None` when the
    /// query result did not change.
    pub fn between(
        query: FetchQuery,
        before: &[MediaAssetRef],
        after: Vec<MediaAssetRef>,
    ) -> Option<Self> {
        let diff = diff_collections(before, &after);
        if diff.is_empty() {
            return None;
        }

        let removed_objects = diff.removed.iter().map(|&i| before[i].clone()).collect();
        let inserted_objects = diff.inserted.iter().map(|&i| after[i].clone()).collect();

        Some(Self {
            query,
            details: diff.into(),
            inserted_objects,
            removed_objects,
            fetch_result_after_changes: after,
        })
    }
}

/// Receiving end of a query subscription.
///
/// Dropping it unsubscribes; the store prunes it on its next change.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    query: FetchQuery,
    receiver: Receiver<ChangeNotification>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn query(&self) -> &FetchQuery {
        &self.query
    }

    /// Waits for the next notification. `None` once the store is gone.
    pub async fn next(&self) -> Option<ChangeNotification> {
        self.receiver.recv_async().await.ok()
    }

    /// Returns all notifications delivered so far without waiting.
    pub fn drain(&self) -> Vec<ChangeNotification> {
        self.receiver.try_iter().collect()
    }
}

struct Subscriber {
    id: u64,
    query: FetchQuery,
    snapshot: Vec<MediaAssetRef>,
    sender: Sender<ChangeNotification>,
}

/// Tracks subscribed queries and turns store mutations into notifications.
#[derive(Default)]
pub struct ChangeBroadcaster {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription whose notifications are relative to `baseline`.
    ///
    /// The query is re-run through `fetch` under the subscriber lock. If the
    /// store has moved on since `baseline` was taken, the catch-up
    /// notification is queued on the new subscription right away.
    pub fn register<F>(
        &self,
        query: FetchQuery,
        baseline: Vec<MediaAssetRef>,
        fetch: F,
    ) -> Subscription
    where
        F: Fn(&FetchQuery) -> Result<Vec<MediaAssetRef>, StoreError>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = flume::unbounded();

        let mut subscribers = self.subscribers.lock();
        let snapshot = match fetch(&query) {
            Ok(current) => {
                match ChangeNotification::between(query.clone(), &baseline, current.clone()) {
                    Some(catch_up) => {
                        debug!(id, "Subscribed query changed since baseline");
                        let _ = sender.send(catch_up);
                        current
                    }
                    None => baseline,
                }
            }
            Err(e) => {
                warn!(id, error = %e, "Failed to check subscription baseline");
                baseline
            }
        };

        subscribers.push(Subscriber {
            id,
            query: query.clone(),
            snapshot,
            sender,
        });
        debug!(id, ?query, "Registered change subscription");

        Subscription {
            id,
            query,
            receiver,
        }
    }

    /// Re-runs every subscribed query through `fetch` and notifies the
    /// subscribers whose result changed.
    pub fn publish<F>(&self, fetch: F)
    where
        F: Fn(&FetchQuery) -> Result<Vec<MediaAssetRef>, StoreError>,
    {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| !sub.sender.is_disconnected());

        for sub in subscribers.iter_mut() {
            let after = match fetch(&sub.query) {
                Ok(after) => after,
                Err(e) => {
                    warn!(id = sub.id, error = %e, "Failed to refresh subscribed query");
                    continue;
                }
            };

            let Some(notification) =
                ChangeNotification::between(sub.query.clone(), &sub.snapshot, after.clone())
            else {
                trace!(id = sub.id, "Subscribed query unchanged");
                continue;
            };

            sub.snapshot = after;
            if sub.sender.send(notification).is_err() {
                trace!(id = sub.id, "Subscriber went away");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|sub| !sub.sender.is_disconnected())
            .count()
    }
}

/// The media library as seen by the gallery.
pub trait MediaStore: Send + Sync {
    fn authorization_status(&self) -> AccessStatus;

    /// Most recent assets matching `kinds`, newest first.
    fn fetch_recent(
        &self,
        kinds: KindFilter,
        limit: usize,
    ) -> Result<Vec<MediaAssetRef>, StoreError>;

    /// The assets with the given ids, in request order.
    fn fetch_by_identifiers(&self, ids: &[AssetId]) -> Result<Vec<MediaAssetRef>, StoreError>;

    /// Subscribes to changes of `query`, relative to the `baseline` result the
    /// caller currently displays.
    fn subscribe(
        &self,
        query: FetchQuery,
        baseline: Vec<MediaAssetRef>,
    ) -> Result<Subscription, StoreError>;

    /// Saves freshly captured media and returns its library reference.
    fn persist_capture(&self, capture: &CapturedMedia) -> Result<MediaAssetRef, StoreError>;

    fn fetch(&self, query: &FetchQuery) -> Result<Vec<MediaAssetRef>, StoreError> {
        match query {
            FetchQuery::Recent { kinds, limit } => self.fetch_recent(*kinds, *limit),
            FetchQuery::Identifiers(ids) => self.fetch_by_identifiers(ids),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str, created_at: i64) -> MediaAssetRef {
        MediaAssetRef::new(id, MediaKind::Photo, created_at)
    }

    #[test]
    fn test_notification_between_unchanged_is_none() {
        let result = vec![photo("a", 2), photo("b", 1)];
        let query = FetchQuery::Identifiers(vec!["a".into(), "b".into()]);
        assert!(ChangeNotification::between(query, &result, result.clone()).is_none());
    }

    #[test]
    fn test_notification_carries_objects() {
        let before = vec![photo("a", 2), photo("b", 1)];
        let after = vec![photo("c", 3), photo("a", 2)];
        let query = FetchQuery::Recent {
            kinds: KindFilter::Any,
            limit: 2,
        };

        let n = ChangeNotification::between(query, &before, after.clone()).unwrap();
        assert!(n.details.has_incremental_changes);
        assert_eq!(n.details.removed.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(n.details.inserted.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(n.removed_objects, vec![photo("b", 1)]);
        assert_eq!(n.inserted_objects, vec![photo("c", 3)]);
        assert_eq!(n.fetch_result_after_changes, after);
    }

    #[test]
    fn test_broadcaster_publishes_only_changes() {
        let broadcaster = ChangeBroadcaster::new();
        let query = FetchQuery::Recent {
            kinds: KindFilter::Any,
            limit: 10,
        };
        let sub = broadcaster.register(query, vec![photo("a", 1)], |_| Ok(vec![photo("a", 1)]));

        broadcaster.publish(|_| Ok(vec![photo("a", 1)]));
        assert!(sub.drain().is_empty());

        broadcaster.publish(|_| Ok(vec![photo("b", 2), photo("a", 1)]));
        let received = sub.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].inserted_objects, vec![photo("b", 2)]);

        // Snapshot advanced, so the same result is not reported twice.
        broadcaster.publish(|_| Ok(vec![photo("b", 2), photo("a", 1)]));
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn test_dropped_subscription_is_pruned() {
        let broadcaster = ChangeBroadcaster::new();
        let sub =
            broadcaster.register(FetchQuery::Identifiers(Vec::new()), Vec::new(), |_| Ok(Vec::new()));
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);
        broadcaster.publish(|_| Ok(Vec::new()));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_register_catches_up_with_stale_baseline() {
        let broadcaster = ChangeBroadcaster::new();
        let query = FetchQuery::Recent {
            kinds: KindFilter::Any,
            limit: 10,
        };
        let current = vec![photo("late", 3), photo("a", 1)];
        let sub = broadcaster.register(query, vec![photo("a", 1)], |_| Ok(current.clone()));

        let received = sub.drain();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].inserted_objects, vec![photo("late", 3)]);
        assert_eq!(received[0].fetch_result_after_changes, current);

        // The catch-up result became the snapshot.
        broadcaster.publish(|_| Ok(current.clone()));
        assert!(sub.drain().is_empty());
    }
}
