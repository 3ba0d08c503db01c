//! Keeping the gallery grid in step with the media library.
//!
//! This module provides:
//! - `DiffResult` - index-level grid changes and how to apply them
//! - `Reconciler` - diffs two snapshots of a library query
//! - `AssetListController` - the authoritative grid state

pub mod controller;
pub mod diff;
pub mod reconciler;

pub use controller::{AssetListController, FetchTicket, PickerRequest, ScrollMetrics};
pub use diff::{DiffResult, Keyed};
pub use reconciler::Reconciler;
