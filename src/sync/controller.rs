//! Authoritative state behind the gallery grid.
//!
//! The controller owns the ordered item list, the selected segment and the
//! pagination window. Store work is split in two halves: a `request_*` call
//! hands out a [`FetchTicket`], the caller runs the query wherever it likes,
//! and [`AssetListController::complete_fetch`] folds the result back in.
//! Every state change that invalidates outstanding queries bumps the
//! generation carried by the tickets, so late results are dropped on arrival.

use tracing::{debug, info, trace, warn};

use super::diff::{dedup_last_wins, DiffResult};
use super::reconciler::Reconciler;
use crate::config::{GalleryConfig, LiveCameraPolicy};
use crate::error::{GalleryError, StoreError};
use crate::models::{AccessStatus, AssetId, AssetItem, MediaAssetRef, MediaFilter, MediaKind};
use crate::store::{ChangeNotification, FetchQuery};

/// A library query issued by the controller and awaiting its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub query: FetchQuery,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Scroll position of the grid along its scroll axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub content_size: f64,
    pub viewport: f64,
}

impl ScrollMetrics {
    /// Whether the viewport has reached the end of the content.
    pub fn reached_end(&self) -> bool {
        self.offset >= self.content_size - self.viewport
    }
}

/// Picker the presentation should show for "open gallery".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerRequest {
    /// Let the user extend a limited library selection.
    LimitedLibrary,
    Camera,
    Library {
        kind: Option<MediaKind>,
        selection_limit: usize,
    },
}

pub struct AssetListController {
    config: GalleryConfig,
    items: Vec<AssetItem>,
    filter: MediaFilter,
    access: AccessStatus,
    generation: u64,
    /// Query whose result is currently displayed.
    query: Option<FetchQuery>,
}

impl AssetListController {
    pub fn new(config: GalleryConfig) -> Self {
        let filter = config.initial_filter;
        let items = if filter == MediaFilter::LifeCamera {
            vec![AssetItem::LiveCamera]
        } else {
            Vec::new()
        };

        Self {
            config,
            items,
            filter,
            access: AccessStatus::NotDetermined,
            generation: 0,
            query: None,
        }
    }

    pub fn items(&self) -> &[AssetItem] {
        &self.items
    }

    pub fn filter(&self) -> MediaFilter {
        self.filter
    }

    pub fn access(&self) -> AccessStatus {
        self.access
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Query whose result the grid shows, if any.
    pub fn current_query(&self) -> Option<&FetchQuery> {
        self.query.as_ref()
    }

    /// Number of media assets in the grid, not counting the camera tile.
    pub fn loaded_count(&self) -> usize {
        self.items.len() - self.asset_offset()
    }

    pub fn has_placeholder(&self) -> bool {
        self.items.iter().any(AssetItem::is_placeholder)
    }

    /// The media assets in display order.
    pub fn assets(&self) -> Vec<MediaAssetRef> {
        self.items
            .iter()
            .filter_map(AssetItem::as_media)
            .cloned()
            .collect()
    }

    /// Grid index of the first media asset.
    fn asset_offset(&self) -> usize {
        usize::from(self.items.first().is_some_and(AssetItem::is_placeholder))
    }

    fn bump_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn replace_assets(&mut self, assets: Vec<MediaAssetRef>) {
        let offset = self.asset_offset();
        self.items.truncate(offset);
        self.items.extend(assets.into_iter().map(AssetItem::Media));
    }

    // =========================================================================
    // Segment / authorization
    // =========================================================================

    /// Selects a segment.
    ///
    /// Entering the live camera segment yields a wholesale diff; leaving it
    /// removes the camera tile. Other switches only change what later fetches
    /// ask for and return `None`.
    pub fn set_filter(&mut self, filter: MediaFilter) -> Result<Option<DiffResult>, GalleryError> {
        let placeholder_ok = filter != MediaFilter::LifeCamera || self.has_placeholder();
        if filter == self.filter && placeholder_ok {
            trace!(?filter, "Segment unchanged");
            return Ok(None);
        }

        if filter.requires_library() && !self.access.allows_queries() {
            debug!(?filter, access = ?self.access, "Segment needs library access");
            return Err(GalleryError::PermissionDenied);
        }

        let previous = std::mem::replace(&mut self.filter, filter);
        let generation = self.bump_generation();
        info!(?previous, ?filter, generation, "Segment changed");

        if filter == MediaFilter::LifeCamera {
            if self.has_placeholder() {
                return Ok(None);
            }
            match self.config.live_camera_policy {
                LiveCameraPolicy::ClearAssets => {
                    self.items = vec![AssetItem::LiveCamera];
                    self.query = None;
                }
                LiveCameraPolicy::KeepAssets => {
                    self.items.insert(0, AssetItem::LiveCamera);
                }
            }
            return Ok(Some(DiffResult::wholesale()));
        }

        if previous == MediaFilter::LifeCamera {
            return Ok(Some(match self.config.live_camera_policy {
                LiveCameraPolicy::ClearAssets => {
                    let len = self.items.len();
                    self.items.clear();
                    self.query = None;
                    DiffResult::remove_all(len)
                }
                LiveCameraPolicy::KeepAssets => match self.items.iter().position(AssetItem::is_placeholder) {
                    Some(index) => {
                        self.items.remove(index);
                        DiffResult {
                            removed: [index].into_iter().collect(),
                            ..DiffResult::empty()
                        }
                    }
                    None => DiffResult::empty(),
                },
            }));
        }

        Ok(None)
    }

    /// Records the library authorization. Losing access drops every media
    /// asset and any outstanding query.
    pub fn set_access(&mut self, status: AccessStatus) -> Option<DiffResult> {
        let previous = std::mem::replace(&mut self.access, status);
        info!(?previous, ?status, "Library access updated");

        if status.allows_queries() || !previous.allows_queries() && self.loaded_count() == 0 {
            return None;
        }
        Some(self.drop_assets())
    }

    fn drop_assets(&mut self) -> DiffResult {
        self.bump_generation();
        self.query = None;

        let offset = self.asset_offset();
        let count = self.loaded_count();
        self.items.truncate(offset);
        DiffResult::remove_all(count).shifted(offset)
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Asks for the next page: `loaded_count + page_size` most recent assets.
    ///
    /// Returns `None` for the camera segments, which never query the library.
    pub fn request_load_more(&mut self) -> Result<Option<FetchTicket>, GalleryError> {
        self.request_refresh(self.config.page_size)
    }

    /// Asks for the current window grown by `extra` assets.
    pub fn request_refresh(&mut self, extra: usize) -> Result<Option<FetchTicket>, GalleryError> {
        let Some(kinds) = self.filter.query_kinds() else {
            trace!(filter = ?self.filter, "Segment does not query the library");
            return Ok(None);
        };
        if !self.access.allows_queries() {
            return Err(GalleryError::PermissionDenied);
        }

        let limit = self.loaded_count() + extra;
        let generation = self.bump_generation();
        debug!(limit, generation, "Requesting assets");

        Ok(Some(FetchTicket {
            generation,
            query: FetchQuery::Recent { kinds, limit },
        }))
    }

    /// Asks for exactly the assets chosen in the picker.
    pub fn request_selection(
        &mut self,
        ids: Vec<AssetId>,
    ) -> Result<Option<FetchTicket>, GalleryError> {
        if ids.is_empty() {
            return Ok(None);
        }
        if !self.access.allows_queries() {
            return Err(GalleryError::PermissionDenied);
        }

        let generation = self.bump_generation();
        debug!(count = ids.len(), generation, "Requesting picked assets");

        Ok(Some(FetchTicket {
            generation,
            query: FetchQuery::Identifiers(ids),
        }))
    }

    /// Folds a query result into the grid.
    ///
    /// Results for superseded tickets are dropped and yield `Ok(None)`.
    /// Failures leave the grid untouched, except a permission failure which
    /// revokes access and drops every media asset.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<MediaAssetRef>, StoreError>,
    ) -> Result<Option<DiffResult>, GalleryError> {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale fetch result"
            );
            return Ok(None);
        }

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(StoreError::PermissionDenied) => {
                warn!("Library access revoked during fetch");
                self.access = AccessStatus::Denied;
                self.drop_assets();
                return Err(GalleryError::PermissionDenied);
            }
            Err(e) => {
                warn!(error = %e, "Library query failed");
                return Err(GalleryError::QueryFailed(e));
            }
        };

        let fetched = dedup_last_wins(fetched);
        let diff = Reconciler::with_offset(self.asset_offset()).reconcile(
            &self.assets(),
            &fetched,
            None,
        );

        self.replace_assets(fetched);
        self.query = Some(ticket.query);
        info!(loaded = self.loaded_count(), incremental = diff.is_incremental, "Applied fetch result");

        Ok(Some(diff))
    }

    // =========================================================================
    // External changes
    // =========================================================================

    /// Applies a store change notification.
    ///
    /// Notifications for any query other than the displayed one are ignored.
    pub fn ingest_external_change(&mut self, notification: ChangeNotification) -> Option<DiffResult> {
        if self.query.as_ref() != Some(&notification.query) {
            trace!(query = ?notification.query, "Ignoring change for another query");
            return None;
        }

        let after = dedup_last_wins(notification.fetch_result_after_changes);
        let diff = Reconciler::with_offset(self.asset_offset()).reconcile(
            &self.assets(),
            &after,
            Some(&notification.details),
        );

        self.replace_assets(after);
        debug!(
            loaded = self.loaded_count(),
            incremental = diff.is_incremental,
            "Applied library change"
        );
        Some(diff)
    }

    /// Shows a freshly captured or picked asset at the head of the grid.
    ///
    /// The store's view wins again on the next fetch or notification.
    pub fn append_captured_asset(&mut self, asset: MediaAssetRef) -> Option<DiffResult> {
        if self.items.iter().any(|item| item.key() == Some(&asset.id)) {
            trace!(id = %asset.id, "Captured asset already shown");
            return None;
        }

        let index = self.asset_offset();
        info!(id = %asset.id, index, "Inserting captured asset");
        self.items.insert(index, AssetItem::Media(asset));

        Some(DiffResult {
            inserted: [index].into_iter().collect(),
            ..DiffResult::empty()
        })
    }

    /// Empties the grid, camera tile included, and abandons in-flight fetches.
    pub fn clear(&mut self) -> DiffResult {
        let len = self.items.len();
        self.items.clear();
        self.query = None;
        let generation = self.bump_generation();
        info!(removed = len, generation, "Cleared grid");
        DiffResult::remove_all(len)
    }

    // =========================================================================
    // Presentation helpers
    // =========================================================================

    /// Whether a scroll position should trigger [`Self::request_load_more`].
    pub fn should_load_more(&self, metrics: ScrollMetrics) -> bool {
        self.filter.requires_library() && metrics.reached_end()
    }

    /// Which picker "open gallery" should present.
    pub fn open_gallery(&self) -> Result<PickerRequest, GalleryError> {
        match self.access {
            AccessStatus::Denied | AccessStatus::Restricted => Err(GalleryError::PermissionDenied),
            AccessStatus::Limited => Ok(PickerRequest::LimitedLibrary),
            _ if self.filter == MediaFilter::Camera => Ok(PickerRequest::Camera),
            _ => Ok(PickerRequest::Library {
                kind: self.filter.picker_kind(),
                selection_limit: self.config.picker_selection_limit,
            }),
        }
    }
}
