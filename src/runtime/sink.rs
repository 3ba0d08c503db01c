use tracing::warn;

use crate::error::GalleryError;
use crate::models::AssetItem;
use crate::sync::{DiffResult, PickerRequest};

/// The grid the gallery drives. Called only from the runtime's task.
pub trait PresentationSink {
    /// Applies an incremental diff. `items` is the grid after the change.
    fn apply_diff(&mut self, diff: &DiffResult, items: &[AssetItem]);

    /// Rebuilds the whole grid from `items`.
    fn reload_all(&mut self, items: &[AssetItem]);

    fn present_picker(&mut self, _request: PickerRequest) {}

    fn report_error(&mut self, _error: &GalleryError) {}
}

/// Keeps its own copy of the grid, built only from the diffs it receives.
#[derive(Debug, Default)]
pub struct GridMirror {
    items: Vec<AssetItem>,
    diffs_applied: usize,
    reloads: usize,
    pickers: Vec<PickerRequest>,
    errors: Vec<String>,
}

impl GridMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[AssetItem] {
        &self.items
    }

    pub fn diffs_applied(&self) -> usize {
        self.diffs_applied
    }

    pub fn reloads(&self) -> usize {
        self.reloads
    }

    pub fn pickers(&self) -> &[PickerRequest] {
        &self.pickers
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl PresentationSink for GridMirror {
    fn apply_diff(&mut self, diff: &DiffResult, items: &[AssetItem]) {
        match diff.apply(&self.items, items) {
            Some(next) if next == items => {
                self.items = next;
                self.diffs_applied += 1;
            }
            _ => {
                warn!(
                    mirrored = self.items.len(),
                    expected = items.len(),
                    "Diff did not reproduce the grid, reloading"
                );
                self.reload_all(items);
            }
        }
    }

    fn reload_all(&mut self, items: &[AssetItem]) {
        self.items = items.to_vec();
        self.reloads += 1;
    }

    fn present_picker(&mut self, request: PickerRequest) {
        self.pickers.push(request);
    }

    fn report_error(&mut self, error: &GalleryError) {
        self.errors.push(error.to_string());
    }
}
