use crate::models::MediaFilter;

/// Default number of assets requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Default number of items the system picker lets the user select.
pub const DEFAULT_PICKER_SELECTION_LIMIT: usize = 3;

/// What happens to loaded assets when the live camera segment is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveCameraPolicy {
    /// Drop loaded assets; the camera tile is the only item.
    #[default]
    ClearAssets,
    /// Keep loaded assets and show the camera tile in front of them.
    KeepAssets,
}

/// Configuration for the gallery controller.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Number of additional assets requested by each "load more".
    pub page_size: usize,
    /// Selection limit passed to the library picker.
    pub picker_selection_limit: usize,
    /// Handling of loaded assets when entering the live camera segment.
    pub live_camera_policy: LiveCameraPolicy,
    /// Segment selected on start.
    pub initial_filter: MediaFilter,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            picker_selection_limit: DEFAULT_PICKER_SELECTION_LIMIT,
            live_camera_policy: LiveCameraPolicy::default(),
            initial_filter: MediaFilter::default(),
        }
    }
}

impl GalleryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_picker_selection_limit(mut self, limit: usize) -> Self {
        self.picker_selection_limit = limit.max(1);
        self
    }

    pub fn with_live_camera_policy(mut self, policy: LiveCameraPolicy) -> Self {
        self.live_camera_policy = policy;
        self
    }

    pub fn with_initial_filter(mut self, filter: MediaFilter) -> Self {
        self.initial_filter = filter;
        self
    }
}
