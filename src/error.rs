use thiserror::Error;

/// Failures raised by a media store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("media library access denied")]
    PermissionDenied,

    #[error("media library query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("media library I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to determine project directories")]
    NoProjectDirs,
}

/// Failures surfaced to callers of the gallery controller.
///
/// Stale fetch results and inconsistent change notifications are absorbed by
/// the controller and never show up here.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("media library access denied")]
    PermissionDenied,

    #[error("query failed: {0}")]
    QueryFailed(#[source] StoreError),

    #[error("gallery runtime is no longer running")]
    RuntimeClosed,
}

impl From<StoreError> for GalleryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied => Self::PermissionDenied,
            other => Self::QueryFailed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_permission_maps_to_gallery_permission() {
        let err = GalleryError::from(StoreError::PermissionDenied);
        assert!(matches!(err, GalleryError::PermissionDenied));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = GalleryError::from(StoreError::from(io));
        assert!(matches!(err, GalleryError::QueryFailed(StoreError::Io(_))));
        assert!(err.to_string().contains("disk gone"));
    }
}
