use super::MediaKind;

/// Segment selected above the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaFilter {
    LifeCamera,
    Camera,
    #[default]
    Photos,
    Videos,
    All,
}

/// Which media kinds a library query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFilter {
    Only(MediaKind),
    Any,
}

impl KindFilter {
    pub fn matches(self, kind: MediaKind) -> bool {
        match self {
            Self::Only(only) => only == kind,
            Self::Any => true,
        }
    }
}

impl MediaFilter {
    pub const ALL: [MediaFilter; 5] = [
        Self::LifeCamera,
        Self::Camera,
        Self::Photos,
        Self::Videos,
        Self::All,
    ];

    /// Kind filter for library queries, `None` for the camera segments which
    /// never query the library.
    pub fn query_kinds(self) -> Option<KindFilter> {
        match self {
            Self::LifeCamera | Self::Camera => None,
            Self::Photos => Some(KindFilter::Only(MediaKind::Photo)),
            Self::Videos => Some(KindFilter::Only(MediaKind::Video)),
            Self::All => Some(KindFilter::Any),
        }
    }

    /// Whether this segment needs library access to be useful.
    pub fn requires_library(self) -> bool {
        self.query_kinds().is_some()
    }

    /// Kind restriction handed to the system picker.
    pub fn picker_kind(self) -> Option<MediaKind> {
        match self {
            Self::Photos => Some(MediaKind::Photo),
            Self::Videos => Some(MediaKind::Video),
            _ => None,
        }
    }

    pub fn segment_index(self) -> usize {
        match self {
            Self::LifeCamera => 0,
            Self::Camera => 1,
            Self::Photos => 2,
            Self::Videos => 3,
            Self::All => 4,
        }
    }

    pub fn from_segment_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "lifecamera" | "live" | "live-camera" => Some(Self::LifeCamera),
            "camera" => Some(Self::Camera),
            "photos" => Some(Self::Photos),
            "videos" => Some(Self::Videos),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_roundtrip_order() {
        for (i, filter) in MediaFilter::ALL.iter().enumerate() {
            assert_eq!(filter.segment_index(), i);
            assert_eq!(MediaFilter::from_segment_index(i), Some(*filter));
        }
        assert_eq!(MediaFilter::from_segment_index(5), None);
        assert_eq!(MediaFilter::default(), MediaFilter::Photos);
    }

    #[test]
    fn test_camera_segments_do_not_query() {
        assert_eq!(MediaFilter::LifeCamera.query_kinds(), None);
        assert_eq!(MediaFilter::Camera.query_kinds(), None);
        assert_eq!(MediaFilter::All.query_kinds(), Some(KindFilter::Any));
        assert!(KindFilter::Any.matches(MediaKind::Video));
        assert!(!KindFilter::Only(MediaKind::Photo).matches(MediaKind::Video));
    }

    #[test]
    fn test_picker_kind() {
        assert_eq!(MediaFilter::Photos.picker_kind(), Some(MediaKind::Photo));
        assert_eq!(MediaFilter::Videos.picker_kind(), Some(MediaKind::Video));
        assert_eq!(MediaFilter::All.picker_kind(), None);
    }
}
