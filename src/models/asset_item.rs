use std::fmt;

/// Stable identifier of a media asset within the library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "photo" | "image" => Some(Self::Photo),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Reference to an asset held by the media store.
///
/// `modified_at` is the store's revision marker: two references with the same
/// id but different `modified_at` describe the same slot with changed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAssetRef {
    pub id: AssetId,
    pub kind: MediaKind,
    pub created_at: i64,
    pub modified_at: i64,
}

impl MediaAssetRef {
    pub fn new(id: impl Into<AssetId>, kind: MediaKind, created_at: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at,
            modified_at: created_at,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// One slot in the gallery grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetItem {
    Media(MediaAssetRef),
    /// The live camera preview tile. Carries no key.
    LiveCamera,
}

impl AssetItem {
    /// Identifier used for matching, `None` for the placeholder.
    pub fn key(&self) -> Option<&AssetId> {
        match self {
            Self::Media(asset) => Some(&asset.id),
            Self::LiveCamera => None,
        }
    }

    pub fn as_media(&self) -> Option<&MediaAssetRef> {
        match self {
            Self::Media(asset) => Some(asset),
            Self::LiveCamera => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::LiveCamera)
    }
}

impl From<MediaAssetRef> for AssetItem {
    fn from(asset: MediaAssetRef) -> Self {
        Self::Media(asset)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
