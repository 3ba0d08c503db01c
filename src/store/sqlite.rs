//! SQLite-backed media library.
//!
//! The database is stored at `XDG_DATA_HOME/demo-gallery/library.sqlite` by
//! default and uses WAL mode. Every mutation re-runs the subscribed queries
//! and notifies their subscribers.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use directories::ProjectDirs;
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use super::{CapturedMedia, ChangeBroadcaster, FetchQuery, MediaStore, Subscription};
use crate::error::StoreError;
use crate::models::{AccessStatus, AssetId, KindFilter, MediaAssetRef, MediaKind};

pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
    access: RwLock<AccessStatus>,
    broadcaster: ChangeBroadcaster,
}

impl SqliteMediaStore {
    /// Opens or creates the library at the default XDG location.
    pub fn open_default() -> Result<Self, StoreError> {
        let db_path = Self::default_db_path()?;
        Self::open(&db_path)
    }

    /// Returns the default database path based on XDG directories.
    pub fn default_db_path() -> Result<PathBuf, StoreError> {
        let proj_dirs =
            ProjectDirs::from("", "", "demo-gallery").ok_or(StoreError::NoProjectDirs)?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("library.sqlite"))
    }

    /// Opens or creates the library at the specified path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self::with_connection(conn)?;
        info!("Opened media library at {:?}", path);
        Ok(store)
    }

    /// Opens a library that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS assets (
                id TEXT PRIMARY KEY NOT NULL,
                kind INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                modified_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_assets_created ON assets(created_at DESC, id);
            ",
        )?;
        debug!("Library tables created/verified");

        Ok(Self {
            conn: Mutex::new(conn),
            access: RwLock::new(AccessStatus::Authorized),
            broadcaster: ChangeBroadcaster::new(),
        })
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    /// Changes the authorization the library reports and enforces.
    pub fn set_authorization(&self, status: AccessStatus) {
        *self.access.write() = status;
        info!(?status, "Library authorization changed");
    }

    fn check_access(&self) -> Result<(), StoreError> {
        if self.access.read().allows_queries() {
            Ok(())
        } else {
            Err(StoreError::PermissionDenied)
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Inserts or replaces a single asset.
    pub fn insert_asset(&self, asset: &MediaAssetRef) -> Result<(), StoreError> {
        {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            Self::upsert_in_tx(&tx, std::slice::from_ref(asset))?;
            tx.commit()?;
        }
        self.notify_subscribers();
        Ok(())
    }

    /// Inserts or replaces many assets in a single transaction.
    pub fn insert_assets(&self, assets: &[MediaAssetRef]) -> Result<usize, StoreError> {
        if assets.is_empty() {
            return Ok(0);
        }

        let count = {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let count = Self::upsert_in_tx(&tx, assets)?;
            tx.commit()?;
            count
        };

        debug!("Batch upserted {} assets", count);
        self.notify_subscribers();
        Ok(count)
    }

    fn upsert_in_tx(tx: &Transaction, assets: &[MediaAssetRef]) -> Result<usize, StoreError> {
        let mut stmt = tx.prepare_cached(
            "
            INSERT INTO assets (id, kind, created_at, modified_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at
            ",
        )?;

        let mut count = 0;
        for asset in assets {
            stmt.execute(params![
                asset.id.as_str(),
                kind_to_int(asset.kind),
                asset.created_at,
                asset.modified_at,
            ])?;
            count += 1;
        }
        Ok(count)
    }

    /// Deletes an asset. Returns whether it existed.
    pub fn delete_asset(&self, id: &AssetId) -> Result<bool, StoreError> {
        let rows = self
            .conn
            .lock()
            .execute("DELETE FROM assets WHERE id = ?1", params![id.as_str()])?;

        if rows > 0 {
            self.notify_subscribers();
        }
        Ok(rows > 0)
    }

    /// Marks an asset's content as changed. Returns whether it existed.
    pub fn touch_asset(&self, id: &AssetId, modified_at: i64) -> Result<bool, StoreError> {
        let rows = self.conn.lock().execute(
            "UPDATE assets SET modified_at = ?1 WHERE id = ?2",
            params![modified_at, id.as_str()],
        )?;

        if rows > 0 {
            self.notify_subscribers();
        }
        Ok(rows > 0)
    }

    pub fn get_asset(&self, id: &AssetId) -> Result<Option<MediaAssetRef>, StoreError> {
        let asset = self
            .conn
            .lock()
            .query_row(
                "SELECT id, kind, created_at, modified_at FROM assets WHERE id = ?1",
                params![id.as_str()],
                row_to_asset,
            )
            .optional()?;
        Ok(asset)
    }

    /// Returns the total count of assets in the library.
    pub fn count_assets(&self) -> Result<i64, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    fn notify_subscribers(&self) {
        self.broadcaster.publish(|query| self.query(query));
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn query(&self, query: &FetchQuery) -> Result<Vec<MediaAssetRef>, StoreError> {
        match query {
            FetchQuery::Recent { kinds, limit } => self.query_recent(*kinds, *limit),
            FetchQuery::Identifiers(ids) => self.query_identifiers(ids),
        }
    }

    fn query_recent(
        &self,
        kinds: KindFilter,
        limit: usize,
    ) -> Result<Vec<MediaAssetRef>, StoreError> {
        let kind = match kinds {
            KindFilter::Only(kind) => Some(kind_to_int(kind)),
            KindFilter::Any => None,
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "
            SELECT id, kind, created_at, modified_at
            FROM assets
            WHERE (?1 IS NULL OR kind = ?1)
            ORDER BY created_at DESC, id ASC
            LIMIT ?2
            ",
        )?;

        let assets = stmt
            .query_map(params![kind, limit], row_to_asset)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assets)
    }

    fn query_identifiers(&self, ids: &[AssetId]) -> Result<Vec<MediaAssetRef>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, kind, created_at, modified_at FROM assets WHERE id = ?1",
        )?;

        let mut assets = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(asset) = stmt
                .query_row(params![id.as_str()], row_to_asset)
                .optional()?
            {
                assets.push(asset);
            }
        }
        Ok(assets)
    }

    /// Returns the current Unix timestamp.
    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

impl MediaStore for SqliteMediaStore {
    fn authorization_status(&self) -> AccessStatus {
        *self.access.read()
    }

    fn fetch_recent(
        &self,
        kinds: KindFilter,
        limit: usize,
    ) -> Result<Vec<MediaAssetRef>, StoreError> {
        self.check_access()?;
        self.query_recent(kinds, limit)
    }

    fn fetch_by_identifiers(&self, ids: &[AssetId]) -> Result<Vec<MediaAssetRef>, StoreError> {
        self.check_access()?;
        self.query_identifiers(ids)
    }

    fn subscribe(
        &self,
        query: FetchQuery,
        baseline: Vec<MediaAssetRef>,
    ) -> Result<Subscription, StoreError> {
        self.check_access()?;
        Ok(self
            .broadcaster
            .register(query, baseline, |query| self.query(query)))
    }

    fn persist_capture(&self, capture: &CapturedMedia) -> Result<MediaAssetRef, StoreError> {
        self.check_access()?;
        let asset = MediaAssetRef::new(
            uuid::Uuid::new_v4().to_string(),
            capture.kind,
            capture.created_at,
        );
        self.insert_asset(&asset)?;
        info!(id = %asset.id, kind = ?asset.kind, "Persisted captured media");
        Ok(asset)
    }
}

// =========================================================================
// Helper Functions
// =========================================================================

fn row_to_asset(row: &Row<'_>) -> rusqlite::Result<MediaAssetRef> {
    Ok(MediaAssetRef {
        id: AssetId::new(row.get::<_, String>(0)?),
        kind: int_to_kind(row.get(1)?),
        created_at: row.get(2)?,
        modified_at: row.get(3)?,
    })
}

/// Converts MediaKind enum to integer for storage.
fn kind_to_int(kind: MediaKind) -> i32 {
    match kind {
        MediaKind::Photo => 0,
        MediaKind::Video => 1,
    }
}

/// Converts stored integer back to MediaKind enum.
fn int_to_kind(value: i32) -> MediaKind {
    match value {
        1 => MediaKind::Video,
        _ => MediaKind::Photo,
    }
}
