use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::config::GalleryConfig;
use crate::error::GalleryError;
use crate::models::{AccessStatus, AssetId, AssetItem, MediaAssetRef, MediaFilter, MediaKind};
use crate::runtime::{
    CaptureOutcome, Command, GalleryHandle, GalleryRuntime, GridMirror, PresentationSink,
};
use crate::store::{CapturedMedia, SqliteMediaStore};
use crate::sync::{DiffResult, PickerRequest, ScrollMetrics};

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    More,
    Clear,
    Filter(MediaFilter),
    Capture(MediaKind),
    Pick(Vec<AssetId>),
    Open,
    Access(AccessStatus),
    Scroll(ScrollMetrics),
    Add(MediaKind),
    Delete(AssetId),
    Quit,
}

impl ConsoleCommand {
    /// Parses a console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb, args.as_slice()) {
            ("more", []) => Self::More,
            ("clear", []) => Self::Clear,
            ("open", []) => Self::Open,
            ("quit" | "exit", []) => Self::Quit,
            ("filter", [name]) => Self::Filter(
                MediaFilter::parse(name).with_context(|| format!("Unknown filter: {name}"))?,
            ),
            ("capture", [kind]) => Self::Capture(parse_kind(kind)?),
            ("add", [kind]) => Self::Add(parse_kind(kind)?),
            ("delete", [id]) => Self::Delete(AssetId::from(*id)),
            ("pick", ids) if !ids.is_empty() => {
                Self::Pick(ids.iter().map(|id| AssetId::from(*id)).collect())
            }
            ("access", [status]) => Self::Access(
                AccessStatus::parse(status)
                    .with_context(|| format!("Unknown access status: {status}"))?,
            ),
            ("scroll", [offset, content, viewport]) => Self::Scroll(ScrollMetrics {
                offset: offset.parse().context("Invalid scroll offset")?,
                content_size: content.parse().context("Invalid content size")?,
                viewport: viewport.parse().context("Invalid viewport size")?,
            }),
            _ => bail!("Unrecognized command: {}", line.trim()),
        };
        Ok(Some(command))
    }
}

fn parse_kind(name: &str) -> Result<MediaKind> {
    MediaKind::parse(name).with_context(|| format!("Unknown media kind: {name}"))
}

/// Renders the grid as one line: `[camera] id:photo id:video ...`.
pub fn render_grid(items: &[AssetItem]) -> String {
    if items.is_empty() {
        return "(empty)".to_string();
    }

    items
        .iter()
        .map(|item| match item {
            AssetItem::LiveCamera => "[camera]".to_string(),
            AssetItem::Media(asset) => {
                let kind = if asset.is_video() { "video" } else { "photo" };
                format!("{}:{}", asset.id, kind)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mirrors the grid and prints it after every change.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    mirror: GridMirror,
}

impl ConsoleSink {
    pub fn into_mirror(self) -> GridMirror {
        self.mirror
    }

    fn print(&self) {
        println!("{} item(s): {}", self.mirror.items().len(), render_grid(self.mirror.items()));
    }
}

impl PresentationSink for ConsoleSink {
    fn apply_diff(&mut self, diff: &DiffResult, items: &[AssetItem]) {
        self.mirror.apply_diff(diff, items);
        println!(
            "diff: -{} +{} ~{} moves {}",
            diff.removed.len(),
            diff.inserted.len(),
            diff.changed.len(),
            diff.moves.len()
        );
        self.print();
    }

    fn reload_all(&mut self, items: &[AssetItem]) {
        self.mirror.reload_all(items);
        println!("reload");
        self.print();
    }

    fn present_picker(&mut self, request: PickerRequest) {
        self.mirror.present_picker(request);
        match request {
            PickerRequest::LimitedLibrary => println!("picker: extend limited selection"),
            PickerRequest::Camera => println!("picker: camera (use `capture <photo|video>`)"),
            PickerRequest::Library {
                kind,
                selection_limit,
            } => println!(
                "picker: library {} up to {} (use `pick <id>...`)",
                kind.map_or("photos and videos", |kind| match kind {
                    MediaKind::Photo => "photos",
                    MediaKind::Video => "videos",
                }),
                selection_limit
            ),
        }
    }

    fn report_error(&mut self, error: &GalleryError) {
        self.mirror.report_error(error);
        eprintln!("error: {error}");
    }
}

/// Console front end over a SQLite library.
pub struct GalleryApp {
    store: Arc<SqliteMediaStore>,
    config: GalleryConfig,
}

impl GalleryApp {
    pub fn new(store: SqliteMediaStore, config: GalleryConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Opens the library at `db`, or the default location.
    pub fn open(db: Option<&Path>, config: GalleryConfig) -> Result<Self> {
        let store = match db {
            Some(path) => SqliteMediaStore::open(path)
                .with_context(|| format!("Failed to open library at {}", path.display()))?,
            None => SqliteMediaStore::open_default().context("Failed to open default library")?,
        };
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &SqliteMediaStore {
        &self.store
    }

    /// Adds `count` assets, newest last, every fourth one a video.
    pub fn seed(&self, count: usize) -> Result<()> {
        let now = SqliteMediaStore::now();
        let assets: Vec<_> = (0..count)
            .map(|i| {
                let kind = if i % 4 == 3 {
                    MediaKind::Video
                } else {
                    MediaKind::Photo
                };
                MediaAssetRef::new(format!("seed-{:04}", i), kind, now - (count - i) as i64)
            })
            .collect();

        self.store
            .insert_assets(&assets)
            .context("Failed to seed library")?;
        info!(count, "Seeded library");
        Ok(())
    }

    /// Reads commands from `input` until `quit` or end of input.
    ///
    /// Returns the final mirrored grid.
    pub async fn run<R>(&self, input: R) -> Result<GridMirror>
    where
        R: AsyncBufRead + Unpin,
    {
        let (runtime, handle) = GalleryRuntime::new(
            Arc::clone(&self.store),
            ConsoleSink::default(),
            self.config.clone(),
        );
        let task = tokio::spawn(runtime.run());

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read command")? {
            match ConsoleCommand::parse(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleCommand::Quit)) => break,
                Ok(Some(command)) => self.execute(command, &handle)?,
                Err(e) => eprintln!("{e:#}"),
            }
        }

        handle.shutdown()?;
        let sink = task.await.context("Gallery runtime failed")?;
        Ok(sink.into_mirror())
    }

    fn execute(&self, command: ConsoleCommand, handle: &GalleryHandle) -> Result<()> {
        match command {
            ConsoleCommand::More => handle.load_more()?,
            ConsoleCommand::Clear => handle.clear()?,
            ConsoleCommand::Filter(filter) => handle.set_filter(filter)?,
            ConsoleCommand::Open => handle.send(Command::OpenGallery)?,
            ConsoleCommand::Pick(ids) => handle.send(Command::PickerFinished(ids))?,
            ConsoleCommand::Scroll(metrics) => handle.send(Command::Scrolled(metrics))?,
            ConsoleCommand::Capture(kind) => {
                let media = CapturedMedia {
                    kind,
                    created_at: SqliteMediaStore::now(),
                };
                handle.send(Command::CaptureFinished(CaptureOutcome::Raw(media)))?;
            }
            ConsoleCommand::Access(status) => {
                self.store.set_authorization(status);
                handle.send(Command::AccessChanged(status))?;
            }
            ConsoleCommand::Add(kind) => {
                let asset = MediaAssetRef::new(
                    uuid::Uuid::new_v4().to_string(),
                    kind,
                    SqliteMediaStore::now(),
                );
                self.store
                    .insert_asset(&asset)
                    .context("Failed to add asset")?;
                println!("added {}", asset.id);
            }
            ConsoleCommand::Delete(id) => {
                if !self.store.delete_asset(&id).context("Failed to delete asset")? {
                    warn!(%id, "No such asset");
                }
            }
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(seed: usize) -> GalleryApp {
        let app = GalleryApp::new(
            SqliteMediaStore::open_in_memory().unwrap(),
            GalleryConfig::default(),
        );
        app.seed(seed).unwrap();
        app
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("  ").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("more").unwrap(),
            Some(ConsoleCommand::More)
        );
        assert_eq!(
            ConsoleCommand::parse("filter live").unwrap(),
            Some(ConsoleCommand::Filter(MediaFilter::LifeCamera))
        );
        assert_eq!(
            ConsoleCommand::parse("pick a b").unwrap(),
            Some(ConsoleCommand::Pick(vec![AssetId::new("a"), AssetId::new("b")]))
        );
        assert_eq!(
            ConsoleCommand::parse("scroll 700 1000 300").unwrap(),
            Some(ConsoleCommand::Scroll(ScrollMetrics {
                offset: 700.0,
                content_size: 1000.0,
                viewport: 300.0,
            }))
        );
        assert_eq!(
            ConsoleCommand::parse("access denied").unwrap(),
            Some(ConsoleCommand::Access(AccessStatus::Denied))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(ConsoleCommand::parse("filter sideways").is_err());
        assert!(ConsoleCommand::parse("capture audio").is_err());
        assert!(ConsoleCommand::parse("pick").is_err());
        assert!(ConsoleCommand::parse("scroll 1 two 3").is_err());
        assert!(ConsoleCommand::parse("more please").is_err());
    }

    #[test]
    fn test_render_grid() {
        assert_eq!(render_grid(&[]), "(empty)");
        let items = vec![
            AssetItem::LiveCamera,
            AssetItem::Media(MediaAssetRef::new("v1", MediaKind::Video, 0)),
        ];
        assert_eq!(render_grid(&items), "[camera] v1:video");
    }

    #[test]
    fn test_seed_mixes_kinds() {
        let app = app(8);
        assert_eq!(app.store().count_assets().unwrap(), 8);
        let video = app.store().get_asset(&AssetId::new("seed-0003")).unwrap();
        assert!(video.is_some_and(|asset| asset.is_video()));
    }

    #[tokio::test]
    async fn test_run_script() {
        let app = app(30);
        let mirror = app.run(&b"more\nbogus\n\nquit\nmore\n"[..]).await.unwrap();
        assert_eq!(mirror.items().len(), 20);
        assert!(mirror.errors().is_empty());
    }

    #[tokio::test]
    async fn test_run_added_asset_shows_under_all() {
        let app = app(5);
        let mirror = app
            .run(&b"add video\nfilter all\nmore\n"[..])
            .await
            .unwrap();
        assert_eq!(mirror.items().len(), 6);
    }

    #[tokio::test]
    async fn test_run_denied_access_reports_error() {
        let app = app(5);
        let mirror = app.run(&b"access denied\nmore\n"[..]).await.unwrap();
        assert!(mirror.items().is_empty());
        assert_eq!(mirror.errors().len(), 1);
    }
}
