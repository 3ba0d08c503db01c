//! Single-task driver for the gallery.
//!
//! - `GalleryRuntime` owns the controller and the presentation sink
//! - `GalleryHandle` sends commands to it from anywhere
//! - Store queries run on the blocking pool and report back over a channel
//! - Library change notifications are received on the same task, so every
//!   mutation and every sink call happens in one place, in arrival order

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::GalleryConfig;
use crate::error::{GalleryError, StoreError};
use crate::models::{AccessStatus, AssetId, MediaAssetRef, MediaFilter};
use crate::store::{CapturedMedia, ChangeNotification, MediaStore, Subscription};
use crate::sync::{AssetListController, DiffResult, FetchTicket, ScrollMetrics};

pub mod sink;

pub use sink::{GridMirror, PresentationSink};

/// What the camera flow handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The capture is already in the library.
    Stored(MediaAssetRef),
    /// Raw media that still has to be saved to the library.
    Raw(CapturedMedia),
}

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetFilter(MediaFilter),
    LoadMore,
    Clear,
    Scrolled(ScrollMetrics),
    OpenGallery,
    PickerFinished(Vec<AssetId>),
    CaptureFinished(CaptureOutcome),
    AccessChanged(AccessStatus),
    /// Stop once in-flight store work has reported back.
    Shutdown,
}

enum Completion {
    Fetch {
        ticket: FetchTicket,
        result: Result<Vec<MediaAssetRef>, StoreError>,
    },
    Persisted(Result<MediaAssetRef, StoreError>),
    /// The store task died without a result.
    Lost,
}

/// Cloneable sender for [`Command`]s.
#[derive(Debug, Clone)]
pub struct GalleryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl GalleryHandle {
    pub fn send(&self, command: Command) -> Result<(), GalleryError> {
        self.tx
            .send(command)
            .map_err(|_| GalleryError::RuntimeClosed)
    }

    pub fn load_more(&self) -> Result<(), GalleryError> {
        self.send(Command::LoadMore)
    }

    pub fn set_filter(&self, filter: MediaFilter) -> Result<(), GalleryError> {
        self.send(Command::SetFilter(filter))
    }

    pub fn clear(&self) -> Result<(), GalleryError> {
        self.send(Command::Clear)
    }

    pub fn shutdown(&self) -> Result<(), GalleryError> {
        self.send(Command::Shutdown)
    }
}

pub struct GalleryRuntime<S, P> {
    store: Arc<S>,
    sink: P,
    controller: AssetListController,
    commands: mpsc::UnboundedReceiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    subscription: Option<Subscription>,
    in_flight: usize,
    closing: bool,
}

impl<S, P> GalleryRuntime<S, P>
where
    S: MediaStore + 'static,
    P: PresentationSink,
{
    pub fn new(store: Arc<S>, sink: P, config: GalleryConfig) -> (Self, GalleryHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let runtime = Self {
            store,
            sink,
            controller: AssetListController::new(config),
            commands,
            completions_tx,
            completions_rx,
            subscription: None,
            in_flight: 0,
            closing: false,
        };
        (runtime, GalleryHandle { tx })
    }

    pub fn controller(&self) -> &AssetListController {
        &self.controller
    }

    /// Processes commands until shutdown and returns the sink.
    pub async fn run(mut self) -> P {
        self.sink.reload_all(self.controller.items());
        let status = self.store.authorization_status();
        self.apply_access(status);
        info!(filter = ?self.controller.filter(), ?status, "Gallery runtime started");

        loop {
            if self.closing && self.in_flight == 0 {
                break;
            }

            tokio::select! {
                command = self.commands.recv(), if !self.closing => match command {
                    Some(Command::Shutdown) | None => {
                        debug!(in_flight = self.in_flight, "Gallery runtime closing");
                        self.closing = true;
                    }
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.in_flight -= 1;
                    self.handle_completion(completion);
                }
                Some(notification) = next_change(self.subscription.as_ref()), if !self.closing => {
                    self.handle_notification(notification);
                }
            }
        }

        info!("Gallery runtime stopped");
        self.sink
    }

    fn handle_command(&mut self, command: Command) {
        trace!(?command, "Handling command");
        match command {
            Command::SetFilter(filter) => match self.controller.set_filter(filter) {
                Ok(diff) => {
                    self.emit(diff);
                    self.drop_orphaned_subscription();
                }
                Err(e) => self.sink.report_error(&e),
            },
            Command::LoadMore => self.load_more(),
            Command::Clear => {
                let diff = self.controller.clear();
                self.subscription = None;
                self.emit(Some(diff));
            }
            Command::Scrolled(metrics) => {
                if self.controller.should_load_more(metrics) {
                    self.load_more();
                }
            }
            Command::OpenGallery => match self.controller.open_gallery() {
                Ok(request) => self.sink.present_picker(request),
                Err(e) => self.sink.report_error(&e),
            },
            Command::PickerFinished(ids) => {
                let ticket = self.controller.request_selection(ids);
                self.dispatch(ticket);
            }
            Command::CaptureFinished(CaptureOutcome::Stored(asset)) => {
                let diff = self.controller.append_captured_asset(asset);
                self.emit(diff);
            }
            Command::CaptureFinished(CaptureOutcome::Raw(media)) => self.spawn_persist(media),
            Command::AccessChanged(status) => self.apply_access(status),
            Command::Shutdown => self.closing = true,
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetch { ticket, result } => {
                match self.controller.complete_fetch(ticket, result) {
                    Ok(Some(diff)) => {
                        self.resubscribe();
                        self.emit(Some(diff));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        if matches!(e, GalleryError::PermissionDenied) {
                            self.subscription = None;
                            self.sink.reload_all(self.controller.items());
                        }
                        self.sink.report_error(&e);
                    }
                }
            }
            Completion::Persisted(Ok(asset)) => {
                if self.controller.filter().requires_library() {
                    let ticket = self.controller.request_refresh(1);
                    self.dispatch(ticket);
                } else {
                    let diff = self.controller.append_captured_asset(asset);
                    self.emit(diff);
                }
            }
            Completion::Persisted(Err(e)) => self.sink.report_error(&GalleryError::from(e)),
            Completion::Lost => {}
        }
    }

    fn handle_notification(&mut self, notification: ChangeNotification) {
        let diff = self.controller.ingest_external_change(notification);
        self.emit(diff);
    }

    fn apply_access(&mut self, status: AccessStatus) {
        let diff = self.controller.set_access(status);
        if !status.allows_queries() {
            self.subscription = None;
        }
        self.emit(diff);
    }

    fn load_more(&mut self) {
        let ticket = self.controller.request_load_more();
        self.dispatch(ticket);
    }

    fn dispatch(&mut self, ticket: Result<Option<FetchTicket>, GalleryError>) {
        match ticket {
            Ok(Some(ticket)) => self.spawn_fetch(ticket),
            Ok(None) => {}
            Err(e) => self.sink.report_error(&e),
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        let store = Arc::clone(&self.store);
        self.spawn_store_work(move || {
            let result = store.fetch(&ticket.query);
            Completion::Fetch { ticket, result }
        });
    }

    fn spawn_persist(&mut self, media: CapturedMedia) {
        let store = Arc::clone(&self.store);
        self.spawn_store_work(move || Completion::Persisted(store.persist_capture(&media)));
    }

    /// Runs `work` on the blocking pool. Exactly one completion is reported,
    /// even when `work` panics.
    fn spawn_store_work<F>(&mut self, work: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let completion = match tokio::task::spawn_blocking(work).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!(error = %e, "Store task failed");
                    Completion::Lost
                }
            };
            let _ = tx.send(completion);
        });
    }

    /// Follows the displayed query, relative to what the grid shows now.
    fn resubscribe(&mut self) {
        let Some(query) = self.controller.current_query().cloned() else {
            self.subscription = None;
            return;
        };

        match self.store.subscribe(query, self.controller.assets()) {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => {
                self.subscription = None;
                self.sink.report_error(&GalleryError::from(e));
            }
        }
    }

    fn drop_orphaned_subscription(&mut self) {
        if self.controller.current_query().is_none() {
            self.subscription = None;
        }
    }

    fn emit(&mut self, diff: Option<DiffResult>) {
        let Some(diff) = diff else {
            return;
        };
        if diff.is_empty() {
            return;
        }

        if diff.is_incremental {
            self.sink.apply_diff(&diff, self.controller.items());
        } else {
            self.sink.reload_all(self.controller.items());
        }
    }
}

async fn next_change(subscription: Option<&Subscription>) -> Option<ChangeNotification> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::models::{AssetItem, KindFilter, MediaKind};
    use crate::store::SqliteMediaStore;
    use crate::sync::PickerRequest;

    /// A SQLite library that runs `after_recent` once each recent query
    /// has produced its result.
    struct HookedStore {
        inner: SqliteMediaStore,
        after_recent: Box<dyn Fn(&SqliteMediaStore) + Send + Sync>,
    }

    impl MediaStore for HookedStore {
        fn authorization_status(&self) -> AccessStatus {
            self.inner.authorization_status()
        }

        fn fetch_recent(
            &self,
            kinds: KindFilter,
            limit: usize,
        ) -> Result<Vec<MediaAssetRef>, StoreError> {
            let result = self.inner.fetch_recent(kinds, limit);
            (self.after_recent)(&self.inner);
            result
        }

        fn fetch_by_identifiers(
            &self,
            ids: &[AssetId],
        ) -> Result<Vec<MediaAssetRef>, StoreError> {
            self.inner.fetch_by_identifiers(ids)
        }

        fn subscribe(
            &self,
            query: crate::store::FetchQuery,
            baseline: Vec<MediaAssetRef>,
        ) -> Result<Subscription, StoreError> {
            self.inner.subscribe(query, baseline)
        }

        fn persist_capture(&self, capture: &CapturedMedia) -> Result<MediaAssetRef, StoreError> {
            self.inner.persist_capture(capture)
        }
    }

    fn hooked_store(
        count: i64,
        after_recent: impl Fn(&SqliteMediaStore) + Send + Sync + 'static,
    ) -> Arc<HookedStore> {
        Arc::new(HookedStore {
            inner: seeded_library(count),
            after_recent: Box::new(after_recent),
        })
    }

    /// Mirrors the grid and reports every sink call to the test.
    struct ObservedMirror {
        mirror: GridMirror,
        events: mpsc::UnboundedSender<&'static str>,
    }

    impl PresentationSink for ObservedMirror {
        fn apply_diff(&mut self, diff: &DiffResult, items: &[AssetItem]) {
            self.mirror.apply_diff(diff, items);
            let _ = self.events.send("diff");
        }

        fn reload_all(&mut self, items: &[AssetItem]) {
            self.mirror.reload_all(items);
            let _ = self.events.send("reload");
        }

        fn present_picker(&mut self, request: PickerRequest) {
            self.mirror.present_picker(request);
            let _ = self.events.send("picker");
        }

        fn report_error(&mut self, error: &GalleryError) {
            self.mirror.report_error(error);
            let _ = self.events.send("error");
        }
    }

    fn seeded_library(count: i64) -> SqliteMediaStore {
        let store = SqliteMediaStore::open_in_memory().unwrap();
        let assets: Vec<_> = (0..count)
            .map(|i| MediaAssetRef::new(format!("p{:03}", i), MediaKind::Photo, i))
            .collect();
        store.insert_assets(&assets).unwrap();
        store
    }

    fn seeded_store(count: i64) -> Arc<SqliteMediaStore> {
        Arc::new(seeded_library(count))
    }

    fn start<S: MediaStore + 'static>(
        store: &Arc<S>,
        config: GalleryConfig,
    ) -> (
        tokio::task::JoinHandle<ObservedMirror>,
        GalleryHandle,
        mpsc::UnboundedReceiver<&'static str>,
    ) {
        let (events_tx, events) = mpsc::unbounded_channel();
        let sink = ObservedMirror {
            mirror: GridMirror::new(),
            events: events_tx,
        };
        let (runtime, handle) = GalleryRuntime::new(Arc::clone(store), sink, config);
        (tokio::spawn(runtime.run()), handle, events)
    }

    fn ids(items: &[AssetItem]) -> Vec<String> {
        items
            .iter()
            .map(|item| match item {
                AssetItem::Media(asset) => asset.id.to_string(),
                AssetItem::LiveCamera => "camera".to_string(),
            })
            .collect()
    }

    async fn wait_for(events: &mut mpsc::UnboundedReceiver<&'static str>, kind: &str) {
        while let Some(event) = events.recv().await {
            if event == kind {
                return;
            }
        }
        panic!("sink closed before {kind}");
    }

    #[tokio::test]
    async fn test_load_more_pages_through_library() {
        let store = seeded_store(35);
        let (task, handle, mut events) = start(&store, GalleryConfig::default());
        wait_for(&mut events, "reload").await;

        handle.load_more().unwrap();
        wait_for(&mut events, "reload").await;
        handle.load_more().unwrap();
        wait_for(&mut events, "diff").await;
        handle.shutdown().unwrap();

        let sink = task.await.unwrap();
        let shown = ids(sink.mirror.items());
        assert_eq!(shown.len(), 35);
        assert_eq!(shown[0], "p034");
        assert_eq!(shown[34], "p000");
    }

    #[tokio::test]
    async fn test_clear_wins_over_late_fetch() {
        let store = seeded_store(10);
        let (task, handle, _events) = start(&store, GalleryConfig::default());

        handle.load_more().unwrap();
        handle.clear().unwrap();
        handle.shutdown().unwrap();

        let sink = task.await.unwrap();
        assert!(sink.mirror.items().is_empty());
    }

    #[tokio::test]
    async fn test_external_insert_reaches_grid() {
        let store = seeded_store(3);
        let (task, handle, mut events) = start(&store, GalleryConfig::default());
        wait_for(&mut events, "reload").await;

        handle.load_more().unwrap();
        wait_for(&mut events, "reload").await;

        store
            .insert_asset(&MediaAssetRef::new("fresh", MediaKind::Photo, 100))
            .unwrap();
        wait_for(&mut events, "diff").await;

        store.delete_asset(&AssetId::new("p001")).unwrap();
        wait_for(&mut events, "diff").await;

        handle.shutdown().unwrap();
        let sink = task.await.unwrap();
        assert_eq!(ids(sink.mirror.items()), vec!["fresh", "p002", "p000"]);
        assert!(sink.mirror.diffs_applied() >= 2);
    }

    #[tokio::test]
    async fn test_revoked_access_clears_grid_and_reports() {
        let store = seeded_store(5);
        let (task, handle, mut events) = start(&store, GalleryConfig::default());

        handle.load_more().unwrap();
        wait_for(&mut events, "reload").await;
        wait_for(&mut events, "reload").await;

        store.set_authorization(AccessStatus::Denied);
        handle.load_more().unwrap();
        wait_for(&mut events, "error").await;

        handle.set_filter(MediaFilter::Videos).unwrap();
        wait_for(&mut events, "error").await;

        handle.shutdown().unwrap();
        let sink = task.await.unwrap();
        assert!(sink.mirror.items().is_empty());
        assert_eq!(sink.mirror.errors().len(), 2);
    }

    #[tokio::test]
    async fn test_raw_capture_is_persisted_and_requeried() {
        let store = seeded_store(2);
        let (task, handle, mut events) = start(&store, GalleryConfig::default());

        handle.load_more().unwrap();
        wait_for(&mut events, "reload").await;
        wait_for(&mut events, "reload").await;

        handle
            .send(Command::CaptureFinished(CaptureOutcome::Raw(CapturedMedia {
                kind: MediaKind::Photo,
                created_at: 1_000,
            })))
            .unwrap();
        wait_for(&mut events, "diff").await;

        handle.shutdown().unwrap();
        let sink = task.await.unwrap();
        assert_eq!(sink.mirror.items().len(), 3);
        assert_eq!(store.count_assets().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_live_camera_and_picker() {
        let store = seeded_store(4);
        let (task, handle, _events) = start(&store, GalleryConfig::default());

        handle.set_filter(MediaFilter::LifeCamera).unwrap();
        handle.set_filter(MediaFilter::LifeCamera).unwrap();
        handle.send(Command::OpenGallery).unwrap();
        handle.shutdown().unwrap();

        let sink = task.await.unwrap();
        assert_eq!(sink.mirror.items(), &[AssetItem::LiveCamera]);
        assert_eq!(
            sink.mirror.pickers(),
            &[PickerRequest::Library {
                kind: None,
                selection_limit: 3,
            }]
        );
    }

    #[tokio::test]
    async fn test_picker_selection_replaces_grid() {
        let store = seeded_store(6);
        let (task, handle, _events) = start(&store, GalleryConfig::default());

        handle
            .send(Command::PickerFinished(vec![
                AssetId::new("p004"),
                AssetId::new("p001"),
            ]))
            .unwrap();
        handle.shutdown().unwrap();

        let sink = task.await.unwrap();
        assert_eq!(ids(sink.mirror.items()), vec!["p004", "p001"]);
    }

    #[tokio::test]
    async fn test_change_between_fetch_and_subscribe_is_not_lost() {
        let inserted = AtomicBool::new(false);
        let store = hooked_store(3, move |inner| {
            if !inserted.swap(true, Ordering::SeqCst) {
                inner
                    .insert_asset(&MediaAssetRef::new("late", MediaKind::Photo, 100))
                    .unwrap();
            }
        });
        let (task, handle, mut events) = start(&store, GalleryConfig::default());
        wait_for(&mut events, "reload").await;

        handle.load_more().unwrap();
        wait_for(&mut events, "reload").await;
        wait_for(&mut events, "diff").await;

        handle.shutdown().unwrap();
        let sink = task.await.unwrap();
        assert_eq!(store.inner.count_assets().unwrap(), 4);
        assert_eq!(ids(sink.mirror.items()), vec!["late", "p002", "p001", "p000"]);
    }

    #[tokio::test]
    async fn test_panicking_store_task_does_not_block_shutdown() {
        let store = hooked_store(3, |_| panic!("library crashed"));
        let (task, handle, _events) = start(&store, GalleryConfig::default());

        handle.load_more().unwrap();
        handle.shutdown().unwrap();

        let sink = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("runtime did not stop")
            .unwrap();
        assert!(sink.mirror.items().is_empty());
    }
}
