pub mod connectivity;
pub mod error;
pub mod intercept;
pub mod queue;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod types;

mod time;

use std::rc::Rc;
use std::sync::Arc;

pub use connectivity::{ConnectivityHandle, ConnectivityMonitor, NetworkStatus};
pub use error::{OfflineError, Result};
pub use intercept::InterceptingClient;
pub use queue::OfflineQueue;
pub use sync::{SyncEngine, SYNC_TAG, UPLOAD_URL};
pub use transport::{Transport, WireBody, WireRequest, WireResponse};
pub use types::{NewScan, PendingRequest, PendingScan, QrRecord, RoomType, ScanStatus};

use crate::storage::Storage;
use crate::time::now_millis;

/// OfflineManager: the context object owning the offline core.
///
/// Built once by the application entry point and handed to the screens;
/// there is no ambient global state. Surrounding UI code is only allowed
/// to touch the members exposed here: enqueue, list-pending, retry,
/// delete, the badge subscription, and the intercepting fetch.
pub struct OfflineManager {
    storage: Arc<dyn Storage>,
    queue: OfflineQueue,
    engine: Rc<SyncEngine>,
    client: InterceptingClient,
    connectivity: ConnectivityHandle,
    monitor: ConnectivityMonitor,
}

impl OfflineManager {
    pub fn new(storage: Arc<dyn Storage>, transport: Arc<dyn Transport>) -> Self {
        let connectivity = ConnectivityHandle::detect();
        let queue = OfflineQueue::new(storage.clone());
        let engine = Rc::new(SyncEngine::new(
            queue.clone(),
            transport.clone(),
            connectivity.clone(),
        ));
        let client = InterceptingClient::new(transport, queue.clone(), connectivity.clone());
        let monitor = ConnectivityMonitor::new(connectivity.clone());

        Self {
            storage,
            queue,
            engine,
            client,
            connectivity,
            monitor,
        }
    }

    /// Opens IndexedDB and wires the browser fetch transport. Fails with
    /// `StorageUnavailable` when the environment cannot persist; the app
    /// then runs without offline features.
    #[cfg(target_arch = "wasm32")]
    pub async fn init() -> Result<Self> {
        let storage: Arc<dyn Storage> =
            Arc::new(storage::indexeddb::IndexedDbStorage::open().await?);
        let transport: Arc<dyn Transport> = Arc::new(transport::fetch::FetchTransport::new());
        Ok(Self::new(storage, transport))
    }

    /// Begins watching connectivity transitions. Became-online triggers
    /// one sync pass; repeated calls are ignored.
    pub fn start(&mut self) {
        let engine = self.engine.clone();
        self.monitor.start(move || spawn_pass(engine.clone()));
    }

    pub fn connectivity(&self) -> ConnectivityHandle {
        self.connectivity.clone()
    }

    /// Stores a scan for upload and, when currently online, kicks off a
    /// delivery attempt in the background.
    pub async fn enqueue_scan(&self, upload: NewScan) -> Result<u32> {
        let id = self.queue.enqueue_scan(upload).await?;
        self.engine.notify().await;
        if self.connectivity.is_online() {
            spawn_pass(self.engine.clone());
        }
        Ok(id)
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingScan>> {
        self.queue.list_pending().await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.queue.pending_count().await
    }

    /// Manual retry of one stored scan; the outcome (server ack or the
    /// rejection message) goes back to the caller for inline display.
    pub async fn retry(&self, id: u32) -> Result<serde_json::Value> {
        self.engine.retry_scan(id).await
    }

    pub async fn delete(&self, id: u32) -> Result<()> {
        self.queue.remove(id).await?;
        self.engine.notify().await;
        Ok(())
    }

    /// Outbound application-data request with the offline fallback of the
    /// interception layer.
    pub async fn fetch(&self, request: WireRequest) -> Result<WireResponse> {
        self.client.fetch(request).await
    }

    /// Runs one sync pass now. No-op (with no side effects) while offline.
    pub async fn sync_now(&self) -> Result<()> {
        self.engine.sync_pass().await
    }

    /// Routes the environment's background-sync signal by tag.
    pub async fn handle_sync_signal(&self, tag: &str) {
        self.engine.handle_sync_signal(tag).await
    }

    /// Badge/list refresh subscription, called with the pending count.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(usize) + 'static,
    {
        self.engine.subscribe(observer)
    }

    /// Caches a generated QR health-data payload so the card stays
    /// viewable offline. Keyed by the caller, unrelated to the sync queue.
    pub async fn save_qr_record(&self, id: &str, data: serde_json::Value) -> Result<()> {
        let record = QrRecord {
            id: id.to_string(),
            data,
            timestamp: now_millis(),
        };
        self.storage.put_qr_record(&record).await
    }

    pub async fn qr_records(&self) -> Result<Vec<QrRecord>> {
        self.storage.qr_records().await
    }
}

#[cfg(target_arch = "wasm32")]
fn spawn_pass(engine: Rc<SyncEngine>) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(error) = engine.sync_pass().await {
            log::error!("sync pass failed: {}", error);
        }
    });
}

/// Outside the browser there is no event loop to hand the pass to;
/// native callers (tests) drive `sync_now` directly.
#[cfg(not(target_arch = "wasm32"))]
fn spawn_pass(_engine: Rc<SyncEngine>) {}
