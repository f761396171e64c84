use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

use crate::connectivity::ConnectivityHandle;
use crate::error::{OfflineError, Result};
use crate::queue::{decode_payload, OfflineQueue};
use crate::transport::{MultipartScan, Transport, WireBody, WireRequest};
use crate::types::{PendingScan, ScanStatus};

/// Background-sync tag registered by the service worker; any other tag
/// is ignored.
pub const SYNC_TAG: &str = "sync-requests";

/// Upload endpoint for room scans.
pub const UPLOAD_URL: &str = "/api/room-scan";

/// Drains the pending-item queue against the network.
///
/// Items are processed strictly one at a time to bound upload bandwidth;
/// a per-item in-flight set keeps overlapping passes (became-online and a
/// background signal firing together) from submitting the same scan
/// twice. Failures never abort a pass and are reflected as item status,
/// not surfaced to observers.
pub struct SyncEngine {
    queue: OfflineQueue,
    transport: Arc<dyn Transport>,
    connectivity: ConnectivityHandle,
    in_flight: RefCell<HashSet<u32>>,
    observers: RefCell<Vec<Rc<dyn Fn(usize)>>>,
}

impl SyncEngine {
    pub fn new(
        queue: OfflineQueue,
        transport: Arc<dyn Transport>,
        connectivity: ConnectivityHandle,
    ) -> Self {
        Self {
            queue,
            transport,
            connectivity,
            in_flight: RefCell::new(HashSet::new()),
            observers: RefCell::new(Vec::new()),
        }
    }

    /// One full sweep over pending and error scans, then the deferred
    /// generic requests. Aborts with no side effects when connectivity
    /// is not known to be online.
    pub async fn sync_pass(&self) -> Result<()> {
        if !self.connectivity.is_online() {
            log::debug!("sync pass skipped: not online");
            return Ok(());
        }

        let scans = self.queue.list_pending().await?;
        if !scans.is_empty() {
            log::info!("syncing {} pending scan(s)", scans.len());
        }

        for scan in scans {
            let id = match scan.id {
                Some(id) => id,
                None => continue,
            };
            if !self.in_flight.borrow_mut().insert(id) {
                log::debug!("scan #{} already in flight, skipping", id);
                continue;
            }
            let outcome = self.attempt_upload(&scan).await;
            self.in_flight.borrow_mut().remove(&id);

            match outcome {
                Ok(ack) => self.finish_synced(id, ack).await,
                Err(error) => self.finish_failed(id, &error).await,
            }
        }

        self.replay_requests().await;
        self.notify().await;
        Ok(())
    }

    /// Manual per-item retry. Unlike the background pass, the outcome is
    /// returned so the UI can show the server's message inline; a success
    /// still removes the record.
    pub async fn retry_scan(&self, id: u32) -> Result<serde_json::Value> {
        let scan = self
            .queue
            .get_scan(id)
            .await?
            .ok_or(OfflineError::NotFound(id))?;

        if !self.in_flight.borrow_mut().insert(id) {
            return Err(OfflineError::Transport(
                "an upload for this scan is already in progress".to_string(),
            ));
        }
        let outcome = self.attempt_upload(&scan).await;
        self.in_flight.borrow_mut().remove(&id);

        match outcome {
            Ok(ack) => {
                self.finish_synced(id, ack.clone()).await;
                self.notify().await;
                Ok(ack)
            }
            Err(error) => {
                self.finish_failed(id, &error).await;
                self.notify().await;
                Err(error)
            }
        }
    }

    /// Entry point for the environment's background-sync signal. Fires
    /// with no UI caller awaiting it, so failures end up in the log and
    /// on item status only.
    pub async fn handle_sync_signal(&self, tag: &str) {
        if tag != SYNC_TAG {
            log::debug!("ignoring sync signal with tag {:?}", tag);
            return;
        }
        if let Err(error) = self.sync_pass().await {
            log::error!("background sync failed: {}", error);
        }
    }

    /// Registers a badge/list refresh observer, called with the pending
    /// count after every pass and every manual mutation.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(usize) + 'static,
    {
        self.observers.borrow_mut().push(Rc::new(observer));
    }

    pub async fn notify(&self) {
        let count = match self.queue.pending_count().await {
            Ok(count) => count,
            Err(error) => {
                log::error!("failed to count pending items: {}", error);
                return;
            }
        };
        // The borrow is released before each call so an observer may
        // subscribe (or trigger another notification) without tripping
        // the RefCell guard. Observers added mid-notification are first
        // called on the next one.
        let len = self.observers.borrow().len();
        for i in 0..len {
            let observer = self.observers.borrow()[i].clone();
            observer(count);
        }
    }

    async fn attempt_upload(&self, scan: &PendingScan) -> Result<serde_json::Value> {
        let bytes = decode_payload(scan)?;

        let request = WireRequest::new(UPLOAD_URL, "POST").with_body(WireBody::Multipart(
            MultipartScan {
                room_type: scan.room_type,
                file_name: scan.file_name.clone(),
                file_type: scan.file_type.clone(),
                bytes,
                notes: scan.notes.clone(),
            },
        ));

        let response = self.transport.send(&request).await?;
        if response.is_success() {
            // Acknowledgment body is opaque; a non-JSON body is kept as
            // a plain string value.
            Ok(response
                .json()
                .unwrap_or(serde_json::Value::String(response.body.clone())))
        } else {
            Err(OfflineError::ServerRejected(response.error_detail()))
        }
    }

    async fn finish_synced(&self, id: u32, ack: serde_json::Value) {
        match self
            .queue
            .update_status(id, ScanStatus::Synced, Some(ack))
            .await
        {
            Ok(()) => {}
            // Deleted under us by a concurrent path; nothing left to do.
            Err(OfflineError::NotFound(_)) => return,
            Err(error) => {
                log::error!("failed to mark scan #{} synced: {}", id, error);
                return;
            }
        }

        // Synced records are not retained.
        if let Err(error) = self.queue.remove(id).await {
            log::error!("failed to delete synced scan #{}: {}", id, error);
        }
        log::info!("scan #{} synced", id);
    }

    async fn finish_failed(&self, id: u32, error: &OfflineError) {
        log::warn!("scan #{} upload failed: {}", id, error);
        match self.queue.record_failure(id, &error.to_string()).await {
            Ok(()) | Err(OfflineError::NotFound(_)) => {}
            Err(error) => log::error!("failed to record failure for scan #{}: {}", id, error),
        }
    }

    /// Replays generic deferred requests: deleted on 2xx, left in place
    /// for the next pass otherwise.
    async fn replay_requests(&self) {
        let requests = match self.queue.pending_requests().await {
            Ok(requests) => requests,
            Err(error) => {
                log::error!("failed to load deferred requests: {}", error);
                return;
            }
        };

        for deferred in requests {
            let id = match deferred.id {
                Some(id) => id,
                None => continue,
            };

            let mut wire = WireRequest::new(&deferred.url, &deferred.method);
            wire.headers = deferred.headers.clone();
            if let Some(body) = deferred.body.clone() {
                wire.body = WireBody::Text(body);
            }

            match self.transport.send(&wire).await {
                Ok(response) if response.is_success() => {
                    if let Err(error) = self.queue.remove_request(id).await {
                        log::error!("failed to delete replayed request #{}: {}", id, error);
                    } else {
                        log::info!("replayed deferred request #{}", id);
                    }
                }
                Ok(response) => {
                    log::warn!("deferred request #{} got {}", id, response.status);
                }
                Err(error) => {
                    log::warn!("deferred request #{} failed: {}", id, error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::NetworkStatus;
    use crate::storage::mock::MockStorage;
    use crate::transport::mock::MockTransport;
    use crate::types::NewScan;

    struct Harness {
        storage: MockStorage,
        transport: Arc<MockTransport>,
        connectivity: ConnectivityHandle,
        queue: OfflineQueue,
        engine: SyncEngine,
    }

    fn harness(status: NetworkStatus) -> Harness {
        let storage = MockStorage::new();
        let transport = Arc::new(MockTransport::new());
        let connectivity = ConnectivityHandle::new(status);
        let queue = OfflineQueue::new(Arc::new(storage.clone()));
        let engine = SyncEngine::new(queue.clone(), transport.clone(), connectivity.clone());
        Harness {
            storage,
            transport,
            connectivity,
            queue,
            engine,
        }
    }

    fn scan(room: &str) -> NewScan {
        NewScan {
            room_type: room.to_string(),
            file_name: "scan.jpg".to_string(),
            file_type: "image/jpeg".to_string(),
            bytes: vec![1, 2, 3],
            notes: None,
        }
    }

    #[tokio::test]
    async fn offline_pass_has_no_side_effects() {
        let h = harness(NetworkStatus::Offline);
        h.queue.enqueue_scan(scan("bedroom")).await.unwrap();
        let writes_before = h.storage.write_count();

        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.transport.sent_count(), 0);
        assert_eq!(h.storage.write_count(), writes_before);
        assert_eq!(h.queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_connectivity_also_skips_the_pass() {
        let h = harness(NetworkStatus::Unknown);
        h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn successful_upload_removes_the_record() {
        let h = harness(NetworkStatus::Online);
        let id = h.queue.enqueue_scan(scan("bedroom")).await.unwrap();
        h.transport.respond_with(200, r#"{"scanId":"srv-1"}"#);

        h.engine.sync_pass().await.unwrap();

        assert!(h.queue.get_scan(id).await.unwrap().is_none());
        assert!(h.queue.list_pending().await.unwrap().is_empty());

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, UPLOAD_URL);
        assert_eq!(sent[0].method, "POST");
        match &sent[0].body {
            WireBody::Multipart(m) => {
                assert_eq!(m.room_type.as_str(), "bedroom");
                assert_eq!(m.file_name, "scan.jpg");
                assert_eq!(m.bytes, vec![1, 2, 3]);
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejected_upload_records_error_without_duplicating() {
        let h = harness(NetworkStatus::Online);
        let id = h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        h.transport
            .respond_with(422, r#"{"detail":"unsupported file type"}"#);
        h.engine.sync_pass().await.unwrap();

        let pending = h.queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, Some(id));
        assert_eq!(pending[0].status, ScanStatus::Error);
        assert_eq!(pending[0].retry_count, Some(1));
        assert_eq!(
            pending[0].response.as_ref().unwrap()["error"],
            "unsupported file type"
        );

        // Error items are retried every pass; a second failure only
        // increments the count.
        h.transport.fail_with("connection reset");
        h.engine.sync_pass().await.unwrap();

        let pending = h.queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retry_count, Some(2));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_pass() {
        let h = harness(NetworkStatus::Online);
        let a = h.queue.enqueue_scan(scan("bedroom")).await.unwrap();
        let b = h.queue.enqueue_scan(scan("stairs")).await.unwrap();

        h.transport.respond_with(500, "oops");
        h.transport.respond_with(200, "{}");
        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.transport.sent_count(), 2);
        assert!(h.queue.get_scan(b).await.unwrap().is_none());
        let remaining = h.queue.get_scan(a).await.unwrap().unwrap();
        assert_eq!(remaining.status, ScanStatus::Error);
    }

    #[tokio::test]
    async fn deferred_requests_are_replayed_and_deleted_on_success() {
        let h = harness(NetworkStatus::Online);
        h.queue
            .enqueue_request(
                "/api/health-data",
                "POST",
                Default::default(),
                Some(r#"{"age":80}"#.to_string()),
            )
            .await
            .unwrap();

        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.transport.sent_count(), 1);
        assert!(h.queue.pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_replay_leaves_the_request_queued() {
        let h = harness(NetworkStatus::Online);
        h.queue
            .enqueue_request("/api/health-data", "POST", Default::default(), None)
            .await
            .unwrap();

        h.transport.fail_with("dns failure");
        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.queue.pending_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn observers_get_the_fresh_pending_count() {
        let h = harness(NetworkStatus::Online);
        h.queue.enqueue_scan(scan("bedroom")).await.unwrap();
        h.queue.enqueue_scan(scan("bathroom")).await.unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        h.engine.subscribe(move |count| sink.borrow_mut().push(count));

        h.transport.respond_with(200, "{}");
        h.transport.respond_with(500, "oops");
        h.engine.sync_pass().await.unwrap();

        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[tokio::test]
    async fn observer_may_subscribe_during_notification() {
        let storage = MockStorage::new();
        let queue = OfflineQueue::new(Arc::new(storage));
        let connectivity = ConnectivityHandle::new(NetworkStatus::Online);
        let engine = Rc::new(SyncEngine::new(
            queue.clone(),
            Arc::new(MockTransport::new()),
            connectivity,
        ));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let weak = Rc::downgrade(&engine);
        engine.subscribe(move |_| {
            if let Some(engine) = weak.upgrade() {
                let sink = sink.clone();
                engine.subscribe(move |count| sink.borrow_mut().push(count));
            }
        });

        engine.notify().await;
        engine.notify().await;

        // The observer added during the first notification only hears
        // the second one.
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[tokio::test]
    async fn manual_retry_surfaces_the_server_message() {
        let h = harness(NetworkStatus::Online);
        let id = h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        h.transport
            .respond_with(413, r#"{"detail":"file too large"}"#);
        let err = h.engine.retry_scan(id).await.unwrap_err();
        assert!(matches!(err, OfflineError::ServerRejected(ref m) if m == "file too large"));

        h.transport.respond_with(201, r#"{"scanId":"srv-9"}"#);
        let ack = h.engine.retry_scan(id).await.unwrap();
        assert_eq!(ack["scanId"], "srv-9");
        assert!(h.queue.get_scan(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_of_a_vanished_scan_is_not_found() {
        let h = harness(NetworkStatus::Online);
        let err = h.engine.retry_scan(7).await.unwrap_err();
        assert!(matches!(err, OfflineError::NotFound(7)));
    }

    #[tokio::test]
    async fn sync_signal_routes_only_the_known_tag() {
        let h = harness(NetworkStatus::Online);
        h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        h.engine.handle_sync_signal("unrelated-tag").await;
        assert_eq!(h.transport.sent_count(), 0);

        h.engine.handle_sync_signal(SYNC_TAG).await;
        assert_eq!(h.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn corrupt_payload_is_recorded_as_error_not_sent() {
        let h = harness(NetworkStatus::Online);
        let id = h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        // Corrupt the stored payload behind the queue's back.
        use crate::storage::Storage as _;
        let mut stored = h.storage.get_scan(id).await.unwrap().unwrap();
        stored.scan_data = "!!not-base64!!".to_string();
        h.storage.put_scan(&stored).await.unwrap();

        h.engine.sync_pass().await.unwrap();

        assert_eq!(h.transport.sent_count(), 0);
        let scan = h.queue.get_scan(id).await.unwrap().unwrap();
        assert_eq!(scan.status, ScanStatus::Error);
        assert_eq!(scan.retry_count, Some(1));
    }

    #[tokio::test]
    async fn connectivity_flip_mid_session_gates_the_next_pass() {
        let h = harness(NetworkStatus::Online);
        h.queue.enqueue_scan(scan("bedroom")).await.unwrap();

        h.connectivity.set(NetworkStatus::Offline);
        h.engine.sync_pass().await.unwrap();
        assert_eq!(h.transport.sent_count(), 0);

        h.connectivity.set(NetworkStatus::Online);
        h.transport.respond_with(200, "{}");
        h.engine.sync_pass().await.unwrap();
        assert_eq!(h.transport.sent_count(), 1);
    }
}
