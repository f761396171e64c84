use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::{OfflineError, Result};
use crate::storage::Storage;
use crate::time::now_millis;
use crate::types::{NewScan, PendingRequest, PendingScan, RoomType, ScanStatus};

/// Domain layer over the durable store: the pending-item queue.
///
/// Holds no record state. Every mutation re-fetches a fresh copy by id,
/// so interleaved callers never overwrite each other.
#[derive(Clone)]
pub struct OfflineQueue {
    storage: Arc<dyn Storage>,
}

impl OfflineQueue {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Stores a deferred API request for replay once connectivity
    /// returns. The body is only captured for methods that carry one.
    pub async fn enqueue_request(
        &self,
        url: &str,
        method: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Result<u32> {
        let method = method.to_ascii_uppercase();
        let body = if matches!(method.as_str(), "GET" | "HEAD") {
            None
        } else {
            body
        };

        let request = PendingRequest {
            id: None,
            url: url.to_string(),
            method,
            headers,
            body,
            timestamp: now_millis(),
        };

        let id = self.storage.add_request(&request).await?;
        log::info!("queued request {} {} as #{}", request.method, url, id);
        Ok(id)
    }

    /// Validates and stores a room scan with `status = pending`.
    /// The payload is base64-encoded for storage and decoded back to
    /// bytes at transmission time.
    pub async fn enqueue_scan(&self, upload: NewScan) -> Result<u32> {
        let room_type = RoomType::parse(&upload.room_type)?;
        if upload.bytes.is_empty() {
            return Err(OfflineError::InvalidScan(
                "a scan file is required".to_string(),
            ));
        }

        let scan = PendingScan {
            id: None,
            room_type,
            file_name: upload.file_name,
            file_type: upload.file_type,
            file_size: upload.bytes.len() as u64,
            scan_data: BASE64.encode(&upload.bytes),
            notes: upload.notes.filter(|n| !n.trim().is_empty()),
            timestamp: now_millis(),
            status: ScanStatus::Pending,
            retry_count: None,
            last_attempt: None,
            response: None,
        };

        let id = self.storage.add_scan(&scan).await?;
        log::info!("queued {} scan {} as #{}", room_type, scan.file_name, id);
        Ok(id)
    }

    /// Scans awaiting delivery: `pending` plus `error` (error items stay
    /// retry-eligible). Sorted by creation time since store order is
    /// unspecified.
    pub async fn list_pending(&self) -> Result<Vec<PendingScan>> {
        let mut scans = self.storage.scans_by_status(ScanStatus::Pending).await?;
        scans.extend(self.storage.scans_by_status(ScanStatus::Error).await?);
        // Ids tiebreak equal timestamps so two saves within the same
        // millisecond still list in insertion order.
        scans.sort_by_key(|s| (s.timestamp, s.id));
        Ok(scans)
    }

    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.list_pending().await?.len())
    }

    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>> {
        self.storage.get_requests().await
    }

    pub async fn get_scan(&self, id: u32) -> Result<Option<PendingScan>> {
        self.storage.get_scan(id).await
    }

    /// Read-modify-write status transition. `NotFound` when the record
    /// was already deleted by a concurrent path; callers treat that as a
    /// benign no-op.
    pub async fn update_status(
        &self,
        id: u32,
        status: ScanStatus,
        response: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut scan = self
            .storage
            .get_scan(id)
            .await?
            .ok_or(OfflineError::NotFound(id))?;

        scan.status = status;
        if response.is_some() {
            scan.response = response;
        }
        self.storage.put_scan(&scan).await
    }

    /// Records a failed delivery attempt: `error` status, retry count
    /// incremented, attempt time stamped, message kept for the UI.
    pub async fn record_failure(&self, id: u32, message: &str) -> Result<()> {
        let mut scan = self
            .storage
            .get_scan(id)
            .await?
            .ok_or(OfflineError::NotFound(id))?;

        scan.status = ScanStatus::Error;
        scan.retry_count = Some(scan.retry_count.unwrap_or(0) + 1);
        scan.last_attempt = Some(now_millis());
        scan.response = Some(serde_json::json!({ "error": message }));
        self.storage.put_scan(&scan).await
    }

    /// Idempotent delete: removing an absent id is not an error.
    pub async fn remove(&self, id: u32) -> Result<()> {
        self.storage.delete_scan(id).await
    }

    pub async fn remove_request(&self, id: u32) -> Result<()> {
        self.storage.delete_request(id).await
    }
}

/// Decodes a stored scan payload back to raw bytes.
pub(crate) fn decode_payload(scan: &PendingScan) -> Result<Vec<u8>> {
    BASE64
        .decode(&scan.scan_data)
        .map_err(|e| OfflineError::Parse(format!("scan #{:?} payload: {}", scan.id, e)))
}
