#[cfg(target_arch = "wasm32")]
pub mod indexeddb;
pub mod mock;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PendingRequest, PendingScan, QrRecord, ScanStatus};

/// Durable record store abstraction.
///
/// One logical table per item kind, each record keyed by a store-assigned
/// id. WASM is single-threaded, so no `Send + Sync` requirement; the mock
/// implementation backs native tests.
///
/// Callers always read a fresh copy before mutating (`get_scan` then
/// `put_scan`) so interleaved sync passes never overwrite each other with
/// stale state.
#[async_trait(?Send)]
pub trait Storage {
    /// Persists a deferred request, returns the assigned id.
    async fn add_request(&self, request: &PendingRequest) -> Result<u32>;

    /// All deferred requests, store order.
    async fn get_requests(&self) -> Result<Vec<PendingRequest>>;

    /// Removes a deferred request. Absent id is not an error.
    async fn delete_request(&self, id: u32) -> Result<()>;

    /// Persists a scan, returns the assigned id.
    async fn add_scan(&self, scan: &PendingScan) -> Result<u32>;

    /// Fetches one scan by id.
    async fn get_scan(&self, id: u32) -> Result<Option<PendingScan>>;

    /// Full-record replace, used for status transitions.
    async fn put_scan(&self, scan: &PendingScan) -> Result<()>;

    /// Removes a scan. Absent id is not an error: deletes race with sync
    /// completion by design.
    async fn delete_scan(&self, id: u32) -> Result<()>;

    /// All scans with the given status, order unspecified.
    async fn scans_by_status(&self, status: ScanStatus) -> Result<Vec<PendingScan>>;

    /// Upserts a cached QR payload (externally keyed).
    async fn put_qr_record(&self, record: &QrRecord) -> Result<()>;

    /// All cached QR payloads.
    async fn qr_records(&self) -> Result<Vec<QrRecord>>;
}
