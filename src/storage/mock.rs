use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{PendingRequest, PendingScan, QrRecord, ScanStatus};

/// In-memory Storage implementation for tests.
///
/// Clones share the same underlying tables, which lets a test hand the
/// "same database" to a second queue to simulate a page reload. Every
/// mutating operation bumps `write_count` so tests can assert that an
/// aborted sync pass touched nothing.
#[derive(Clone)]
pub struct MockStorage {
    requests: Arc<Mutex<Vec<PendingRequest>>>,
    scans: Arc<Mutex<Vec<PendingScan>>>,
    qr: Arc<Mutex<Vec<QrRecord>>>,
    next_request_id: Arc<Mutex<u32>>,
    next_scan_id: Arc<Mutex<u32>>,
    write_count: Arc<Mutex<usize>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            scans: Arc::new(Mutex::new(Vec::new())),
            qr: Arc::new(Mutex::new(Vec::new())),
            next_request_id: Arc::new(Mutex::new(1)),
            next_scan_id: Arc::new(Mutex::new(1)),
            write_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Number of mutating operations performed so far.
    pub fn write_count(&self) -> usize {
        *self.write_count.lock().unwrap()
    }

    fn record_write(&self) {
        *self.write_count.lock().unwrap() += 1;
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Storage for MockStorage {
    async fn add_request(&self, request: &PendingRequest) -> Result<u32> {
        let mut next = self.next_request_id.lock().unwrap();
        let id = *next;
        *next += 1;

        let mut stored = request.clone();
        stored.id = Some(id);
        self.requests.lock().unwrap().push(stored);
        self.record_write();
        Ok(id)
    }

    async fn get_requests(&self) -> Result<Vec<PendingRequest>> {
        Ok(self.requests.lock().unwrap().clone())
    }

    async fn delete_request(&self, id: u32) -> Result<()> {
        self.requests.lock().unwrap().retain(|r| r.id != Some(id));
        self.record_write();
        Ok(())
    }

    async fn add_scan(&self, scan: &PendingScan) -> Result<u32> {
        let mut next = self.next_scan_id.lock().unwrap();
        let id = *next;
        *next += 1;

        let mut stored = scan.clone();
        stored.id = Some(id);
        self.scans.lock().unwrap().push(stored);
        self.record_write();
        Ok(id)
    }

    async fn get_scan(&self, id: u32) -> Result<Option<PendingScan>> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == Some(id))
            .cloned())
    }

    async fn put_scan(&self, scan: &PendingScan) -> Result<()> {
        let mut scans = self.scans.lock().unwrap();
        if let Some(existing) = scans.iter_mut().find(|s| s.id == scan.id) {
            *existing = scan.clone();
        }
        self.record_write();
        Ok(())
    }

    async fn delete_scan(&self, id: u32) -> Result<()> {
        self.scans.lock().unwrap().retain(|s| s.id != Some(id));
        self.record_write();
        Ok(())
    }

    async fn scans_by_status(&self, status: ScanStatus) -> Result<Vec<PendingScan>> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn put_qr_record(&self, record: &QrRecord) -> Result<()> {
        let mut qr = self.qr.lock().unwrap();
        if let Some(existing) = qr.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            qr.push(record.clone());
        }
        self.record_write();
        Ok(())
    }

    async fn qr_records(&self) -> Result<Vec<QrRecord>> {
        Ok(self.qr.lock().unwrap().clone())
    }
}
