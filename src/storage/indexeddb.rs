use async_trait::async_trait;
use rexie::*;
use wasm_bindgen::JsValue;

use crate::error::{OfflineError, Result};
use crate::storage::Storage;
use crate::types::{PendingRequest, PendingScan, QrRecord, ScanStatus};

const DB_NAME: &str = "homesafe_offline";
const DB_VERSION: u32 = 1;

const STORE_REQUESTS: &str = "pending_requests";
const STORE_SCANS: &str = "pending_scans";
const STORE_QR: &str = "qr_data";

/// IndexedDB-backed store.
///
/// Records are stored as plain JS objects so IndexedDB's auto-increment
/// assigns the `id` key path on insert; each operation is one transaction,
/// committed with `tx.done()`, so a crash mid-write leaves no partial
/// record.
pub struct IndexedDbStorage {
    db: Rexie,
}

impl IndexedDbStorage {
    /// Idempotent open: creates the schema on first use. Fails with
    /// `StorageUnavailable` when the environment has no IndexedDB;
    /// callers disable offline features rather than crash.
    pub async fn open() -> Result<Self> {
        let db = Rexie::builder(DB_NAME)
            .version(DB_VERSION)
            .add_object_store(
                ObjectStore::new(STORE_REQUESTS)
                    .key_path("id")
                    .auto_increment(true)
                    .add_index(Index::new("timestamp", "timestamp")),
            )
            .add_object_store(
                ObjectStore::new(STORE_SCANS)
                    .key_path("id")
                    .auto_increment(true)
                    .add_index(Index::new("status", "status"))
                    .add_index(Index::new("timestamp", "timestamp")),
            )
            .add_object_store(
                ObjectStore::new(STORE_QR)
                    .key_path("id")
                    .add_index(Index::new("timestamp", "timestamp")),
            )
            .build()
            .await
            .map_err(|e| OfflineError::StorageUnavailable(e.to_string()))?;

        Ok(Self { db })
    }

    fn key_of(id: u32) -> JsValue {
        JsValue::from_f64(id as f64)
    }

    fn assigned_id(key: JsValue) -> Result<u32> {
        key.as_f64()
            .map(|k| k as u32)
            .ok_or_else(|| OfflineError::Storage("store returned a non-numeric key".to_string()))
    }
}

#[async_trait(?Send)]
impl Storage for IndexedDbStorage {
    async fn add_request(&self, request: &PendingRequest) -> Result<u32> {
        let tx = self
            .db
            .transaction(&[STORE_REQUESTS], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_REQUESTS)?;

        let value = serde_wasm_bindgen::to_value(request)?;
        let key = store.add(&value, None).await?;
        tx.done().await?;

        Self::assigned_id(key)
    }

    async fn get_requests(&self) -> Result<Vec<PendingRequest>> {
        let tx = self
            .db
            .transaction(&[STORE_REQUESTS], TransactionMode::ReadOnly)?;
        let store = tx.store(STORE_REQUESTS)?;

        let all = store.get_all(None, None).await?;

        let mut requests = Vec::new();
        for value in all {
            if let Ok(request) = serde_wasm_bindgen::from_value::<PendingRequest>(value) {
                requests.push(request);
            }
        }

        Ok(requests)
    }

    async fn delete_request(&self, id: u32) -> Result<()> {
        let tx = self
            .db
            .transaction(&[STORE_REQUESTS], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_REQUESTS)?;

        store.delete(Self::key_of(id)).await?;
        tx.done().await?;

        Ok(())
    }

    async fn add_scan(&self, scan: &PendingScan) -> Result<u32> {
        let tx = self
            .db
            .transaction(&[STORE_SCANS], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_SCANS)?;

        let value = serde_wasm_bindgen::to_value(scan)?;
        let key = store.add(&value, None).await?;
        tx.done().await?;

        Self::assigned_id(key)
    }

    async fn get_scan(&self, id: u32) -> Result<Option<PendingScan>> {
        let tx = self
            .db
            .transaction(&[STORE_SCANS], TransactionMode::ReadOnly)?;
        let store = tx.store(STORE_SCANS)?;

        let value = store.get(Self::key_of(id)).await?;

        match value {
            Some(v) => Ok(Some(serde_wasm_bindgen::from_value(v)?)),
            None => Ok(None),
        }
    }

    async fn put_scan(&self, scan: &PendingScan) -> Result<()> {
        let tx = self
            .db
            .transaction(&[STORE_SCANS], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_SCANS)?;

        let value = serde_wasm_bindgen::to_value(scan)?;
        store.put(&value, None).await?;
        tx.done().await?;

        Ok(())
    }

    async fn delete_scan(&self, id: u32) -> Result<()> {
        let tx = self
            .db
            .transaction(&[STORE_SCANS], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_SCANS)?;

        store.delete(Self::key_of(id)).await?;
        tx.done().await?;

        Ok(())
    }

    async fn scans_by_status(&self, status: ScanStatus) -> Result<Vec<PendingScan>> {
        let tx = self
            .db
            .transaction(&[STORE_SCANS], TransactionMode::ReadOnly)?;
        let store = tx.store(STORE_SCANS)?;

        // Full scan filtered in memory; queues stay small.
        let all = store.get_all(None, None).await?;

        let mut scans = Vec::new();
        for value in all {
            if let Ok(scan) = serde_wasm_bindgen::from_value::<PendingScan>(value) {
                if scan.status == status {
                    scans.push(scan);
                }
            }
        }

        Ok(scans)
    }

    async fn put_qr_record(&self, record: &QrRecord) -> Result<()> {
        let tx = self.db.transaction(&[STORE_QR], TransactionMode::ReadWrite)?;
        let store = tx.store(STORE_QR)?;

        let value = serde_wasm_bindgen::to_value(record)?;
        store.put(&value, None).await?;
        tx.done().await?;

        Ok(())
    }

    async fn qr_records(&self) -> Result<Vec<QrRecord>> {
        let tx = self.db.transaction(&[STORE_QR], TransactionMode::ReadOnly)?;
        let store = tx.store(STORE_QR)?;

        let all = store.get_all(None, None).await?;

        let mut records = Vec::new();
        for value in all {
            if let Ok(record) = serde_wasm_bindgen::from_value::<QrRecord>(value) {
                records.push(record);
            }
        }

        Ok(records)
    }
}
