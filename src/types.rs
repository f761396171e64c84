use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OfflineError, Result};

/// Room categories accepted by the scan upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Bedroom,
    Bathroom,
    Living,
    Hallway,
    Stairs,
}

impl RoomType {
    /// Parses user input. Empty or unknown values are an `InvalidScan`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(OfflineError::InvalidScan("room type is required".to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "bedroom" => Ok(RoomType::Bedroom),
            "bathroom" => Ok(RoomType::Bathroom),
            "living" => Ok(RoomType::Living),
            "hallway" => Ok(RoomType::Hallway),
            "stairs" => Ok(RoomType::Stairs),
            other => Err(OfflineError::InvalidScan(format!(
                "unknown room type: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Bedroom => "bedroom",
            RoomType::Bathroom => "bathroom",
            RoomType::Living => "living",
            RoomType::Hallway => "hallway",
            RoomType::Stairs => "stairs",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a stored scan.
///
/// `Synced` is terminal (the record is deleted right after it is set).
/// `Error` stays retry-eligible: sync sweeps pick it up alongside
/// `Pending` every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Synced,
    Error,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Synced => "synced",
            ScanStatus::Error => "error",
        }
    }
}

/// A room scan waiting for upload, as persisted.
///
/// Field names serialize in camelCase: that is the record schema the
/// store has always held, and reloads must keep reading it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingScan {
    /// Assigned by the store on insert; `None` before that.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub room_type: RoomType,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    /// File payload, base64-encoded for storage. Decoded back to bytes
    /// just before transmission.
    pub scan_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time, unix millis.
    pub timestamp: i64,
    pub status: ScanStatus,
    /// Present only after at least one failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Present only after at least one attempt, unix millis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<i64>,
    /// Server acknowledgment (or error detail), opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// A generic API request deferred while offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    /// `None` for bodiless methods.
    pub body: Option<String>,
    pub timestamp: i64,
}

/// Cached QR health-data payload, keyed by the caller. Unrelated to the
/// sync engine; survives reloads so generated cards stay viewable offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrRecord {
    pub id: String,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

/// Input to `OfflineQueue::enqueue_scan`. Room type arrives as raw form
/// input and is validated there.
#[derive(Debug, Clone)]
pub struct NewScan {
    pub room_type: String,
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_type_parse_is_case_insensitive() {
        assert_eq!(RoomType::parse("Bedroom").unwrap(), RoomType::Bedroom);
        assert_eq!(RoomType::parse("  stairs ").unwrap(), RoomType::Stairs);
    }

    #[test]
    fn room_type_rejects_empty_and_unknown() {
        assert!(matches!(
            RoomType::parse(""),
            Err(OfflineError::InvalidScan(_))
        ));
        assert!(matches!(
            RoomType::parse("garage"),
            Err(OfflineError::InvalidScan(_))
        ));
    }

    #[test]
    fn scan_serializes_camel_case_without_absent_fields() {
        let scan = PendingScan {
            id: None,
            room_type: RoomType::Bedroom,
            file_name: "scan.jpg".to_string(),
            file_type: "image/jpeg".to_string(),
            file_size: 3,
            scan_data: "YWJj".to_string(),
            notes: None,
            timestamp: 1,
            status: ScanStatus::Pending,
            retry_count: None,
            last_attempt: None,
            response: None,
        };
        let json = serde_json::to_value(&scan).unwrap();
        assert_eq!(json["roomType"], "bedroom");
        assert_eq!(json["status"], "pending");
        assert!(json.get("id").is_none());
        assert!(json.get("retryCount").is_none());
        assert!(json.get("lastAttempt").is_none());
    }
}
