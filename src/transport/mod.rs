#[cfg(target_arch = "wasm32")]
pub mod fetch;
pub mod mock;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RoomType;

/// An outbound request, independent of the browser fetch API so the
/// sync engine and interception layer can be exercised natively.
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: WireBody,
}

impl WireRequest {
    pub fn new(url: &str, method: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_ascii_uppercase(),
            headers: HashMap::new(),
            body: WireBody::None,
        }
    }

    pub fn with_body(mut self, body: WireBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub enum WireBody {
    None,
    Text(String),
    /// Multipart scan upload: `roomType`, `scanFile` (with filename and
    /// MIME type), optional `notes`.
    Multipart(MultipartScan),
}

#[derive(Debug, Clone)]
pub struct MultipartScan {
    pub room_type: RoomType,
    pub file_name: String,
    pub file_type: String,
    pub bytes: Vec<u8>,
    pub notes: Option<String>,
}

/// A completed HTTP exchange. Transport-level failures (DNS, aborted
/// connection, offline) are `Err(Transport)` instead; a served non-2xx
/// is still an `Ok` response.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: String,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Error message for a rejected request: the server's `detail`
    /// string when the body carries one, a generic status line otherwise.
    pub fn error_detail(&self) -> String {
        if let Ok(value) = self.json() {
            if let Some(detail) = value.get("detail").and_then(|d| d.as_str()) {
                return detail.to_string();
            }
        }
        format!("server returned {}", self.status)
    }
}

/// Network seam. The wasm implementation wraps fetch; tests script a
/// mock, the same split the storage layer uses.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse>;
}
