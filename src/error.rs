use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    /// The environment has no usable persistence substrate (no IndexedDB).
    /// Offline features must be disabled, the rest of the app keeps working.
    #[error("offline storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// A required scan field is missing or malformed. Surfaced inline to
    /// the submitting user, never recorded on an item.
    #[error("invalid scan: {0}")]
    InvalidScan(String),

    /// The record vanished under a concurrent delete. Benign for callers.
    #[error("record not found: {0}")]
    NotFound(u32),

    #[error("network error: {0}")]
    Transport(String),

    /// Non-2xx response with a server-provided message.
    #[error("{0}")]
    ServerRejected(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for OfflineError {
    fn from(error: serde_json::Error) -> Self {
        OfflineError::Parse(error.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for OfflineError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        if let Some(s) = value.as_string() {
            OfflineError::Storage(s)
        } else {
            OfflineError::Storage(format!("{:?}", value))
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl From<rexie::Error> for OfflineError {
    fn from(error: rexie::Error) -> Self {
        OfflineError::Storage(error.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<serde_wasm_bindgen::Error> for OfflineError {
    fn from(error: serde_wasm_bindgen::Error) -> Self {
        OfflineError::Parse(error.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<gloo_net::Error> for OfflineError {
    fn from(error: gloo_net::Error) -> Self {
        OfflineError::Transport(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
