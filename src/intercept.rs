use std::sync::Arc;

use crate::connectivity::ConnectivityHandle;
use crate::error::Result;
use crate::queue::OfflineQueue;
use crate::transport::{Transport, WireBody, WireRequest, WireResponse};

/// Path prefix of the application's own API surface. Everything else
/// passes through untouched.
pub const API_PREFIX: &str = "/api/";

/// Offline fallback for outbound application-data requests.
///
/// The real network call always runs first. Only when the transport
/// itself fails while the monitor reports offline is the request stored
/// and a synthetic "queued" 202 returned.
pub struct InterceptingClient {
    transport: Arc<dyn Transport>,
    queue: OfflineQueue,
    connectivity: ConnectivityHandle,
}

impl InterceptingClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        queue: OfflineQueue,
        connectivity: ConnectivityHandle,
    ) -> Self {
        Self {
            transport,
            queue,
            connectivity,
        }
    }

    pub async fn fetch(&self, request: WireRequest) -> Result<WireResponse> {
        if !request.url.starts_with(API_PREFIX) {
            return self.transport.send(&request).await;
        }

        match self.transport.send(&request).await {
            Ok(response) => Ok(response),
            Err(error) => {
                // A stale handle must never swallow a real failure: queue
                // only when the monitor agrees we are offline. Multipart
                // bodies never reach this path (the scan queue persists
                // them before any network attempt).
                let queueable = !matches!(request.body, WireBody::Multipart(_));
                if self.connectivity.is_offline() && queueable {
                    self.queue_for_later(&request).await
                } else {
                    Err(error)
                }
            }
        }
    }

    async fn queue_for_later(&self, request: &WireRequest) -> Result<WireResponse> {
        let body = match &request.body {
            WireBody::Text(text) => Some(text.clone()),
            _ => None,
        };
        let id = self
            .queue
            .enqueue_request(&request.url, &request.method, request.headers.clone(), body)
            .await?;

        log::info!("offline: queued {} {}", request.method, request.url);

        let body = serde_json::json!({
            "success": false,
            "message": "Request queued for when you are back online",
            "queued": true,
            "id": id,
        });
        Ok(WireResponse {
            status: 202,
            body: body.to_string(),
        })
    }
}
