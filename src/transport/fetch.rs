use async_trait::async_trait;
use gloo_net::http::{Method, RequestBuilder};

use crate::error::{OfflineError, Result};
use crate::transport::{MultipartScan, Transport, WireBody, WireRequest, WireResponse};

/// Browser fetch implementation of the network seam.
pub struct FetchTransport;

impl FetchTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FetchTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Transport for FetchTransport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse> {
        let mut builder =
            RequestBuilder::new(&request.url).method(parse_method(&request.method)?);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = match &request.body {
            WireBody::None => builder.send().await?,
            WireBody::Text(text) => builder.body(text.clone())?.send().await?,
            WireBody::Multipart(scan) => builder.body(form_data(scan)?)?.send().await?,
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(WireResponse { status, body })
    }
}

fn parse_method(method: &str) -> Result<Method> {
    match method {
        "GET" => Ok(Method::GET),
        "HEAD" => Ok(Method::HEAD),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "OPTIONS" => Ok(Method::OPTIONS),
        other => Err(OfflineError::Transport(format!(
            "unsupported method: {}",
            other
        ))),
    }
}

/// Builds the multipart form the upload endpoint expects: `roomType`,
/// `scanFile` carrying the decoded bytes with original filename and MIME
/// type, and `notes` when present.
fn form_data(scan: &MultipartScan) -> Result<web_sys::FormData> {
    let form = web_sys::FormData::new().map_err(OfflineError::from)?;

    form.append_with_str("roomType", scan.room_type.as_str())
        .map_err(OfflineError::from)?;

    let parts = js_sys::Array::new();
    parts.push(&js_sys::Uint8Array::from(scan.bytes.as_slice()));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type(&scan.file_type);
    let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
        .map_err(OfflineError::from)?;
    form.append_with_blob_and_filename("scanFile", &blob, &scan.file_name)
        .map_err(OfflineError::from)?;

    if let Some(notes) = &scan.notes {
        form.append_with_str("notes", notes)
            .map_err(OfflineError::from)?;
    }

    Ok(form)
}
