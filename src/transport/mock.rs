use std::cell::RefCell;
use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{OfflineError, Result};
use crate::transport::{Transport, WireRequest, WireResponse};

/// Scripted transport for tests.
///
/// Outcomes queue up in order; every sent request is recorded for
/// inspection. With an empty script, requests succeed with `200 {}`.
pub struct MockTransport {
    script: RefCell<VecDeque<Result<WireResponse>>>,
    sent: RefCell<Vec<WireRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Next request gets this response.
    pub fn respond_with(&self, status: u16, body: &str) {
        self.script.borrow_mut().push_back(Ok(WireResponse {
            status,
            body: body.to_string(),
        }));
    }

    /// Next request fails at the transport level (offline, DNS, abort).
    pub fn fail_with(&self, message: &str) {
        self.script
            .borrow_mut()
            .push_back(Err(OfflineError::Transport(message.to_string())));
    }

    pub fn sent(&self) -> Vec<WireRequest> {
        self.sent.borrow().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn send(&self, request: &WireRequest) -> Result<WireResponse> {
        self.sent.borrow_mut().push(request.clone());
        match self.script.borrow_mut().pop_front() {
            Some(outcome) => outcome,
            None => Ok(WireResponse {
                status: 200,
                body: "{}".to_string(),
            }),
        }
    }
}
