//! Scripted providers for pipeline tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use glimpse_core::{Provider, ProviderError, ProviderRequest, ProviderResponse};

/// Replays a fixed list of replies in order and records every request.
///
/// Panics when asked for more replies than were scripted, so a test that
/// expects N calls fails loudly on call N+1.
pub(crate) struct SequentialMockProvider {
    responses: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub(crate) fn new(mut responses: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        responses.reverse();
        Arc::new(Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("SequentialMockProvider ran out of scripted responses");
        next.map(|text| ProviderResponse {
            text,
            model: "mock-model".into(),
            usage: None,
            finish_reason: None,
            metadata: serde_json::Map::new(),
        })
    }
}
