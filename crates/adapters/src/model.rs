// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generation-model seam used by content collaborators.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Overrides the adapter's default model
    pub model: Option<String>,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: String,
    pub text: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model call blocked: {0}")]
    Blocked(String),
    #[error("model provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait ModelAdapter: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeModelState {
        scripted: VecDeque<Result<ModelResponse, ModelError>>,
        requests: Vec<ModelRequest>,
    }

    /// Model that replays scripted responses, then echoes the prompt
    #[derive(Clone, Default)]
    pub struct FakeModel {
        inner: Arc<Mutex<FakeModelState>>,
    }

    impl FakeModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, response: Result<ModelResponse, ModelError>) {
            self.inner.lock().scripted.push_back(response);
        }

        pub fn requests(&self) -> Vec<ModelRequest> {
            self.inner.lock().requests.clone()
        }
    }

    #[async_trait]
    impl ModelAdapter for FakeModel {
        fn name(&self) -> &str {
            "fake"
        }

        fn default_model(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
            let mut state = self.inner.lock();
            state.requests.push(request.clone());
            state.scripted.pop_front().unwrap_or_else(|| {
                let tokens = request.prompt.split_whitespace().count() as u64;
                Ok(ModelResponse {
                    model: request.model.unwrap_or_else(|| "fake-model".to_string()),
                    text: request.prompt,
                    usage: Some(TokenUsage {
                        prompt_tokens: tokens,
                        completion_tokens: tokens,
                        total_tokens: tokens * 2,
                    }),
                })
            })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeModel;
