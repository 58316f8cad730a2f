// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::mask::truncate;
use super::HookPipeline;
use async_trait::async_trait;
use mend_adapters::{ModelAdapter, ModelError, ModelRequest, ModelResponse};
use mend_core::{HookContext, HookEvent, Job};
use std::time::Instant;

/// [`ModelAdapter`] whose calls pass through the hook pipeline.
///
/// A blocked call never reaches the inner model and surfaces as
/// [`ModelError::Blocked`].
#[derive(Clone)]
pub struct HookedModel<M: ModelAdapter> {
    inner: M,
    hooks: HookPipeline,
    identity: HookContext,
    max_payload_chars: usize,
}

impl<M: ModelAdapter> HookedModel<M> {
    pub fn new(inner: M, hooks: HookPipeline, max_payload_chars: usize) -> Self {
        Self { inner, hooks, identity: HookContext::default(), max_payload_chars }
    }

    /// Attribute calls to `job`
    pub fn for_job(mut self, job: &Job) -> Self {
        self.identity = HookContext::default().for_job(job);
        self
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    fn context(&self, event: HookEvent, model: &str, prompt: &str) -> HookContext {
        let mut ctx = HookContext::model(event, model, truncate(prompt, self.max_payload_chars))
            .metadata("provider", self.inner.name());
        ctx.job_id = self.identity.job_id;
        ctx.tenant_id = self.identity.tenant_id.clone();
        ctx.user_id = self.identity.user_id.clone();
        ctx
    }
}

fn clamp(tokens: u64) -> u32 {
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

#[async_trait]
impl<M: ModelAdapter> ModelAdapter for HookedModel<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let model = request.model.clone().unwrap_or_else(|| self.inner.default_model().to_string());
        let before = self.context(HookEvent::BeforeModel, &model, &request.prompt);
        let decision = self.hooks.before_model(&before);
        if decision.is_blocked() {
            let after = before
                .with_event(HookEvent::AfterModel)
                .success(false)
                .error_message(decision.reason());
            self.hooks.after_model(&after, &decision);
            return Err(ModelError::Blocked(decision.reason().to_string()));
        }

        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let after = before
            .with_event(HookEvent::AfterModel)
            .duration_ms(start.elapsed().as_millis() as u64);
        let after = match &result {
            Ok(response) => {
                let mut ctx = after.success(true).model_name(response.model.clone());
                if let Some(usage) = response.usage {
                    ctx = ctx
                        .prompt_tokens(clamp(usage.prompt_tokens))
                        .completion_tokens(clamp(usage.completion_tokens))
                        .total_tokens(clamp(usage.total_tokens));
                }
                ctx
            }
            Err(e) => after.success(false).error_message(e.to_string()),
        };
        self.hooks.after_model(&after, &decision);
        result
    }
}
