//! Scripted generator for tests and offline runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::{GenerationRequest, GenerationResult, TextGenerator};
use crate::error::GenerationError;

/// Replays queued replies in order and records every prompt it receives.
///
/// Once the queue is drained every call returns empty text.
pub struct MockGenerator {
    model: String,
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator that answers with each of `texts`, in order.
    pub fn with_replies<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for text in texts {
            generator.queue_reply(text);
        }
        generator
    }

    pub fn queue_reply(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: GenerationError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }
}

// Recovers poisoned locks.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        lock(&self.prompts).push(request.prompt().to_string());
        let next = lock(&self.replies).pop_front();
        match next {
            Some(Ok(text)) => Ok(GenerationResult::new(text)),
            Some(Err(e)) => Err(e),
            None => Ok(GenerationResult::default()),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
