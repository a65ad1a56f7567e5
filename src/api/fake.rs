//! Scripted generators for tests and dry runs.
//!
//! Replies are matched by checking whether the prompt contains a registered
//! substring (case-insensitive). Several replies registered for the same
//! substring are handed out in order, the last one repeating.

use super::{ApiError, ImageGenerator, TextGenerator};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

type Reply = Result<String, String>;

/// A fake text generator that records every call it receives.
#[derive(Debug, Default)]
pub struct FakeGenerator {
    rules: Mutex<Vec<(String, VecDeque<Reply>)>>,
    default_response: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` to prompts containing `prompt_contains`.
    pub fn with_response(self, prompt_contains: &str, response: &str) -> Self {
        self.push_reply(prompt_contains, Ok(response.to_string()))
    }

    /// Fail prompts containing `prompt_contains` with a request error.
    pub fn with_failure(self, prompt_contains: &str, message: &str) -> Self {
        self.push_reply(prompt_contains, Err(message.to_string()))
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    fn push_reply(mut self, pattern: &str, reply: Reply) -> Self {
        let pattern = pattern.to_lowercase();
        let rules = self.rules.get_mut().unwrap_or_else(|e| e.into_inner());
        match rules.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, queue)) => queue.push_back(reply),
            None => rules.push((pattern, VecDeque::from([reply]))),
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// User prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ApiError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((system.to_string(), prompt.to_string()));

        let prompt_lower = prompt.to_lowercase();
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        for (pattern, queue) in rules.iter_mut() {
            if !prompt_lower.contains(pattern.as_str()) {
                continue;
            }
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(reply) = reply {
                return reply.map_err(ApiError::RequestFailed);
            }
        }

        match &self.default_response {
            Some(response) => Ok(response.clone()),
            None => Err(ApiError::RequestFailed(format!(
                "FakeGenerator: no response configured for prompt (first 100 chars): {}",
                prompt.chars().take(100).collect::<String>()
            ))),
        }
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }
}

/// A fake image generator returning fixed bytes.
#[derive(Debug)]
pub struct FakeImageGenerator {
    bytes: Vec<u8>,
    supports_edit: bool,
    fail_when_contains: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeImageGenerator {
    fn default() -> Self {
        Self {
            bytes: b"\x89PNG\r\n\x1a\nfake".to_vec(),
            supports_edit: true,
            fail_when_contains: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_edit(mut self) -> Self {
        self.supports_edit = false;
        self
    }

    /// Any prompt containing `needle` fails in both modes.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_when_contains.push(needle.to_string());
        self
    }

    /// Call log entries look like `generate:<prompt>` or `edit:<prompt>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, kind: &str, prompt: &str) -> Result<(), ApiError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{kind}:{prompt}"));
        if self.fail_when_contains.iter().any(|n| prompt.contains(n)) {
            return Err(ApiError::Status {
                status: 400,
                message: "content policy violation".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageGenerator for FakeImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ApiError> {
        self.record("generate", prompt)?;
        Ok(self.bytes.clone())
    }

    async fn edit_image(&self, _base_png: &Path, prompt: &str) -> Result<Vec<u8>, ApiError> {
        if !self.supports_edit {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(format!("edit-unsupported:{prompt}"));
            return Err(ApiError::Unsupported("image edits".to_string()));
        }
        self.record("edit", prompt)?;
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_case_insensitively() {
        let fake = FakeGenerator::new().with_response("HELLO", "world");
        assert_eq!(fake.generate("", "hello there").await.unwrap(), "world");
        assert_eq!(fake.call_count(), 1);
    }

    #[tokio::test]
    async fn queued_replies_run_in_order_then_repeat() {
        let fake = FakeGenerator::new()
            .with_response("roteiro", "first")
            .with_response("roteiro", "second");
        assert_eq!(fake.generate("", "roteiro").await.unwrap(), "first");
        assert_eq!(fake.generate("", "roteiro").await.unwrap(), "second");
        assert_eq!(fake.generate("", "roteiro").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn unmatched_without_default_fails() {
        let fake = FakeGenerator::new();
        assert!(fake.generate("", "anything").await.is_err());

        let fake = FakeGenerator::new().with_default_response("ok");
        assert_eq!(fake.generate("", "anything").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn failure_rule_surfaces_as_request_error() {
        let fake = FakeGenerator::new().with_failure("quota", "insufficient_quota");
        let err = fake.generate("", "quota please").await.unwrap_err();
        assert!(err.to_string().contains("insufficient_quota"));
    }

    #[tokio::test]
    async fn image_fake_without_edit_reports_unsupported() {
        let fake = FakeImageGenerator::new().without_edit();
        let err = fake.edit_image(Path::new("x.png"), "p").await.unwrap_err();
        assert!(matches!(err, ApiError::Unsupported(_)));
        assert!(fake.generate_image("p").await.is_ok());
        assert_eq!(fake.calls(), vec!["edit-unsupported:p", "generate:p"]);
    }
}
