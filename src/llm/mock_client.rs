use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{CompletionError, CompletionService, DESCRIPTION_SYSTEM_PROMPT};

/// Completion service answering with fixed strings, for tests and dry runs.
///
/// Description prompts get `description`, content prompts get `content`.
/// Calls whose user message contains a registered pattern fail a given
/// number of times before succeeding.
pub struct MockCompletionService {
    description: String,
    content: String,
    delay: Duration,
    delays: Vec<(String, Duration)>,
    failures: Mutex<Vec<(String, usize)>>,
    completed: Mutex<Vec<String>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockCompletionService {
    pub fn new(description: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            content: content.into(),
            delay: Duration::ZERO,
            delays: Vec::new(),
            failures: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sleep `delay` instead of the default for calls whose user message
    /// contains `pattern`
    pub fn delayed_on(mut self, pattern: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((pattern.into(), delay));
        self
    }

    /// Fail the next `times` calls whose user message contains `pattern`
    pub fn failing_on(self, pattern: impl Into<String>, times: usize) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push((pattern.into(), times));
        }
        self
    }

    /// Total calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User messages of finished calls, in completion order
    pub fn completion_log(&self) -> Vec<String> {
        self.completed
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Highest number of calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn delay_for(&self, user: &str) -> Duration {
        self.delays
            .iter()
            .find(|(pattern, _)| user.contains(pattern.as_str()))
            .map(|(_, delay)| *delay)
            .unwrap_or(self.delay)
    }

    fn take_failure(&self, user: &str) -> bool {
        let Ok(mut failures) = self.failures.lock() else {
            return false;
        };
        match failures
            .iter_mut()
            .find(|(pattern, remaining)| *remaining > 0 && user.contains(pattern.as_str()))
        {
            Some((_, remaining)) => {
                *remaining -= 1;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CompletionService for MockCompletionService {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_for(user);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Ok(mut log) = self.completed.lock() {
            log.push(user.to_string());
        }

        if self.take_failure(user) {
            return Err(CompletionError::Api {
                status: 500,
                body: "simulated failure".to_string(),
            });
        }

        if system == DESCRIPTION_SYSTEM_PROMPT {
            Ok(self.description.clone())
        } else {
            Ok(self.content.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CONTENT_SYSTEM_PROMPT;

    #[tokio::test]
    async fn test_answers_by_prompt() {
        let mock = MockCompletionService::new("desc", "content");
        assert_eq!(
            mock.complete(DESCRIPTION_SYSTEM_PROMPT, "Product url is x").await.unwrap(),
            "desc"
        );
        assert_eq!(
            mock.complete(&CONTENT_SYSTEM_PROMPT, "Product name is x").await.unwrap(),
            "content"
        );
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_budget() {
        let mock = MockCompletionService::new("desc", "content").failing_on("Gadget", 1);

        assert!(mock.complete(&CONTENT_SYSTEM_PROMPT, "Widget").await.is_ok());
        assert!(mock.complete(&CONTENT_SYSTEM_PROMPT, "Gadget").await.is_err());
        assert!(mock.complete(&CONTENT_SYSTEM_PROMPT, "Gadget").await.is_ok());
    }
}
