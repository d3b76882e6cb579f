//! In-memory fakes for the generation contract (testing only)
//!
//! Provides `ScriptedGenerator` and `FailingGenerator`, which satisfy
//! [`TextGenerator`] without any network access.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::generator::{GenerationRequest, TextGenerator};
use crate::Result;

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(GenerationError),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
    delay: Option<Duration>,
}

/// Answers prompts from a script of `needle -> reply` rules.
///
/// The first rule whose needle occurs in the prompt wins; otherwise the
/// default reply is returned. Every request is recorded.
#[derive(Debug)]
pub struct ScriptedGenerator {
    rules: Vec<Rule>,
    default_reply: String,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` when the prompt contains `needle`.
    pub fn reply_when(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Text(text.into()),
            delay: None,
        });
        self
    }

    /// Fail with `error` when the prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, error: GenerationError) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Fail(error),
            delay: None,
        });
        self
    }

    /// Sleep for `delay` before replying with `text` when the prompt contains `needle`.
    pub fn delay_when(
        mut self,
        needle: impl Into<String>,
        delay: Duration,
        text: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Text(text.into()),
            delay: Some(delay),
        });
        self
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        let rule = self
            .rules
            .iter()
            .find(|r| request.prompt.contains(&r.needle))
            .cloned();

        let Some(rule) = rule else {
            return Ok(self.default_reply.clone());
        };

        if let Some(delay) = rule.delay {
            tokio::time::sleep(delay).await;
        }

        match rule.reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// FailingGenerator
// ---------------------------------------------------------------------------

/// Fails every request with the same error.
#[derive(Debug)]
pub struct FailingGenerator {
    error: GenerationError,
}

impl FailingGenerator {
    pub fn new(error: GenerationError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        Err(self.error.clone())
    }
}
