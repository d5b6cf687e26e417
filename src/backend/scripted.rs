//! Canned-reply generator for tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::Generator;
use crate::error::{Result, TrailError};

/// Returns a fixed reply and records every prompt it was given.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    reply: String,
    fail_with: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            ..Self::default()
        }
    }

    /// A generator whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match &self.fail_with {
            Some(message) => Err(TrailError::Generation(message.clone())),
            None => Ok(self.reply.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_and_call_count() {
        let gen = ScriptedGenerator::new("Tuesday at 2 PM.");
        assert_eq!(gen.generate("p1").unwrap(), "Tuesday at 2 PM.");
        assert_eq!(gen.generate("p2").unwrap(), "Tuesday at 2 PM.");
        assert_eq!(gen.calls(), 2);
        assert_eq!(gen.prompts(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn test_failing() {
        let gen = ScriptedGenerator::failing("offline");
        assert!(matches!(gen.generate("p"), Err(TrailError::Generation(m)) if m == "offline"));
        assert_eq!(gen.calls(), 1);
    }
}
