//! User-facing collaborators: short notices and yes/no confirmation.
//!
//! The library never talks to a terminal (or any other UI) directly. Whoever
//! embeds it provides a [`Notifier`] and, for the gated startup, a [`Confirm`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fire-and-forget display of a short message.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);
}

pub type NotifierHandle = Arc<dyn Notifier>;

/// Asks the user a yes/no question.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// `true` if the user agreed. Anything short of a clear yes is a no.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Sends notices to the log at `info` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;
impl Notifier for LogNotifier {
    fn notice(&self, message: &str) {
        tracing::info!(target: "imgshelf::notice", "{message}");
    }
}

/// Keeps every notice for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}
impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}
impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}

/// Answers every question the same way, counting how often it was asked.
#[derive(Debug, Default)]
pub struct FixedAnswer {
    answer: bool,
    asked: AtomicUsize,
}
impl FixedAnswer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}
#[async_trait]
impl Confirm for FixedAnswer {
    async fn confirm(&self, prompt: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(prompt, answer = self.answer, "Answering confirmation automatically");
        self.answer
    }
}
