//! Operator-facing output channel.

use std::sync::Mutex;

/// Channel that build steps report progress and failures through.
pub trait Ui {
    /// Announce a new phase.
    fn say(&self, message: &str);

    /// Detail for the current phase.
    fn message(&self, message: &str);

    /// Report a failure.
    fn error(&self, message: &str);
}

/// Kind of line recorded by [`BufferUi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiLevel {
    /// Phase headline from [`Ui::say`].
    Say,
    /// Detail line from [`Ui::message`].
    Message,
    /// Failure from [`Ui::error`].
    Error,
}

/// [`Ui`] that keeps everything it is given in memory.
#[derive(Debug, Default)]
pub struct BufferUi {
    lines: Mutex<Vec<(UiLevel, String)>>,
}

impl BufferUi {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines in emission order.
    pub fn lines(&self) -> Vec<(UiLevel, String)> {
        self.lock().clone()
    }

    /// Recorded lines of one level.
    pub fn at(&self, level: UiLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Recorded error lines.
    pub fn errors(&self) -> Vec<String> {
        self.at(UiLevel::Error)
    }

    fn push(&self, level: UiLevel, message: &str) {
        self.lock().push((level, message.to_string()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(UiLevel, String)>> {
        // A poisoned buffer still holds every line pushed before the panic.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Ui for BufferUi {
    fn say(&self, message: &str) {
        self.push(UiLevel::Say, message);
    }

    fn message(&self, message: &str) {
        self.push(UiLevel::Message, message);
    }

    fn error(&self, message: &str) {
        self.push(UiLevel::Error, message);
    }
}
