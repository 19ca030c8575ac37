//! Click event model for asynchronous click counting.

/// A click on a short code, queued for the background worker.
///
/// Redirects only enqueue the event; the counter update happens in
/// [`crate::domain::click_worker::run_click_worker`] so the response never
/// waits on a database write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub code: String,
}

impl ClickEvent {
    /// Creates a new click event for `code`.
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}
