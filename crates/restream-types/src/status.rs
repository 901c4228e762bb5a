//! Aggregable success/warning/error result value.

use serde::{Deserialize, Serialize};

/// Separator between accumulated messages in the HTTP view.
const MESSAGE_SEPARATOR: &str = "\n-----\n";

/// Outcome of one logical operation, possibly spanning several feeds.
///
/// Warnings and errors both clear the `ok` flag; the distinction is advisory
/// and lives only in the message text. Statuses combine across feeds with
/// AND-ed `ok` and messages concatenated in iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatus {
    ok: bool,
    messages: Vec<String>,
}

impl ExecutionStatus {
    /// A fresh, fully successful status.
    pub fn ok() -> Self {
        Self {
            ok: true,
            messages: Vec::new(),
        }
    }

    /// A failed status carrying one error message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut status = Self::ok();
        status.append_error(message);
        status
    }

    /// Record a warning. Clears the `ok` flag.
    pub fn append_warning(&mut self, message: impl Into<String>) {
        self.ok = false;
        self.messages.push(message.into());
    }

    /// Record an error. Clears the `ok` flag.
    pub fn append_error(&mut self, message: impl Into<String>) {
        self.ok = false;
        self.messages.push(message.into());
    }

    /// Fold another status into this one.
    pub fn merge(&mut self, other: ExecutionStatus) {
        self.ok = self.ok && other.ok;
        self.messages.extend(other.messages);
    }

    /// Whether no warning or error has been recorded.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Accumulated messages, in the order they were recorded.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// The HTTP view of the status: `("Ok", 200)` on full success, otherwise
    /// `(joined messages, 500)`.
    pub fn to_http(&self) -> (String, u16) {
        if self.ok {
            ("Ok".to_string(), 200)
        } else {
            (self.messages.join(MESSAGE_SEPARATOR), 500)
        }
    }
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::ok()
    }
}
