//! # Notifications
//!
//! User-facing messages ("toasts") leave the app through the [`Notifier`]
//! port. The frontend bridge renders them; tests record them.
//!
//! ```text
//!   MutationService ──┐
//!   LedgerSubscription├──► Arc<dyn Notifier> ──► TracingNotifier (binary)
//!   ReconciliationFeed┘                       └─► ToastLog (tests, UI bridge)
//! ```

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Info,
    Warning,
    Error,
}

/// One message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Toast {
            message: message.into(),
            kind,
        }
    }
}

/// Notification side channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);

    fn success(&self, message: &str) {
        self.notify(Toast::new(message, ToastKind::Success));
    }

    fn info(&self, message: &str) {
        self.notify(Toast::new(message, ToastKind::Info));
    }

    fn warning(&self, message: &str) {
        self.notify(Toast::new(message, ToastKind::Warning));
    }

    fn error(&self, message: &str) {
        self.notify(Toast::new(message, ToastKind::Error));
    }
}

/// Writes toasts to the log. Used by the command-line binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Error => error!(target: "reception::toast", "{}", toast.message),
            ToastKind::Warning => warn!(target: "reception::toast", "{}", toast.message),
            ToastKind::Success | ToastKind::Info => {
                info!(target: "reception::toast", "{}", toast.message)
            }
        }
    }
}

/// Keeps every toast in order of arrival.
#[derive(Debug, Default)]
pub struct ToastLog {
    toasts: Mutex<Vec<Toast>>,
}

impl ToastLog {
    pub fn new() -> Self {
        ToastLog::default()
    }

    /// Everything notified so far.
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns everything notified so far.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.toasts.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn last(&self) -> Option<Toast> {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl Notifier for ToastLog {
    fn notify(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(toast);
    }
}
