//! User-facing notifications.
//!
//! The store and the account flows report outcomes through a [`Notifier`].
//! Frontends translate them into whatever they show (toasts, status lines);
//! tests collect them with [`NotificationLog`].

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// The action completed.
    Success,
    /// The action failed.
    Error,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Loading the document list failed. The previous list is still shown.
    FetchFailed {
        /// Underlying error, for logs.
        reason: String,
    },
    /// Sign-in completed.
    SignedIn,
    /// Sign-in was rejected or failed.
    SignInFailed {
        /// Message from the auth provider.
        reason: String,
    },
    /// Account registered; the user still has to verify their email.
    SignedUp,
    /// Registration was rejected or failed.
    SignUpFailed {
        /// Message from the auth provider.
        reason: String,
    },
    /// The remote session could not be ended.
    SignOutFailed {
        /// Message from the auth provider.
        reason: String,
    },
}

impl Notification {
    /// Severity of this notification.
    pub fn level(&self) -> NotificationLevel {
        match self {
            Notification::SignedIn | Notification::SignedUp => NotificationLevel::Success,
            Notification::FetchFailed { .. }
            | Notification::SignInFailed { .. }
            | Notification::SignUpFailed { .. }
            | Notification::SignOutFailed { .. } => NotificationLevel::Error,
        }
    }

    /// Text to show the user.
    pub fn message(&self) -> String {
        match self {
            Notification::FetchFailed { .. } => "Failed to fetch documents".to_string(),
            Notification::SignedIn => "Successfully logged in".to_string(),
            Notification::SignInFailed { reason } => non_empty_or(reason, "Failed to login"),
            Notification::SignedUp => {
                "Account created! Please check your email to verify your account.".to_string()
            }
            Notification::SignUpFailed { reason } => {
                non_empty_or(reason, "Failed to create account")
            }
            Notification::SignOutFailed { .. } => "Failed to sign out".to_string(),
        }
    }
}

fn non_empty_or(reason: &str, fallback: &str) -> String {
    if reason.trim().is_empty() {
        fallback.to_string()
    } else {
        reason.to_string()
    }
}

/// Receiver of user-facing notifications.
///
/// Implementors translate notifications into frontend-specific output.
pub trait Notifier: Send + Sync {
    /// Called once per reported outcome.
    fn notify(&self, notification: Notification);
}

impl<F> Notifier for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn notify(&self, notification: Notification) {
        self(notification)
    }
}

/// Notifier that only writes to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level() {
            NotificationLevel::Success => info!("{}", notification.message()),
            NotificationLevel::Error => warn!(?notification, "{}", notification.message()),
        }
    }
}

/// Notifier that keeps every notification in order.
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far.
    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain everything received so far.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of notifications received.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of error-level notifications received.
    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|n| n.level() == NotificationLevel::Error)
            .count()
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
