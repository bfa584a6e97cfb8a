//! Notification surface for the command line.

use ballot_engine::{Notification, NotificationKind, Notifier};

/// Shows notifications as log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message;
        match notification.kind {
            NotificationKind::Success => tracing::info!(target: "ballot_client::notify", "✔ {message}"),
            NotificationKind::Error => tracing::error!(target: "ballot_client::notify", "✖ {message}"),
            NotificationKind::Info => tracing::info!(target: "ballot_client::notify", "{message}"),
            NotificationKind::Loading => tracing::debug!(target: "ballot_client::notify", "… {message}"),
        }
    }
}
