//! Headless notification panel.
//!
//! The state behind a notification center widget: a bounded, newest-first
//! history of dispatched notifications plus the live connection status.
//! Rendering belongs to the embedding UI; several panels can sit on the
//! same bus and each keeps its own independent history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use spacerent_core::Notification;
use tokio::sync::watch;

use crate::alert::{Alerter, ensure_permission};
use crate::bus::{BusSubscription, NotificationBus};
use crate::connection::{ConnectionManager, ConnectionState};

/// How many notifications the panel retains, newest first.
pub const HISTORY_CAPACITY: usize = 10;

/// A mounted notification panel.
pub struct NotificationPanel {
    history: Arc<Mutex<VecDeque<Notification>>>,
    subscription: Option<BusSubscription>,
    status: watch::Receiver<ConnectionState>,
    manager: Arc<ConnectionManager>,
    last_error: Option<String>,
}

impl NotificationPanel {
    /// Mount a panel: attach a bus listener, bring the connection up, and
    /// ask for alert permission once the connection succeeds (never after
    /// a denial).
    ///
    /// A failed connect still yields a usable panel: the history keeps
    /// working for anything published locally, `connected()` reports
    /// false, and [`last_error`](Self::last_error) carries the cause.
    pub async fn mount(
        bus: &NotificationBus,
        manager: Arc<ConnectionManager>,
        alerter: Arc<dyn Alerter>,
    ) -> NotificationPanel {
        Self::mount_with_capacity(bus, manager, alerter, HISTORY_CAPACITY).await
    }

    pub async fn mount_with_capacity(
        bus: &NotificationBus,
        manager: Arc<ConnectionManager>,
        alerter: Arc<dyn Alerter>,
        capacity: usize,
    ) -> NotificationPanel {
        let history = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));

        let sink = Arc::clone(&history);
        let subscription = bus.subscribe(Arc::new(move |notification: &Notification| {
            let mut history = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            history.push_front(notification.clone());
            history.truncate(capacity);
        }));

        let status = manager.status_watch();
        let last_error = match manager.connect().await {
            Ok(()) => {
                ensure_permission(alerter.as_ref());
                None
            }
            Err(error) => Some(error.to_string()),
        };

        NotificationPanel {
            history,
            subscription: Some(subscription),
            status,
            manager,
            last_error,
        }
    }

    /// Unmount: detach from the bus and close the connection.
    pub async fn unmount(mut self) -> crate::error::Result<()> {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.manager.disconnect().await
    }

    /// Current history, newest first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Remove one entry by id. Unknown ids are a no-op.
    pub fn dismiss(&self, id: &str) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|notification| notification.id != id);
    }

    /// Empty the history.
    pub fn clear_all(&self) {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live connection status for the indicator dot.
    pub fn connected(&self) -> bool {
        *self.status.borrow() == ConnectionState::Connected
    }

    /// Why the last connect failed, if it did.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
