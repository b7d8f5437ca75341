//! In-process notification bus.
//!
//! An explicit observer registry owned by the application root and passed
//! by reference, replacing ambient global dispatch. Fan-out is synchronous
//! and in arrival order; listeners receive every notification published
//! while they are attached.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use spacerent_core::Notification;

/// Callback type for bus listeners.
pub type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

/// Cloneable handle to one shared listener table.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<RwLock<ListenerTable>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener. Detach is explicit via
    /// [`BusSubscription::unsubscribe`]; dropping the returned handle keeps
    /// the listener attached, so an unmount that forgets to detach is a
    /// bug at the call site rather than a silent behavior change.
    pub fn subscribe(&self, listener: Listener) -> BusSubscription {
        let mut table = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = table.next_id;
        table.next_id += 1;
        table.listeners.insert(id, listener);

        BusSubscription {
            id,
            bus: self.clone(),
        }
    }

    /// Deliver one notification to every attached listener, synchronously,
    /// in attach order.
    ///
    /// Listeners run on a snapshot taken outside the lock, so a listener
    /// may publish or subscribe without deadlocking the bus.
    pub fn publish(&self, notification: &Notification) {
        let snapshot: Vec<Listener> = {
            let table = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            table.listeners.values().cloned().collect()
        };

        for listener in snapshot {
            listener(notification);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .listeners
            .len()
    }

    fn remove(&self, id: u64) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .listeners
            .remove(&id);
    }
}

/// Handle to one attached listener.
pub struct BusSubscription {
    id: u64,
    bus: NotificationBus,
}

impl BusSubscription {
    /// Detach the listener. No further notifications are delivered to it.
    pub fn unsubscribe(self) {
        self.bus.remove(self.id);
    }
}
