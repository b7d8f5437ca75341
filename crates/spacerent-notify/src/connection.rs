//! Broker connection management.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use spacerent_core::{Notification, SessionStore};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;
use crate::error::{NotifyError, Result};
use crate::registry::TopicRegistry;
use crate::transport::{BrokerSession, BrokerTransport, DropHandler};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Connection manager configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Broker endpoint.
    pub url: String,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/ws".to_string(),
        }
    }
}

struct ManagerInner {
    state: RwLock<ConnectionState>,
    /// Bumped under the state lock on every connect attempt. A drop
    /// signal may only tear down the session it came from: the read loop
    /// can outlive `close()` when the socket errors concurrently, so a
    /// stale signal can arrive after a disconnect()/connect() pair.
    generation: AtomicU64,
    session: Mutex<Option<Box<dyn BrokerSession>>>,
    registry: Mutex<TopicRegistry>,
    status_tx: watch::Sender<ConnectionState>,
}

impl ManagerInner {
    /// Teardown after an unexpected transport drop: the socket is already
    /// gone, so the registry is cleared without talking to the broker and
    /// the status channel surfaces the loss. No automatic reconnection;
    /// that policy belongs to the caller.
    async fn handle_drop(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.state.write().await;
            if generation != self.generation.load(Ordering::SeqCst)
                || *state == ConnectionState::Disconnected
            {
                return;
            }
            *state = ConnectionState::Disconnected;
        }

        self.session.lock().await.take();
        self.registry.lock().await.unsubscribe_all(None).await;
        self.status_tx.send_replace(ConnectionState::Disconnected);
        warn!("broker connection dropped");
    }
}

/// Owns the single logical broker connection for one logged-in session.
///
/// Constructed once at application root and passed by reference; nothing
/// else may hold or mutate the underlying transport handle. The state
/// machine is DISCONNECTED -> CONNECTING -> CONNECTED, back to
/// DISCONNECTED on [`disconnect`](Self::disconnect), handshake failure, or
/// transport drop.
pub struct ConnectionManager {
    config: ConnectorConfig,
    transport: Arc<dyn BrokerTransport>,
    session_store: Arc<dyn SessionStore>,
    dispatcher: Arc<Dispatcher>,
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectorConfig,
        transport: Arc<dyn BrokerTransport>,
        session_store: Arc<dyn SessionStore>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (status_tx, _status_rx) = watch::channel(ConnectionState::Disconnected);

        Self {
            config,
            transport,
            session_store,
            dispatcher,
            inner: Arc::new(ManagerInner {
                state: RwLock::new(ConnectionState::Disconnected),
                generation: AtomicU64::new(0),
                session: Mutex::new(None),
                registry: Mutex::new(TopicRegistry::new()),
                status_tx,
            }),
        }
    }

    /// Connect to the broker and subscribe to the topics selected by the
    /// identity persisted right now.
    ///
    /// Idempotent: while already connected this is a no-op that still
    /// reports readiness with `Ok(())` (a recoverable duplicate call, not
    /// an error). Subscriptions are live by the time this returns. On
    /// handshake failure the manager stays disconnected and the error is
    /// returned; no retry is attempted here.
    pub async fn connect(&self) -> Result<()> {
        let generation = {
            let mut state = self.inner.state.write().await;
            match *state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(NotifyError::Connection(
                        "connect already in progress".to_string(),
                    ));
                }
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.inner.status_tx.send_replace(ConnectionState::Connecting);

        // Evaluated once per connect, so a logout/login between connects
        // never leaks the prior identity's subscriptions.
        let identity = match self.session_store.load() {
            Ok(identity) => identity,
            Err(error) => {
                warn!("session record unreadable, connecting anonymously: {error}");
                None
            }
        };

        let on_frame = self.dispatcher.handler();
        let drop_inner = Arc::clone(&self.inner);
        let on_drop: DropHandler = Arc::new(move || {
            let inner = Arc::clone(&drop_inner);
            tokio::spawn(inner.handle_drop(generation));
        });

        let session = match self.transport.open(&self.config.url, on_frame, on_drop).await {
            Ok(session) => session,
            Err(error) => {
                *self.inner.state.write().await = ConnectionState::Disconnected;
                self.inner
                    .status_tx
                    .send_replace(ConnectionState::Disconnected);
                return Err(error);
            }
        };

        // Holding the state lock through subscription setup keeps a racing
        // disconnect() ordered entirely before or after it.
        let mut state = self.inner.state.write().await;
        if *state != ConnectionState::Connecting {
            drop(state);
            if let Err(error) = session.close().await {
                debug!("discarding cancelled session: {error}");
            }
            return Err(NotifyError::Connection(
                "connection cancelled during handshake".to_string(),
            ));
        }

        self.inner
            .registry
            .lock()
            .await
            .subscribe_all(session.as_ref(), identity.as_ref())
            .await;
        *self.inner.session.lock().await = Some(session);
        *state = ConnectionState::Connected;
        drop(state);

        self.inner.status_tx.send_replace(ConnectionState::Connected);
        Ok(())
    }

    /// Tear the connection down.
    ///
    /// Safe from any state and safe to call repeatedly. Every registered
    /// subscription is unsubscribed and the registry cleared before the
    /// transport close, so no dispatch can originate from them afterwards
    /// even if the close itself is still in flight.
    pub async fn disconnect(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write().await;
            if *state == ConnectionState::Disconnected {
                return Ok(());
            }
            *state = ConnectionState::Disconnected;
        }

        let session = self.inner.session.lock().await.take();
        self.inner
            .registry
            .lock()
            .await
            .unsubscribe_all(session.as_deref())
            .await;

        if let Some(session) = session {
            if let Err(error) = session.close().await {
                debug!("transport close failed during teardown: {error}");
            }
        }

        self.inner
            .status_tx
            .send_replace(ConnectionState::Disconnected);
        Ok(())
    }

    /// Publish one notification to a broker destination.
    pub async fn send_notification(
        &self,
        destination: &str,
        notification: &Notification,
    ) -> Result<()> {
        let body = serde_json::to_string(notification)?;
        let session_guard = self.inner.session.lock().await;
        let session = session_guard.as_deref().ok_or(NotifyError::NotConnected)?;
        session.send(destination, body).await
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// Watch channel mirroring the connection state, for status
    /// indicators.
    pub fn status_watch(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status_tx.subscribe()
    }

    pub async fn subscription_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    pub async fn subscribed_destinations(&self) -> Vec<String> {
        self.inner.registry.lock().await.destinations()
    }
}
