//! Real-time notification pipeline for the spacerent client.
//!
//! This crate intentionally exposes a small surface:
//! - a broker transport seam with a WebSocket implementation
//! - an explicitly owned connection manager (connect/disconnect state machine)
//! - role-driven topic subscriptions
//! - frame dispatch onto an in-process notification bus
//! - a headless notification panel with a bounded recent history
//!
//! Routing, form state, and the REST layer of the surrounding application
//! live elsewhere; this crate only deals with push notifications.

pub mod alert;
pub mod bus;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod panel;
pub mod registry;
pub mod transport;

pub use alert::{Alerter, LogAlerter, NullAlerter, Permission};
pub use bus::{BusSubscription, Listener, NotificationBus};
pub use connection::{ConnectionManager, ConnectionState, ConnectorConfig};
pub use dispatch::Dispatcher;
pub use error::{NotifyError, Result};
pub use panel::{HISTORY_CAPACITY, NotificationPanel};
pub use registry::TopicRegistry;
pub use transport::{
    BrokerSession, BrokerTransport, DropHandler, FrameHandler, InboundFrame, TransportConfig,
    WebSocketTransport,
};
