//! Inbound frame dispatch.

use std::sync::Arc;

use spacerent_core::Notification;
use tracing::warn;

use crate::alert::{Alerter, raise_alert};
use crate::bus::NotificationBus;
use crate::transport::{FrameHandler, InboundFrame};

/// Decodes inbound frames and fans the resulting notifications out on the
/// bus, with a best-effort native alert after each delivery.
pub struct Dispatcher {
    bus: NotificationBus,
    alerter: Arc<dyn Alerter>,
}

impl Dispatcher {
    pub fn new(bus: NotificationBus, alerter: Arc<dyn Alerter>) -> Self {
        Self { bus, alerter }
    }

    /// The frame callback handed to the transport.
    pub fn handler(self: &Arc<Self>) -> FrameHandler {
        let dispatcher = Arc::clone(self);
        Arc::new(move |frame| dispatcher.on_frame(frame))
    }

    /// Handle one inbound frame.
    ///
    /// A malformed payload is logged and dropped; it never crosses this
    /// boundary as an error and never touches connection state. Bus
    /// delivery happens before the alert so a broken alerter cannot delay
    /// or lose notifications.
    pub fn on_frame(&self, frame: InboundFrame) {
        let notification = match Notification::from_json(&frame.body) {
            Ok(notification) => notification,
            Err(error) => {
                warn!(
                    "dropping malformed notification on {}: {}",
                    frame.destination, error
                );
                return;
            }
        };

        self.bus.publish(&notification);
        raise_alert(self.alerter.as_ref(), &notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{NullAlerter, Permission};
    use crate::error::{NotifyError, Result};
    use std::sync::Mutex;

    fn frame(destination: &str, body: &str) -> InboundFrame {
        InboundFrame {
            destination: destination.to_string(),
            body: body.to_string(),
        }
    }

    fn collector(bus: &NotificationBus) -> (Arc<Mutex<Vec<String>>>, crate::bus::BusSubscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = bus.subscribe(Arc::new(move |notification: &Notification| {
            sink.lock().expect("seen").push(notification.id.clone());
        }));
        (seen, subscription)
    }

    #[test]
    fn valid_frame_reaches_every_listener() {
        let bus = NotificationBus::new();
        let (seen, subscription) = collector(&bus);
        let dispatcher = Dispatcher::new(bus, Arc::new(NullAlerter));

        dispatcher.on_frame(frame(
            "/topic/spaces",
            r#"{"id":"n1","type":"NEW_SPACE","message":"Space X listed","timestamp":"2024-01-01T00:00:00Z"}"#,
        ));

        assert_eq!(*seen.lock().expect("seen"), vec!["n1".to_string()]);
        subscription.unsubscribe();
    }

    #[test]
    fn malformed_frame_is_dropped_without_panicking() {
        let bus = NotificationBus::new();
        let (seen, subscription) = collector(&bus);
        let dispatcher = Dispatcher::new(bus, Arc::new(NullAlerter));

        dispatcher.on_frame(frame("/topic/public", "not even json"));
        dispatcher.on_frame(frame("/topic/public", r#"{"id":"n2"}"#));

        assert!(seen.lock().expect("seen").is_empty());
        subscription.unsubscribe();
    }

    #[test]
    fn alert_failure_does_not_affect_bus_delivery() {
        struct BrokenAlerter;

        impl Alerter for BrokenAlerter {
            fn permission(&self) -> Permission {
                Permission::Granted
            }

            fn request_permission(&self) -> Permission {
                Permission::Granted
            }

            fn show(&self, _title: &str, _body: &str) -> Result<()> {
                Err(NotifyError::Alert("no display".to_string()))
            }
        }

        let bus = NotificationBus::new();
        let (seen, subscription) = collector(&bus);
        let dispatcher = Dispatcher::new(bus, Arc::new(BrokenAlerter));

        dispatcher.on_frame(frame(
            "/topic/contracts",
            r#"{"id":"n3","type":"CONTRACT_UPDATE","message":"Contract renewed","timestamp":"2024-01-01T00:00:00Z"}"#,
        ));

        assert_eq!(*seen.lock().expect("seen"), vec!["n3".to_string()]);
        subscription.unsubscribe();
    }

    #[test]
    fn frames_dispatch_in_arrival_order() {
        let bus = NotificationBus::new();
        let (seen, subscription) = collector(&bus);
        let dispatcher = Dispatcher::new(bus, Arc::new(NullAlerter));

        for id in ["n1", "n2", "n3"] {
            dispatcher.on_frame(frame(
                "/topic/spaces",
                &format!(
                    r#"{{"id":"{id}","type":"TEST","message":"m","timestamp":"2024-01-01T00:00:00Z"}}"#
                ),
            ));
        }

        assert_eq!(
            *seen.lock().expect("seen"),
            vec!["n1".to_string(), "n2".to_string(), "n3".to_string()]
        );
        subscription.unsubscribe();
    }
}
