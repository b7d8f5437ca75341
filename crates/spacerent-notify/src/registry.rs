//! Topic subscription registry.

use std::collections::HashMap;

use spacerent_core::{Identity, Topic};
use tracing::{debug, warn};

use crate::transport::BrokerSession;

/// Maps active broker destinations to their logical topics.
///
/// Owned and mutated only by the connection manager. One entry per
/// destination; re-subscribing an existing destination is a no-op so a
/// topic never gains a duplicate delivery path.
#[derive(Default)]
pub struct TopicRegistry {
    entries: HashMap<String, Topic>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every topic selected for this identity.
    ///
    /// Best-effort per topic: a failed subscribe is logged and skipped so
    /// one bad destination does not block the rest.
    pub async fn subscribe_all(&mut self, session: &dyn BrokerSession, identity: Option<&Identity>) {
        for topic in Topic::for_identity(identity) {
            let destination = topic.destination();
            if self.entries.contains_key(&destination) {
                continue;
            }

            match session.subscribe(&destination).await {
                Ok(()) => {
                    debug!("subscribed to {destination}");
                    self.entries.insert(destination, topic);
                }
                Err(error) => warn!("subscribe failed for {destination}: {error}"),
            }
        }
    }

    /// Unsubscribe every registered destination and clear the registry.
    ///
    /// Passing no session (connection already gone) or a failing session
    /// still clears the map: from the registry's point of view the
    /// subscriptions are inert as soon as this returns.
    pub async fn unsubscribe_all(&mut self, session: Option<&dyn BrokerSession>) {
        for destination in self.entries.keys() {
            if let Some(session) = session
                && let Err(error) = session.unsubscribe(destination).await
            {
                debug!("unsubscribe ignored for {destination}: {error}");
            }
        }

        self.entries.clear();
    }

    pub fn contains(&self, destination: &str) -> bool {
        self.entries.contains_key(destination)
    }

    pub fn destinations(&self) -> Vec<String> {
        let mut destinations: Vec<String> = self.entries.keys().cloned().collect();
        destinations.sort();
        destinations
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSession {
        subscribes: Mutex<Vec<String>>,
        unsubscribes: Mutex<Vec<String>>,
        fail_destinations: Vec<String>,
    }

    #[async_trait]
    impl BrokerSession for RecordingSession {
        async fn subscribe(&self, destination: &str) -> Result<()> {
            if self.fail_destinations.iter().any(|d| d == destination) {
                return Err(NotifyError::Subscription(format!(
                    "broker refused {destination}"
                )));
            }
            self.subscribes
                .lock()
                .expect("subscribes")
                .push(destination.to_string());
            Ok(())
        }

        async fn unsubscribe(&self, destination: &str) -> Result<()> {
            self.unsubscribes
                .lock()
                .expect("unsubscribes")
                .push(destination.to_string());
            Ok(())
        }

        async fn send(&self, _destination: &str, _body: String) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn admin() -> Identity {
        Identity {
            id: "1".to_string(),
            name: "Admin".to_string(),
            role: "ADMIN".to_string(),
            username: None,
            email: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn subscribes_role_topic_set_once() {
        let session = RecordingSession::default();
        let mut registry = TopicRegistry::new();
        let identity = admin();

        registry.subscribe_all(&session, Some(&identity)).await;
        registry.subscribe_all(&session, Some(&identity)).await;

        assert_eq!(
            registry.destinations(),
            vec![
                "/queue/user.1".to_string(),
                "/topic/contracts".to_string(),
                "/topic/public".to_string(),
                "/topic/spaces".to_string(),
            ]
        );
        // The second pass found every destination present and sent nothing.
        assert_eq!(session.subscribes.lock().expect("subscribes").len(), 4);
    }

    #[tokio::test]
    async fn failed_subscribe_skips_only_that_topic() {
        let session = RecordingSession {
            fail_destinations: vec!["/topic/spaces".to_string()],
            ..RecordingSession::default()
        };
        let mut registry = TopicRegistry::new();
        let identity = admin();

        registry.subscribe_all(&session, Some(&identity)).await;

        assert!(!registry.contains("/topic/spaces"));
        assert!(registry.contains("/topic/public"));
        assert!(registry.contains("/topic/contracts"));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_even_without_a_session() {
        let session = RecordingSession::default();
        let mut registry = TopicRegistry::new();

        registry.subscribe_all(&session, None).await;
        assert_eq!(registry.len(), 1);

        registry.unsubscribe_all(None).await;
        assert!(registry.is_empty());
        assert!(session.unsubscribes.lock().expect("unsubscribes").is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_all_tolerates_an_empty_registry() {
        let mut registry = TopicRegistry::new();
        registry.unsubscribe_all(None).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_all_notifies_the_broker_when_possible() {
        let session = RecordingSession::default();
        let mut registry = TopicRegistry::new();
        let identity = admin();

        registry.subscribe_all(&session, Some(&identity)).await;
        registry.unsubscribe_all(Some(&session)).await;

        assert!(registry.is_empty());
        assert_eq!(session.unsubscribes.lock().expect("unsubscribes").len(), 4);
    }
}
