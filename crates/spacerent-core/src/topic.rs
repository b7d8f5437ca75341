//! Broker topic names and the role-based selection policy.

use crate::identity::{Identity, Role};

/// A logical broker channel the client can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Broadcasts for every connected client.
    Public,
    /// Per-user queue keyed by the user id.
    User(String),
    /// Space availability and status changes.
    Spaces,
    /// Contract lifecycle events.
    Contracts,
}

impl Topic {
    /// The broker destination for this topic.
    pub fn destination(&self) -> String {
        match self {
            Topic::Public => "/topic/public".to_string(),
            Topic::User(id) => format!("/queue/user.{id}"),
            Topic::Spaces => "/topic/spaces".to_string(),
            Topic::Contracts => "/topic/contracts".to_string(),
        }
    }

    /// The topic set for one connect, evaluated against the identity
    /// available at that moment.
    ///
    /// Everyone gets the public channel. A logged-in user also gets their
    /// own queue, then role-scoped topics: tenants watch spaces, owners
    /// watch contracts, admins watch both. An unrecognized role gets
    /// nothing beyond public and the user queue.
    pub fn for_identity(identity: Option<&Identity>) -> Vec<Topic> {
        let mut topics = vec![Topic::Public];

        if let Some(identity) = identity {
            topics.push(Topic::User(identity.id.clone()));

            match identity.role() {
                Some(Role::Tenant) => topics.push(Topic::Spaces),
                Some(Role::Owner) => topics.push(Topic::Contracts),
                Some(Role::Admin) => {
                    topics.push(Topic::Spaces);
                    topics.push(Topic::Contracts);
                }
                None => {}
            }
        }

        topics
    }
}
