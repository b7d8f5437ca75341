//! Authenticated user identity and roles.

use serde::{Deserialize, Deserializer, Serialize};

/// Recognized marketplace roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Tenant,
    Admin,
}

impl Role {
    /// Parse the wire form of a role. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "OWNER" => Some(Role::Owner),
            "TENANT" => Some(Role::Tenant),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Tenant => "TENANT",
            Role::Admin => "ADMIN",
        }
    }
}

/// The authenticated identity record returned by the auth service and
/// persisted by the session store.
///
/// The role is kept as the raw wire string: an unrecognized role must not
/// make the whole record unreadable, it only opts the user out of
/// role-scoped topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Identity {
    /// The recognized role, if any.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

// The auth service serializes numeric user ids; older records carry them
// as strings. Accept both.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
