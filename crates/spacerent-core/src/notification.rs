//! The notification value delivered over the broker.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Notification categories emitted by the backend.
///
/// The `kind` field stays an open string so new backend categories flow
/// through without a client release; these are the ones currently sent.
pub mod kinds {
    pub const NEW_SPACE: &str = "NEW_SPACE";
    pub const SPACE_STATUS_CHANGE: &str = "SPACE_STATUS_CHANGE";
    pub const NEW_CONTRACT: &str = "NEW_CONTRACT";
    pub const CONTRACT_UPDATE: &str = "CONTRACT_UPDATE";
    pub const CONTRACT_CONFIRMED: &str = "CONTRACT_CONFIRMED";
    pub const TEST: &str = "TEST";
}

/// A single notification. Immutable once dispatched; listeners receive
/// clones and never share mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Entity snapshot attached by the backend (space, contract, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// `"all"` for broadcasts, a user id for per-user queue deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
}

impl Notification {
    /// Parse one inbound frame body.
    ///
    /// Required fields (`id`, `type`, `message`, `timestamp`) are strict;
    /// unknown extra fields are ignored.
    pub fn from_json(body: &str) -> Result<Notification, serde_json::Error> {
        serde_json::from_str(body)
    }
}

/// Parse a backend timestamp.
///
/// The notification service serializes `LocalDateTime` without a zone
/// offset; newer payloads use RFC 3339. Offset-less values are read as
/// UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|naive| naive.and_utc()))
}

mod timestamp {
    use super::{DateTime, SecondsFormat, Utc, parse_timestamp};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_broadcast_notification() {
        let notification = Notification::from_json(
            r#"{"id":"n1","type":"NEW_SPACE","message":"Space X listed","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .expect("valid notification");

        assert_eq!(notification.id, "n1");
        assert_eq!(notification.kind, kinds::NEW_SPACE);
        assert_eq!(notification.message, "Space X listed");
        assert_eq!(
            notification.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(notification.data, None);
        assert_eq!(notification.recipient_id, None);
    }

    #[test]
    fn parses_offset_less_backend_timestamp() {
        let notification = Notification::from_json(
            r#"{"id":"n2","type":"CONTRACT_UPDATE","message":"Contract renewed","timestamp":"2024-06-15T09:30:00","recipientId":"7"}"#,
        )
        .expect("valid notification");

        assert_eq!(
            notification.timestamp,
            Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
        );
        assert_eq!(notification.recipient_id.as_deref(), Some("7"));
    }

    #[test]
    fn keeps_entity_payload_and_ignores_unknown_fields() {
        let notification = Notification::from_json(
            r#"{"id":"n3","type":"SPACE_STATUS_CHANGE","message":"Space 'A' is now available","timestamp":"2024-01-01T00:00:00Z","data":{"spaceId":3,"available":true},"priority":"low"}"#,
        )
        .expect("valid notification");

        let data = notification.data.expect("entity payload");
        assert_eq!(data["spaceId"], 3);
        assert_eq!(data["available"], true);
    }

    #[test]
    fn rejects_frames_missing_required_fields() {
        let missing = [
            r#"{"type":"TEST","message":"x","timestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"id":"n4","message":"x","timestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"id":"n4","type":"TEST","timestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"id":"n4","type":"TEST","message":"x"}"#,
            r#"{"id":"n4","type":"TEST","message":"x","timestamp":"yesterday"}"#,
        ];

        for body in missing {
            assert!(Notification::from_json(body).is_err(), "accepted: {body}");
        }
    }

    #[test]
    fn serializes_timestamp_as_rfc3339_utc() {
        let notification = Notification {
            id: "n5".to_string(),
            kind: kinds::TEST.to_string(),
            message: "This is a test notification".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
            data: None,
            recipient_id: Some("all".to_string()),
        };

        let encoded = serde_json::to_string(&notification).expect("serializable");
        assert!(encoded.contains(r#""timestamp":"2024-03-02T12:00:00Z""#));
        assert!(encoded.contains(r#""type":"TEST""#));
        assert!(encoded.contains(r#""recipientId":"all""#));
    }
}
