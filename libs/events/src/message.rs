//! File-access notification messages.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::DecodeError;

/// Reference format of the `timestamp` field (UTC, no zone designator).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";

/// Accepted when decoding: the reference format with optional fractional seconds.
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d.%H:%M:%S%.f";

/// An iRODS qualified username.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub zone: String,
}

/// A file-access notification sent by iRODS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// User that triggered the event, when the publisher supplied one.
    pub author: Option<Author>,

    /// Opaque identifier of the data object.
    pub entity: String,

    /// Absolute path of the data object in the iRODS virtual filesystem.
    pub path: String,

    /// When the event occurred, if the publisher supplied it.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Shape of the message on the wire. Unknown fields are ignored.
#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    author: Option<Author>,
    entity: String,
    path: String,
    #[serde(default)]
    timestamp: Option<String>,
}

impl Message {
    /// Decode a delivery body.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMessage = serde_json::from_slice(body)?;

        if wire.entity.is_empty() {
            return Err(DecodeError::EmptyField { field: "entity" });
        }
        if wire.path.is_empty() {
            return Err(DecodeError::EmptyField { field: "path" });
        }

        let timestamp = wire.timestamp.as_deref().map(parse_timestamp).transpose()?;

        Ok(Self {
            author: wire.author,
            entity: wire.entity,
            path: wire.path,
            timestamp,
        })
    }

    /// Returns true if the message path lies under `root`.
    ///
    /// This is a plain string prefix test, matching how the repository root is
    /// configured.
    pub fn is_under(&self, root: &str) -> bool {
        self.path.starts_with(root)
    }
}

/// Decode a delivery body. Shorthand for [`Message::decode`].
pub fn decode(body: &[u8]) -> Result<Message, DecodeError> {
    Message::decode(body)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DecodeError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DecodeError::InvalidTimestamp {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const NO_TIMESTAMP: &str = r#"
    {
      "author": { "name": "nobody", "zone": "nowhere" },
      "entity": "fakeid",
      "path": "/foo/bar"
    }"#;

    const WITH_TIMESTAMP: &str = r#"
    {
      "author": { "name": "nobody", "zone": "nowhere" },
      "entity": "fakeid",
      "path": "/foo/bar",
      "timestamp": "2017-10-06.15:07:37"
    }"#;

    const EXTRA_FIELDS: &str = r#"
    {
      "author": { "name": "nobody", "zone": "nowhere" },
      "entity": "fakeid",
      "path": "/foo/bar",
      "creator": { "name": "brucealmighty", "zone": "nowhere" }
    }"#;

    fn assert_common_fields(msg: &Message) {
        let author = msg.author.as_ref().expect("no author in decoded message");
        assert_eq!(author.name, "nobody");
        assert_eq!(author.zone, "nowhere");
        assert_eq!(msg.entity, "fakeid");
        assert_eq!(msg.path, "/foo/bar");
    }

    #[test]
    fn test_decode_without_timestamp() {
        let msg = decode(NO_TIMESTAMP.as_bytes()).unwrap();
        assert_common_fields(&msg);
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn test_decode_with_timestamp() {
        let msg = decode(WITH_TIMESTAMP.as_bytes()).unwrap();
        assert_common_fields(&msg);
        let expected = Utc.with_ymd_and_hms(2017, 10, 6, 15, 7, 37).unwrap();
        assert_eq!(msg.timestamp, Some(expected));
    }

    #[test]
    fn test_decode_timestamp_with_fractional_seconds() {
        let body = r#"{"entity":"e","path":"/p","timestamp":"2017-10-06.15:07:37.250"}"#;
        let msg = decode(body.as_bytes()).unwrap();
        let expected = Utc.with_ymd_and_hms(2017, 10, 6, 15, 7, 37).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(msg.timestamp, Some(expected));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let msg = decode(EXTRA_FIELDS.as_bytes()).unwrap();
        assert_common_fields(&msg);
    }

    #[test]
    fn test_decode_null_timestamp() {
        let body = r#"{"entity":"e","path":"/p","timestamp":null}"#;
        let msg = decode(body.as_bytes()).unwrap();
        assert!(msg.timestamp.is_none());
        assert!(msg.author.is_none());
    }

    #[test]
    fn test_decode_rejects_malformed_timestamp() {
        let body = r#"{"entity":"e","path":"/p","timestamp":"2017-10-06T15:07:37Z"}"#;
        let err = decode(body.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidTimestamp {
                value: "2017-10-06T15:07:37Z".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_non_string_timestamp() {
        let body = r#"{"entity":"e","path":"/p","timestamp":1507302457}"#;
        assert!(matches!(
            decode(body.as_bytes()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_entity() {
        let body = r#"{"path":"/p"}"#;
        assert!(matches!(
            decode(body.as_bytes()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_path() {
        let body = r#"{"entity":"e","path":""}"#;
        assert_eq!(
            decode(body.as_bytes()),
            Err(DecodeError::EmptyField { field: "path" })
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(b"not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_is_under() {
        let msg = decode(NO_TIMESTAMP.as_bytes()).unwrap();
        assert!(msg.is_under("/foo"));
        assert!(msg.is_under("/foo/bar"));
        assert!(!msg.is_under("/other"));
    }

    proptest! {
        #[test]
        fn decode_is_deterministic(entity in "[A-Za-z0-9-]{1,36}", path in "/[a-z/]{0,40}") {
            let body = serde_json::json!({ "entity": entity, "path": path }).to_string();
            let first = decode(body.as_bytes()).unwrap();
            let second = decode(body.as_bytes()).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.entity, entity);
            prop_assert!(first.timestamp.is_none());
        }
    }
}
