use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ShellError;

/// A scheduled conference room as described by the room directory.
///
/// Never mutated after it is received; a fresh fetch supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    pub room_id_token: String,
    #[serde(deserialize_with = "de_instant")]
    pub accessible_from: DateTime<Utc>,
    #[serde(deserialize_with = "de_instant")]
    pub accessible_to: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mode: String,
    /// Name of the person who booked the room.
    #[serde(rename = "user_name", default, deserialize_with = "de_lenient_string")]
    pub owner_name: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub client_id: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub client_name: String,
    #[serde(default)]
    pub client_logo: bool,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub user_avatar: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub user_id: String,
    /// Where the recording link goes. Empty strings are treated as absent.
    #[serde(default, deserialize_with = "de_optional_email")]
    pub email: Option<String>,
}

impl RoomRecord {
    /// Browser tab title used by the embedding page.
    pub fn page_title(&self) -> String {
        format!("{} - Video Conference App", self.client_name)
    }
}

/// Outcome of a room directory lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomLookup {
    Found(RoomRecord),
    /// The directory answered but did not accept the token.
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct RoomEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl RoomLookup {
    /// Interpret a room directory response body.
    ///
    /// `{"success": true, "data": {...}}` is a record; anything else,
    /// including unparseable bodies, is a rejection.
    pub fn from_json(body: &str) -> Self {
        let envelope: RoomEnvelope = match serde_json::from_str(body) {
            Ok(e) => e,
            Err(e) => return RoomLookup::Rejected(format!("malformed room response: {e}")),
        };

        if envelope.success {
            if let Some(data) = envelope.data {
                return match serde_json::from_value::<RoomRecord>(data) {
                    Ok(record) => RoomLookup::Found(record),
                    Err(e) => RoomLookup::Rejected(format!("invalid room record: {e}")),
                };
            }
        }

        let reason = match envelope.error {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => envelope
                .message
                .unwrap_or_else(|| "room not found".to_string()),
            Some(other) => other.to_string(),
        };
        RoomLookup::Rejected(reason)
    }

    /// Fold a directory call into a lookup. A failed fetch rejects the token.
    pub fn from_fetch(result: Result<RoomLookup, ShellError>) -> Self {
        result.unwrap_or_else(|e| {
            tracing::warn!("room fetch failed: {e}");
            RoomLookup::Rejected(e.to_string())
        })
    }

    pub fn record(&self) -> Option<&RoomRecord> {
        match self {
            RoomLookup::Found(record) => Some(record),
            RoomLookup::Rejected(_) => None,
        }
    }
}

/// Parse a room boundary timestamp.
///
/// RFC 3339 is preferred; zone-less date-times are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInstant {
    Text(String),
    Millis(i64),
}

fn de_instant<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    match RawInstant::deserialize(d)? {
        RawInstant::Text(raw) => parse_instant(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognised timestamp '{raw}'"))
        }),
        RawInstant::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
    }
}

fn de_lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(d)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn de_optional_email<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let email = Option::<String>::deserialize(d)?;
    Ok(email.filter(|e| !e.trim().is_empty()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_record(from: DateTime<Utc>, to: DateTime<Utc>) -> RoomRecord {
        RoomRecord {
            room_id_token: "room-abc".to_string(),
            accessible_from: from,
            accessible_to: to,
            title: "Weekly sync".to_string(),
            mode: "grid".to_string(),
            owner_name: "Dana".to_string(),
            client_id: "42".to_string(),
            client_name: "Acme".to_string(),
            client_logo: false,
            user_avatar: String::new(),
            user_id: "7".to_string(),
            email: None,
        }
    }

    #[test]
    fn parses_successful_envelope() {
        let body = r#"{
            "success": true,
            "data": {
                "room_id_token": "tok-1",
                "accessible_from": "2026-10-19T09:00:00Z",
                "accessible_to": "2026-10-19T10:00:00Z",
                "title": "Standup",
                "mode": "speaker",
                "user_name": "Dana",
                "client_id": 12,
                "client_name": "Acme",
                "client_logo": true,
                "user_avatar": null,
                "user_id": 99,
                "email": "dana@example.com"
            }
        }"#;
        let lookup = RoomLookup::from_json(body);
        let record = lookup.record().unwrap();
        assert_eq!(record.room_id_token, "tok-1");
        assert_eq!(record.owner_name, "Dana");
        assert_eq!(record.client_id, "12");
        assert_eq!(record.user_id, "99");
        assert_eq!(record.user_avatar, "");
        assert_eq!(record.email.as_deref(), Some("dana@example.com"));
        assert_eq!(
            record.accessible_from,
            Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
        );
        assert_eq!(record.page_title(), "Acme - Video Conference App");
    }

    #[test]
    fn empty_email_is_absent() {
        let body = r#"{"success":true,"data":{
            "room_id_token":"t","accessible_from":"2026-01-01 10:00:00",
            "accessible_to":"2026-01-01T11:00:00","email":""}}"#;
        let record = RoomLookup::from_json(body).record().cloned().unwrap();
        assert_eq!(record.email, None);
        assert_eq!(
            record.accessible_to,
            Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap()
        );
    }

    #[test]
    fn epoch_millis_timestamps_are_accepted() {
        let body = r#"{"success":true,"data":{
            "room_id_token":"t","accessible_from":1700000000000,"accessible_to":1700003600000}}"#;
        let record = RoomLookup::from_json(body).record().cloned().unwrap();
        assert_eq!(record.accessible_from.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn error_body_is_rejected() {
        assert_eq!(
            RoomLookup::from_json(r#"{"error":"Invalid token"}"#),
            RoomLookup::Rejected("Invalid token".to_string())
        );
        assert_eq!(
            RoomLookup::from_json(r#"{"success":false,"message":"expired link"}"#),
            RoomLookup::Rejected("expired link".to_string())
        );
        assert_eq!(
            RoomLookup::from_json(r#"{"success":false}"#),
            RoomLookup::Rejected("room not found".to_string())
        );
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert!(matches!(
            RoomLookup::from_json("<html>502</html>"),
            RoomLookup::Rejected(_)
        ));
        assert!(matches!(
            RoomLookup::from_json(r#"{"success":true,"data":{"room_id_token":"t"}}"#),
            RoomLookup::Rejected(_)
        ));
    }

    #[test]
    fn failed_fetch_is_a_rejection() {
        let err = ShellError::Http("connection refused".into());
        match RoomLookup::from_fetch(Err(err)) {
            RoomLookup::Rejected(reason) => assert!(reason.contains("connection refused")),
            other => panic!("unexpected lookup {other:?}"),
        }

        let found = RoomLookup::Found(sample_record(Utc::now(), Utc::now()));
        assert_eq!(RoomLookup::from_fetch(Ok(found.clone())), found);
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert!(parse_instant("tomorrow").is_none());
        assert!(parse_instant("2026-10-19T09:00:00+02:00").is_some());
    }
}
