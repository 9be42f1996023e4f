//! HTTP client for the conference API: room lookup, session tokens and
//! recording rules.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ShellError;
use crate::room::RoomLookup;
use crate::session::{RoomDirectory, SessionCredential, TokenIssuer};
use crate::settings::ShellConfig;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    user_identity: &'a str,
    room_name: &'a str,
    create_conversation: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    room_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Include,
    Exclude,
}

/// One entry of a room's recording rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// `audio` or `video`.
    #[serde(rename = "kind", default, skip_serializing_if = "Option::is_none")]
    pub track_kind: Option<String>,
}

impl RecordingRule {
    pub fn include_all() -> Self {
        Self {
            rule_type: RuleType::Include,
            all: Some(true),
            publisher: None,
            track_kind: None,
        }
    }

    pub fn exclude_all() -> Self {
        Self {
            rule_type: RuleType::Exclude,
            ..Self::include_all()
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordingRulesRequest<'a> {
    room_sid: &'a str,
    rules: &'a [RecordingRule],
    client_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Conference API bound to one base URL.
#[derive(Debug, Clone)]
pub struct ConferenceApi {
    base: Url,
    config: ShellConfig,
    http: Client,
}

impl ConferenceApi {
    pub fn new(base: Url, config: ShellConfig) -> Self {
        Self {
            base,
            config,
            http: Client::new(),
        }
    }

    /// Client for the API that serves `page_url`.
    pub fn for_page(page_url: &Url, config: ShellConfig) -> Result<Self, ShellError> {
        let base = config.resolve_api_base(page_url)?;
        Ok(Self::new(base, config))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ShellError> {
        self.base
            .join(path)
            .map_err(|e| ShellError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Room lookup URL for `token`.
    pub fn room_url(&self, token: &str) -> Result<String, ShellError> {
        let endpoint = self.endpoint(&self.config.room_path)?;
        Ok(format!("{endpoint}?token={}", urlencoding::encode(token)))
    }

    /// Replace the recording rules of a live room.
    ///
    /// Returns the server's JSON answer on success.
    pub async fn update_recording_rules(
        &self,
        room_sid: &str,
        rules: &[RecordingRule],
        client_id: &str,
    ) -> Result<serde_json::Value, ShellError> {
        let url = self.endpoint(&self.config.recording_rules_path)?;
        tracing::info!("updating recording rules for {room_sid}");

        let resp = self
            .http
            .post(url)
            .json(&RecordingRulesRequest {
                room_sid,
                rules,
                client_id,
            })
            .send()
            .await
            .map_err(|e| ShellError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ShellError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ShellError::Http(recording_rules_error(&body)));
        }
        serde_json::from_str(&body)
            .map_err(|e| ShellError::Http(format!("invalid recording rules response: {e}")))
    }
}

fn recording_rules_error(body: &str) -> String {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .unwrap_or_default()
        .error;
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| "There was an error updating recording rules".to_string());
    match detail.and_then(|d| d.code) {
        Some(code) => format!("{message} (code {code})"),
        None => message,
    }
}

#[async_trait]
impl RoomDirectory for ConferenceApi {
    async fn fetch_room_record(&self, token: &str) -> Result<RoomLookup, ShellError> {
        let url = self.room_url(token)?;
        tracing::info!("fetching room record from {}", self.base);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ShellError::RoomFetch(e.to_string()))?;
        let body = resp
            .text()
            .await
            .map_err(|e| ShellError::RoomFetch(e.to_string()))?;
        Ok(RoomLookup::from_json(&body))
    }
}

#[async_trait]
impl TokenIssuer for ConferenceApi {
    async fn issue_credential(
        &self,
        identity: &str,
        room_id_token: &str,
    ) -> Result<SessionCredential, ShellError> {
        let url = self.endpoint(&self.config.token_path)?;
        tracing::info!("requesting session token for {identity}");

        let resp = self
            .http
            .post(url)
            .json(&TokenRequest {
                user_identity: identity,
                room_name: room_id_token,
                create_conversation: self.config.create_conversation,
            })
            .send()
            .await
            .map_err(|e| ShellError::Credential(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ShellError::Credential(format!(
                "token endpoint returned status {}",
                resp.status()
            )));
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ShellError::Credential(format!("invalid token response: {e}")))?;

        Ok(SessionCredential {
            token: data.token,
            room_type: data.room_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(page: &str) -> ConferenceApi {
        ConferenceApi::for_page(&Url::parse(page).unwrap(), ShellConfig::default()).unwrap()
    }

    #[test]
    fn room_url_encodes_token() {
        let api = api("https://conf.example.com/?token=x");
        assert_eq!(
            api.room_url("a b&c").unwrap(),
            "https://conf.example.com/api/confroom/?token=a%20b%26c"
        );
    }

    #[test]
    fn localhost_page_targets_dev_server() {
        let api = api("http://localhost:3000/?token=x");
        assert_eq!(
            api.room_url("t").unwrap(),
            "http://localhost:3600/api/confroom/?token=t"
        );
    }

    #[test]
    fn token_request_shape() {
        let body = serde_json::to_value(TokenRequest {
            user_identity: "Alice",
            room_name: "room-abc",
            create_conversation: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "user_identity": "Alice",
                "room_name": "room-abc",
                "create_conversation": false
            })
        );
    }

    #[test]
    fn recording_rules_serialize_sparse() {
        let rules = [
            RecordingRule::include_all(),
            RecordingRule {
                rule_type: RuleType::Exclude,
                all: None,
                publisher: Some("bob".into()),
                track_kind: Some("video".into()),
            },
        ];
        let body = serde_json::to_value(RecordingRulesRequest {
            room_sid: "RM1",
            rules: &rules,
            client_id: "42",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "room_sid": "RM1",
                "rules": [
                    {"type": "include", "all": true},
                    {"type": "exclude", "publisher": "bob", "kind": "video"}
                ],
                "client_id": "42"
            })
        );
        assert_eq!(RecordingRule::exclude_all().rule_type, RuleType::Exclude);
    }

    #[test]
    fn recording_rules_error_uses_server_message() {
        assert_eq!(
            recording_rules_error(r#"{"error":{"message":"Room not found","code":53112}}"#),
            "Room not found (code 53112)"
        );
        assert_eq!(
            recording_rules_error("oops"),
            "There was an error updating recording rules"
        );
    }
}
