use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ShellError;
use crate::window::{AccessWindow, DEFAULT_GRACE_MS};

/// Port the conference API listens on during local development.
const LOCAL_API_BASE: &str = "http://localhost:3600";

/// Shell configuration, read from a JSON file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ShellConfig {
    /// Conference API base. Derived from the page URL when absent.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_room_path")]
    pub room_path: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    #[serde(default = "default_recording_rules_path")]
    pub recording_rules_path: String,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: i64,
    /// Ask the token endpoint to also create a chat conversation.
    #[serde(default = "default_true")]
    pub create_conversation: bool,
}

fn default_room_path() -> String {
    "/api/confroom/".to_string()
}

fn default_token_path() -> String {
    "/api/twilio".to_string()
}

fn default_recording_rules_path() -> String {
    "/api/recordingrules".to_string()
}

fn default_grace_period_ms() -> i64 {
    DEFAULT_GRACE_MS
}

fn default_true() -> bool {
    true
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            room_path: default_room_path(),
            token_path: default_token_path(),
            recording_rules_path: default_recording_rules_path(),
            grace_period_ms: default_grace_period_ms(),
            create_conversation: true,
        }
    }
}

impl ShellConfig {
    /// Read a config file, surfacing I/O and parse errors.
    pub fn load_from(path: &Path) -> Result<Self, ShellError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| ShellError::Config(format!("{}: {e}", path.display())))
    }

    /// Read a config file, falling back to defaults if it is missing or corrupt.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("using default config: {e}");
                Self::default()
            }
        }
    }

    pub fn access_window(&self) -> AccessWindow {
        AccessWindow::with_grace_ms(self.grace_period_ms)
    }

    /// API base for a page: the configured override, the local dev server for
    /// `localhost` pages, otherwise the page origin.
    pub fn resolve_api_base(&self, page_url: &Url) -> Result<Url, ShellError> {
        if let Some(base) = &self.api_base {
            return Url::parse(base).map_err(|e| ShellError::InvalidUrl(format!("{base}: {e}")));
        }

        let origin = page_url.origin();
        if !origin.is_tuple() {
            return Err(ShellError::InvalidUrl(format!(
                "page url has no origin: {page_url}"
            )));
        }
        let serialized = origin.ascii_serialization();
        let base = if serialized.contains("localhost") {
            LOCAL_API_BASE.to_string()
        } else {
            serialized
        };
        Url::parse(&base).map_err(|e| ShellError::InvalidUrl(format!("{base}: {e}")))
    }
}

/// Participant preferences kept between visits.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Preferences {
    #[serde(default)]
    pub display_name: Option<String>,
}

pub struct PreferencesStore {
    preferences: Mutex<Preferences>,
    file_path: PathBuf,
}

impl PreferencesStore {
    pub fn new(data_dir: &Path) -> Self {
        let file_path = data_dir.join("preferences.json");
        let preferences = Self::load(&file_path);
        Self {
            preferences: Mutex::new(preferences),
            file_path,
        }
    }

    pub fn get(&self) -> Preferences {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.preferences
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .display_name = name;
        self.save();
    }

    fn save(&self) {
        let preferences = self.get();
        if let Some(parent) = self.file_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("cannot create {}: {e}", parent.display());
                return;
            }
        }
        match serde_json::to_string_pretty(&preferences) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("cannot write {}: {e}", self.file_path.display());
                }
            }
            Err(e) => tracing::warn!("cannot serialize preferences: {e}"),
        }
    }

    fn load(path: &Path) -> Preferences {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Preferences::default(),
        }
    }
}
