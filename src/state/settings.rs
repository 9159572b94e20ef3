// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_ACTIVITY_LIMIT, MIN_ACTIVITY_LIMIT};
use crate::network::SiteId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid more-info url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Network-wide community settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunitySettings {
    /// Site hosting the mirror and the directory (0 = not configured)
    #[serde(default)]
    pub community_site: SiteId,
    /// Retention cap for mirror posts
    #[serde(default = "default_activity_limit")]
    pub activity_limit: u32,
    /// Emails of users whose posts are never mirrored
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub more_info_url: Option<String>,
    /// Shared token expected on asynchronous load-more requests
    #[serde(default)]
    pub request_token: String,
}

fn default_activity_limit() -> u32 {
    DEFAULT_ACTIVITY_LIMIT
}

impl Default for CommunitySettings {
    fn default() -> Self {
        Self {
            community_site: 0,
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            blacklist: Vec::new(),
            more_info_url: None,
            request_token: String::new(),
        }
    }
}

/// Raw values as submitted by the settings form
#[derive(Debug, Clone, Default)]
pub struct SettingsInput {
    pub community_site: String,
    pub activity_limit: String,
    pub blacklist: String,
    pub more_info_url: String,
    pub request_token: String,
}

impl CommunitySettings {
    /// The community site, if one is configured
    pub fn community_site(&self) -> Option<SiteId> {
        (self.community_site > 0).then_some(self.community_site)
    }

    pub fn is_blacklisted(&self, email: &str) -> bool {
        self.blacklist.iter().any(|e| e.eq_ignore_ascii_case(email))
    }

    /// Normalize submitted form values.
    /// Unparseable numbers become 0, the blacklist is comma-split and trimmed.
    pub fn from_input(input: &SettingsInput) -> Result<Self, SettingsError> {
        let community_site = parse_absint(&input.community_site);

        let activity_limit = match parse_absint(&input.activity_limit) {
            0 => DEFAULT_ACTIVITY_LIMIT,
            n => u32::try_from(n).unwrap_or(u32::MAX).max(MIN_ACTIVITY_LIMIT),
        };

        let blacklist = input
            .blacklist
            .trim()
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();

        let more_info_url = match input.more_info_url.trim() {
            "" => None,
            raw => Some(url::Url::parse(raw)?.to_string()),
        };

        Ok(Self {
            community_site,
            activity_limit,
            blacklist,
            more_info_url,
            request_token: input.request_token.trim().to_string(),
        })
    }

    /// Get the settings file path (~/.config/campus-commons/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the default location, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "invalid settings file, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }
}

/// Parse like an absolute integer: sign dropped, garbage is 0
fn parse_absint(raw: &str) -> u64 {
    let digits: String = raw
        .trim()
        .trim_start_matches(['-', '+'])
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse() {
        Ok(n) => n,
        Err(_) if digits.is_empty() => 0,
        // Only overflow remains
        Err(_) => u64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = CommunitySettings::load_from(&dir.path().join("missing.json"));
        assert_eq!(settings.community_site(), None);
        assert_eq!(settings.activity_limit, DEFAULT_ACTIVITY_LIMIT);
        assert!(settings.blacklist.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = CommunitySettings {
            community_site: 7,
            activity_limit: 500,
            blacklist: vec!["spam@example.org".to_string()],
            more_info_url: Some("https://example.org/info".to_string()),
            request_token: "secret".to_string(),
        };
        settings.save_to(&path).unwrap();

        let loaded = CommunitySettings::load_from(&path);
        assert_eq!(loaded.community_site(), Some(7));
        assert_eq!(loaded.activity_limit, 500);
        assert!(loaded.is_blacklisted("SPAM@example.org"));
        assert_eq!(loaded.request_token, "secret");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"community_site": 3}"#).unwrap();

        let loaded = CommunitySettings::load_from(&path);
        assert_eq!(loaded.community_site, 3);
        assert_eq!(loaded.activity_limit, DEFAULT_ACTIVITY_LIMIT);
    }

    #[test]
    fn test_from_input_normalizes() {
        let input = SettingsInput {
            community_site: " -12 ".to_string(),
            activity_limit: "50".to_string(),
            blacklist: " a@x.org , ,b@x.org ".to_string(),
            more_info_url: String::new(),
            request_token: " tok ".to_string(),
        };
        let settings = CommunitySettings::from_input(&input).unwrap();
        assert_eq!(settings.community_site, 12);
        assert_eq!(settings.activity_limit, MIN_ACTIVITY_LIMIT);
        assert_eq!(settings.blacklist, vec!["a@x.org", "b@x.org"]);
        assert_eq!(settings.more_info_url, None);
        assert_eq!(settings.request_token, "tok");

        let huge = SettingsInput {
            activity_limit: "4294967496".to_string(),
            ..Default::default()
        };
        let settings = CommunitySettings::from_input(&huge).unwrap();
        assert_eq!(settings.activity_limit, u32::MAX);

        let in_range = SettingsInput {
            activity_limit: "20000".to_string(),
            ..Default::default()
        };
        let settings = CommunitySettings::from_input(&in_range).unwrap();
        assert_eq!(settings.activity_limit, 20000);
    }

    #[test]
    fn test_from_input_rejects_bad_url() {
        let input = SettingsInput {
            more_info_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(CommunitySettings::from_input(&input).is_err());
    }

    #[test]
    fn test_parse_absint() {
        assert_eq!(parse_absint("42abc"), 42);
        assert_eq!(parse_absint("abc"), 0);
        assert_eq!(parse_absint(""), 0);
        assert_eq!(parse_absint("99999999999999999999999"), u64::MAX);
    }
}
