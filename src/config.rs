use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::BaseDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ConfigError};
use crate::utils::normalize_url;

/// HubSpot's search endpoint stops paging at 10k results.
pub const DEFAULT_FULL_SET_CAP: usize = 10_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    #[default]
    Litto,
    Skwezed,
}

impl Brand {
    pub const ALL: [Brand; 2] = [Brand::Litto, Brand::Skwezed];

    pub fn as_str(self) -> &'static str {
        match self {
            Brand::Litto => "litto",
            Brand::Skwezed => "skwezed",
        }
    }

    fn env_suffix(self) -> &'static str {
        match self {
            Brand::Litto => "LITTO",
            Brand::Skwezed => "SKWEZED",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "litto" => Ok(Brand::Litto),
            "skwezed" => Ok(Brand::Skwezed),
            other => Err(format!("unknown brand: {other}")),
        }
    }
}

/// The signed-in brand ambassador. Their e-mail scopes every contact query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: String,
    #[serde(default)]
    pub brand: Brand,
}

impl Session {
    pub fn new(email: &str, brand: Brand) -> Result<Self, ApiError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ApiError::Unauthorized("You must be logged in.".into()));
        }
        Ok(Self { email, brand })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandSettings {
    pub base_url: String,
    pub token: String,
    pub preferred_owner_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandCredentials {
    pub base_url: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub session: Option<Session>,
    pub litto: BrandSettings,
    pub skwezed: BrandSettings,
    pub full_set_cap: usize,
    pub request_timeout_secs: u64,
    pub last_location: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session: None,
            litto: BrandSettings::default(),
            skwezed: BrandSettings::default(),
            full_set_cap: DEFAULT_FULL_SET_CAP,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_location: None,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("ba-dashboard.toml"))
    }

    /// Reads the user's settings file; a missing or unreadable file yields
    /// defaults.
    pub fn load() -> Self {
        let Some(path) = Self::toml_path() else {
            warn!("No config dir, using default settings");
            return Self::new();
        };
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                Self::new()
            }
            Err(e) => {
                warn!("Failed to load {}: {e}", path.display());
                Self::new()
            }
        }
    }

    /// A stored session goes through [`Session::new`] again, so a hand-edited
    /// e-mail is trimmed and lowercased and a blank one signs out.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&text)?;
        settings.session = settings
            .session
            .take()
            .and_then(|s| Session::new(&s.email, s.brand).ok());
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::toml_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn brand(&self, brand: Brand) -> &BrandSettings {
        match brand {
            Brand::Litto => &self.litto,
            Brand::Skwezed => &self.skwezed,
        }
    }

    pub fn brand_mut(&mut self, brand: Brand) -> &mut BrandSettings {
        match brand {
            Brand::Litto => &mut self.litto,
            Brand::Skwezed => &mut self.skwezed,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn credentials(&self, brand: Brand) -> Result<BrandCredentials, ApiError> {
        self.credentials_with(brand, |key| std::env::var(key).ok())
    }

    /// Settings file first, then `HUBSPOT_*_{BRAND}`, then the unsuffixed
    /// `HUBSPOT_*` variables.
    pub fn credentials_with<F>(&self, brand: Brand, env: F) -> Result<BrandCredentials, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stored = self.brand(brand);
        let lookup = |stored: &str, key: &str| -> Option<String> {
            let stored = stored.trim();
            if !stored.is_empty() {
                return Some(stored.to_string());
            }
            env(&format!("{key}_{}", brand.env_suffix()))
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        match (
            lookup(&stored.base_url, "HUBSPOT_API_BASE"),
            lookup(&stored.token, "HUBSPOT_ACCESS_TOKEN"),
        ) {
            (Some(base_url), Some(token)) => Ok(BrandCredentials {
                base_url: normalize_url(&base_url),
                token,
            }),
            _ => Err(ApiError::config("HUBSPOT_API_BASE or HUBSPOT_ACCESS_TOKEN")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn settings_round_trip_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("ba-dashboard.toml");

        let mut settings = Settings::new();
        settings.session = Some(Session::new("BA@Example.com ", Brand::Skwezed).unwrap());
        settings.skwezed.base_url = "https://api.hubapi.com".into();
        settings.skwezed.token = "pat-na1-abc".into();
        settings.last_location = Some("/dashboard?page=2".into());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.session.unwrap().email, "ba@example.com");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ba-dashboard.toml");
        fs::write(&path, "[litto]\ntoken = \"pat\"\n").unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.litto.token, "pat");
        assert_eq!(loaded.full_set_cap, DEFAULT_FULL_SET_CAP);
        assert!(loaded.session.is_none());
    }

    #[test]
    fn hand_edited_session_is_normalized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ba-dashboard.toml");
        fs::write(&path, "[session]\nemail = \"  BA@Example.COM \"\nbrand = \"skwezed\"\n").unwrap();
        let session = Settings::load_from(&path).unwrap().session.unwrap();
        assert_eq!(session.email, "ba@example.com");
        assert_eq!(session.brand, Brand::Skwezed);

        fs::write(&path, "[session]\nemail = \"   \"\n").unwrap();
        assert!(Settings::load_from(&path).unwrap().session.is_none());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ba-dashboard.toml");
        fs::write(&path, "full_set_cap = \"many\"").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn credentials_prefer_file_then_brand_env_then_generic_env() {
        let mut settings = Settings::new();
        settings.litto.token = "file-token".into();

        let env = |key: &str| match key {
            "HUBSPOT_API_BASE_LITTO" => Some("litto.hubapi.test".to_string()),
            "HUBSPOT_API_BASE" => Some("https://generic.test".to_string()),
            "HUBSPOT_ACCESS_TOKEN" => Some("env-token".to_string()),
            _ => None,
        };

        let litto = settings.credentials_with(Brand::Litto, env).unwrap();
        assert_eq!(litto.base_url, "https://litto.hubapi.test");
        assert_eq!(litto.token, "file-token");

        let skwezed = settings.credentials_with(Brand::Skwezed, env).unwrap();
        assert_eq!(skwezed.base_url, "https://generic.test");
        assert_eq!(skwezed.token, "env-token");
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let err = Settings::new()
            .credentials_with(Brand::Litto, |_| None)
            .unwrap_err();
        assert!(matches!(err, ApiError::Config { .. }));
    }

    #[test]
    fn empty_session_email_is_unauthorized() {
        assert!(matches!(
            Session::new("  ", Brand::Litto),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
