//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.twepic/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TwepicConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub colors: ColorsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub fps: Option<u32>,
    /// Characters per second for the new-post reveal effect
    pub reveal_speed: Option<f32>,
    pub notice_seconds: Option<f32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub stream_url: Option<String>,
    pub web_url: Option<String>,
    pub token: Option<String>,
}

/// Per piece-role style overrides, keyed by role name (`hashtag`,
/// `link_domain`, `text_mention`, ...).
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ColorsConfig {
    #[serde(default)]
    pub column: BTreeMap<String, ColorSpec>,
    #[serde(default)]
    pub detail: BTreeMap<String, ColorSpec>,
}

/// One style override: either a keyword (`"none"`, `"username"`,
/// `"whitespace"`) or an explicit colour with attributes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Keyword(String),
    Style(StyleSpec),
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct StyleSpec {
    /// 6x6x6 colour cube coordinates, each 0..=5
    pub cube: Option<[u8; 3]>,
    /// One of the 16 basic terminal colours
    pub basic: Option<u8>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub reverse: bool,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_FPS: u32 = 60;
pub const DEFAULT_REVEAL_SPEED: f32 = 60.0;
pub const DEFAULT_NOTICE_SECONDS: f32 = 1.0;
pub const DEFAULT_API_URL: &str = "https://api.twitter.com/1.1";
pub const DEFAULT_STREAM_URL: &str = "https://userstream.twitter.com/1.1";
pub const DEFAULT_WEB_URL: &str = "https://twitter.com";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub fps: u32,
    pub reveal_speed: f32,
    pub notice_seconds: f32,
    pub api_url: String,
    pub stream_url: String,
    pub web_url: String,
    pub token: Option<String>,
    pub colors: ColorsConfig,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            reveal_speed: DEFAULT_REVEAL_SPEED,
            notice_seconds: DEFAULT_NOTICE_SECONDS,
            api_url: DEFAULT_API_URL.to_string(),
            stream_url: DEFAULT_STREAM_URL.to_string(),
            web_url: DEFAULT_WEB_URL.to_string(),
            token: None,
            colors: ColorsConfig::default(),
        }
    }
}

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub api_url: Option<String>,
    pub stream_url: Option<String>,
    pub fps: Option<u32>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.twepic/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".twepic").join("config.toml"))
}

/// Load config from `~/.twepic/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `TwepicConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<TwepicConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(TwepicConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(TwepicConfig::default());
    }

    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<TwepicConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: TwepicConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

fn generate_default_config(path: &Path) {
    let default_content = r#"# Twepic Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# fps = 60
# reveal_speed = 60.0               # characters per second for new posts
# notice_seconds = 1.0

# [api]
# base_url = "https://api.twitter.com/1.1"       # Or TWEPIC_API_URL
# stream_url = "https://userstream.twitter.com/1.1"  # Or TWEPIC_STREAM_URL
# web_url = "https://twitter.com"
# token = "..."                     # Or TWEPIC_TOKEN

# Style overrides per piece role, for the feed list and the detail panel.
# Values: "none", "username", "whitespace", or a table.
# [colors.column]
# hashtag = { cube = [5, 2, 0] }
# link_domain = { cube = [0, 2, 5], underline = true }
# text_mention = { basic = 11, bold = true }
#
# [colors.detail]
# mention_username = "username"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &TwepicConfig, cli: &CliOverrides) -> ResolvedConfig {
    // API URL: CLI → env → config → default
    let api_url = cli
        .api_url
        .clone()
        .or_else(|| std::env::var("TWEPIC_API_URL").ok())
        .or_else(|| config.api.base_url.clone())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    // Stream URL: CLI → env → config → default
    let stream_url = cli
        .stream_url
        .clone()
        .or_else(|| std::env::var("TWEPIC_STREAM_URL").ok())
        .or_else(|| config.api.stream_url.clone())
        .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());

    // Token: env → config
    let token = std::env::var("TWEPIC_TOKEN")
        .ok()
        .or_else(|| config.api.token.clone());

    ResolvedConfig {
        fps: cli
            .fps
            .or(config.general.fps)
            .unwrap_or(DEFAULT_FPS)
            .clamp(1, 240),
        reveal_speed: config
            .general
            .reveal_speed
            .unwrap_or(DEFAULT_REVEAL_SPEED),
        notice_seconds: config
            .general
            .notice_seconds
            .unwrap_or(DEFAULT_NOTICE_SECONDS),
        api_url,
        stream_url,
        web_url: config
            .api
            .web_url
            .clone()
            .unwrap_or_else(|| DEFAULT_WEB_URL.to_string()),
        token,
        colors: config.colors.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = TwepicConfig::default();
        assert!(config.colors.column.is_empty());
        assert!(config.api.base_url.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let resolved = resolve(&TwepicConfig::default(), &CliOverrides::default());
        assert_eq!(resolved.fps, DEFAULT_FPS);
        assert_eq!(resolved.reveal_speed, DEFAULT_REVEAL_SPEED);
        assert_eq!(resolved.web_url, DEFAULT_WEB_URL);
    }

    #[test]
    fn test_resolve_cli_wins() {
        let config = TwepicConfig {
            general: GeneralConfig {
                fps: Some(30),
                ..Default::default()
            },
            api: ApiConfig {
                base_url: Some("http://from-config".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            api_url: Some("http://from-cli".to_string()),
            fps: Some(1000),
            ..Default::default()
        };
        let resolved = resolve(&config, &cli);
        assert_eq!(resolved.api_url, "http://from-cli");
        assert_eq!(resolved.fps, 240);
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
fps = 30
notice_seconds = 2.5

[api]
base_url = "http://localhost:9000"
token = "abc"

[colors.column]
hashtag = { cube = [5, 2, 0], bold = true }
text_normal = "none"

[colors.detail]
mention_username = "username"
"#;
        let config: TwepicConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.fps, Some(30));
        assert_eq!(config.general.notice_seconds, Some(2.5));
        assert_eq!(config.api.token.as_deref(), Some("abc"));
        assert_eq!(
            config.colors.column.get("hashtag"),
            Some(&ColorSpec::Style(StyleSpec {
                cube: Some([5, 2, 0]),
                bold: true,
                ..Default::default()
            }))
        );
        assert_eq!(
            config.colors.column.get("text_normal"),
            Some(&ColorSpec::Keyword("none".to_string()))
        );
        assert_eq!(
            config.colors.detail.get("mention_username"),
            Some(&ColorSpec::Keyword("username".to_string()))
        );
    }

    #[test]
    fn test_sparse_toml_parses() {
        let config: TwepicConfig = toml::from_str("[general]\nfps = 20\n").unwrap();
        assert_eq!(config.general.fps, Some(20));
        assert!(config.api.token.is_none());
        assert!(config.colors.detail.is_empty());
    }

    #[test]
    fn test_load_config_from_reports_parse_errors() {
        let dir = std::env::temp_dir().join(format!("twepic-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[general\nfps = ").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
