//! Configuration file support

use ochat_ai::DEFAULT_ENDPOINT;
use ochat_tui::Theme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "OCHAT_CONFIG_PATH";

/// Environment variable overriding the server endpoint
pub const ENDPOINT_ENV: &str = "OCHAT_ENDPOINT";

/// Color scheme for the TUI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn theme(self) -> Theme {
        match self {
            ThemeName::Dark => Theme::dark(),
            ThemeName::Light => Theme::light(),
        }
    }
}

/// Configuration for ochat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the generation proxy
    pub endpoint: Option<String>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
    pub theme: Option<ThemeName>,
}

impl Config {
    /// Directory holding the config file and the debug log
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ochat")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location. A missing file gives the
    /// defaults; an unreadable one warns and gives the defaults.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            tui: Some(true),
            theme: Some(ThemeName::Dark),
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Pick the endpoint: command line, then environment, then file, then
    /// the built-in default
    pub fn resolve_endpoint(&self, cli: Option<&str>, env: Option<&str>) -> String {
        [cli, env, self.endpoint.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string()
    }

    pub fn theme(&self) -> Theme {
        self.theme.unwrap_or_default().theme()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# ochat configuration file
# Place at ~/.config/ochat/config.toml (Linux), ~/Library/Application Support/ochat/config.toml (macOS)
# or %APPDATA%\ochat\config.toml (Windows). OCHAT_CONFIG_PATH overrides the location.

# Base URL of the generation proxy (POST {endpoint}/stream)
# OCHAT_ENDPOINT and --endpoint take precedence
endpoint = "http://10.100.201.91:8000"

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

# Color theme: "dark" or "light"
theme = "dark"
"#
}
