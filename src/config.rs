use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub safety: SafetyConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Working directory adopted at startup; current directory when unset.
    pub working_dir: Option<PathBuf>,
    /// Theme name carried for the UI collaborator. The core only stores it.
    pub theme: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SafetyConfig {
    /// Substrings that block a command outright, matched case-insensitively.
    pub forbidden: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows shown per history page.
    pub history_limit: usize,
    /// Distinct recent commands fed into the suggestion set.
    pub suggestion_history: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            working_dir: None,
            theme: "dark".to_string(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            forbidden: crate::safety::DEFAULT_DENY_LIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            suggestion_history: 20,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            safety: SafetyConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(config_dir) = config_path.parent() {
            fs::create_dir_all(config_dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cmdpad")
    }

    pub fn db_path() -> PathBuf {
        Self::base_dir().join("commands.db")
    }

    fn config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.theme, "dark");
        assert_eq!(config.display.history_limit, 100);
        assert_eq!(config.display.suggestion_history, 20);
        assert!(config.safety.forbidden.contains(&"rm -rf".to_string()));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.safety.forbidden, config.safety.forbidden);
        assert_eq!(parsed.general.theme, config.general.theme);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[general]\ntheme = \"light\"\n").unwrap();
        assert_eq!(parsed.general.theme, "light");
        assert_eq!(parsed.display.history_limit, 100);
    }
}
