// ABOUTME: Configuration parsing from TOML file with environment variable overrides.
// ABOUTME: Validates provider keys and resolves storage and URL settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub urls: UrlsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Provider keys to construct clients for, in presentation order
    #[serde(default = "default_enabled_providers")]
    pub enabled: Vec<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_providers(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Overrides the platform data directory when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlsConfig {
    #[serde(default = "default_onboarding_url")]
    pub onboarding: String,
    #[serde(default = "default_issue_url")]
    pub issue_report: String,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            onboarding: default_onboarding_url(),
            issue_report: default_issue_url(),
        }
    }
}

fn default_enabled_providers() -> Vec<String> {
    vec![
        "slack".to_string(),
        "discord".to_string(),
        "liveshare".to_string(),
    ]
}

fn default_onboarding_url() -> String {
    "https://huddle.dev/setup".to_string()
}

fn default_issue_url() -> String {
    "https://github.com/huddle-dev/huddle/issues/new".to_string()
}

impl Config {
    /// Load configuration from `huddle.toml` with environment variable
    /// overrides, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("huddle.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Config {
                providers: ProvidersConfig::default(),
                storage: StorageConfig::default(),
                urls: UrlsConfig::default(),
            }
        };

        if let Ok(val) = std::env::var("HUDDLE_PROVIDERS") {
            config.providers.enabled = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("HUDDLE_DATA_DIR") {
            config.storage.data_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("HUDDLE_ONBOARDING_URL") {
            config.urls.onboarding = val;
        }
        if let Ok(val) = std::env::var("HUDDLE_ISSUE_URL") {
            config.urls.issue_report = val;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.providers.enabled.is_empty() {
            anyhow::bail!(
                "providers.enabled must name at least one provider \
                 (set in huddle.toml or HUDDLE_PROVIDERS env var)"
            );
        }
        for key in &self.providers.enabled {
            if key.chars().any(|c| c.is_uppercase() || c.is_whitespace()) {
                anyhow::bail!("invalid provider key '{}': keys are lowercase words", key);
            }
        }
        Ok(())
    }

    /// URLs in the shape the session aggregate expects.
    pub fn session_urls(&self) -> huddle_core::SessionUrls {
        huddle_core::SessionUrls {
            onboarding: self.urls.onboarding.clone(),
            issue_report: self.urls.issue_report.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_file() {
        let config = Config::load_from(Path::new("/nonexistent/huddle.toml")).unwrap();
        assert_eq!(config.providers.enabled, vec!["slack", "discord", "liveshare"]);
        assert!(config.storage.data_dir.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [providers]
            enabled = ["slack"]

            [urls]
            onboarding = "https://example.com/start"
            "#,
        )
        .unwrap();
        assert_eq!(config.providers.enabled, vec!["slack"]);
        assert_eq!(config.urls.onboarding, "https://example.com/start");
        assert_eq!(config.urls.issue_report, default_issue_url());
    }

    #[test]
    fn test_invalid_provider_key_rejected() {
        let config = Config {
            providers: ProvidersConfig {
                enabled: vec!["Slack".to_string()],
            },
            storage: StorageConfig::default(),
            urls: UrlsConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_providers_rejected() {
        let config = Config {
            providers: ProvidersConfig { enabled: vec![] },
            storage: StorageConfig::default(),
            urls: UrlsConfig::default(),
        };
        assert!(config.validate().is_err());
    }
}
