//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::view::view_mode::VIEW_MODE_KEY;

/// Conexia configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub tables: TableConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub projects: String,
    pub trainings: String,
    /// Column that scopes every row to its owning company
    pub company_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub view_mode_key: String,
    pub default_avatar_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            projects: "conex_projetos".to_string(),
            trainings: "conex_treinamentos".to_string(),
            company_column: "empresa".to_string(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            view_mode_key: VIEW_MODE_KEY.to_string(),
            default_avatar_url:
                "https://tfmzozvazfbrapkzxrcz.supabase.co/storage/v1/object/public/conexia/user-perfil.png"
                    .to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("CONEXIA_API_KEY")
            .or_else(|_| env::var("SUPABASE_ANON_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact_key(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Gateway API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CONEXIA_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("conexia")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the UI preference file path
    pub fn preferences_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("preferences.toml"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.gateway.enforce_env_only()?;
        if self.tables.company_column.trim().is_empty() {
            return Err(anyhow!("tables.company_column must not be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "gateway.url" => Ok(self.gateway.url.clone()),
            "gateway.timeout_secs" => Ok(self.gateway.timeout_secs.to_string()),

            "tables.projects" => Ok(self.tables.projects.clone()),
            "tables.trainings" => Ok(self.tables.trainings.clone()),
            "tables.company_column" => Ok(self.tables.company_column.clone()),

            "ui.view_mode_key" => Ok(self.ui.view_mode_key.clone()),
            "ui.default_avatar_url" => Ok(self.ui.default_avatar_url.clone()),

            // API key (special handling - show redacted)
            "gateway.api_key" | "api_key" => match self.gateway.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use CONEXIA_API_KEY or SUPABASE_ANON_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `conexia config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "gateway.url" => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(anyhow!("Gateway URL must start with http:// or https://"));
                }
                self.gateway.url = value.trim_end_matches('/').to_string();
            }
            "gateway.timeout_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Timeout must be at least one second"));
                }
                self.gateway.timeout_secs = secs;
            }

            "tables.projects" => self.tables.projects = non_empty(key, value)?,
            "tables.trainings" => self.tables.trainings = non_empty(key, value)?,
            "tables.company_column" => self.tables.company_column = non_empty(key, value)?,

            "ui.view_mode_key" => self.ui.view_mode_key = non_empty(key, value)?,
            "ui.default_avatar_url" => self.ui.default_avatar_url = value.to_string(),

            // API key cannot be set via config
            "gateway.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the CONEXIA_API_KEY or SUPABASE_ANON_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `conexia config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "gateway.url",
            "gateway.timeout_secs",
            "gateway.api_key",
            "tables.projects",
            "tables.trainings",
            "tables.company_column",
            "ui.view_mode_key",
            "ui.default_avatar_url",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("{} must not be empty", key));
    }
    Ok(value.to_string())
}

/// Keep only the last four characters of a secret
fn redact_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let suffix: String = key.chars().skip(count - 4).collect();
    format!("***{}", suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.gateway.api_key.is_none());
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.tables.projects, "conex_projetos");
        assert_eq!(config.tables.company_column, "empresa");
        assert_eq!(config.ui.view_mode_key, "projetosViewType");
    }

    #[test]
    fn test_config_toml_roundtrip_skips_api_key() {
        let mut config = Config::default();
        config.gateway.url = "https://example.supabase.co".to_string();

        let serialized = toml::to_string_pretty(&config).expect("Should serialize");
        assert!(!serialized.contains("api_key"));

        let parsed: Config = toml::from_str(&serialized).expect("Should parse");
        assert_eq!(parsed.gateway.url, "https://example.supabase.co");
        assert_eq!(parsed.tables.trainings, config.tables.trainings);
    }

    #[test]
    fn test_set_and_get_known_keys() {
        let mut config = Config::default();

        config.set("gateway.url", "https://abc.supabase.co/").unwrap();
        assert_eq!(config.get("gateway.url").unwrap(), "https://abc.supabase.co");

        config.set("gateway.timeout_secs", "5").unwrap();
        assert_eq!(config.get("gateway.timeout_secs").unwrap(), "5");

        config.set("tables.projects", "projects").unwrap();
        assert_eq!(config.get("tables.projects").unwrap(), "projects");
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();

        assert!(config.set("gateway.url", "ftp://nope").is_err());
        assert!(config.set("gateway.timeout_secs", "0").is_err());
        assert!(config.set("gateway.timeout_secs", "soon").is_err());
        assert!(config.set("tables.company_column", "   ").is_err());
        assert!(config.set("gateway.api_key", "secret").is_err());
        assert!(config.set("no.such.key", "x").is_err());
    }

    #[test]
    fn test_stored_api_key_fails_validation() {
        let mut config = Config::default();
        config.gateway.api_key = Some("inline".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redact_key_counts_characters() {
        assert_eq!(redact_key("abc"), "***");
        assert_eq!(redact_key("abcd"), "***");
        assert_eq!(redact_key("sk-live-1234"), "***1234");
        assert_eq!(redact_key("chave-é"), "***ve-é");
        assert_eq!(redact_key("ééééé"), "***éééé");
    }

    #[test]
    fn test_list_contains_every_key() {
        let config = Config::default();
        let entries = config.list().unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();

        assert!(keys.contains(&"gateway.url"));
        assert!(keys.contains(&"tables.trainings"));
        assert!(keys.contains(&"ui.default_avatar_url"));
        assert_eq!(entries.len(), 8);
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let parsed: Config = toml::from_str("[gateway]\nurl = \"https://x.supabase.co\"\n").unwrap();
        assert_eq!(parsed.gateway.url, "https://x.supabase.co");
        assert_eq!(parsed.gateway.timeout_secs, 30);
        assert_eq!(parsed.tables.projects, "conex_projetos");
    }
}
