use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub sheets: Option<SheetsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    /// JID of the one group whose messages are processed, e.g.
    /// "120363403986445201@g.us". Everything else is rejected.
    pub group_jid: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    /// File containing a Google API bearer token.
    pub credentials_path: PathBuf,
    pub spreadsheet_id: String,
    #[serde(default = "default_worksheet")]
    pub worksheet: String,
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        port: default_port(),
        debug: false,
    }
}

fn default_port() -> u16 {
    5000
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_worksheet() -> String {
    "Sheet1".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // The key can live in the environment instead of the config file.
        if config.gemini.api_key.is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                config.gemini.api_key = key;
            }
        }

        if config.gemini.api_key.is_empty() {
            anyhow::bail!(
                "Gemini API key missing: set [gemini] api_key or the GEMINI_API_KEY env var"
            );
        }

        if config.whatsapp.group_jid.is_empty() {
            anyhow::bail!("[whatsapp] group_jid must not be empty");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 8080
            debug = true

            [gemini]
            api_key = "test-key"
            model = "gemini-2.5-flash"

            [whatsapp]
            group_jid = "120363403986445201@g.us"

            [sheets]
            credentials_path = "/etc/wa-intake/token"
            spreadsheet_id = "abc123"
            worksheet = "Leads"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.server.debug);
        assert_eq!(config.gemini.api_key, "test-key");
        assert_eq!(config.gemini.base_url, default_base_url());
        assert_eq!(config.whatsapp.group_jid, "120363403986445201@g.us");
        assert_eq!(config.sheets.unwrap().worksheet, "Leads");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gemini]
            api_key = "k"

            [whatsapp]
            group_jid = "g@g.us"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 5000);
        assert!(!config.server.debug);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
        assert!(config.sheets.is_none());
    }

    #[test]
    fn test_sheets_worksheet_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gemini]
            api_key = "k"

            [whatsapp]
            group_jid = "g@g.us"

            [sheets]
            credentials_path = "token"
            spreadsheet_id = "id"
            "#,
        )
        .unwrap();

        assert_eq!(config.sheets.unwrap().worksheet, "Sheet1");
    }
}
