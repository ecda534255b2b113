//! Configuration for knowtree, persisted as TOML.
//!
//! Lives at `$XDG_CONFIG_HOME/knowtree/config.toml` unless `--config` points
//! elsewhere. Every field has a serde default, so a missing file or a partial
//! file both yield a working configuration.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::LayoutConfig;

/// Errors from configuration handling.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(knowtree::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(knowtree::config::parse),
        help("Check the TOML syntax. `knowtree config init` writes a fresh default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(knowtree::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Language-model endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    pub model: String,
    /// Inline credential. Prefer `api_key_env` for shared config files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Output cap for the refinement call.
    pub refine_max_tokens: u32,
    /// Output cap for the mind-map call; unset means no cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4".into(),
            api_key: None,
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 120,
            refine_max_tokens: 100,
            generate_max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// The inline key if set and non-blank, otherwise the environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Encyclopedia lookup settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Wikipedia language edition.
    pub language: String,
    pub top_k_results: usize,
    /// Character budget per excerpt.
    pub doc_content_chars_max: usize,
    /// Keep page id and URL alongside each excerpt.
    pub load_all_available_meta: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Override for the API root (defaults to `https://{language}.wikipedia.org/w/api.php`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            language: "pt".into(),
            top_k_results: 3,
            doc_content_chars_max: 10_000,
            load_all_available_meta: true,
            timeout_secs: 30,
            user_agent: concat!("knowtree/", env!("CARGO_PKG_VERSION")).into(),
            api_url: None,
        }
    }
}

impl KnowledgeConfig {
    pub fn endpoint(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.wikipedia.org/w/api.php", self.language))
    }
}

/// History retention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained generations; unset keeps everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Account and entitlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub subscribed: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email: None,
            subscribed: true,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowtreeConfig {
    pub llm: LlmConfig,
    pub knowledge: KnowledgeConfig,
    pub history: HistoryConfig,
    pub account: AccountConfig,
    pub render: LayoutConfig,
}

impl KnowtreeConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Pretty TOML for this configuration; `path` only labels errors.
    pub fn to_toml(&self, path: &Path) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Copy with the inline API key masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.llm.api_key.is_some() {
            copy.llm.api_key = Some("<redacted>".to_string());
        }
        copy
    }

    fn parse(content: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_pipeline_constants() {
        let config = KnowtreeConfig::default();
        assert_eq!(config.llm.model, "gpt-4");
        assert_eq!(config.llm.refine_max_tokens, 100);
        assert!(config.llm.generate_max_tokens.is_none());
        assert_eq!(config.knowledge.language, "pt");
        assert_eq!(config.knowledge.top_k_results, 3);
        assert_eq!(config.knowledge.doc_content_chars_max, 10_000);
        assert!(config.history.capacity.is_none());
        assert!(config.account.subscribed);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let toml = r#"
            [llm]
            model = "gpt-4o-mini"

            [history]
            capacity = 5
        "#;
        let config = KnowtreeConfig::parse(toml, Path::new("inline.toml")).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.history.capacity, Some(5));
        assert_eq!(config.knowledge, KnowledgeConfig::default());
    }

    #[test]
    fn redacted_copy_masks_only_the_inline_key() {
        let mut config = KnowtreeConfig::default();
        assert!(config.redacted().llm.api_key.is_none());

        config.llm.api_key = Some("sk-segredo".into());
        let shown = config.redacted();
        assert_eq!(shown.llm.api_key.as_deref(), Some("<redacted>"));
        assert_eq!(shown.llm.model, config.llm.model);
        let text = shown.to_toml(Path::new("inline.toml")).unwrap();
        assert!(!text.contains("sk-segredo"));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = KnowtreeConfig::parse("[llm\nmodel = 1", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = KnowtreeConfig::default();
        config.account.email = Some("leitor@example.com".into());
        config.knowledge.language = "en".into();
        config.save(&path).unwrap();

        let loaded = KnowtreeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = KnowtreeConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, KnowtreeConfig::default());
    }

    #[test]
    fn inline_api_key_wins() {
        let config = LlmConfig {
            api_key: Some("sk-inline".into()),
            api_key_env: "KNOWTREE_TEST_UNSET_VARIABLE".into(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-inline"));
    }

    #[test]
    fn unset_env_means_no_credential() {
        let config = LlmConfig {
            api_key: None,
            api_key_env: "KNOWTREE_TEST_UNSET_VARIABLE".into(),
            ..Default::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn endpoint_follows_language() {
        let config = KnowledgeConfig {
            language: "en".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://en.wikipedia.org/w/api.php");
    }
}
