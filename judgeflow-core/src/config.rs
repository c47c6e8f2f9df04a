// Copyright 2025 Judgeflow Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Runtime and provider configuration.
//!
//! Plain option structs with `Default` impls, deserializable from TOML.
//! No builders: fields are set directly or via named constructors, matching
//! the rest of this crate's configuration style.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::rate_limit::{RateLimitStrategy, RateLimitConfig};

/// Language used for judge prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Minimal,
    #[default]
    Normal,
    Verbose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub chart_width: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            chart_width: 80,
        }
    }
}

/// Top-level runtime toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub enabled: bool,
    pub language: Language,
    pub logging: LoggingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: Language::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// One OpenAI-compatible (or Anthropic-shaped) provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub chat_models: Vec<String>,
    #[serde(default)]
    pub embedding_models: Vec<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            chat_models: Vec::new(),
            embedding_models: Vec::new(),
            rate_limit: None,
        }
    }

    pub fn with_chat_models(mut self, models: Vec<String>) -> Self {
        self.chat_models = models;
        self
    }

    pub fn with_embedding_models(mut self, models: Vec<String>) -> Self {
        self.embedding_models = models;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

/// The full set of configured providers plus a fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub providers: Vec<ProviderConfig>,
    pub default_provider: Option<String>,
}

impl ProvidersConfig {
    pub fn find(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn default_provider(&self) -> Option<&ProviderConfig> {
        self.default_provider
            .as_deref()
            .and_then(|name| self.find(name))
            .or_else(|| self.providers.first())
    }

    /// Resolves the effective rate-limit strategy/timeout for a provider,
    /// falling back to a permissive default when unconfigured.
    pub fn rate_limit_for(&self, provider: &str) -> RateLimitConfig {
        self.find(provider)
            .and_then(|p| p.rate_limit.clone())
            .unwrap_or_else(|| RateLimitConfig {
                rps: f64::MAX,
                strategy: RateLimitStrategy::Wait,
                timeout: Duration::from_secs(30),
            })
    }
}

/// Model-id -> provider-name mapping, used by the rate limiter registry and
/// the model registry to resolve which judge endpoint backs a model id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelProviderMap {
    pub chat: HashMap<String, String>,
    pub embedding: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runtime_is_enabled_english_normal() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.language, Language::En);
        assert_eq!(cfg.logging.level, LogLevel::Normal);
    }

    #[test]
    fn providers_config_falls_back_to_first_provider() {
        let cfg = ProvidersConfig {
            providers: vec![ProviderConfig::new("a", "http://a", "key")],
            default_provider: None,
        };
        assert_eq!(cfg.default_provider().unwrap().name, "a");
    }

    #[test]
    fn unconfigured_provider_rate_limit_is_permissive_wait() {
        let cfg = ProvidersConfig::default();
        let rl = cfg.rate_limit_for("unknown");
        assert_eq!(rl.strategy, RateLimitStrategy::Wait);
    }
}
