// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Tag identifying which stored agent configuration to load.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentConfigVersion {
    /// General-purpose agent
    #[default]
    Default,
    /// Deterministic configuration backed by the mock provider
    Test,
    /// Coordinating agent that delegates to the others
    #[value(alias = "automata_main")]
    AutomataMain,
    /// Read-only code retrieval agent
    #[value(alias = "automata_retriever")]
    AutomataRetriever,
    /// Code writing agent
    #[value(alias = "automata_writer")]
    AutomataWriter,
}

impl AgentConfigVersion {
    pub const ALL: [AgentConfigVersion; 5] = [
        AgentConfigVersion::Default,
        AgentConfigVersion::Test,
        AgentConfigVersion::AutomataMain,
        AgentConfigVersion::AutomataRetriever,
        AgentConfigVersion::AutomataWriter,
    ];

    /// Stable tag used for file names and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentConfigVersion::Default => "default",
            AgentConfigVersion::Test => "test",
            AgentConfigVersion::AutomataMain => "automata_main",
            AgentConfigVersion::AutomataRetriever => "automata_retriever",
            AgentConfigVersion::AutomataWriter => "automata_writer",
        }
    }
}

impl std::fmt::Display for AgentConfigVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AgentConfigVersion {
    type Err = ConfigError;

    /// Accepts the snake_case tag; `-` is treated as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == tag)
            .ok_or_else(|| ConfigError::UnknownVersion(s.to_string()))
    }
}

fn default_stream() -> bool {
    true
}
fn default_max_iters() -> u32 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Provider identifier: "openai" | "mock"
    pub provider: String,
    /// Model name forwarded to the provider API
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Base URL override for OpenAI-compatible proxies
    pub base_url: Option<String>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            name: "gpt-4o".into(),
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.7),
        }
    }
}

/// A fully materialized agent configuration record.
///
/// Records are produced by a [`ConfigResolver`](crate::ConfigResolver) and
/// handed to a builder behind an `Arc`; nothing mutates them afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomataAgentConfig {
    /// Version this record was resolved from.  Always overwritten by the
    /// resolver, so a stale value in a file has no effect.
    #[serde(default)]
    pub config_version: AgentConfigVersion,
    #[serde(default)]
    pub description: String,
    /// System prompt with `{{key}}` placeholders.
    #[serde(default)]
    pub system_template: String,
    /// Values substituted into `system_template`.
    #[serde(default)]
    pub system_template_variables: HashMap<String, String>,
    #[serde(default)]
    pub model: ModelConfig,
    /// Request streamed completions from the provider
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// Maximum number of model rounds before the agent gives up
    #[serde(default = "default_max_iters")]
    pub max_iters: u32,
    /// Log every model round and tool result at info level
    #[serde(default)]
    pub verbose: bool,
}

impl Default for AutomataAgentConfig {
    fn default() -> Self {
        Self {
            config_version: AgentConfigVersion::Default,
            description: String::new(),
            system_template: String::new(),
            system_template_variables: HashMap::new(),
            model: ModelConfig::default(),
            stream: default_stream(),
            max_iters: default_max_iters(),
            verbose: false,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
