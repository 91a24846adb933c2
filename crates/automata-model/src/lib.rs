// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod types;
mod provider;
mod openai;
mod mock;

pub use types::*;
pub use provider::{ModelProvider, ResponseStream};
pub use openai::OpenAiProvider;
pub use mock::{MockProvider, ScriptedMockProvider};

use std::sync::Arc;

use anyhow::{bail, Context};
use automata_config::ModelConfig;

/// Construct a shared [`ModelProvider`] from configuration.
///
/// Provider selection:
/// - `"openai"` → [`OpenAiProvider`]; an API key must be resolvable
/// - `"mock"` → [`MockProvider`] (echo-back)
pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Arc<dyn ModelProvider>> {
    match cfg.provider.as_str() {
        "openai" => {
            let key = resolve_api_key(cfg, "OPENAI_API_KEY").context(
                "API key not set; provide api_key or api_key_env in the agent config",
            )?;
            Ok(Arc::new(OpenAiProvider::new(
                cfg.name.clone(),
                key,
                cfg.base_url.clone(),
                cfg.max_tokens,
                cfg.temperature,
            )))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => bail!("unknown model provider: {other}"),
    }
}

fn resolve_api_key(cfg: &ModelConfig, fallback_env: &str) -> Option<String> {
    if let Some(k) = &cfg.api_key {
        return Some(k.clone());
    }
    let env = cfg.api_key_env.as_deref().unwrap_or(fallback_env);
    std::env::var(env).ok().filter(|k| !k.is_empty())
}
