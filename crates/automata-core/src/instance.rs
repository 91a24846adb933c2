// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use tracing::{debug, info, warn};

use automata_config::{AgentConfigVersion, ConfigResolver, FileConfigResolver};
use automata_tools::Toolkits;

use crate::{AutomataBuilderFactory, BuilderFactory, InstanceError};

/// Describes one kind of agent run: which configuration to load, which
/// builder assembles the agent, and which toolkits it receives.
///
/// The descriptor holds no per-run state.  [`run`](Self::run) builds a
/// fresh agent every time, so a descriptor can be reused and shared freely;
/// cloning it shares the builder factory and resolver.
#[derive(Clone)]
pub struct AutomataInstance {
    config_version: AgentConfigVersion,
    description: String,
    builder: Arc<dyn BuilderFactory>,
    toolkits: Option<Toolkits>,
    resolver: Arc<dyn ConfigResolver>,
}

impl AutomataInstance {
    pub fn new(config_version: AgentConfigVersion) -> Self {
        Self {
            config_version,
            description: String::new(),
            builder: Arc::new(AutomataBuilderFactory),
            toolkits: None,
            resolver: Arc::new(FileConfigResolver::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn BuilderFactory>) -> Self {
        self.builder = builder;
        self
    }

    /// Attach a toolkit mapping.  Any mapping, even an empty one, is passed
    /// to the builder on every run; without one the builder keeps its
    /// defaults.
    pub fn with_toolkits(mut self, toolkits: Toolkits) -> Self {
        self.toolkits = Some(toolkits);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ConfigResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config_version(&self) -> AgentConfigVersion {
        self.config_version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn builder(&self) -> &dyn BuilderFactory {
        self.builder.as_ref()
    }

    pub fn toolkits(&self) -> Option<&Toolkits> {
        self.toolkits.as_ref()
    }

    /// Build a fresh agent for `instructions`, run it once, release it and
    /// return its result.
    ///
    /// Resolution, construction and build failures are reported as the
    /// matching [`InstanceError`] variant.  A failure of the agent itself is
    /// returned unchanged as [`InstanceError::Execution`].  The agent is
    /// released before this returns, whatever the outcome.
    pub async fn run(&self, instructions: impl Into<String>) -> Result<String, InstanceError> {
        let version = self.config_version;

        debug!(%version, "resolving agent configuration");
        let config = self
            .resolver
            .load(version)
            .map_err(|source| InstanceError::ConfigurationNotFound { version, source })?;

        debug!(%version, builder = self.builder.name(), "constructing builder");
        let mut builder = self.builder.create(Arc::new(config)).map_err(|source| {
            InstanceError::BuilderConstruction { builder: self.builder.name().to_string(), source }
        })?;

        if let Some(toolkits) = &self.toolkits {
            debug!(kinds = ?toolkits.keys().collect::<Vec<_>>(), "registering toolkits");
            builder = builder.with_toolkits(toolkits.clone());
        }
        builder = builder.with_instructions(instructions.into());

        let mut agent = builder.build()?;

        debug!(%version, "running agent");
        let result = agent.run().await;
        agent.release().await;
        drop(agent);

        match result {
            Ok(output) => {
                info!(%version, bytes = output.len(), "agent run complete");
                Ok(output)
            }
            Err(e) => {
                warn!(%version, error = %e, "agent run failed");
                Err(InstanceError::Execution(e))
            }
        }
    }
}

impl Default for AutomataInstance {
    fn default() -> Self {
        Self::new(AgentConfigVersion::default())
    }
}

impl std::fmt::Debug for AutomataInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Option<Vec<_>> =
            self.toolkits.as_ref().map(|t| t.keys().map(|k| k.as_str()).collect());
        if let Some(k) = kinds.as_mut() {
            k.sort_unstable();
        }
        f.debug_struct("AutomataInstance")
            .field("config_version", &self.config_version)
            .field("description", &self.description)
            .field("builder", &self.builder.name())
            .field("toolkits", &kinds)
            .finish_non_exhaustive()
    }
}
