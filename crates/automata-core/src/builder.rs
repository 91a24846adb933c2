// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use automata_config::AutomataAgentConfig;
use automata_tools::Toolkits;

use crate::BuildError;

/// Incrementally assembles a [`RunnableAgent`].
///
/// Each step consumes the builder and hands it back, so a caller threads a
/// single owned value through the chain and no augmentation can be lost.
pub trait AgentBuilder: Send {
    /// Register capability modules.  Called at most once per build by
    /// [`AutomataInstance`](crate::AutomataInstance), and only when the
    /// descriptor carries a toolkit mapping.
    fn with_toolkits(self: Box<Self>, toolkits: Toolkits) -> Box<dyn AgentBuilder>;

    fn with_instructions(self: Box<Self>, instructions: String) -> Box<dyn AgentBuilder>;

    /// Finalize into a single-use agent.
    fn build(self: Box<Self>) -> Result<Box<dyn RunnableAgent>, BuildError>;
}

/// A transient, single-use execution unit.
#[async_trait]
pub trait RunnableAgent: Send {
    /// Carry out the instructions and return the textual result.
    async fn run(&mut self) -> anyhow::Result<String>;

    /// Teardown hook, invoked exactly once after `run` on every exit path.
    async fn release(&mut self) {}
}

/// Creates builders bound to a configuration record.  This is the
/// "builder kind" stored by a descriptor.
pub trait BuilderFactory: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    fn create(&self, config: Arc<AutomataAgentConfig>) -> anyhow::Result<Box<dyn AgentBuilder>>;
}

/// [`BuilderFactory`] backed by a closure.  See [`builder_fn`].
pub struct FnBuilderFactory<F> {
    name: String,
    create: F,
}

impl<F> BuilderFactory for FnBuilderFactory<F>
where
    F: Fn(Arc<AutomataAgentConfig>) -> anyhow::Result<Box<dyn AgentBuilder>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, config: Arc<AutomataAgentConfig>) -> anyhow::Result<Box<dyn AgentBuilder>> {
        (self.create)(config)
    }
}

impl<F> std::fmt::Debug for FnBuilderFactory<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBuilderFactory").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Wrap a closure as a named builder factory.
///
/// ```ignore
/// let factory = builder_fn("custom", |cfg| {
///     Ok(Box::new(AutomataAgentBuilder::new(cfg)?) as Box<dyn AgentBuilder>)
/// });
/// ```
pub fn builder_fn<F>(name: impl Into<String>, create: F) -> FnBuilderFactory<F>
where
    F: Fn(Arc<AutomataAgentConfig>) -> anyhow::Result<Box<dyn AgentBuilder>> + Send + Sync,
{
    FnBuilderFactory { name: name.into(), create }
}
