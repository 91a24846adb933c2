// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod builder;
mod error;
mod instance;
pub mod prompts;

pub use agent::{AutomataAgent, AutomataAgentBuilder, AutomataBuilderFactory};
pub use builder::{builder_fn, AgentBuilder, BuilderFactory, FnBuilderFactory, RunnableAgent};
pub use error::{BuildError, InstanceError};
pub use instance::AutomataInstance;
