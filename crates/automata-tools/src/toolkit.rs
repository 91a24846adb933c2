// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Tool;

/// Kind of capability a toolkit provides.  Each kind appears at most once
/// in a [`Toolkits`] mapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolkitType {
    /// Locate and read source code
    #[value(alias = "py_retriever")]
    PyRetriever,
    /// Write source files
    #[value(alias = "py_writer")]
    PyWriter,
    /// Semantic search over an indexed codebase
    #[value(alias = "codebase_oracle")]
    CodebaseOracle,
    /// Answers about the surrounding project context
    #[value(alias = "context_oracle")]
    ContextOracle,
}

impl ToolkitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolkitType::PyRetriever => "py_retriever",
            ToolkitType::PyWriter => "py_writer",
            ToolkitType::CodebaseOracle => "codebase_oracle",
            ToolkitType::ContextOracle => "context_oracle",
        }
    }
}

impl std::fmt::Display for ToolkitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A named bundle of tools registered together.
///
/// Cloning is cheap: tools are shared behind `Arc`.
#[derive(Clone)]
pub struct Toolkit {
    pub kind: ToolkitType,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl Toolkit {
    pub fn new(kind: ToolkitType) -> Self {
        Self { kind, tools: Vec::new() }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field("kind", &self.kind)
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Capability-kind → toolkit mapping handed to an agent builder.
pub type Toolkits = HashMap<ToolkitType, Toolkit>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolkitError {
    #[error("tool `{tool}` from toolkit {kind} is already registered")]
    DuplicateTool { tool: String, kind: ToolkitType },
}
