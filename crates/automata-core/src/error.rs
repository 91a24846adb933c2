use automata_config::{AgentConfigVersion, ConfigError};
use automata_tools::ToolkitError;

/// Failure of the terminal `build` step of an [`AgentBuilder`](crate::AgentBuilder).
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no instructions were given to the builder")]
    MissingInstructions,
    #[error(transparent)]
    DuplicateTool(#[from] ToolkitError),
    #[error("invalid builder state: {0}")]
    InvalidConfig(String),
}

/// Everything [`AutomataInstance::run`](crate::AutomataInstance::run) can fail with.
///
/// The first three variants name the step that failed.  `Execution` is
/// whatever the agent itself returned, untouched: its `Display` and
/// `source()` are the agent's, and `downcast_ref` recovers the value.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("agent configuration `{version}` could not be resolved")]
    ConfigurationNotFound {
        version: AgentConfigVersion,
        #[source]
        source: ConfigError,
    },
    #[error("builder `{builder}` could not be constructed")]
    BuilderConstruction {
        builder: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("agent build failed")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Execution(anyhow::Error),
}

impl InstanceError {
    /// Recover a typed error raised by the agent during execution.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            InstanceError::Execution(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }
}
