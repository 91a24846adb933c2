use std::path::PathBuf;

use crate::AgentConfigVersion;

/// Failure to turn a version tag into a configuration record.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown agent config version `{0}`")]
    UnknownVersion(String),
    #[error("no configuration registered for version `{0}`")]
    NotFound(AgentConfigVersion),
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}
