// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::{AgentConfigVersion, AutomataAgentConfig, ConfigError};

/// Maps a version tag to a configuration record.
pub trait ConfigResolver: Send + Sync {
    fn load(&self, version: AgentConfigVersion) -> Result<AutomataAgentConfig, ConfigError>;
}

/// Raw YAML of the record shipped with this crate for `version`.
pub fn bundled(version: AgentConfigVersion) -> Option<&'static str> {
    match version {
        AgentConfigVersion::Default => Some(include_str!("../configs/default.yaml")),
        AgentConfigVersion::Test => Some(include_str!("../configs/test.yaml")),
        AgentConfigVersion::AutomataMain => Some(include_str!("../configs/automata_main.yaml")),
        AgentConfigVersion::AutomataRetriever => {
            Some(include_str!("../configs/automata_retriever.yaml"))
        }
        AgentConfigVersion::AutomataWriter => {
            Some(include_str!("../configs/automata_writer.yaml"))
        }
    }
}

/// Load `version` from the standard search paths on top of the bundled record.
pub fn load(version: AgentConfigVersion) -> Result<AutomataAgentConfig, ConfigError> {
    FileConfigResolver::new().load(version)
}

/// Ordered list of config directories searched from lowest to highest priority.
/// Later directories override earlier ones.
fn config_search_dirs() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. System-wide
    paths.push(PathBuf::from("/etc/automata/agent_configs"));

    // 2. XDG / home
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/automata/agent_configs"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("automata/agent_configs"));
    }

    // 3. Workspace-local
    paths.push(PathBuf::from(".automata/agent_configs"));

    paths
}

/// Resolves records from `<dir>/<version>.yaml` files layered over the
/// bundled defaults.
#[derive(Debug, Clone)]
pub struct FileConfigResolver {
    search_dirs: Vec<PathBuf>,
    extra_dir: Option<PathBuf>,
    use_bundled: bool,
}

impl FileConfigResolver {
    pub fn new() -> Self {
        Self {
            search_dirs: config_search_dirs(),
            extra_dir: None,
            use_bundled: true,
        }
    }

    /// Replace the standard search directories.
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Highest-priority directory, e.g. from `--config-dir`.
    pub fn with_extra_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_dir = Some(dir.into());
        self
    }

    /// Only resolve versions that exist on disk.
    pub fn without_bundled(mut self) -> Self {
        self.use_bundled = false;
        self
    }

    fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
        if !path.is_file() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading agent config layer");
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layer = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        mapping_layer(layer, &path.display().to_string())
    }
}

impl Default for FileConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver for FileConfigResolver {
    fn load(&self, version: AgentConfigVersion) -> Result<AutomataAgentConfig, ConfigError> {
        let mut merged: Option<Value> = None;

        if self.use_bundled {
            if let Some(text) = bundled(version) {
                let base = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                    origin: format!("bundled {version}.yaml"),
                    source,
                })?;
                merged = Some(base);
            }
        }

        let file_name = format!("{version}.yaml");
        for dir in self.search_dirs.iter().chain(self.extra_dir.iter()) {
            if let Some(layer) = Self::read_layer(&dir.join(&file_name))? {
                match merged.as_mut() {
                    Some(dst) => merge_yaml(dst, layer),
                    None => merged = Some(layer),
                }
            }
        }

        let merged = merged.ok_or(ConfigError::NotFound(version))?;
        let mut config: AutomataAgentConfig =
            serde_yaml::from_value(merged).map_err(|source| ConfigError::Parse {
                origin: file_name,
                source,
            })?;
        config.config_version = version;
        debug!(%version, provider = %config.model.provider, "resolved agent config");
        Ok(config)
    }
}

/// Fixed in-memory records, keyed by version.
#[derive(Debug, Clone, Default)]
pub struct MapConfigResolver {
    records: HashMap<AgentConfigVersion, AutomataAgentConfig>,
}

impl MapConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, version: AgentConfigVersion, config: AutomataAgentConfig) -> Self {
        self.records.insert(version, config);
        self
    }
}

impl ConfigResolver for MapConfigResolver {
    fn load(&self, version: AgentConfigVersion) -> Result<AutomataAgentConfig, ConfigError> {
        let mut config = self
            .records
            .get(&version)
            .cloned()
            .ok_or(ConfigError::NotFound(version))?;
        config.config_version = version;
        Ok(config)
    }
}

/// An empty (or comment-only) document contributes nothing; any other
/// top level must be a mapping.
fn mapping_layer(layer: Value, origin: &str) -> Result<Option<Value>, ConfigError> {
    match layer {
        Value::Null => Ok(None),
        Value::Mapping(_) => Ok(Some(layer)),
        _ => Err(ConfigError::Parse {
            origin: origin.to_string(),
            source: <serde_yaml::Error as serde::de::Error>::custom(
                "top level of an agent config must be a mapping",
            ),
        }),
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Mapping(d), Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(Value::Mapping(Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn isolated() -> FileConfigResolver {
        FileConfigResolver::new().with_search_dirs(Vec::new())
    }

    #[test]
    fn empty_override_keeps_bundled_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "# nothing here yet\n").unwrap();
        let merged =
            isolated().with_extra_dir(dir.path()).load(AgentConfigVersion::Default).unwrap();
        let bundled = isolated().load(AgentConfigVersion::Default).unwrap();
        assert_eq!(merged, bundled);
        assert!(!merged.system_template.is_empty());
    }

    #[test]
    fn empty_file_alone_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.yaml"), "").unwrap();
        let err = isolated()
            .without_bundled()
            .with_extra_dir(dir.path())
            .load(AgentConfigVersion::Test)
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(AgentConfigVersion::Test)));
    }

    #[test]
    fn non_mapping_layer_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.yaml"), "- just\n- a list\n").unwrap();
        let err = isolated().with_extra_dir(dir.path()).load(AgentConfigVersion::Test).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = val("x: 1");
        merge_yaml(&mut dst, val("x: 2"));
        assert_eq!(dst["x"].as_i64(), Some(2));
    }

    #[test]
    fn merge_preserves_keys_not_in_src() {
        let mut dst = val("a: 1\nb: 2");
        merge_yaml(&mut dst, val("b: 99"));
        assert_eq!(dst["a"].as_i64(), Some(1));
        assert_eq!(dst["b"].as_i64(), Some(99));
    }

    #[test]
    fn merge_nested_mappings() {
        let mut dst = val("model:\n  provider: openai\n  name: gpt-4o");
        merge_yaml(&mut dst, val("model:\n  name: gpt-4o-mini"));
        assert_eq!(dst["model"]["provider"].as_str(), Some("openai"));
        assert_eq!(dst["model"]["name"].as_str(), Some("gpt-4o-mini"));
    }

    #[test]
    fn every_version_has_a_parseable_bundled_record() {
        let resolver = isolated();
        for v in AgentConfigVersion::ALL {
            let cfg = resolver.load(v).unwrap();
            assert_eq!(cfg.config_version, v);
            assert!(!cfg.system_template.is_empty(), "{v} has no system template");
        }
    }

    #[test]
    fn bundled_test_record_uses_mock_provider() {
        let cfg = isolated().load(AgentConfigVersion::Test).unwrap();
        assert_eq!(cfg.model.provider, "mock");
        assert!(!cfg.stream);
    }

    #[test]
    fn missing_record_without_bundled_is_not_found() {
        let resolver = isolated().without_bundled();
        let err = resolver.load(AgentConfigVersion::AutomataMain).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(AgentConfigVersion::AutomataMain)));
    }

    #[test]
    fn extra_dir_overrides_bundled_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.yaml"),
            "max_iters: 3\nmodel:\n  name: gpt-4o-mini\n",
        )
        .unwrap();

        let cfg = isolated().with_extra_dir(dir.path()).load(AgentConfigVersion::Default).unwrap();
        assert_eq!(cfg.max_iters, 3);
        assert_eq!(cfg.model.name, "gpt-4o-mini");
        // untouched keys keep the bundled values
        assert_eq!(cfg.model.provider, "openai");
        assert_eq!(cfg.system_template_variables["agent_name"], "Automata");
    }

    #[test]
    fn later_search_dir_wins() {
        let low = tempfile::tempdir().unwrap();
        let high = tempfile::tempdir().unwrap();
        std::fs::write(low.path().join("test.yaml"), "description: low\nmax_iters: 7\n").unwrap();
        std::fs::write(high.path().join("test.yaml"), "description: high\n").unwrap();

        let cfg = FileConfigResolver::new()
            .with_search_dirs(vec![low.path().to_path_buf(), high.path().to_path_buf()])
            .without_bundled()
            .load(AgentConfigVersion::Test)
            .unwrap();
        assert_eq!(cfg.description, "high");
        assert_eq!(cfg.max_iters, 7);
    }

    #[test]
    fn file_version_field_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("automata_writer.yaml"), "config_version: test\n").unwrap();
        let cfg = isolated()
            .without_bundled()
            .with_extra_dir(dir.path())
            .load(AgentConfigVersion::AutomataWriter)
            .unwrap();
        assert_eq!(cfg.config_version, AgentConfigVersion::AutomataWriter);
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "max_iters: [unterminated\n").unwrap();
        let err =
            isolated().with_extra_dir(dir.path()).load(AgentConfigVersion::Default).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn schema_mismatch_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.yaml"), "max_iters: lots\n").unwrap();
        let err =
            isolated().with_extra_dir(dir.path()).load(AgentConfigVersion::Default).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn repeated_loads_are_equal() {
        let resolver = isolated();
        let a = resolver.load(AgentConfigVersion::Default).unwrap();
        let b = resolver.load(AgentConfigVersion::Default).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn map_resolver_returns_registered_record() {
        let record = AutomataAgentConfig { max_iters: 9, ..AutomataAgentConfig::default() };
        let resolver = MapConfigResolver::new().with(AgentConfigVersion::Test, record);
        let cfg = resolver.load(AgentConfigVersion::Test).unwrap();
        assert_eq!(cfg.max_iters, 9);
        assert_eq!(cfg.config_version, AgentConfigVersion::Test);
        assert!(matches!(
            resolver.load(AgentConfigVersion::Default),
            Err(ConfigError::NotFound(AgentConfigVersion::Default))
        ));
    }
}
