//! Run configuration stored in `simchain.toml`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::binding::StageBinding;
use crate::core::types::{NamedValues, Visibility};

/// Default file name looked up by the CLI.
pub const DEFAULT_CONFIG_FILE: &str = "simchain.toml";

/// Run configuration (TOML).
///
/// Built once from disk, then read-only: the CLI may override the run section
/// from flags before handing it to [`crate::run::execute`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Stages in execution order. Each stage after the first may bind to the
    /// outputs of the stage before it.
    pub stages: Vec<StageConfig>,
}

/// Which stages to run and how.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct RunSection {
    pub mode: Mode,

    /// Stage to run when `mode = "single"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    /// Ask the engine to show its UI. Does not change results.
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Run one named stage with its own inputs.
    Single,
    /// Run every stage in order, propagating values through bindings.
    #[default]
    Chain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Adapter command spawned once per session (e.g. `["aspen-bridge"]`).
    pub command: Vec<String>,

    /// Seconds to wait for the adapter to exit after `close`.
    pub close_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: vec!["simchain-bridge".to_string()],
            close_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    /// Unique identifier (used by `--only` and in reports).
    pub name: String,
    /// Stored model file opened by the engine.
    pub model: PathBuf,
    /// Mapping document (`input_paths` / `output_paths`).
    pub mapping: PathBuf,
    /// Output names to print, in order. Empty prints every output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub report: Vec<String>,
    /// Case values for a stage run on its own or first in a chain; defaults
    /// for a stage fed by a binding.
    #[serde(default)]
    pub inputs: NamedValues,
    /// How this stage takes values from the previous stage in a chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<StageBinding>,
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(anyhow!("stages must be a non-empty array"));
        }
        let mut names = BTreeSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            stage
                .validate()
                .with_context(|| format!("stages[{index}] invalid"))?;
            if !names.insert(stage.name.as_str()) {
                return Err(anyhow!("duplicate stage name {}", stage.name));
            }
        }
        if let Some(first) = self.stages.first()
            && first.binding.is_some()
        {
            return Err(anyhow!(
                "stage {} is first and cannot have a binding",
                first.name
            ));
        }
        match self.run.mode {
            Mode::Single => {
                let stage = self
                    .run
                    .stage
                    .as_deref()
                    .ok_or_else(|| anyhow!("run.stage is required when run.mode = \"single\""))?;
                if self.stage(stage).is_none() {
                    return Err(anyhow!("run.stage {stage} does not name a stage"));
                }
            }
            Mode::Chain => {
                if self.stages.len() < 2 {
                    return Err(anyhow!("run.mode = \"chain\" needs at least two stages"));
                }
            }
        }
        if self.engine.command.is_empty() || self.engine.command[0].trim().is_empty() {
            return Err(anyhow!("engine.command must be a non-empty array"));
        }
        if self.engine.close_timeout_secs == 0 {
            return Err(anyhow!("engine.close_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_flag(self.run.visible)
    }

    /// Make relative model and mapping paths relative to `base` instead of the
    /// process working directory.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        for stage in &mut self.stages {
            if stage.model.is_relative() {
                stage.model = base.join(&stage.model);
            }
            if stage.mapping.is_relative() {
                stage.mapping = base.join(&stage.mapping);
            }
        }
        self
    }
}

impl StageConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("name must be non-empty"));
        }
        if self.model.as_os_str().is_empty() {
            return Err(anyhow!("stage {}: model must be non-empty", self.name));
        }
        if self.mapping.as_os_str().is_empty() {
            return Err(anyhow!("stage {}: mapping must be non-empty", self.name));
        }
        if let Some(binding) = &self.binding {
            if binding.extract.is_empty() {
                return Err(anyhow!(
                    "stage {}: binding.extract must be a non-empty array",
                    self.name
                ));
            }
            let duplicates = binding.duplicate_targets();
            if !duplicates.is_empty() {
                return Err(anyhow!(
                    "stage {}: binding targets repeated: {}",
                    self.name,
                    duplicates.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// Load and validate config from a TOML file.
///
/// Paths inside are returned as written; see [`RunConfig::resolve_paths`].
pub fn load_config(path: &Path) -> Result<RunConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
