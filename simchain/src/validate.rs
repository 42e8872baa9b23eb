//! Static checks over a run configuration and its mapping documents.
//!
//! Nothing here opens an engine. The checks find what would make a run fail
//! before it starts: missing files, bad mapping documents, inputs the mapping
//! does not declare, and bindings that point at names neither side knows.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::core::io_map::IoMap;
use crate::io::config::{RunConfig, StageConfig};
use crate::io::mapping::load_mapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run would fail.
    Error,
    /// The run would proceed with defaults or absent readings.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub stage: String,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{label}: stage {}: {}", self.stage, self.message)
    }
}

/// What was found for one stage.
#[derive(Debug, Clone)]
pub struct StageCheck {
    pub name: String,
    pub model: PathBuf,
    pub model_exists: bool,
    pub mapping: PathBuf,
    /// Loaded mapping, when the document was valid.
    pub io_map: Option<IoMap>,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub stages: Vec<StageCheck>,
    pub problems: Vec<Problem>,
}

impl CheckOutcome {
    /// True when no problem would stop a run.
    pub fn is_ok(&self) -> bool {
        !self
            .problems
            .iter()
            .any(|problem| problem.severity == Severity::Error)
    }
}

/// Check every stage of `cfg`, collecting all problems rather than stopping
/// at the first.
pub fn check(cfg: &RunConfig) -> Result<CheckOutcome> {
    let mut problems = Vec::new();
    let mut stages: Vec<StageCheck> = Vec::with_capacity(cfg.stages.len());

    for stage in &cfg.stages {
        let mut report = |severity, message: String| {
            problems.push(Problem {
                stage: stage.name.clone(),
                severity,
                message,
            });
        };

        let model_exists = stage.model.is_file();
        if !model_exists {
            report(
                Severity::Error,
                format!("model file missing {}", stage.model.display()),
            );
        }

        let io_map = match load_mapping(&stage.mapping) {
            Ok(io_map) => Some(io_map),
            Err(err) => {
                report(Severity::Error, err.to_string());
                None
            }
        };

        if let Some(io_map) = &io_map {
            for name in io_map.unknown_inputs(stage.inputs.keys().map(String::as_str)) {
                report(
                    Severity::Error,
                    format!("input {name} is not declared in input_paths"),
                );
            }
            for name in &stage.report {
                if !io_map.output_paths().contains_key(name) {
                    report(
                        Severity::Warning,
                        format!("report names {name}, which is not in output_paths"),
                    );
                }
            }
        }

        if let (Some(binding), Some(upstream)) = (&stage.binding, stages.last()) {
            for projection in &binding.extract {
                if let Some(io_map) = &io_map
                    && io_map.input_address(projection.target()).is_none()
                {
                    report(
                        Severity::Error,
                        format!(
                            "binding target {} is not in input_paths",
                            projection.target()
                        ),
                    );
                }
                if let Some(upstream_map) = &upstream.io_map
                    && !upstream_map.output_paths().contains_key(projection.source())
                {
                    report(
                        Severity::Warning,
                        format!(
                            "binding source {} is not in output_paths of stage {}",
                            projection.source(),
                            upstream.name
                        ),
                    );
                }
            }
        }

        debug!(stage = %stage.name, model_exists, mapping_ok = io_map.is_some(), "stage checked");
        stages.push(stage_check(stage, model_exists, io_map));
    }

    Ok(CheckOutcome { stages, problems })
}

fn stage_check(stage: &StageConfig, model_exists: bool, io_map: Option<IoMap>) -> StageCheck {
    StageCheck {
        name: stage.name.clone(),
        model: stage.model.clone(),
        model_exists,
        mapping: stage.mapping.clone(),
        io_map,
    }
}

/// `path` with a trailing marker when the file is missing.
pub fn describe_path(path: &Path, exists: bool) -> String {
    if exists {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}
