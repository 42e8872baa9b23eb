//! Scaffolding for a new simchain project: config plus mapping templates.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::config::{
    DEFAULT_CONFIG_FILE, EngineConfig, Mode, RunConfig, RunSection, StageConfig, write_config,
};
use crate::core::binding::StageBinding;
use crate::core::types::{NamedValues, Value};

const POWER_PATHS: &str = r"# Gas turbine model: name -> engine address.
input_paths:
  fuelfeed: \Data\Streams\FUEL\Input\TOTFLOW\MIXED
  airfeed: \Data\Streams\AIR\Input\TOTFLOW\MIXED

output_paths:
  work: \Data\Blocks\GT\Output\WNET
  fgastemp: \Data\Streams\FGAS\Output\TEMP_OUT\MIXED
  fgasmsflow: \Data\Streams\FGAS\Output\MASSFLMX\MIXED
  fgasco2: \Data\Streams\FGAS\Output\MOLEFRAC\MIXED\CO2
  fgasn2: \Data\Streams\FGAS\Output\MOLEFRAC\MIXED\N2
  fgasco: \Data\Streams\FGAS\Output\MOLEFRAC\MIXED\CO
  fgaswater: \Data\Streams\FGAS\Output\MOLEFRAC\MIXED\H2O
  steammsflow: \Data\Streams\STEAM\Output\MASSFLMX\MIXED
";

const ORC_PATHS: &str = r"# Organic Rankine cycle model fed by the turbine flue gas.
input_paths:
  fgastemp: \Data\Streams\FGAS\Input\TEMP\MIXED
  fgaspres: \Data\Streams\FGAS\Input\PRES\MIXED
  fgasmsflow: \Data\Streams\FGAS\Input\TOTFLOW\MIXED
  fgasco2: \Data\Streams\FGAS\Input\FLOW\MIXED\CO2
  fgasn2: \Data\Streams\FGAS\Input\FLOW\MIXED\N2
  fgasco: \Data\Streams\FGAS\Input\FLOW\MIXED\CO
  fgaswater: \Data\Streams\FGAS\Input\FLOW\MIXED\H2O
  fgaso2: \Data\Streams\FGAS\Input\FLOW\MIXED\O2

output_paths:
  work: \Data\Blocks\TURB\Output\WNET
  qevap: \Data\Blocks\EVAP\Output\QNET
";

/// Options for [`init_project`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
}

/// Files written (or kept) by [`init_project`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub config_path: PathBuf,
    pub power_mapping_path: PathBuf,
    pub orc_mapping_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            config_path: root.join(DEFAULT_CONFIG_FILE),
            power_mapping_path: root.join("models/power/power_paths.yaml"),
            orc_mapping_path: root.join("models/ORC/ORC_paths.yaml"),
        }
    }
}

/// Two-stage gas turbine → ORC example, with paths relative to the config.
pub fn template_config() -> RunConfig {
    RunConfig {
        run: RunSection {
            mode: Mode::Chain,
            stage: None,
            visible: false,
        },
        engine: EngineConfig::default(),
        stages: vec![
            StageConfig {
                name: "power".to_string(),
                model: PathBuf::from("models/power/power.apw"),
                mapping: PathBuf::from("models/power/power_paths.yaml"),
                inputs: values(&[("fuelfeed", 50.0), ("airfeed", 1000.0)]),
                report: [
                    "work",
                    "fgastemp",
                    "fgasmsflow",
                    "fgasco2",
                    "fgasn2",
                    "fgasco",
                    "fgaswater",
                    "steammsflow",
                ]
                .map(String::from)
                .to_vec(),
                binding: None,
            },
            StageConfig {
                name: "orc".to_string(),
                model: PathBuf::from("models/ORC/ORC.apw"),
                mapping: PathBuf::from("models/ORC/ORC_paths.yaml"),
                inputs: values(&[
                    ("fgastemp", 250.0),
                    ("fgaspres", 1.013),
                    ("fgasmsflow", 200.0),
                    ("fgasco2", 0.12),
                    ("fgasn2", 0.75),
                    ("fgasco", 0.0),
                    ("fgaswater", 0.08),
                    ("fgaso2", 0.05),
                ]),
                report: vec!["work".to_string(), "qevap".to_string()],
                binding: Some(StageBinding::identity([
                    "fgastemp",
                    "fgasmsflow",
                    "fgasco2",
                    "fgasn2",
                    "fgasco",
                    "fgaswater",
                ])),
            },
        ],
    }
}

/// Write the template config and mapping documents under `root`.
///
/// Existing files are kept unless `options.force` is set. Model files are
/// never created; they come from the simulation tool.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<ProjectPaths> {
    let paths = ProjectPaths::new(root);

    write_if_missing_or_force(&paths.power_mapping_path, POWER_PATHS, options.force)?;
    write_if_missing_or_force(&paths.orc_mapping_path, ORC_PATHS, options.force)?;

    if options.force || !paths.config_path.exists() {
        write_config(&paths.config_path, &template_config())
            .with_context(|| format!("write {}", paths.config_path.display()))?;
        debug!(path = %paths.config_path.display(), "config written");
    }

    Ok(paths)
}

fn write_if_missing_or_force(path: &Path, contents: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        debug!(path = %path.display(), "keeping existing file");
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn values(entries: &[(&str, f64)]) -> NamedValues {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Real(*value)))
        .collect()
}
