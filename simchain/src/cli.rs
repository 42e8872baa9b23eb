//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::exit_codes;
use crate::io::config::{Mode, RunConfig, load_config};
use crate::io::engine::Engine;
use crate::io::init::{InitOptions, init_project};
use crate::report::{render_mapping, render_run};
use crate::run::execute;
use crate::validate::{check, describe_path};

/// Flags of `simchain run` that override the configured run section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Run only this stage with its own inputs.
    pub only: Option<String>,
    /// Run every stage as a chain.
    pub chain: bool,
    pub visible: bool,
}

impl RunOverrides {
    /// Apply the flags and re-validate.
    pub fn apply(self, mut cfg: RunConfig) -> Result<RunConfig> {
        if let Some(stage) = self.only {
            cfg.run.mode = Mode::Single;
            cfg.run.stage = Some(stage);
        } else if self.chain {
            cfg.run.mode = Mode::Chain;
            cfg.run.stage = None;
        }
        if self.visible {
            cfg.run.visible = true;
        }
        cfg.validate().context("apply run flags")?;
        Ok(cfg)
    }
}

/// Load the config at `path`, resolving its relative paths against the
/// directory that holds it.
pub fn load_run_config(path: &Path) -> Result<RunConfig> {
    let cfg = load_config(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    debug!(config = %path.display(), base = %base.display(), "config loaded");
    Ok(cfg.resolve_paths(base))
}

/// Scaffold a project next to `config_path`.
pub fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let root = config_path.parent().unwrap_or_else(|| Path::new(""));
    let paths = init_project(root, &InitOptions { force })?;
    println!("init: config={}", paths.config_path.display());
    println!("init: mapping={}", paths.power_mapping_path.display());
    println!("init: mapping={}", paths.orc_mapping_path.display());
    Ok(exit_codes::OK)
}

/// Print every stage's mappings and file status, then every problem found.
pub fn cmd_check(cfg: &RunConfig) -> Result<i32> {
    let outcome = check(cfg)?;
    for stage in &outcome.stages {
        println!("=== {} ===", stage.name);
        println!("model:   {}", describe_path(&stage.model, stage.model_exists));
        println!(
            "mapping: {}",
            describe_path(&stage.mapping, stage.io_map.is_some())
        );
        if let Some(io_map) = &stage.io_map {
            print!("{}", render_mapping("input_paths", io_map.input_paths()));
            print!("{}", render_mapping("output_paths", io_map.output_paths()));
        }
    }
    for problem in &outcome.problems {
        eprintln!("{problem}");
    }
    if outcome.is_ok() {
        println!("check: ok stages={}", outcome.stages.len());
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::INVALID)
    }
}

/// Execute the configured run and print every stage's results.
pub fn cmd_run<E: Engine>(engine: &E, cfg: &RunConfig) -> Result<i32> {
    info!(mode = ?cfg.run.mode, stages = cfg.stages.len(), "starting run");
    let report = execute(engine, cfg)?;
    print!("{}", render_run(&report));
    Ok(exit_codes::OK)
}
