//! Run orchestration: config → loaded stages → single case or pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::case::CaseRunner;
use crate::chain::{PipelineOutcome, Stage, StageResult, run_pipeline};
use crate::core::binding::StageBinding;
use crate::core::io_map::IoMap;
use crate::core::types::NamedValues;
use crate::io::config::{Mode, RunConfig};
use crate::io::engine::Engine;
use crate::io::mapping::load_mapping;

/// A stage whose mapping document has been loaded.
#[derive(Debug, Clone)]
pub struct LoadedStage {
    pub name: String,
    pub model: PathBuf,
    pub io_map: IoMap,
    pub inputs: NamedValues,
    pub binding: Option<StageBinding>,
    pub report: Vec<String>,
}

impl LoadedStage {
    fn as_stage(&self) -> Stage<'_> {
        Stage {
            name: &self.name,
            model: &self.model,
            io_map: &self.io_map,
            inputs: &self.inputs,
            binding: self.binding.as_ref(),
        }
    }
}

/// Load every stage's mapping document, in config order.
pub fn load_stages(cfg: &RunConfig) -> Result<Vec<LoadedStage>> {
    cfg.stages
        .iter()
        .map(|stage| {
            let io_map = load_mapping(&stage.mapping)
                .with_context(|| format!("load mapping for stage {}", stage.name))?;
            Ok(LoadedStage {
                name: stage.name.clone(),
                model: stage.model.clone(),
                io_map,
                inputs: stage.inputs.clone(),
                binding: stage.binding.clone(),
                report: stage.report.clone(),
            })
        })
        .collect()
}

/// What a run produced, with the stage definitions needed to present it.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: Mode,
    pub stages: Vec<LoadedStage>,
    pub results: Vec<StageResult>,
}

impl RunReport {
    /// Loaded stage definition for a result.
    pub fn stage_for(&self, result: &StageResult) -> Option<&LoadedStage> {
        self.stages.iter().find(|stage| stage.name == result.name)
    }
}

/// Execute `cfg` against `engine`.
///
/// Single mode runs the named stage with its own inputs. Chain mode runs
/// every stage in order through [`run_pipeline`]. All mapping documents are
/// loaded before any engine session opens.
#[instrument(skip_all, fields(mode = ?cfg.run.mode))]
pub fn execute<E: Engine>(engine: &E, cfg: &RunConfig) -> Result<RunReport> {
    let stages = load_stages(cfg)?;
    let runner = CaseRunner::new(engine, cfg.visibility());

    let results = match cfg.run.mode {
        Mode::Single => {
            let name = cfg
                .run
                .stage
                .as_deref()
                .ok_or_else(|| anyhow!("run.stage is required in single mode"))?;
            let stage = stages
                .iter()
                .find(|stage| stage.name == name)
                .ok_or_else(|| anyhow!("unknown stage {name}"))?;
            info!(stage = name, "running single stage");
            let result = runner
                .run_case(&stage.model, &stage.io_map, &stage.inputs)
                .with_context(|| format!("stage `{name}` failed"))?;
            vec![StageResult {
                name: stage.name.clone(),
                result,
                dropped: Vec::new(),
            }]
        }
        Mode::Chain => {
            let chain: Vec<Stage<'_>> = stages.iter().map(LoadedStage::as_stage).collect();
            let PipelineOutcome { stages: results, trace } = run_pipeline(&runner, &chain)?;
            debug!(states = trace.history().len(), "pipeline finished");
            results
        }
    };

    Ok(RunReport {
        mode: cfg.run.mode,
        stages,
        results,
    })
}
