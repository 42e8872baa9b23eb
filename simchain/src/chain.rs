//! Stage pipeline: run dependent cases in order, propagating values.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::case::CaseRunner;
use crate::core::binding::{StageBinding, merge, project};
use crate::core::io_map::IoMap;
use crate::core::pipeline_state::{PipelineState, StateTrace};
use crate::core::types::{NamedValues, ResultSet};
use crate::error::SimError;
use crate::io::engine::Engine;

/// One stage of a pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    pub name: &'a str,
    pub model: &'a Path,
    pub io_map: &'a IoMap,
    /// Own inputs for the first stage; defaults for every later stage.
    pub inputs: &'a NamedValues,
    /// Projection from the previous stage's outputs. Ignored on the first stage.
    pub binding: Option<&'a StageBinding>,
}

/// Result of one completed stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub name: String,
    pub result: ResultSet,
    /// Upstream names the binding asked for but could not propagate.
    pub dropped: Vec<String>,
}

/// Every stage completed.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub stages: Vec<StageResult>,
    pub trace: StateTrace,
}

/// A stage failed; no later stage was started.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed")]
pub struct StageFailure {
    pub stage: String,
    /// Stages that finished before the failure.
    pub completed: Vec<StageResult>,
    pub trace: StateTrace,
    #[source]
    pub source: SimError,
}

/// Run `stages` in order.
///
/// The first stage runs with its own inputs. Every later stage runs with its
/// defaults overlaid by the values its binding projects out of the previous
/// stage's outputs (propagated values win). The first failure ends the
/// pipeline in [`PipelineState::Failed`].
#[instrument(skip_all, fields(stages = stages.len()))]
pub fn run_pipeline<E: Engine>(
    runner: &CaseRunner<'_, E>,
    stages: &[Stage<'_>],
) -> Result<PipelineOutcome, Box<StageFailure>> {
    let mut trace = StateTrace::default();
    let mut completed: Vec<StageResult> = Vec::with_capacity(stages.len());
    let unbound = StageBinding::default();

    for (index, stage) in stages.iter().enumerate() {
        let (inputs, dropped) = match completed.last() {
            None => (stage.inputs.clone(), Vec::new()),
            Some(previous) => {
                trace.advance(PipelineState::Extracting(index));
                let binding = stage.binding.unwrap_or(&unbound);
                let projected = match project(&previous.result.outputs, binding) {
                    Ok(projected) => projected,
                    Err(source) => {
                        return Err(fail(stage, index, completed, trace, source));
                    }
                };
                if !projected.dropped.is_empty() {
                    debug!(
                        stage = stage.name,
                        dropped = ?projected.dropped,
                        "upstream values unavailable, defaults apply"
                    );
                }
                trace.advance(PipelineState::Merging(index));
                (merge(stage.inputs, &projected.values), projected.dropped)
            }
        };

        trace.advance(PipelineState::Running(index));
        info!(stage = stage.name, "stage started");
        match runner.run_case(stage.model, stage.io_map, &inputs) {
            Ok(result) => completed.push(StageResult {
                name: stage.name.to_string(),
                result,
                dropped,
            }),
            Err(source) => return Err(fail(stage, index, completed, trace, source)),
        }
    }

    trace.advance(PipelineState::Done);
    Ok(PipelineOutcome {
        stages: completed,
        trace,
    })
}

/// Two-stage pipeline: run `upstream`, then `downstream` with `defaults`
/// overlaid by the values `binding` extracts from the upstream outputs.
pub fn run_chained<E: Engine>(
    runner: &CaseRunner<'_, E>,
    upstream: Stage<'_>,
    downstream: Stage<'_>,
    defaults: &NamedValues,
    binding: &StageBinding,
) -> Result<(ResultSet, ResultSet), Box<StageFailure>> {
    let downstream = Stage {
        inputs: defaults,
        binding: Some(binding),
        ..downstream
    };
    let PipelineOutcome { stages, trace } = run_pipeline(runner, &[upstream, downstream])?;
    match <[StageResult; 2]>::try_from(stages) {
        Ok([upstream, downstream]) => Ok((upstream.result, downstream.result)),
        Err(completed) => Err(Box::new(StageFailure {
            stage: downstream.name.to_string(),
            source: SimError::EngineFault {
                operation: "pipeline",
                reason: format!("expected 2 stage results, got {}", completed.len()),
            },
            completed,
            trace,
        })),
    }
}

fn fail(
    stage: &Stage<'_>,
    index: usize,
    completed: Vec<StageResult>,
    mut trace: StateTrace,
    source: SimError,
) -> Box<StageFailure> {
    trace.advance(PipelineState::Failed(index));
    Box::new(StageFailure {
        stage: stage.name.to_string(),
        completed,
        trace,
        source,
    })
}
