//! State machine for a staged pipeline run.
//!
//! ```text
//! Idle -> Running(0) -> Extracting(1) -> Merging(1) -> Running(1) -> ... -> Done
//!            \______________ any failure ______________/-> Failed(stage)
//! ```

use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Case runner active for the stage at this index.
    Running(usize),
    /// Projecting the previous stage's outputs for the stage at this index.
    Extracting(usize),
    /// Overlaying the projection on this stage's defaults.
    Merging(usize),
    Done,
    /// The stage at this index failed; later stages never start.
    Failed(usize),
}

impl PipelineState {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::{Done, Extracting, Failed, Idle, Merging, Running};
        match (self, next) {
            (Idle, Running(0) | Done) => true,
            (Running(stage), Extracting(next_stage)) => next_stage == stage + 1,
            (Running(_), Done) => true,
            (Extracting(stage), Merging(next_stage)) => stage == next_stage,
            (Merging(stage), Running(next_stage)) => stage == next_stage,
            (Running(stage) | Extracting(stage) | Merging(stage), Failed(failed)) => {
                stage == failed
            }
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Running(stage) => write!(f, "running[{stage}]"),
            PipelineState::Extracting(stage) => write!(f, "extracting[{stage}]"),
            PipelineState::Merging(stage) => write!(f, "merging[{stage}]"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(stage) => write!(f, "failed[{stage}]"),
        }
    }
}

/// Records the states a pipeline passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    history: Vec<PipelineState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self {
            history: vec![PipelineState::Idle],
        }
    }
}

impl StateTrace {
    pub fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    /// Move to `next`. Illegal edges are a programming error in the pipeline.
    pub fn advance(&mut self, next: PipelineState) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal pipeline transition {current} -> {next}"
        );
        debug!(from = %current, to = %next, "pipeline transition");
        self.history.push(next);
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }
}
