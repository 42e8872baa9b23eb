//! Case execution: one model, one fresh engine session.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::core::io_map::IoMap;
use crate::core::types::{NamedValues, Outputs, ResultSet, Visibility};
use crate::error::Result;
use crate::io::engine::{Engine, EngineSession};

/// Runs cases against an engine, one session per case.
pub struct CaseRunner<'e, E: Engine> {
    engine: &'e E,
    visibility: Visibility,
}

impl<'e, E: Engine> CaseRunner<'e, E> {
    pub fn new(engine: &'e E, visibility: Visibility) -> Self {
        Self { engine, visibility }
    }

    /// Run one case end to end: resolve, open, set, execute, harvest, dispose.
    ///
    /// Every input name must be declared in `io_map`; an unknown name fails
    /// before any session is opened. Once a session is open it is disposed on
    /// every exit path. Declared outputs whose addresses do not resolve come
    /// back as [`crate::core::types::Reading::Absent`] rather than failing.
    #[instrument(skip_all, fields(model = %model.display(), inputs = inputs.len()))]
    pub fn run_case(&self, model: &Path, io_map: &IoMap, inputs: &NamedValues) -> Result<ResultSet> {
        let resolved = io_map.resolve_inputs(inputs)?;

        let mut session = EngineSession::open(self.engine, model, self.visibility)?;
        for input in &resolved {
            session.set_variable(input.address, input.value)?;
        }
        session.execute()?;

        let mut outputs = Outputs::new();
        for (name, address) in io_map.output_paths() {
            outputs.insert(name.clone(), session.read_variable(address)?);
        }
        let diagnostics: Vec<_> = session.dispose().into_iter().collect();

        let result = ResultSet {
            inputs: inputs.clone(),
            outputs,
            diagnostics,
        };
        let absent = result.absent_outputs();
        if !absent.is_empty() {
            warn!(absent = ?absent, "some declared outputs did not resolve");
        }
        info!(
            outputs = result.outputs.len(),
            absent = absent.len(),
            "case finished"
        );
        Ok(result)
    }
}
