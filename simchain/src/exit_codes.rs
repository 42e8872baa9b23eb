//! Stable exit codes for simchain CLI commands.

use crate::error::{ErrorKind, SimError};

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid run config, mapping document, or case inputs (includes a failed `check`).
pub const INVALID: i32 = 1;
/// The engine could not be opened (model missing or engine unavailable).
pub const OPEN_FAILED: i32 = 2;
/// A run failed inside an open engine session.
pub const RUN_FAILED: i32 = 3;

/// Pick the exit code for an error chain.
///
/// The first [`SimError`] found in the chain decides; anything else (I/O while
/// reading the run config, argument problems) counts as invalid input.
pub fn for_error(err: &anyhow::Error) -> i32 {
    let sim = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SimError>());
    match sim.map(SimError::kind) {
        Some(ErrorKind::Open) => OPEN_FAILED,
        Some(ErrorKind::Run) => RUN_FAILED,
        Some(ErrorKind::Invalid) | None => INVALID,
    }
}
