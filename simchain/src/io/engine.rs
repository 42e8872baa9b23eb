//! Engine abstraction and scoped sessions.
//!
//! The [`Engine`] trait decouples case orchestration from the actual
//! simulation backend (currently the [`crate::io::bridge`] process). Tests use
//! a deterministic fake that records every call.
//!
//! An [`EngineSession`] owns one open engine instance. It is closed exactly
//! once: explicitly through [`EngineSession::dispose`] on the success path, or
//! from `Drop` when a failure unwinds the case with `?`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::types::{Diagnostic, Reading, Value, Visibility};
use crate::error::{Result, SimError};

/// Narrow capability surface of a simulation engine.
///
/// `Handle` is one open instance bound to one model; `Node` is a resolved
/// variable address inside that instance's tree.
pub trait Engine {
    type Handle;
    type Node;

    /// Open a fresh instance of `model`.
    ///
    /// Fails with [`SimError::ModelNotFound`] or [`SimError::EngineUnavailable`].
    fn open(&self, model: &Path, visibility: Visibility) -> Result<Self::Handle>;

    /// Resolve an address; `Ok(None)` when it does not exist in the tree.
    fn find(&self, handle: &mut Self::Handle, address: &str) -> Result<Option<Self::Node>>;

    fn set_value(&self, handle: &mut Self::Handle, node: &Self::Node, value: &Value) -> Result<()>;

    fn get_value(&self, handle: &mut Self::Handle, node: &Self::Node) -> Result<Value>;

    /// Run the model. Blocks until the engine finishes.
    fn execute(&self, handle: &mut Self::Handle) -> Result<()>;

    /// Close the instance without saving anything back to the model file.
    fn close(&self, handle: Self::Handle) -> Result<()>;
}

/// One live engine instance, disposed exactly once.
pub struct EngineSession<'e, E: Engine> {
    engine: &'e E,
    model: PathBuf,
    handle: Option<E::Handle>,
}

impl<'e, E: Engine> EngineSession<'e, E> {
    /// Open a session on `model`. Nothing needs disposing if this fails.
    pub fn open(engine: &'e E, model: &Path, visibility: Visibility) -> Result<Self> {
        let handle = engine.open(model, visibility)?;
        debug!(model = %model.display(), visible = visibility.is_visible(), "session opened");
        Ok(Self {
            engine,
            model: model.to_path_buf(),
            handle: Some(handle),
        })
    }

    pub fn model(&self) -> &Path {
        &self.model
    }

    /// Set the variable at `address`. An unresolved address is an error.
    pub fn set_variable(&mut self, address: &str, value: &Value) -> Result<()> {
        let engine = self.engine;
        let handle = self.live_handle("set")?;
        let node = engine
            .find(handle, address)?
            .ok_or_else(|| SimError::AddressNotFound {
                address: address.to_string(),
            })?;
        engine.set_value(handle, &node, value)?;
        debug!(address, %value, "variable set");
        Ok(())
    }

    pub fn execute(&mut self) -> Result<()> {
        let engine = self.engine;
        let handle = self.live_handle("execute")?;
        engine.execute(handle)?;
        debug!(model = %self.model.display(), "engine run finished");
        Ok(())
    }

    /// Read the variable at `address`. An unresolved address is [`Reading::Absent`].
    pub fn read_variable(&mut self, address: &str) -> Result<Reading> {
        let engine = self.engine;
        let handle = self.live_handle("get")?;
        match engine.find(handle, address)? {
            Some(node) => Ok(Reading::Present(engine.get_value(handle, &node)?)),
            None => {
                debug!(address, "output address did not resolve");
                Ok(Reading::Absent)
            }
        }
    }

    /// Close the session. A close failure becomes a [`Diagnostic`], never an error.
    pub fn dispose(mut self) -> Option<Diagnostic> {
        self.close_once()
    }

    fn live_handle(&mut self, operation: &'static str) -> Result<&mut E::Handle> {
        self.handle.as_mut().ok_or_else(|| SimError::EngineFault {
            operation,
            reason: "session already disposed".to_string(),
        })
    }

    fn close_once(&mut self) -> Option<Diagnostic> {
        let handle = self.handle.take()?;
        match self.engine.close(handle) {
            Ok(()) => {
                debug!(model = %self.model.display(), "session closed");
                None
            }
            Err(err) => {
                warn!(model = %self.model.display(), err = %err, "closing session failed");
                Some(Diagnostic {
                    model: self.model.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}

impl<E: Engine> Drop for EngineSession<'_, E> {
    fn drop(&mut self) {
        // Failure path: the diagnostic has nowhere to go but the log.
        let _ = self.close_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fault, FakeEngine, FakeModel};

    fn engine() -> FakeEngine {
        FakeEngine::new().with_model(
            "power.apw",
            FakeModel::new()
                .with_variable("IN\\FUEL", Value::Real(0.0))
                .with_variable("OUT\\WORK", Value::Real(0.0)),
        )
    }

    #[test]
    fn set_then_read_round_trips() {
        let engine = engine();
        let mut session =
            EngineSession::open(&engine, Path::new("power.apw"), Visibility::Hidden).expect("open");
        session
            .set_variable("IN\\FUEL", &Value::Real(50.0))
            .expect("set");
        let reading = session.read_variable("IN\\FUEL").expect("read");
        assert_eq!(reading, Reading::Present(Value::Real(50.0)));
        assert_eq!(session.dispose(), None);
        assert_eq!(engine.closed(), 1);
    }

    #[test]
    fn unresolved_address_is_error_on_set_and_absent_on_read() {
        let engine = engine();
        let mut session =
            EngineSession::open(&engine, Path::new("power.apw"), Visibility::Hidden).expect("open");
        let err = session
            .set_variable("IN\\MISSING", &Value::Integer(1))
            .unwrap_err();
        assert!(matches!(err, SimError::AddressNotFound { .. }));
        assert_eq!(
            session.read_variable("OUT\\MISSING").expect("read"),
            Reading::Absent
        );
    }

    #[test]
    fn drop_closes_exactly_once() {
        let engine = engine();
        {
            let _session = EngineSession::open(&engine, Path::new("power.apw"), Visibility::Hidden)
                .expect("open");
        }
        assert_eq!(engine.opened(), 1);
        assert_eq!(engine.closed(), 1);
    }

    #[test]
    fn close_failure_is_a_diagnostic() {
        let engine = engine().with_fault(Fault::Close);
        let session =
            EngineSession::open(&engine, Path::new("power.apw"), Visibility::Hidden).expect("open");
        let diagnostic = session.dispose().expect("diagnostic");
        assert_eq!(diagnostic.model, PathBuf::from("power.apw"));
        assert_eq!(engine.closed(), 1);
    }
}
