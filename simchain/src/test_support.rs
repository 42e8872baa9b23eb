//! Test-only helpers: a deterministic fake engine and temp workspaces.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::types::{Value, Visibility};
use crate::error::{self, SimError};
use crate::io::engine::Engine;

/// Variable tree of one fake engine instance.
pub type Tree = BTreeMap<String, Value>;

type Formula = Box<dyn Fn(&Tree) -> Value>;

/// A model file known to [`FakeEngine`].
///
/// Every open starts from the declared variables; execution then writes each
/// result and formula in declaration order.
#[derive(Default)]
pub struct FakeModel {
    variables: Tree,
    on_execute: Vec<(String, Formula)>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an address with its value when the model is opened.
    pub fn with_variable(mut self, address: &str, initial: Value) -> Self {
        self.variables.insert(address.to_string(), initial);
        self
    }

    /// Declare an address that holds `value` after execution.
    pub fn with_result(self, address: &str, value: Value) -> Self {
        self.with_formula(address, move |_| value.clone())
    }

    /// Declare an address computed from the tree at execution time.
    pub fn with_formula(mut self, address: &str, formula: impl Fn(&Tree) -> Value + 'static) -> Self {
        self.variables
            .entry(address.to_string())
            .or_insert(Value::Empty);
        self.on_execute
            .push((address.to_string(), Box::new(formula)));
        self
    }
}

/// Failure to inject into [`FakeEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// `open` fails with `EngineUnavailable`.
    Open,
    /// `set_value` on this address fails.
    Set(String),
    /// `execute` fails with `EngineExecutionFailed`.
    Execute,
    /// `get_value` on this address fails.
    Get(String),
    /// `close` fails.
    Close,
}

#[derive(Debug, Default)]
struct CallLog {
    opened: Vec<PathBuf>,
    visibility: Vec<Visibility>,
    closed: usize,
    live: usize,
    peak_live: usize,
    executed: usize,
    sets: Vec<(String, Value)>,
}

/// Deterministic in-memory [`Engine`] that records every call.
#[derive(Default)]
pub struct FakeEngine {
    models: BTreeMap<PathBuf, FakeModel>,
    faults: Vec<Fault>,
    log: RefCell<CallLog>,
}

/// Open instance of a [`FakeModel`].
#[derive(Debug)]
pub struct FakeHandle {
    model: PathBuf,
    tree: Tree,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, path: impl Into<PathBuf>, model: FakeModel) -> Self {
        self.models.insert(path.into(), model);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn opened(&self) -> usize {
        self.log.borrow().opened.len()
    }

    pub fn opened_models(&self) -> Vec<PathBuf> {
        self.log.borrow().opened.clone()
    }

    pub fn visibility(&self) -> Vec<Visibility> {
        self.log.borrow().visibility.clone()
    }

    pub fn closed(&self) -> usize {
        self.log.borrow().closed
    }

    /// Largest number of sessions that were open at the same time.
    pub fn peak_live(&self) -> usize {
        self.log.borrow().peak_live
    }

    pub fn executed(&self) -> usize {
        self.log.borrow().executed
    }

    /// Every `(address, value)` pair passed to `set_value`, in call order.
    pub fn sets(&self) -> Vec<(String, Value)> {
        self.log.borrow().sets.clone()
    }

    fn has_fault(&self, fault: &Fault) -> bool {
        self.faults.contains(fault)
    }
}

impl Engine for FakeEngine {
    type Handle = FakeHandle;
    type Node = String;

    fn open(&self, model: &Path, visibility: Visibility) -> error::Result<FakeHandle> {
        let Some(fake) = self.models.get(model) else {
            return Err(SimError::ModelNotFound {
                path: model.to_path_buf(),
            });
        };
        if self.has_fault(&Fault::Open) {
            return Err(SimError::EngineUnavailable {
                reason: "fake engine refused to start".to_string(),
            });
        }
        let mut log = self.log.borrow_mut();
        log.opened.push(model.to_path_buf());
        log.visibility.push(visibility);
        log.live += 1;
        log.peak_live = log.peak_live.max(log.live);
        Ok(FakeHandle {
            model: model.to_path_buf(),
            tree: fake.variables.clone(),
        })
    }

    fn find(&self, handle: &mut FakeHandle, address: &str) -> error::Result<Option<String>> {
        Ok(handle
            .tree
            .contains_key(address)
            .then(|| address.to_string()))
    }

    fn set_value(&self, handle: &mut FakeHandle, node: &String, value: &Value) -> error::Result<()> {
        if self.has_fault(&Fault::Set(node.clone())) {
            return Err(SimError::EngineFault {
                operation: "set",
                reason: format!("fake engine rejected {node}"),
            });
        }
        self.log
            .borrow_mut()
            .sets
            .push((node.clone(), value.clone()));
        handle.tree.insert(node.clone(), value.clone());
        Ok(())
    }

    fn get_value(&self, handle: &mut FakeHandle, node: &String) -> error::Result<Value> {
        if self.has_fault(&Fault::Get(node.clone())) {
            return Err(SimError::EngineFault {
                operation: "get",
                reason: format!("fake engine could not read {node}"),
            });
        }
        Ok(handle.tree.get(node).cloned().unwrap_or(Value::Empty))
    }

    fn execute(&self, handle: &mut FakeHandle) -> error::Result<()> {
        self.log.borrow_mut().executed += 1;
        if self.has_fault(&Fault::Execute) {
            return Err(SimError::EngineExecutionFailed {
                reason: "fake engine did not converge".to_string(),
            });
        }
        if let Some(fake) = self.models.get(&handle.model) {
            for (address, formula) in &fake.on_execute {
                let value = formula(&handle.tree);
                handle.tree.insert(address.clone(), value);
            }
        }
        Ok(())
    }

    fn close(&self, _handle: FakeHandle) -> error::Result<()> {
        let mut log = self.log.borrow_mut();
        log.closed += 1;
        log.live = log.live.saturating_sub(1);
        if self.has_fault(&Fault::Close) {
            return Err(SimError::EngineFault {
                operation: "close",
                reason: "fake engine crashed on close".to_string(),
            });
        }
        Ok(())
    }
}

/// Temporary directory for mapping documents, configs, and model files.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create tempdir")?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

/// Build a [`crate::core::types::NamedValues`] from literal pairs.
pub fn named<V: Into<Value> + Clone>(entries: &[(&str, V)]) -> crate::core::types::NamedValues {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone().into()))
        .collect()
}
