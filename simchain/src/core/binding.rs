//! Value propagation between dependent stages.
//!
//! A downstream stage declares which upstream outputs it consumes (the
//! extraction spec). Propagation is two pure steps: [`project`] picks those
//! outputs from the upstream result, then [`merge`] overlays them on the
//! downstream defaults. Precedence is fixed: a present propagated value always
//! replaces a default of the same name; a default is kept otherwise.

use serde::{Deserialize, Serialize};

use crate::core::types::{NamedValues, Outputs, Reading};
use crate::error::{Result, SimError};

/// One entry of an extraction spec.
///
/// Written as a bare name when upstream and downstream agree on the name, or
/// as `{ from = "...", to = "..." }` to rename on the way through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Projection {
    Same(String),
    Renamed { from: String, to: String },
}

impl Projection {
    /// Upstream output name.
    pub fn source(&self) -> &str {
        match self {
            Projection::Same(name) => name,
            Projection::Renamed { from, .. } => from,
        }
    }

    /// Downstream input name.
    pub fn target(&self) -> &str {
        match self {
            Projection::Same(name) => name,
            Projection::Renamed { to, .. } => to,
        }
    }
}

/// What to do when an extracted upstream output is missing or absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentPolicy {
    /// Leave the name out of the projection; a default may cover it.
    #[default]
    Drop,
    /// Fail the pipeline before the downstream stage starts.
    Fail,
}

/// How a stage takes its inputs from the stage before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageBinding {
    /// Ordered extraction spec.
    pub extract: Vec<Projection>,
    pub on_absent: AbsentPolicy,
}

impl StageBinding {
    /// Identity binding over `names`, dropping absent values.
    pub fn identity<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extract: names
                .into_iter()
                .map(|name| Projection::Same(name.into()))
                .collect(),
            on_absent: AbsentPolicy::Drop,
        }
    }

    /// Target names that appear more than once.
    pub fn duplicate_targets(&self) -> Vec<&str> {
        let mut seen = std::collections::BTreeSet::new();
        let mut duplicates = Vec::new();
        for projection in &self.extract {
            let target = projection.target();
            if !seen.insert(target) && !duplicates.contains(&target) {
                duplicates.push(target);
            }
        }
        duplicates
    }
}

/// Upstream values selected by a binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projected {
    /// Present values keyed by downstream input name.
    pub values: NamedValues,
    /// Upstream names that were requested but missing or absent.
    pub dropped: Vec<String>,
}

/// Select the outputs named by `binding` from an upstream result.
///
/// Under [`AbsentPolicy::Drop`] a requested name that is missing from
/// `outputs` or harvested as [`Reading::Absent`] is recorded in
/// [`Projected::dropped`] and otherwise ignored. Under
/// [`AbsentPolicy::Fail`] it is an error.
pub fn project(outputs: &Outputs, binding: &StageBinding) -> Result<Projected> {
    let mut projected = Projected::default();
    for projection in &binding.extract {
        match outputs.get(projection.source()) {
            Some(Reading::Present(value)) => {
                projected
                    .values
                    .insert(projection.target().to_string(), value.clone());
            }
            Some(Reading::Absent) | None => {
                if binding.on_absent == AbsentPolicy::Fail {
                    return Err(SimError::MissingUpstreamValue {
                        name: projection.source().to_string(),
                    });
                }
                projected.dropped.push(projection.source().to_string());
            }
        }
    }
    Ok(projected)
}

/// Overlay propagated values on a copy of `defaults`.
pub fn merge(defaults: &NamedValues, propagated: &NamedValues) -> NamedValues {
    let mut merged = defaults.clone();
    for (name, value) in propagated {
        merged.insert(name.clone(), value.clone());
    }
    merged
}
