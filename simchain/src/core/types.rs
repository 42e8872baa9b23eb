//! Shared deterministic types for case inputs and harvested results.
//!
//! These types define stable contracts between core components. They do not
//! depend on external state or I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Scalar value exchanged with an engine variable.
///
/// Integers and reals are kept apart so that a value read back from an engine
/// prints the way it was written. `Empty` is a variable that exists but holds
/// no domain value; it is not the same as an address that did not resolve
/// (see [`Reading::Absent`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Empty,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Real(value) => write!(f, "{value:?}"),
            Value::Text(value) => write!(f, "{value}"),
            Value::Empty => f.write_str("<empty>"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// Variable name to value. Used for case inputs, defaults, and merged sets.
pub type NamedValues = BTreeMap<String, Value>;

/// Outcome of harvesting one declared output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reading {
    /// The address resolved and the engine returned this value.
    Present(Value),
    /// The address did not resolve in this run.
    Absent,
}

impl Reading {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Reading::Present(value) => Some(value),
            Reading::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Reading::Present(_))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Present(value) => fmt::Display::fmt(value, f),
            Reading::Absent => f.write_str("(absent)"),
        }
    }
}

/// Output name to harvested reading.
pub type Outputs = BTreeMap<String, Reading>;

/// Display hint passed to the engine when a session opens.
///
/// Has no effect on computed results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
}

impl Visibility {
    pub fn from_flag(visible: bool) -> Self {
        if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    pub fn is_visible(self) -> bool {
        self == Visibility::Visible
    }
}

/// Non-fatal problem observed while closing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Model the session was bound to.
    pub model: PathBuf,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "closing session for {} failed: {}",
            self.model.display(),
            self.message
        )
    }
}

/// Everything one case run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    /// Copy of the inputs that were set before execution.
    pub inputs: NamedValues,
    /// Every name in the output map, present or absent.
    pub outputs: Outputs,
    /// Disposal problems; never part of the run's success or failure.
    pub diagnostics: Vec<Diagnostic>,
}

impl ResultSet {
    /// Harvested value for `name`, if the output was declared and resolved.
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name).and_then(Reading::value)
    }

    /// Names of declared outputs whose addresses did not resolve.
    pub fn absent_outputs(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|(_, reading)| !reading.is_present())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_deserialize_by_shape() {
        let values: NamedValues = toml::from_str(
            r#"
fgastemp = 250
fgaspres = 1.013
fluid = "R245fa"
"#,
        )
        .expect("parse");
        assert_eq!(values["fgastemp"], Value::Integer(250));
        assert_eq!(values["fgaspres"], Value::Real(1.013));
        assert_eq!(values["fluid"], Value::Text("R245fa".to_string()));
    }

    #[test]
    fn reals_keep_their_fractional_part_when_printed() {
        assert_eq!(Value::Real(50.0).to_string(), "50.0");
        assert_eq!(Value::Integer(50).to_string(), "50");
        assert_eq!(Value::Real(1.013).to_string(), "1.013");
        assert_eq!(Reading::Present(Value::Real(200.0)).to_string(), "200.0");
    }

    #[test]
    fn null_is_an_empty_value() {
        let value: Value = serde_json::from_str("null").expect("parse");
        assert_eq!(value, Value::Empty);
        assert_eq!(Reading::Present(value).to_string(), "<empty>");
        assert_eq!(Reading::Absent.to_string(), "(absent)");
    }

    #[test]
    fn result_set_lists_absent_outputs() {
        let mut outputs = Outputs::new();
        outputs.insert("work".to_string(), Reading::Present(Value::Real(12.5)));
        outputs.insert("qevap".to_string(), Reading::Absent);
        let result = ResultSet {
            inputs: NamedValues::new(),
            outputs,
            diagnostics: Vec::new(),
        };
        assert_eq!(result.output("work"), Some(&Value::Real(12.5)));
        assert_eq!(result.output("qevap"), None);
        assert_eq!(result.absent_outputs(), vec!["qevap"]);
    }
}
