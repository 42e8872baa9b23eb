//! Shape validation for mapping documents.
//!
//! A mapping document binds abstract variable names to engine addresses:
//!
//! ```yaml
//! input_paths:
//!   fuelfeed: \Data\Streams\FUEL\Input\TOTFLOW\MIXED
//! output_paths:
//!   work: \Data\Blocks\GT\Output\WNET
//! ```
//!
//! `input_paths` is mandatory and non-empty; `output_paths` is optional. Any
//! other top-level key is ignored.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value as Yaml};

use crate::core::types::{NamedValues, Value};
use crate::error::{Result, SimError};

const INPUT_PATHS: &str = "input_paths";
const OUTPUT_PATHS: &str = "output_paths";

/// Validated name → address bindings for one model. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoMap {
    input_paths: BTreeMap<String, String>,
    output_paths: BTreeMap<String, String>,
}

/// An input that resolved to an engine address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub value: &'a Value,
}

impl IoMap {
    /// Parse YAML text and validate its shape. `origin` names the source in errors.
    pub fn from_yaml_str(contents: &str, origin: &str) -> Result<Self> {
        let doc: Yaml = serde_yaml::from_str(contents).map_err(|err| SimError::ConfigMalformed {
            origin: origin.to_string(),
            reason: err.to_string(),
        })?;
        Self::from_document(&doc, origin)
    }

    /// Validate an already parsed document.
    pub fn from_document(doc: &Yaml, origin: &str) -> Result<Self> {
        let Yaml::Mapping(root) = doc else {
            return Err(SimError::ConfigMalformed {
                origin: origin.to_string(),
                reason: format!("expected a mapping at the top level, found {}", kind(doc)),
            });
        };

        let input_paths = match root.get(INPUT_PATHS) {
            Some(Yaml::Mapping(section)) if !section.is_empty() => {
                string_entries(section, INPUT_PATHS, origin)?
            }
            _ => {
                return Err(SimError::ConfigMissingSection {
                    origin: origin.to_string(),
                    section: INPUT_PATHS,
                });
            }
        };

        let output_paths = match root.get(OUTPUT_PATHS) {
            None => BTreeMap::new(),
            Some(Yaml::Mapping(section)) => string_entries(section, OUTPUT_PATHS, origin)?,
            Some(other) => {
                return Err(SimError::ConfigInvalidSection {
                    origin: origin.to_string(),
                    section: OUTPUT_PATHS,
                    reason: format!("expected a mapping, found {}", kind(other)),
                });
            }
        };

        Ok(Self {
            input_paths,
            output_paths,
        })
    }

    pub fn input_paths(&self) -> &BTreeMap<String, String> {
        &self.input_paths
    }

    pub fn output_paths(&self) -> &BTreeMap<String, String> {
        &self.output_paths
    }

    pub fn input_address(&self, name: &str) -> Option<&str> {
        self.input_paths.get(name).map(String::as_str)
    }

    /// Resolve every input name to its address.
    ///
    /// Fails on the first name (in name order) that has no address, so callers
    /// can reject a case before any engine work happens.
    pub fn resolve_inputs<'a>(&'a self, inputs: &'a NamedValues) -> Result<Vec<ResolvedInput<'a>>> {
        inputs
            .iter()
            .map(|(name, value)| {
                let address =
                    self.input_address(name)
                        .ok_or_else(|| SimError::UnknownInputName { name: name.clone() })?;
                Ok(ResolvedInput {
                    name,
                    address,
                    value,
                })
            })
            .collect()
    }

    /// Input names that `inputs` uses but this map does not declare.
    pub fn unknown_inputs<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        names
            .into_iter()
            .filter(|name| !self.input_paths.contains_key(*name))
            .collect()
    }
}

fn string_entries(
    section: &Mapping,
    name: &'static str,
    origin: &str,
) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    for (key, value) in section {
        let invalid = |reason: String| SimError::ConfigInvalidSection {
            origin: origin.to_string(),
            section: name,
            reason,
        };
        let Yaml::String(key) = key else {
            return Err(invalid(format!("keys must be strings, found {}", kind(key))));
        };
        let Yaml::String(address) = value else {
            return Err(invalid(format!(
                "`{key}` must map to an address string, found {}",
                kind(value)
            )));
        };
        entries.insert(key.clone(), address.clone());
    }
    Ok(entries)
}

fn kind(value: &Yaml) -> &'static str {
    match value {
        Yaml::Null => "null",
        Yaml::Bool(_) => "a boolean",
        Yaml::Number(_) => "a number",
        Yaml::String(_) => "a string",
        Yaml::Sequence(_) => "a sequence",
        Yaml::Mapping(_) => "a mapping",
        Yaml::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWER: &str = r#"
input_paths:
  fuelfeed: \Data\Streams\FUEL\Input\TOTFLOW\MIXED
  airfeed: \Data\Streams\AIR\Input\TOTFLOW\MIXED
output_paths:
  work: \Data\Blocks\GT\Output\WNET
  fgastemp: \Data\Streams\FGAS\Output\TEMP_OUT\MIXED
notes: ignored
"#;

    #[test]
    fn loads_both_sections() {
        let map = IoMap::from_yaml_str(POWER, "power_paths.yaml").expect("load");
        assert_eq!(
            map.input_paths().keys().collect::<Vec<_>>(),
            vec!["airfeed", "fuelfeed"]
        );
        assert_eq!(
            map.input_address("fuelfeed"),
            Some(r"\Data\Streams\FUEL\Input\TOTFLOW\MIXED")
        );
        assert_eq!(map.output_paths().len(), 2);
    }

    #[test]
    fn output_paths_are_optional() {
        let map = IoMap::from_yaml_str("input_paths:\n  a: A\n", "doc").expect("load");
        assert!(map.output_paths().is_empty());
    }

    #[test]
    fn rejects_non_mapping_document() {
        let err = IoMap::from_yaml_str("- a\n- b\n", "doc").unwrap_err();
        assert!(matches!(err, SimError::ConfigMalformed { .. }));
    }

    #[test]
    fn rejects_unparseable_document() {
        let err = IoMap::from_yaml_str("input_paths: [unclosed", "doc").unwrap_err();
        assert!(matches!(err, SimError::ConfigMalformed { .. }));
    }

    #[test]
    fn rejects_missing_or_scalar_input_paths() {
        for doc in ["output_paths:\n  a: A\n", "input_paths: 3\n", "input_paths: {}\n"] {
            let err = IoMap::from_yaml_str(doc, "doc").unwrap_err();
            assert!(
                matches!(err, SimError::ConfigMissingSection { section: "input_paths", .. }),
                "unexpected error for {doc:?}: {err}"
            );
        }
    }

    #[test]
    fn rejects_non_mapping_output_paths() {
        let err =
            IoMap::from_yaml_str("input_paths:\n  a: A\noutput_paths: [x]\n", "doc").unwrap_err();
        assert!(matches!(
            err,
            SimError::ConfigInvalidSection {
                section: "output_paths",
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_string_addresses() {
        let err = IoMap::from_yaml_str("input_paths:\n  a: 12\n", "doc").unwrap_err();
        assert!(err.to_string().contains("`a` must map to an address string"));
    }

    #[test]
    fn resolve_inputs_reports_unknown_name() {
        let map = IoMap::from_yaml_str(POWER, "doc").expect("load");
        let mut inputs = NamedValues::new();
        inputs.insert("fuelfeed".to_string(), Value::Real(50.0));
        inputs.insert("steamfeed".to_string(), Value::Real(3.0));
        let err = map.resolve_inputs(&inputs).unwrap_err();
        assert!(matches!(err, SimError::UnknownInputName { name } if name == "steamfeed"));
    }
}
