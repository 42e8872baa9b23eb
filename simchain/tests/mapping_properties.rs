//! Property tests for mapping documents and input resolution.

use std::collections::BTreeMap;

use proptest::collection::btree_map;
use proptest::prelude::*;
use simchain::core::io_map::IoMap;
use simchain::core::types::{NamedValues, Value};
use simchain::error::SimError;

fn names_to_addresses() -> impl Strategy<Value = BTreeMap<String, String>> {
    btree_map("v_[a-z0-9]{1,8}", "\\\\Data\\\\[A-Z]{1,6}\\\\[A-Z]{1,6}", 1..12)
}

fn document(sections: &[(&str, &BTreeMap<String, String>)]) -> String {
    let doc: BTreeMap<&str, &BTreeMap<String, String>> = sections.iter().copied().collect();
    serde_yaml::to_string(&doc).expect("serialize document")
}

proptest! {
    /// Loaded input and output names equal the document's keys.
    #[test]
    fn loaded_names_equal_document_keys(
        inputs in names_to_addresses(),
        outputs in names_to_addresses(),
    ) {
        let yaml = document(&[("input_paths", &inputs), ("output_paths", &outputs)]);
        let io_map = IoMap::from_yaml_str(&yaml, "generated.yaml").expect("load");

        prop_assert_eq!(io_map.input_paths(), &inputs);
        prop_assert_eq!(io_map.output_paths(), &outputs);
    }

    /// Without `input_paths` a document never loads, whatever else it holds.
    #[test]
    fn missing_input_section_is_rejected(outputs in names_to_addresses()) {
        let yaml = document(&[("output_paths", &outputs)]);
        let err = IoMap::from_yaml_str(&yaml, "generated.yaml").unwrap_err();

        prop_assert!(
            matches!(err, SimError::ConfigMissingSection { section: "input_paths", .. }),
            "unexpected error: {}",
            err
        );
    }

    /// Any name outside `input_paths` fails resolution and names itself.
    #[test]
    fn undeclared_input_fails_resolution(
        inputs in names_to_addresses(),
        stranger in "w_[a-z]{1,8}",
    ) {
        let yaml = document(&[("input_paths", &inputs)]);
        let io_map = IoMap::from_yaml_str(&yaml, "generated.yaml").expect("load");

        let mut values: NamedValues = inputs
            .keys()
            .map(|name| (name.clone(), Value::Integer(1)))
            .collect();
        prop_assert!(io_map.resolve_inputs(&values).is_ok());

        values.insert(stranger.clone(), Value::Integer(1));
        let err = io_map.resolve_inputs(&values).unwrap_err();
        prop_assert!(
            matches!(&err, SimError::UnknownInputName { name } if *name == stranger),
            "unexpected error: {}",
            err
        );
    }
}
