//! Loading mapping documents from disk.

use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::core::io_map::IoMap;
use crate::error::{Result, SimError};

/// Read and validate the mapping document at `path`.
///
/// Reading is the only side effect. A missing file is
/// [`SimError::ConfigNotFound`]; shape problems come from
/// [`IoMap::from_yaml_str`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_mapping(path: &Path) -> Result<IoMap> {
    let origin = path.display().to_string();
    if !path.is_file() {
        return Err(SimError::ConfigNotFound { origin });
    }
    let contents = fs::read_to_string(path).map_err(|err| SimError::ConfigMalformed {
        origin: origin.clone(),
        reason: format!("read failed: {err}"),
    })?;
    let map = IoMap::from_yaml_str(&contents, &origin)?;
    debug!(
        inputs = map.input_paths().len(),
        outputs = map.output_paths().len(),
        "mapping loaded"
    );
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;

    #[test]
    fn missing_file_is_not_found() {
        let ws = TestWorkspace::new().expect("workspace");
        let err = load_mapping(&ws.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, SimError::ConfigNotFound { .. }));
    }

    #[test]
    fn loads_document_from_disk() {
        let ws = TestWorkspace::new().expect("workspace");
        let path = ws
            .write(
                "orc/ORC_paths.yaml",
                "input_paths:\n  fgastemp: \\Data\\Streams\\FGAS\\Input\\TEMP\\MIXED\n",
            )
            .expect("write");
        let map = load_mapping(&path).expect("load");
        assert_eq!(
            map.input_address("fgastemp"),
            Some(r"\Data\Streams\FGAS\Input\TEMP\MIXED")
        );
    }

    #[test]
    fn directory_is_not_a_document() {
        let ws = TestWorkspace::new().expect("workspace");
        let err = load_mapping(ws.path()).unwrap_err();
        assert!(matches!(err, SimError::ConfigNotFound { .. }));
    }
}
