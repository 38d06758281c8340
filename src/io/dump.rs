//! Raw upstream response dumps for `inspect --dump-raw`.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;

/// Write `value` as pretty-printed JSON.
pub fn write_raw_json(path: &Path, value: &serde_json::Value) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create dump file '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::usage(format!("Failed to write dump file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dump_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        let value = json!({ "getconsumptionsresult": { "consumptiondata": null } });

        write_raw_json(&path, &value).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn unwritable_path_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("raw.json");
        assert_eq!(write_raw_json(&path, &json!({})).unwrap_err().exit_code(), 2);
    }
}
