//! Locally captured registry datasets.
//!
//! A snapshot is either a JSON array of raw rows or JSON lines (one row per
//! line, blank lines ignored). The format is detected from the first
//! non-whitespace byte.
//!
//! Rows are handed out as JSON values and decoded one at a time by the
//! importer. In a JSON-lines file an unparseable line becomes an error row
//! of its own instead of failing the file.

use std::path::Path;

use crate::error::RegistryError;

/// One snapshot entry, or the reason its line could not be read as JSON.
pub type SnapshotRow = Result<serde_json::Value, RegistryError>;

/// Reads every row from the snapshot at `path`.
///
/// # Errors
///
/// - [`RegistryError::SnapshotIo`] if the file cannot be read.
/// - [`RegistryError::SnapshotParse`] if a file that opens with `[` is not
///   a well-formed JSON array. `line` is 1-based.
pub async fn load_snapshot(path: &Path) -> Result<Vec<SnapshotRow>, RegistryError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RegistryError::SnapshotIo {
            path: path.to_path_buf(),
            source,
        })?;
    let rows = parse_snapshot(&contents, path)?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "snapshot loaded");
    Ok(rows)
}

pub(crate) fn parse_snapshot(contents: &str, path: &Path) -> Result<Vec<SnapshotRow>, RegistryError> {
    if contents.trim_start().starts_with('[') {
        let rows: Vec<serde_json::Value> =
            serde_json::from_str(contents).map_err(|source| RegistryError::SnapshotParse {
                path: path.to_path_buf(),
                line: source.line(),
                source,
            })?;
        return Ok(rows.into_iter().map(Ok).collect());
    }

    Ok(contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| RegistryError::SnapshotParse {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("snapshot.json")
    }

    #[test]
    fn parses_json_array() {
        let rows = parse_snapshot(
            r#"  [{"serial_number":"A"},{"serial_number":"B","status":"Activ"}]"#,
            path(),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].as_ref().unwrap()["status"], "Activ");
    }

    #[test]
    fn parses_json_lines_skipping_blanks() {
        let rows = parse_snapshot(
            "{\"serial_number\":\"A\"}\n\n{\"serialNumber\":\"B\"}\n",
            path(),
        )
        .unwrap();
        let serials: Vec<_> = rows
            .iter()
            .map(|r| {
                let row = r.as_ref().unwrap();
                row.get("serial_number")
                    .or_else(|| row.get("serialNumber"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(serials, vec!["A", "B"]);
    }

    #[test]
    fn empty_file_has_no_rows() {
        assert!(parse_snapshot("", path()).unwrap().is_empty());
    }

    #[test]
    fn bad_json_line_becomes_an_error_row_with_its_line_number() {
        let rows = parse_snapshot(
            "{\"serial_number\":\"A\"}\n{oops\n{\"serial_number\":\"C\"}\n",
            path(),
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].is_ok());
        assert!(matches!(rows[1], Err(RegistryError::SnapshotParse { line: 2, .. })));
        assert!(rows[2].is_ok());
    }

    #[test]
    fn mistyped_array_element_is_kept_for_row_level_decoding() {
        let rows = parse_snapshot(
            r#"[{"serial_number":"A"},{"serialNumber":12345},"stray"]"#,
            path(),
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(Result::is_ok));
    }

    #[test]
    fn truncated_array_fails_the_file() {
        let err = parse_snapshot("[{\"serial_number\":\"A\"},\n{\"serial", path()).unwrap_err();
        assert!(matches!(err, RegistryError::SnapshotParse { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = load_snapshot(Path::new("/nonexistent/onjn/snapshot.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::SnapshotIo { .. }));
    }
}
