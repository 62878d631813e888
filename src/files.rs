//! Reading stage files and writing them atomically.
//!
//! Outputs are written to a `.tmp` sibling of the destination and renamed
//! into place, so a failed run never leaves a half-written file. The result
//! gets the same permissions as any other file the process creates.

use crate::error::TableSnapError;
use crate::model::{ContentElement, TablesDocument};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

fn read_text(path: &Path) -> Result<String, TableSnapError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TableSnapError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => TableSnapError::MalformedInput {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })
}

/// Read a content list: a root array of elements, each with a `type`.
pub fn read_content_list(path: &Path) -> Result<Vec<ContentElement>, TableSnapError> {
    let raw = read_text(path)?;
    let elements: Vec<ContentElement> =
        serde_json::from_str(&raw).map_err(|e| TableSnapError::MalformedInput {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    debug!("Read {} elements from {}", elements.len(), path.display());
    Ok(elements)
}

/// Read table records from a root array or a `{"tables": [...]}` document.
pub fn read_tables(path: &Path) -> Result<Vec<ContentElement>, TableSnapError> {
    let raw = read_text(path)?;
    let malformed = |detail: String| TableSnapError::MalformedInput {
        path: path.to_path_buf(),
        detail,
    };

    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| malformed(e.to_string()))?;
    let tables = if value.is_array() {
        serde_json::from_value::<Vec<ContentElement>>(value)
    } else if value.is_object() {
        serde_json::from_value::<TablesDocument>(value).map(|doc| doc.tables)
    } else {
        return Err(malformed(
            "expected an array or a {\"tables\": [...]} object".into(),
        ));
    }
    .map_err(|e| malformed(e.to_string()))?;

    debug!("Read {} table records from {}", tables.len(), path.display());
    Ok(tables)
}

/// Write `value` as pretty JSON with the given indent.
pub fn write_json<T: Serialize>(path: &Path, value: &T, indent: &[u8]) -> Result<(), TableSnapError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent));
    value
        .serialize(&mut ser)
        .map_err(|e| TableSnapError::Internal(format!("serialise {}: {e}", path.display())))?;
    write_atomic(path, &buf)
}

/// `{path}.tmp`, next to `path`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` in one go: write a temp sibling, then rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TableSnapError> {
    let write_failed = |source: std::io::Error| TableSnapError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, contents).and_then(|_| std::fs::rename(&tmp, path)) {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_failed(e));
    }

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_list_requires_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_content_list.json");
        std::fs::write(&path, r#"[{"type": "text"}, {"page_idx": 1}]"#).unwrap();
        let err = read_content_list(&path).unwrap_err();
        assert!(matches!(err, TableSnapError::MalformedInput { .. }));
    }

    #[test]
    fn content_list_not_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_content_list.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            read_content_list(&path),
            Err(TableSnapError::MalformedInput { .. })
        ));
    }

    #[test]
    fn missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_content_list(&dir.path().join("none.json")),
            Err(TableSnapError::InputNotFound { .. })
        ));
    }

    #[test]
    fn tables_accepts_both_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("a.json");
        std::fs::write(&list, r#"[{"type": "table", "page_idx": 0}]"#).unwrap();
        assert_eq!(read_tables(&list).unwrap().len(), 1);

        let doc = dir.path().join("b.json");
        std::fs::write(&doc, r#"{"tables": [{"type": "table"}, {"type": "table"}]}"#).unwrap();
        assert_eq!(read_tables(&doc).unwrap().len(), 2);

        let scalar = dir.path().join("c.json");
        std::fs::write(&scalar, "3").unwrap();
        assert!(read_tables(&scalar).is_err());
    }

    #[test]
    fn tables_document_element_without_type() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("b.json");
        std::fs::write(&doc, r#"{"tables": [{"table_body": "<table/>"}]}"#).unwrap();
        assert!(matches!(
            read_tables(&doc),
            Err(TableSnapError::MalformedInput { .. })
        ));
    }

    #[test]
    fn write_json_indent_and_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("t.json");
        write_json(&path, &json!([{"title": "资产负债表"}]), b"    ").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("资产负债表"));
        assert!(text.contains("\n        \"title\""));
    }

    #[test]
    fn write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "新内容".as_bytes()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "新内容");
        assert!(!dir.path().join("doc.md.tmp").exists());
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path(Path::new("/d/r_表格.md")),
            PathBuf::from("/d/r_表格.md.tmp")
        );
    }

    #[cfg(unix)]
    #[test]
    fn write_atomic_keeps_default_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.md");
        std::fs::write(&plain, "hello").unwrap();
        let atomic = dir.path().join("doc.md");
        write_atomic(&atomic, b"hello").unwrap();

        let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&atomic), mode(&plain));
    }
}
