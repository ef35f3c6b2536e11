//! Spooled index-file info: documents parked as JSON files until their
//! index task runs.

use std::fs;
use std::path::{Component, Path, PathBuf};

use fieldsearch_core::types::Document;
use fieldsearch_core::IndexError;

/// Writes `document` under `spool_dir` and returns its path relative to it.
pub fn save_index_file_info(spool_dir: &Path, document: &Document) -> Result<PathBuf, IndexError> {
    document.validate()?;
    fs::create_dir_all(spool_dir).map_err(IndexError::storage)?;
    let relative = PathBuf::from(format!("{}.json", uuid::Uuid::new_v4()));
    let bytes = serde_json::to_vec_pretty(document).map_err(IndexError::storage)?;
    fs::write(spool_dir.join(&relative), bytes).map_err(IndexError::storage)?;
    Ok(relative)
}

/// Resolves a relative spool path. Paths leaving the spool directory are rejected.
pub fn absolute_path_for_file_info(spool_dir: &Path, relative: &Path) -> Result<PathBuf, IndexError> {
    let escapes = relative.components().any(|c| !matches!(c, Component::Normal(_)));
    if relative.as_os_str().is_empty() || escapes {
        return Err(IndexError::schema(format!("spooled path '{}' must be relative to the spool directory", relative.display())));
    }
    Ok(spool_dir.join(relative))
}

pub fn load_index_file_info(spool_dir: &Path, relative: &Path) -> Result<Document, IndexError> {
    let path = absolute_path_for_file_info(spool_dir, relative)?;
    let bytes = fs::read(&path).map_err(|e| IndexError::storage(format!("{}: {e}", path.display())))?;
    let document: Document =
        serde_json::from_slice(&bytes).map_err(|e| IndexError::schema(format!("{}: {e}", path.display())))?;
    document.validate()?;
    Ok(document)
}

/// Deletes a consumed spool file. A file that is already gone is fine.
pub fn discard_index_file_info(spool_dir: &Path, relative: &Path) -> Result<(), IndexError> {
    let path = absolute_path_for_file_info(spool_dir, relative)?;
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IndexError::storage(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsearch_core::types::WeightSlot;

    #[test]
    fn saved_info_loads_back() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let document = Document::new("mail", "42").with_text(WeightSlot::Weight0, "hello").with_boost(1.5);
        let relative = save_index_file_info(tmp.path(), &document).expect("save");
        assert!(relative.is_relative());
        assert!(absolute_path_for_file_info(tmp.path(), &relative).expect("resolve").exists());
        assert_eq!(load_index_file_info(tmp.path(), &relative).expect("load"), document);

        discard_index_file_info(tmp.path(), &relative).expect("discard");
        discard_index_file_info(tmp.path(), &relative).expect("discard twice");
        assert!(matches!(load_index_file_info(tmp.path(), &relative), Err(IndexError::Storage(_))));
    }

    #[test]
    fn escaping_paths_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        for bad in ["../x.json", "/etc/passwd", ""] {
            assert!(absolute_path_for_file_info(tmp.path(), Path::new(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn malformed_json_is_a_schema_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        fs::write(tmp.path().join("bad.json"), b"{ not json").expect("write");
        assert!(matches!(load_index_file_info(tmp.path(), Path::new("bad.json")), Err(IndexError::Schema(_))));
    }
}
