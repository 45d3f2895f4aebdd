//! Whole-file JSON persistence helpers

use super::traits::StorageResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns `path` with `suffix` appended to its file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Writes `value` as pretty JSON to `<path>.tmp`, then renames it over `path`
///
/// Readers see either the old file or the new one, never a partial write.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = sibling(path, ".tmp");
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a JSON array of records
///
/// # Returns
///
/// * `Ok(None)` - The file does not exist
/// * `Ok(Some(records))` - The file holds a JSON array
/// * `Err(_)` - The file exists but cannot be read or parsed
pub(crate) fn read_json_array(path: &Path) -> StorageResult<Option<Vec<serde_json::Value>>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    let records: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
    Ok(Some(records))
}

/// Moves an unreadable store file to `<path>.corrupt`
pub(crate) fn quarantine(path: &Path) -> StorageResult<PathBuf> {
    let target = sibling(path, ".corrupt");
    fs::rename(path, &target)?;
    Ok(target)
}

/// Copies a partly readable store file to `<path>.corrupt`, leaving it in place
pub(crate) fn preserve_copy(path: &Path) -> StorageResult<PathBuf> {
    let target = sibling(path, ".corrupt");
    fs::copy(path, &target)?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("store.json.tmp").exists());
        let records = read_json_array(&path).unwrap().unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_json_array(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_quarantine() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        assert!(read_json_array(&path).is_err());
        let moved = quarantine(&path).unwrap();

        assert_eq!(moved, dir.path().join("store.json.corrupt"));
        assert!(!path.exists());
        assert!(moved.exists());
    }
}
