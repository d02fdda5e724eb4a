//! Whole-file JSON document I/O.
//!
//! Documents are written pretty-printed with non-ASCII text left as UTF-8,
//! so Vietnamese names and addresses stay readable in the files. Writes go
//! to a sibling temporary file that is then renamed over the target.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StoreError;
use crate::paths::ensure_dir;

/// Reads the document at `path`, or `T::default()` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`StoreError`] if the file exists but cannot be read or decoded.
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(T::default()),
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Writes `value` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`StoreError`] if encoding or any file operation fails.
pub fn write_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;

    log::trace!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::test_support::temp_dir;

    #[test]
    fn missing_file_reads_as_default() {
        let dir = temp_dir("json_missing");
        let map: BTreeMap<String, String> = read_or_default(&dir.join("nope.json")).unwrap();
        assert!(map.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn writes_indented_unescaped_utf8() {
        let dir = temp_dir("json_utf8");
        let path = dir.join("nested").join("doc.json");
        let mut map = BTreeMap::new();
        map.insert("Địa chỉ".to_owned(), "Hà Nội".to_owned());

        write_pretty(&path, &map).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"Địa chỉ\": \"Hà Nội\"\n}\n");
        let back: BTreeMap<String, String> = read_or_default(&path).unwrap();
        assert_eq!(back, map);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = temp_dir("json_corrupt");
        let path = dir.join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();
        let result: Result<BTreeMap<String, String>, _> = read_or_default(&path);
        assert!(matches!(result, Err(StoreError::Json(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
