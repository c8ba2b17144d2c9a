//! JSON file encoding helpers

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::group::Group;

/// Read and decode a JSON data file. `Ok(None)` if the file does not exist;
/// a blank file decodes to the default value.
pub(crate) async fn read_json<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!(path = %path.display(), "Data file is blank, treating as empty");
        return Ok(Some(T::default()));
    }

    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Encode `value` and replace `path` through a sibling temp file, so a
/// crash mid-write leaves the previous file intact.
pub(crate) async fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read the legacy single fallback group file: a raw group name, possibly
/// written as a JSON string.
pub(crate) async fn read_legacy_name(path: &Path) -> Result<Option<String>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let trimmed = raw.trim();
    let name = serde_json::from_str::<String>(trimmed).unwrap_or_else(|_| trimmed.to_string());
    Ok(Some(name))
}

/// Make decoded groups consistent with their map keys.
///
/// The key is authoritative: a blank inner name is filled in, a conflicting
/// one is overwritten. Entries under the empty key are dropped since the
/// empty name always denotes the virtual group.
pub(crate) fn normalize_groups(raw: BTreeMap<String, Group>) -> BTreeMap<String, Group> {
    raw.into_iter()
        .filter_map(|(key, mut group)| {
            if key.is_empty() {
                warn!("Dropping group stored under an empty name");
                return None;
            }
            if group.name != key {
                if !group.name.is_empty() {
                    warn!(key = %key, name = %group.name, "Group name does not match its key, using key");
                }
                group.name = key.clone();
            }
            group.dedup_parents();
            Some((key, group))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_groups() {
        let raw: BTreeMap<String, Group> = serde_json::from_str(
            r#"{
                "member": {"parents": ["guest", "guest"]},
                "admin": {"name": "root"},
                "": {"name": ""}
            }"#,
        )
        .unwrap();

        let groups = normalize_groups(raw);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups["member"].name, "member");
        assert_eq!(groups["member"].parents, vec!["guest"]);
        assert_eq!(groups["admin"].name, "admin");
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/data/group_data.dat");
        assert_eq!(temp_path(path), Path::new("/data/group_data.dat.tmp"));
    }

    #[tokio::test]
    async fn test_read_missing_and_blank() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.dat");
        let blank = dir.path().join("blank.dat");
        tokio::fs::write(&blank, b"  \n").await.unwrap();

        let none: Option<BTreeMap<String, String>> = read_json(&missing).await.unwrap();
        assert!(none.is_none());

        let empty: Option<BTreeMap<String, String>> = read_json(&blank).await.unwrap();
        assert_eq!(empty, Some(BTreeMap::new()));
    }

    #[tokio::test]
    async fn test_read_legacy_name_variants() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.dat");
        let quoted = dir.path().join("quoted.dat");
        tokio::fs::write(&raw, b"guest\n").await.unwrap();
        tokio::fs::write(&quoted, br#""member""#).await.unwrap();

        assert_eq!(read_legacy_name(&raw).await.unwrap().as_deref(), Some("guest"));
        assert_eq!(read_legacy_name(&quoted).await.unwrap().as_deref(), Some("member"));
        assert!(read_legacy_name(&dir.path().join("none")).await.unwrap().is_none());
    }
}
