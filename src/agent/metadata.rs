//! Runtime Metadata Store
//!
//! Reads the per-volume JSON record written on the node by the component
//! that provisioned the volume. The record lives at
//! `<identity>/<runtime file name>` and is never written here.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Name of the record file the node plugin writes next to each volume.
pub const DEFAULT_RUNTIME_FILE_NAME: &str = "alibabacloudcsiplugin.json";

/// Discriminator field inside a record.
pub const VOLUME_TYPE_FIELD: &str = "volumetype";

/// A decoded record: lower-cased field name to lower-cased value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeMetadataRecord(BTreeMap<String, String>);

impl RuntimeMetadataRecord {
    /// Decode raw record text.
    ///
    /// The whole text is lower-cased first, so keys and values compare
    /// case-insensitively. Non-string values are rejected.
    pub fn decode(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        let lowered = raw.to_lowercase();
        serde_json::from_str::<BTreeMap<String, String>>(&lowered).map(Self)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// The `volumetype` discriminator, if present.
    pub fn volume_type(&self) -> Option<&str> {
        self.get(VOLUME_TYPE_FIELD)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for RuntimeMetadataRecord {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

/// Loads records from disk. Every call re-reads the file.
#[derive(Debug, Clone)]
pub struct RuntimeMetadataStore {
    file_name: String,
}

impl Default for RuntimeMetadataStore {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME_FILE_NAME)
    }
}

impl RuntimeMetadataStore {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Where the record for `identity` is expected, lexically cleaned.
    pub fn record_path(&self, identity: &str) -> PathBuf {
        clean_path(&Path::new(identity).join(&self.file_name))
    }

    /// Read and decode the record for `identity`.
    ///
    /// A missing file is [`Error::NotFound`] carrying the record path; bad
    /// content is [`Error::Decode`].
    pub async fn load(&self, identity: &str) -> Result<RuntimeMetadataRecord> {
        let path = self.record_path(identity);

        let raw = match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let record = RuntimeMetadataRecord::decode(&raw).map_err(|e| Error::Decode {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), fields = record.len(), "Loaded runtime record");
        Ok(record)
    }
}

/// Resolve `.`, `..` and repeated separators without touching the disk.
///
/// `..` above the root stays at the root; leading `..` of a relative path
/// is kept. An empty result is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => cleaned.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                cleaned.pop();
                depth -= 1;
            }
            Component::ParentDir if cleaned.has_root() => {}
            Component::ParentDir => cleaned.push(".."),
            Component::Normal(segment) => {
                cleaned.push(segment);
                depth += 1;
            }
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_record_path() {
        let store = RuntimeMetadataStore::default();
        assert_eq!(
            store.record_path("/var/lib/kubelet/pods/u/volumes/kubernetes.io~csi/pv-1/mount"),
            PathBuf::from(
                "/var/lib/kubelet/pods/u/volumes/kubernetes.io~csi/pv-1/mount/alibabacloudcsiplugin.json"
            )
        );

        let custom = RuntimeMetadataStore::new("runtime.json");
        assert_eq!(custom.record_path("/v"), PathBuf::from("/v/runtime.json"));
    }

    #[test]
    fn test_clean_path() {
        for (raw, cleaned) in [
            ("/x//vol", "/x/vol"),
            ("/x/./vol", "/x/vol"),
            ("/x/a/../vol", "/x/vol"),
            ("/x/vol/", "/x/vol"),
            ("/../vol", "/vol"),
            ("a/../../b", "../b"),
            ("./", "."),
        ] {
            assert_eq!(clean_path(Path::new(raw)), PathBuf::from(cleaned), "{}", raw);
        }
    }

    #[test]
    fn test_record_path_is_cleaned() {
        let store = RuntimeMetadataStore::default();
        let expected = PathBuf::from("/x/vol/alibabacloudcsiplugin.json");
        for identity in ["/x//vol", "/x/./vol", "/x/a/../vol"] {
            assert_eq!(store.record_path(identity), expected);
        }
    }

    #[tokio::test]
    async fn test_load_follows_cleaned_path() {
        let dir = tempfile::tempdir().unwrap();
        let volume = dir.path().join("vol");
        std::fs::create_dir(&volume).unwrap();
        std::fs::write(volume.join(DEFAULT_RUNTIME_FILE_NAME), r#"{"volumetype":"nfs"}"#).unwrap();

        // "missing" does not exist, so only a lexical `..` reaches the record.
        let identity = format!("{}/missing/../vol", dir.path().display());
        let record = RuntimeMetadataStore::default().load(&identity).await.unwrap();
        assert_eq!(record.volume_type(), Some("nfs"));
    }

    #[tokio::test]
    async fn test_load_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = br#"{"volumetype":"block","device":"/dev/vd"#.to_vec();
        raw.push(0xff);
        raw.extend_from_slice(br#""}"#);
        std::fs::write(dir.path().join(DEFAULT_RUNTIME_FILE_NAME), raw).unwrap();

        let record = RuntimeMetadataStore::default()
            .load(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(record.volume_type(), Some("block"));
        assert_eq!(record.get("device"), Some("/dev/vd\u{fffd}"));
    }

    #[test]
    fn test_decode_lowercases_everything() {
        let record =
            RuntimeMetadataRecord::decode(r#"{"VolumeType":"Block","Device":"/dev/VDB"}"#).unwrap();
        assert_eq!(record.volume_type(), Some("block"));
        assert_eq!(record.get("device"), Some("/dev/vdb"));
        assert_eq!(record.get("Device"), None);
    }

    #[test]
    fn test_decode_rejects_non_string_values() {
        assert!(RuntimeMetadataRecord::decode(r#"{"volumetype":"nfs","vers":4}"#).is_err());
        assert!(RuntimeMetadataRecord::decode("[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let identity = dir.path().join("absent");
        let store = RuntimeMetadataStore::default();

        let err = store.load(identity.to_str().unwrap()).await.unwrap_err();
        assert_matches!(err, Error::NotFound(path) if path.ends_with("absent/alibabacloudcsiplugin.json"));
    }

    #[tokio::test]
    async fn test_load_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_RUNTIME_FILE_NAME), "{not json").unwrap();
        let store = RuntimeMetadataStore::default();

        let err = store.load(dir.path().to_str().unwrap()).await.unwrap_err();
        assert_matches!(err, Error::Decode { .. });
    }

    #[tokio::test]
    async fn test_load_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(DEFAULT_RUNTIME_FILE_NAME);
        let store = RuntimeMetadataStore::default();
        let identity = dir.path().to_str().unwrap();

        std::fs::write(&file, r#"{"volumetype":"block"}"#).unwrap();
        assert_eq!(store.load(identity).await.unwrap().volume_type(), Some("block"));

        std::fs::write(&file, r#"{"volumetype":"nfs"}"#).unwrap();
        assert_eq!(store.load(identity).await.unwrap().volume_type(), Some("nfs"));
    }
}
