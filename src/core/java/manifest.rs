// ─── Runtime Manifest Format ───
// The per-file listing some providers serve instead of a single archive:
// every file with its own URL and checksum, plus directories, symlink
// targets and executable bits to restore.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RuntimeManifest {
    pub files: BTreeMap<String, ManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub downloads: Option<EntryDownloads>,
    #[serde(default)]
    pub executable: bool,
    /// Link target, for `kind == Link`.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Link,
}

#[derive(Debug, Deserialize)]
pub struct EntryDownloads {
    pub raw: Option<RawDownload>,
}

#[derive(Debug, Deserialize)]
pub struct RawDownload {
    pub url: String,
    pub sha1: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_manifest_with_all_entry_kinds() {
        let raw = r#"{
            "files": {
                "bin": { "type": "directory" },
                "bin/java": {
                    "type": "file",
                    "executable": true,
                    "downloads": {
                        "raw": {
                            "url": "https://runtime.example.net/bin/java",
                            "sha1": "81a03f76019c67362299c40e0ba13405f5467bff",
                            "size": 12345
                        }
                    }
                },
                "lib/libjava.so": {
                    "type": "file",
                    "downloads": {
                        "raw": {
                            "url": "https://runtime.example.net/lib/libjava.so",
                            "sha1": "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
                        }
                    }
                },
                "legal/java.base": { "type": "link", "target": "../share/legal" }
            }
        }"#;
        let manifest: RuntimeManifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.files.len(), 4);

        let java = &manifest.files["bin/java"];
        assert_eq!(java.kind, EntryKind::File);
        assert!(java.executable);
        assert_eq!(
            java.downloads.as_ref().unwrap().raw.as_ref().unwrap().size,
            Some(12345)
        );

        let lib = &manifest.files["lib/libjava.so"];
        assert!(!lib.executable);
        assert_eq!(
            lib.downloads.as_ref().unwrap().raw.as_ref().unwrap().size,
            None
        );

        let link = &manifest.files["legal/java.base"];
        assert_eq!(link.kind, EntryKind::Link);
        assert_eq!(link.target.as_deref(), Some("../share/legal"));
    }
}
