// ─── Catalog Wire Format ───
// JSON documents served by the component metadata service. The shapes here
// are load-bearing compatibility surface; field names must not drift.

use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;
use crate::core::maven::GradleSpecifier;

/// Top-level catalog: the set of known component UIDs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaIndexFile {
    #[serde(default)]
    pub format_version: u32,
    pub packages: Vec<MetaPackage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPackage {
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

/// Per-UID listing of every known version, in the catalog's declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionListFile {
    #[serde(default)]
    pub format_version: u32,
    pub uid: String,
    #[serde(default)]
    pub name: String,
    pub versions: Vec<VersionDescriptor>,
}

/// One resolvable version of a component, as listed by the catalog.
/// Immutable once fetched. `recommended` is an upstream flag, never derived
/// locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub version: String,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(default)]
    pub release_time: String,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub volatile: bool,
    #[serde(default)]
    pub requires: Vec<Requirement>,
    #[serde(default)]
    pub conflicts: Vec<Requirement>,
}

/// A dependency edge between components. `equals` pins an exact version;
/// `suggests` is advisory only and never gates resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggests: Option<String>,
}

/// The full version file for one (uid, version): everything the merge needs.
///
/// Scalar fields replace whatever an earlier component set; keys spelled
/// with a `+` prefix are additive and concatenate instead. That per-field
/// policy travels with the version file, not with the merge engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFile {
    #[serde(default)]
    pub format_version: u32,
    pub uid: String,
    pub version: String,
    #[serde(default)]
    pub release_time: String,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_java_majors: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<Requirement>,
    #[serde(default)]
    pub volatile: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
    /// Override form: replaces all JVM args accumulated so far.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jvm_args: Vec<String>,
    /// Additive form: appended to the accumulated JVM args.
    #[serde(rename = "+jvmArgs", default, skip_serializing_if = "Vec::is_empty")]
    pub additive_jvm_args: Vec<String>,
    /// Feature flags; always additive across components.
    #[serde(rename = "+traits", default, skip_serializing_if = "Vec::is_empty")]
    pub additive_traits: Vec<String>,
}

/// A classpath library declared by a version file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    /// Gradle-style coordinate; identity for override matching.
    pub name: String,
    /// Repository base for coordinate-derived downloads, when `downloads`
    /// is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

impl Library {
    pub fn specifier(&self) -> LauncherResult<GradleSpecifier> {
        GradleSpecifier::parse(&self.name)
    }

    /// Path of this library relative to the libraries directory: the
    /// concrete artifact path when the catalog declares one, otherwise
    /// derived from the coordinate.
    pub fn storage_path(&self) -> LauncherResult<String> {
        if let Some(downloads) = &self.downloads {
            if let Some(artifact) = &downloads.artifact {
                return Ok(artifact.path.clone());
            }
        }
        Ok(self.specifier()?.local_path().to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_list() {
        let raw = r#"{
            "formatVersion": 1,
            "uid": "net.fabricmc.fabric-loader",
            "name": "Fabric Loader",
            "versions": [
                {
                    "version": "0.15.0",
                    "type": "release",
                    "releaseTime": "2023-11-28T10:00:00+00:00",
                    "recommended": true,
                    "requires": [
                        { "uid": "net.fabricmc.intermediary" }
                    ]
                },
                {
                    "version": "0.14.9",
                    "releaseTime": "2022-09-01T10:00:00+00:00",
                    "volatile": true,
                    "requires": [
                        { "uid": "net.fabricmc.intermediary", "equals": "1.19.2" }
                    ]
                }
            ]
        }"#;
        let list: VersionListFile = serde_json::from_str(raw).unwrap();
        assert_eq!(list.uid, "net.fabricmc.fabric-loader");
        assert_eq!(list.versions.len(), 2);
        assert!(list.versions[0].recommended);
        assert!(!list.versions[0].volatile);
        assert!(list.versions[1].volatile);
        assert_eq!(
            list.versions[1].requires[0].equals.as_deref(),
            Some("1.19.2")
        );
    }

    #[test]
    fn parse_version_file_with_additive_fields() {
        let raw = r#"{
            "formatVersion": 1,
            "uid": "net.minecraft",
            "version": "1.20.4",
            "releaseTime": "2023-12-07T08:00:00+00:00",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "minecraftArguments": "--username ${auth_player_name} --accessToken ${auth_access_token}",
            "compatibleJavaMajors": [17, 21],
            "libraries": [
                {
                    "name": "org.ow2.asm:asm:9.2",
                    "downloads": {
                        "artifact": {
                            "path": "org/ow2/asm/asm/9.2/asm-9.2.jar",
                            "sha1": "81a03f76019c67362299c40e0ba13405f5467bff",
                            "size": 122004,
                            "url": "https://libraries.example.net/org/ow2/asm/asm/9.2/asm-9.2.jar"
                        }
                    }
                },
                { "name": "com.example:plain:1.0", "url": "https://repo.example.net/" }
            ],
            "+jvmArgs": ["-XX:+UseG1GC"],
            "+traits": ["XR:Initial", "FirstThreadOnMacOS"]
        }"#;
        let file: VersionFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.main_class.as_deref(), Some("net.minecraft.client.main.Main"));
        assert_eq!(file.compatible_java_majors, vec![17, 21]);
        assert_eq!(file.additive_jvm_args, vec!["-XX:+UseG1GC"]);
        assert_eq!(file.additive_traits.len(), 2);

        assert_eq!(
            file.libraries[0].storage_path().unwrap(),
            "org/ow2/asm/asm/9.2/asm-9.2.jar"
        );
        assert_eq!(
            file.libraries[1].storage_path().unwrap(),
            "com/example/plain/1.0/plain-1.0.jar"
        );
    }

    #[test]
    fn version_file_round_trips_through_serde() {
        let file = VersionFile {
            format_version: 1,
            uid: "org.quiltmc.quilt-loader".into(),
            version: "0.23.1".into(),
            main_class: Some("org.quiltmc.loader.impl.launch.knot.KnotClient".into()),
            additive_traits: vec!["native-quilt".into()],
            ..VersionFile::default()
        };
        let raw = serde_json::to_string(&file).unwrap();
        let back: VersionFile = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.uid, file.uid);
        assert_eq!(back.main_class, file.main_class);
        assert_eq!(back.additive_traits, file.additive_traits);
    }

    #[test]
    fn parse_catalog_index() {
        let raw = r#"{
            "formatVersion": 1,
            "packages": [
                { "uid": "net.minecraft", "name": "Minecraft" },
                { "uid": "org.lwjgl3" }
            ]
        }"#;
        let index: MetaIndexFile = serde_json::from_str(raw).unwrap();
        assert_eq!(index.packages.len(), 2);
        assert_eq!(index.packages[1].uid, "org.lwjgl3");
        assert!(index.packages[1].name.is_empty());
    }
}
