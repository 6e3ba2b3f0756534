use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::core::error::{LauncherError, LauncherResult};

/// A parsed library coordinate.
///
/// Supported formats:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version:classifier@packaging`
///   `groupId:artifactId:version@packaging`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GradleSpecifier {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension / packaging type. Defaults to `"jar"`.
    pub packaging: String,
}

impl GradleSpecifier {
    pub fn parse(coord: &str) -> LauncherResult<Self> {
        // Split off @packaging first
        let (coord_part, packaging_override) = if let Some(idx) = coord.rfind('@') {
            (&coord[..idx], Some(&coord[idx + 1..]))
        } else {
            (coord, None)
        };

        let parts: Vec<&str> = coord_part.split(':').collect();

        match parts.len() {
            3 => Ok(Self {
                group_id: parts[0].to_string(),
                artifact_id: parts[1].to_string(),
                version: parts[2].to_string(),
                classifier: None,
                packaging: packaging_override.unwrap_or("jar").to_string(),
            }),
            4 => Ok(Self {
                group_id: parts[0].to_string(),
                artifact_id: parts[1].to_string(),
                version: parts[2].to_string(),
                classifier: Some(parts[3].to_string()),
                packaging: packaging_override.unwrap_or("jar").to_string(),
            }),
            _ => Err(LauncherError::InvalidCoordinate(coord.to_string())),
        }
    }

    /// Version-independent identity used for override matching during the
    /// profile merge: `group:artifact[:classifier]`.
    pub fn override_key(&self) -> String {
        match &self.classifier {
            Some(c) => format!("{}:{}:{}", self.group_id, self.artifact_id, c),
            None => format!("{}:{}", self.group_id, self.artifact_id),
        }
    }

    /// Construct the group path portion (`net/sf/jopt-simple`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Build the artifact filename: `artifactId-version[-classifier].packaging`.
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// Full URL under the given repository base.
    pub fn url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!(
            "{}/{}/{}/{}/{}",
            base,
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// Local path relative to the libraries directory, mirroring the Maven
    /// repository layout: `<group_path>/<artifact_id>/<version>/<filename>`.
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.group_path())
            .join(&self.artifact_id)
            .join(&self.version)
            .join(self.filename())
    }
}

impl fmt::Display for GradleSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(c) => write!(
                f,
                "{}:{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, c, self.packaging
            ),
            None => write!(
                f,
                "{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, self.packaging
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_coordinate() {
        let a = GradleSpecifier::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(a.group_id, "net.sf.jopt-simple");
        assert_eq!(a.artifact_id, "jopt-simple");
        assert_eq!(a.version, "5.0.4");
        assert_eq!(a.classifier, None);
        assert_eq!(a.packaging, "jar");
    }

    #[test]
    fn parse_with_classifier() {
        let a = GradleSpecifier::parse("org.lwjgl:lwjgl:3.3.3:natives-windows").unwrap();
        assert_eq!(a.classifier, Some("natives-windows".to_string()));
    }

    #[test]
    fn parse_with_packaging_override() {
        let a = GradleSpecifier::parse("com.example:lib:1.0@zip").unwrap();
        assert_eq!(a.packaging, "zip");
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(GradleSpecifier::parse("only-one-part").is_err());
        assert!(GradleSpecifier::parse("a:b").is_err());
    }

    #[test]
    fn override_key_ignores_version() {
        let v1 = GradleSpecifier::parse("org.ow2.asm:asm:9.2").unwrap();
        let v2 = GradleSpecifier::parse("org.ow2.asm:asm:9.7").unwrap();
        assert_eq!(v1.override_key(), v2.override_key());

        let natives = GradleSpecifier::parse("org.ow2.asm:asm:9.2:natives-linux").unwrap();
        assert_ne!(v1.override_key(), natives.override_key());
    }

    #[test]
    fn url_construction() {
        let a = GradleSpecifier::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        let url = a.url("https://libraries.example.net/");
        assert_eq!(
            url,
            "https://libraries.example.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar"
        );
    }

    #[test]
    fn local_path_construction() {
        let a = GradleSpecifier::parse("org.lwjgl:lwjgl:3.3.3:natives-windows").unwrap();
        assert_eq!(
            a.local_path(),
            PathBuf::from("org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-windows.jar")
        );
    }
}
