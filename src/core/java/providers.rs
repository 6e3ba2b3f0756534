// ─── Runtime Providers ───
// Remote sources of Java runtimes. Providers are inconsistent in what they
// serve: some hand out a single archive with a checksum, others a per-file
// manifest; both payload shapes are first-class.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// How a provider delivers a runtime.
#[derive(Debug, Clone)]
pub enum RuntimePayload {
    /// Single zip to download and unpack.
    Archive {
        url: String,
        sha256: Option<String>,
    },
    /// URL of a per-file manifest driving many small downloads.
    Manifest { url: String },
}

#[derive(Debug, Clone)]
pub struct RuntimeRelease {
    pub vendor: String,
    pub version: String,
    pub major: u32,
    pub payload: RuntimePayload,
}

#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// The newest release this provider has for the given major/OS/arch, or
    /// `None` when it simply does not carry that combination.
    async fn query(
        &self,
        major: u32,
        os: &str,
        arch: &str,
    ) -> LauncherResult<Option<RuntimeRelease>>;
}

// ── Mojang ──────────────────────────────────────────────

const MOJANG_RUNTIME_INDEX: &str =
    "https://launchermeta.mojang.com/v1/products/java-runtime/2ec0cc96c44e5a76b9c8b7c39df7210883d12871/all.json";

/// Mojang serves manifest-style runtimes, keyed by platform and a named
/// runtime component per major version.
pub struct MojangProvider {
    client: Client,
    index_url: String,
}

#[derive(Deserialize)]
struct MojangComponent {
    manifest: MojangManifestRef,
    version: MojangVersion,
}

#[derive(Deserialize)]
struct MojangManifestRef {
    url: String,
}

#[derive(Deserialize)]
struct MojangVersion {
    name: String,
}

impl MojangProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            index_url: MOJANG_RUNTIME_INDEX.to_string(),
        }
    }

    fn component_name(major: u32) -> Option<&'static str> {
        match major {
            8 => Some("jre-legacy"),
            16 => Some("java-runtime-alpha"),
            17 => Some("java-runtime-gamma"),
            21 => Some("java-runtime-delta"),
            _ => None,
        }
    }

    fn platform_key(os: &str, arch: &str) -> Option<&'static str> {
        match (os, arch) {
            ("linux", "x64") => Some("linux"),
            ("linux", "x86") => Some("linux-i386"),
            ("windows", "x64") => Some("windows-x64"),
            ("windows", "x86") => Some("windows-x86"),
            ("windows", "arm64") => Some("windows-arm64"),
            ("macos", "x64") => Some("mac-os"),
            ("macos", "arm64") => Some("mac-os-arm64"),
            _ => None,
        }
    }
}

#[async_trait]
impl RuntimeProvider for MojangProvider {
    fn name(&self) -> &str {
        "Mojang"
    }

    async fn query(
        &self,
        major: u32,
        os: &str,
        arch: &str,
    ) -> LauncherResult<Option<RuntimeRelease>> {
        let Some(component) = Self::component_name(major) else {
            debug!("Mojang has no runtime component for java {}", major);
            return Ok(None);
        };
        let Some(platform) = Self::platform_key(os, arch) else {
            return Ok(None);
        };

        let index: serde_json::Value = self
            .client
            .get(&self.index_url)
            .send()
            .await?
            .error_for_status()
            .map_err(LauncherError::Http)?
            .json()
            .await?;

        let Some(entries) = index.get(platform).and_then(|p| p.get(component)) else {
            return Ok(None);
        };
        let releases: Vec<MojangComponent> = serde_json::from_value(entries.clone())?;
        Ok(releases.into_iter().next().map(|release| RuntimeRelease {
            vendor: "Mojang".to_string(),
            version: release.version.name,
            major,
            payload: RuntimePayload::Manifest {
                url: release.manifest.url,
            },
        }))
    }
}

// ── Adoptium ────────────────────────────────────────────

const ADOPTIUM_API_BASE: &str = "https://api.adoptium.net/v3/assets/latest";

pub struct AdoptiumProvider {
    client: Client,
}

#[derive(Deserialize)]
struct AdoptiumRelease {
    binary: AdoptiumBinary,
    version: AdoptiumVersion,
}

#[derive(Deserialize)]
struct AdoptiumBinary {
    package: AdoptiumPackage,
}

#[derive(Deserialize)]
struct AdoptiumPackage {
    checksum: String,
    link: String,
}

#[derive(Deserialize)]
struct AdoptiumVersion {
    openjdk_version: String,
}

impl AdoptiumProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn map_os(os: &str) -> &'static str {
        match os {
            "macos" => "mac",
            "windows" => "windows",
            _ => "linux",
        }
    }

    fn map_arch(arch: &str) -> &'static str {
        match arch {
            "arm64" => "aarch64",
            "x86" => "x86",
            _ => "x64",
        }
    }
}

#[async_trait]
impl RuntimeProvider for AdoptiumProvider {
    fn name(&self) -> &str {
        "Adoptium"
    }

    async fn query(
        &self,
        major: u32,
        os: &str,
        arch: &str,
    ) -> LauncherResult<Option<RuntimeRelease>> {
        // Prefer a JRE, fall back to the full JDK for majors without one.
        for image_type in ["jre", "jdk"] {
            let url = format!(
                "{}/{}/hotspot?architecture={}&image_type={}&os={}",
                ADOPTIUM_API_BASE,
                major,
                Self::map_arch(arch),
                image_type,
                Self::map_os(os),
            );
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                continue;
            }
            let releases: Vec<AdoptiumRelease> = response.json().await?;
            if let Some(release) = releases.into_iter().next() {
                return Ok(Some(RuntimeRelease {
                    vendor: "Temurin".to_string(),
                    version: release.version.openjdk_version,
                    major,
                    payload: RuntimePayload::Archive {
                        url: release.binary.package.link,
                        sha256: Some(release.binary.package.checksum),
                    },
                }));
            }
        }
        Ok(None)
    }
}

// ── Azul ────────────────────────────────────────────────

const AZUL_API_BASE: &str = "https://api.azul.com/metadata/v1/zulu/packages/";

pub struct AzulProvider {
    client: Client,
}

#[derive(Deserialize)]
struct AzulPackage {
    name: String,
    download_url: String,
    java_version: Vec<u32>,
}

impl AzulProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn map_arch(arch: &str) -> &'static str {
        match arch {
            "arm64" => "aarch64",
            "x86" => "x86",
            _ => "x64",
        }
    }
}

#[async_trait]
impl RuntimeProvider for AzulProvider {
    fn name(&self) -> &str {
        "Azul"
    }

    async fn query(
        &self,
        major: u32,
        os: &str,
        arch: &str,
    ) -> LauncherResult<Option<RuntimeRelease>> {
        let url = format!(
            "{}?java_version={}&os={}&arch={}&archive_type=zip&java_package_type=jre&javafx_bundled=false&latest=true&release_status=ga",
            AZUL_API_BASE,
            major,
            os,
            Self::map_arch(arch),
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let packages: Vec<AzulPackage> = response.json().await?;
        Ok(packages.into_iter().next().map(|package| {
            let version = package
                .java_version
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".");
            debug!("Azul offers {} for java {}", package.name, major);
            RuntimeRelease {
                vendor: "Zulu".to_string(),
                version,
                major,
                // The listing endpoint carries no checksum; the archive is
                // still size- and probe-validated after extraction.
                payload: RuntimePayload::Archive {
                    url: package.download_url,
                    sha256: None,
                },
            }
        }))
    }
}
