use std::path::{Component, Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

/// Extract a runtime archive into `dest`, dropping the archive's single
/// top-level directory so `bin/java` lands directly under `dest`.
pub fn extract_zip_file(zip_path: &Path, dest: &Path) -> LauncherResult<()> {
    let zip_file = std::fs::File::open(zip_path).map_err(|source| LauncherError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(zip_file)?;

    std::fs::create_dir_all(dest).map_err(|source| LauncherError::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;

        let enclosed_name = zipped
            .enclosed_name()
            .ok_or_else(|| LauncherError::Other("invalid zip entry path".into()))?;
        let mut rel_path = PathBuf::new();
        let mut components = enclosed_name.components();
        let _ = components.next();
        for component in components {
            if let Component::Normal(part) = component {
                rel_path.push(part);
            }
        }
        if rel_path.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel_path);
        if zipped.name().ends_with('/') {
            std::fs::create_dir_all(&out_path).map_err(|source| LauncherError::Io {
                path: out_path,
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|source| LauncherError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| LauncherError::Io {
            path: out_path.clone(),
            source,
        })?;

        #[cfg(unix)]
        if let Some(mode) = zipped.unix_mode() {
            if mode & 0o111 != 0 {
                set_executable(&out_path)?;
            }
        }
    }

    Ok(())
}

/// Restore the executable bit; no-op outside unix.
pub fn set_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|source| LauncherError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .permissions();
        perms.set_mode(perms.mode() | 0o755);
        std::fs::set_permissions(path, perms).map_err(|source| LauncherError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_archive(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .add_directory("jdk-21.0.3+9-jre/bin/", SimpleFileOptions::default())
            .unwrap();
        writer
            .start_file(
                "jdk-21.0.3+9-jre/bin/java",
                SimpleFileOptions::default().unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(b"#!/bin/true").unwrap();
        writer
            .start_file("jdk-21.0.3+9-jre/release", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"JAVA_VERSION=21.0.3").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn extraction_strips_the_top_level_directory() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("runtime.zip");
        build_archive(&zip_path);

        let dest = dir.path().join("staging");
        extract_zip_file(&zip_path, &dest).unwrap();

        assert!(dest.join("bin/java").is_file());
        assert!(dest.join("release").is_file());
        assert!(!dest.join("jdk-21.0.3+9-jre").exists());
    }

    #[cfg(unix)]
    #[test]
    fn executable_bits_survive_extraction() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("runtime.zip");
        build_archive(&zip_path);

        let dest = dir.path().join("staging");
        extract_zip_file(&zip_path, &dest).unwrap();

        let mode = std::fs::metadata(dest.join("bin/java"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }
}
