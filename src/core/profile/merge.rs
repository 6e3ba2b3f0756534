// ─── Profile Merge ───
// Folds an ordered list of resolved version files into one effective launch
// description. Deterministic: the same input always produces an identical
// description, so re-running a merge with no component change is a no-op.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::LauncherResult;
use crate::core::meta::{Library, VersionFile};
use crate::core::net::{DownloadAction, Validator};

/// The merge product of a resolved profile. Derived data; recomputed on
/// every resolution and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveLaunchDescription {
    pub main_class: Option<String>,
    /// Library paths relative to the libraries directory, in merge order,
    /// one entry per distinct coordinate.
    pub classpath: Vec<String>,
    pub jvm_args: Vec<String>,
    /// Argument template with `${...}` placeholders, substituted at launch.
    pub minecraft_args: Option<String>,
    pub traits: BTreeSet<String>,
    /// Most-preferred first; drives Java runtime selection.
    pub compatible_java_majors: Vec<u32>,
}

/// Concatenate library lists in component order, de-duplicating by
/// group:artifact(:classifier) key. A later entry with the same key
/// replaces the earlier one at its original position instead of
/// duplicating (mod loaders overriding base-game libraries).
pub fn merged_libraries(files: &[Arc<VersionFile>]) -> LauncherResult<Vec<Library>> {
    let mut keys: Vec<String> = Vec::new();
    let mut libraries: Vec<Library> = Vec::new();

    for file in files {
        for library in &file.libraries {
            let key = library.specifier()?.override_key();
            match keys.iter().position(|k| k == &key) {
                Some(index) => libraries[index] = library.clone(),
                None => {
                    keys.push(key);
                    libraries.push(library.clone());
                }
            }
        }
    }
    Ok(libraries)
}

/// Fold the resolved version files, in component order, into one
/// description.
pub fn merge(files: &[Arc<VersionFile>]) -> LauncherResult<EffectiveLaunchDescription> {
    let mut description = EffectiveLaunchDescription::default();

    for file in files {
        if let Some(main_class) = &file.main_class {
            description.main_class = Some(main_class.clone());
        }
        if let Some(args) = &file.minecraft_arguments {
            description.minecraft_args = Some(args.clone());
        }
        if !file.jvm_args.is_empty() {
            description.jvm_args = file.jvm_args.clone();
        }
        description
            .jvm_args
            .extend(file.additive_jvm_args.iter().cloned());
        description
            .traits
            .extend(file.additive_traits.iter().cloned());
        if !file.compatible_java_majors.is_empty() {
            description.compatible_java_majors = file.compatible_java_majors.clone();
        }
    }

    description.classpath = merged_libraries(files)?
        .iter()
        .map(Library::storage_path)
        .collect::<LauncherResult<Vec<_>>>()?;

    Ok(description)
}

/// Download actions for every merged library that declares a fetchable
/// artifact, destined for the shared libraries directory.
pub fn library_downloads(
    libraries: &[Library],
    libraries_dir: &Path,
) -> LauncherResult<Vec<DownloadAction>> {
    let mut actions = Vec::new();
    for library in libraries {
        let storage_path = library.storage_path()?;
        let dest = libraries_dir.join(&storage_path);

        if let Some(downloads) = &library.downloads {
            if let Some(artifact) = &downloads.artifact {
                actions.push(
                    DownloadAction::new(artifact.url.clone(), dest)
                        .with_validator(Validator::Sha1(artifact.sha1.clone()))
                        .with_size(artifact.size),
                );
                continue;
            }
        }
        if let Some(base) = &library.url {
            let url = library.specifier()?.url(base);
            actions.push(DownloadAction::new(url, dest));
        }
        // A library with neither downloads nor a repository base is assumed
        // to already exist locally (e.g. extracted by an installer).
    }
    Ok(actions)
}
