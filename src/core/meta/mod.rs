// Remote component catalog: wire format, the per-UID version lists, and the
// cache-backed loading of full version files.

mod format;
mod index;

pub use format::{
    Artifact, Library, LibraryDownloads, MetaIndexFile, MetaPackage, Requirement,
    VersionDescriptor, VersionFile, VersionListFile,
};
pub use index::{LoadMode, MetaService, MetaVersion, MetadataIndex, VersionList, VersionSource};
