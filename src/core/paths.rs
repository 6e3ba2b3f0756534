// ─── Data Directory Layout ───
// One launcher data directory; every component is handed paths from here
// instead of consulting any global state.

use std::path::PathBuf;

const APP_DIR_NAME: &str = "Lodestar";

/// Root layout of the launcher's on-disk data.
#[derive(Debug, Clone)]
pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Platform default under the user data directory.
    pub fn default_location() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DIR_NAME))
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.data_dir.join("libraries")
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.data_dir.join("runtimes")
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.data_dir.join("meta")
    }

    pub fn cache_index_file(&self) -> PathBuf {
        self.data_dir.join("metacache.json")
    }
}
