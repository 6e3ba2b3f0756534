// The ordered component list attached to an instance, its resolution against
// the metadata catalog, and the merge producing the effective launch
// description.

mod component;
mod merge;
mod pack;

pub use component::{read_component_list, write_component_list, Component};
pub use merge::{library_downloads, merge, merged_libraries, EffectiveLaunchDescription};
pub use pack::PackProfile;
