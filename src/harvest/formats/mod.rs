//! Package format implementations.
//!
//! - `single_file` - a lone `.el` library with a conventional header
//! - `archive` - a tar of `<name>-<version>/` holding a `<name>-pkg.el`

pub mod archive;
pub mod single_file;

pub use archive::{extract_archive, ArchiveFormat, DirectoryIdentity};
pub use single_file::{extract_header, SingleFileFormat};

use std::sync::Arc;

use crate::config::HarvestConfig;
use crate::harvest::traits::PackageFormat;

/// Every supported format, most specific first.
pub fn default_formats(config: &HarvestConfig) -> Vec<Arc<dyn PackageFormat>> {
    vec![
        Arc::new(ArchiveFormat::new(config.clone())),
        Arc::new(SingleFileFormat),
    ]
}

/// Picks the first format willing to handle an upload.
pub fn detect(
    formats: &[Arc<dyn PackageFormat>],
    file_name: &str,
    head: &[u8],
) -> Option<Arc<dyn PackageFormat>> {
    formats
        .iter()
        .find(|format| format.can_handle(file_name, head))
        .cloned()
}
