//! Multi-file (tar) uploads.
//!
//! A package archive holds a single top-level directory named
//! `<name>-<version>/`. The directory name fixes the package identity; the
//! `<name>-pkg.el` file inside it supplies description and requirements and
//! must agree with that identity. An optional `README` becomes the readme.

use regex::Regex;
use std::io::{BufReader, Read};
use std::path::{Component, Path};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::config::HarvestConfig;
use crate::harvest::codec::encode_details;
use crate::harvest::definition::parse_package_definition;
use crate::harvest::traits::{ExtractionError, PackageFormat};
use crate::model::{PackageDescriptor, PackageDetails, PackageKind};

static DIRECTORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+)-([\d.]+)$").expect("valid regex"));

/// Offset and value of the POSIX tar magic in the first header block.
const USTAR_MAGIC_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8] = b"ustar";

/// Handler for tar uploads.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFormat {
    config: HarvestConfig,
}

impl ArchiveFormat {
    pub fn new(config: HarvestConfig) -> Self {
        Self { config }
    }
}

impl PackageFormat for ArchiveFormat {
    fn name(&self) -> &str {
        "tar"
    }

    fn kind(&self) -> PackageKind {
        PackageKind::Tar
    }

    fn can_handle(&self, file_name: &str, head: &[u8]) -> bool {
        file_name.ends_with(".tar")
            || head
                .get(USTAR_MAGIC_OFFSET..USTAR_MAGIC_OFFSET + USTAR_MAGIC.len())
                .is_some_and(|magic| magic == USTAR_MAGIC)
    }

    fn extract(&self, reader: &mut dyn Read) -> Result<PackageDescriptor, ExtractionError> {
        extract_archive(reader, &self.config)
    }
}

/// Identity encoded in the archive's top-level directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIdentity {
    pub directory: String,
    pub name: String,
    pub version: String,
}

impl DirectoryIdentity {
    /// Splits `<name>-<version>` into its parts.
    pub fn parse(directory: &str) -> Result<Self, ExtractionError> {
        let caps = DIRECTORY_RE.captures(directory).ok_or_else(|| {
            ExtractionError::DirectoryShape(format!(
                "directory `{directory}` must be '<package-name>-<version>/'"
            ))
        })?;
        Ok(Self {
            directory: directory.to_string(),
            name: caps[1].to_string(),
            version: caps[2].to_string(),
        })
    }

    fn definition_file(&self) -> String {
        format!("{}-pkg.el", self.name)
    }
}

/// Extracts a descriptor from a tar stream.
///
/// Entries are read in order and never unpacked to disk. The definition
/// file is streamed straight into the tokenizer.
///
/// # Errors
///
/// - [`ExtractionError::DirectoryShape`] if an entry sits outside a
///   directory, the directory is misnamed, a second top-level directory
///   appears, or the archive is empty
/// - any error from parsing the definition file
/// - [`ExtractionError::Io`] for a corrupt archive
pub fn extract_archive<R: Read>(
    reader: R,
    config: &HarvestConfig,
) -> Result<PackageDescriptor, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut identity: Option<DirectoryIdentity> = None;
    let mut description = String::new();
    let mut details = PackageDetails::default();
    let mut found_definition = false;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let is_dir = entry.header().entry_type().is_dir();
        let (top, rest) = split_entry_path(&path, is_dir)?;

        let id = match identity.take() {
            Some(id) if id.directory != top => {
                return Err(ExtractionError::DirectoryShape(format!(
                    "archive must contain only one top-level directory, found `{}` and `{}`",
                    id.directory, top
                )));
            }
            Some(id) => id,
            None => DirectoryIdentity::parse(&top)?,
        };
        let id = identity.insert(id);

        // Only files sitting directly in the package directory matter.
        let [file_name] = rest.as_slice() else {
            continue;
        };
        if is_dir {
            continue;
        }

        if *file_name == id.definition_file() {
            let reader = BufReader::with_capacity(config.read_chunk_size, &mut entry);
            let definition = parse_package_definition(reader, &id.name, &id.version)?;
            description = definition.description;
            details.required = definition.required;
            found_definition = true;
        } else if *file_name == config.readme_file_name {
            let mut readme = Vec::new();
            entry.read_to_end(&mut readme)?;
            details.readme = String::from_utf8_lossy(&readme).into_owned();
        }
    }

    let identity = identity.ok_or_else(|| {
        ExtractionError::DirectoryShape("archive contains no package directory".to_string())
    })?;

    if !found_definition {
        warn!(
            package = %identity.name,
            expected = %identity.definition_file(),
            "Archive has no package definition file"
        );
    }

    debug!(
        package = %identity.name,
        version = %identity.version,
        requirements = details.required.len(),
        readme_bytes = details.readme.len(),
        "Scanned package archive"
    );

    Ok(PackageDescriptor {
        name: identity.name,
        description,
        latest_version: identity.version,
        author: String::new(),
        kind: PackageKind::Tar,
        details: encode_details(&details)?,
    })
}

/// Splits an entry path into its top-level directory and the remainder.
fn split_entry_path(path: &Path, is_dir: bool) -> Result<(String, Vec<String>), ExtractionError> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(ExtractionError::DirectoryShape(format!(
                    "entry `{}` escapes the package directory",
                    path.display()
                )));
            }
        }
    }

    if parts.is_empty() || (parts.len() == 1 && !is_dir) {
        return Err(ExtractionError::DirectoryShape(format!(
            "entry `{}` is not inside a directory",
            path.display()
        )));
    }

    let top = parts.remove(0);
    Ok((top, parts))
}

// ============================================================================
// Tests
// ============================================================================
