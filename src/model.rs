use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Canonical record extracted from an uploaded package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub description: String,
    pub latest_version: String,
    pub author: String,
    pub kind: PackageKind,
    /// Encoded [`PackageDetails`], see [`crate::harvest::codec`].
    pub details: Vec<u8>,
}

/// Secondary payload stored alongside a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub readme: String,
    pub required: Vec<DependencyRef>, // declaration order
}

/// A required package and its minimum version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub name: String,
    pub version: String,
}

impl DependencyRef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// How a package was uploaded, as package.el names it in the archive index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    #[default]
    Single,
    Tar,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Single => "single",
            PackageKind::Tar => "tar",
        }
    }
}

/// Raw uploaded bytes for one version of a package.
#[derive(Debug, Clone)]
pub struct StoredContents {
    pub version: String,
    pub content: Vec<u8>,
    pub upload_time: SystemTime,
}
