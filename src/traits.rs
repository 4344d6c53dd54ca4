use crate::model::{PackageDescriptor, StoredContents};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Package not found: {0}")]
    PackageNotFound(String),
    #[error("Version {version} of package {name} not found")]
    VersionNotFound { name: String, version: String },
}

/// Persistence for extracted descriptors and uploaded content.
///
/// Descriptors are keyed by package name, content by (name, version).
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Records a successful upload: replaces the package's descriptor and
    /// adds the content under the descriptor's latest version, atomically.
    async fn publish(
        &self,
        descriptor: PackageDescriptor,
        contents: StoredContents,
    ) -> Result<(), StoreError>;

    async fn package(&self, name: &str) -> Result<PackageDescriptor, StoreError>;

    async fn contents(&self, name: &str, version: &str) -> Result<StoredContents, StoreError>;

    /// All descriptors, ordered by name.
    async fn packages(&self) -> Result<Vec<PackageDescriptor>, StoreError>;
}
