use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::model::{PackageDescriptor, StoredContents};
use crate::traits::{PackageStore, StoreError};

#[derive(Debug)]
struct PackageEntry {
    descriptor: PackageDescriptor,
    versions: BTreeMap<String, StoredContents>,
}

/// [`PackageStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    packages: RwLock<BTreeMap<String, PackageEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PackageStore for MemoryStore {
    async fn publish(
        &self,
        descriptor: PackageDescriptor,
        contents: StoredContents,
    ) -> Result<(), StoreError> {
        let mut packages = self.packages.write().await;
        match packages.get_mut(&descriptor.name) {
            Some(entry) => {
                entry.versions.insert(contents.version.clone(), contents);
                entry.descriptor = descriptor;
            }
            None => {
                let mut versions = BTreeMap::new();
                versions.insert(contents.version.clone(), contents);
                packages.insert(
                    descriptor.name.clone(),
                    PackageEntry {
                        descriptor,
                        versions,
                    },
                );
            }
        }
        Ok(())
    }

    async fn package(&self, name: &str) -> Result<PackageDescriptor, StoreError> {
        self.packages
            .read()
            .await
            .get(name)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| StoreError::PackageNotFound(name.to_string()))
    }

    async fn contents(&self, name: &str, version: &str) -> Result<StoredContents, StoreError> {
        let packages = self.packages.read().await;
        let entry = packages
            .get(name)
            .ok_or_else(|| StoreError::PackageNotFound(name.to_string()))?;
        entry
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    async fn packages(&self) -> Result<Vec<PackageDescriptor>, StoreError> {
        Ok(self
            .packages
            .read()
            .await
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect())
    }
}
