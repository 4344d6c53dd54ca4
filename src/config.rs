use serde::{Deserialize, Serialize};

/// Tunables shared by the executor and the extractors.
///
/// Defaults suit an archive serving interactive uploads. Values can be
/// overridden with the `with_*` builders or loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Maximum number of uploads extracted at the same time
    pub concurrency_limit: usize,

    /// Buffer size used when streaming archive entries to the tokenizer
    pub read_chunk_size: usize,

    /// File captured as the readme of an archive upload
    pub readme_file_name: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            read_chunk_size: 256,
            readme_file_name: "README".to_string(),
        }
    }
}

impl HarvestConfig {
    /// Parses a JSON config, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.normalized())
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self.normalized()
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self.normalized()
    }

    pub fn with_readme_file_name(mut self, name: impl Into<String>) -> Self {
        self.readme_file_name = name.into();
        self
    }

    // A zero limit would deadlock the executor and a zero buffer can't read.
    fn normalized(mut self) -> Self {
        self.concurrency_limit = self.concurrency_limit.max(1);
        self.read_chunk_size = self.read_chunk_size.max(1);
        self
    }
}
