//! Upload pipeline.
//!
//! This module provides the [`UploadPipeline`] coordinator that takes an
//! uploaded file through its stages (Detection → Extraction → Publication)
//! with:
//! - Format detection over the registered [`PackageFormat`]s
//! - Concurrency-limited extraction via [`HarvesterExecutor`]
//! - Structured logging via `tracing`
//! - All-or-nothing publication: a failed upload stores nothing

use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{info, instrument, warn};

use crate::config::HarvestConfig;
use crate::executor::HarvesterExecutor;
use crate::harvest::formats::{default_formats, detect};
use crate::harvest::traits::{ExtractionError, PackageFormat};
use crate::model::{PackageDescriptor, StoredContents};
use crate::traits::{PackageStore, StoreError};

/// Bytes of the upload shown to [`PackageFormat::can_handle`].
const DETECTION_HEAD_BYTES: usize = 512;

// ============================================================================
// Pipeline Types
// ============================================================================

/// Outcome of a successful upload.
#[derive(Debug)]
pub struct UploadResult {
    /// Descriptor as published
    pub descriptor: PackageDescriptor,

    /// Name of the format that handled the upload
    pub format: String,

    /// Processing statistics
    pub stats: HarvestStats,
}

/// Statistics about one upload.
#[derive(Debug, Default, Clone)]
pub struct HarvestStats {
    /// Total time spent on the upload (milliseconds)
    pub total_duration_ms: u64,

    /// Time spent extracting metadata (milliseconds)
    pub extraction_duration_ms: u64,

    /// Size of the uploaded content (bytes)
    pub content_bytes: u64,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can occur during pipeline execution.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Metadata extraction failed
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Storing the package failed
    #[error("Publication failed: {0}")]
    Store(#[from] StoreError),

    /// The executor could not run the extraction
    #[error("Executor failure: {0}")]
    Executor(String),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Upload workflow: bytes in, published descriptor out.
///
/// # Example
///
/// ```ignore
/// use elpa_harvester::harvest::pipeline::UploadPipeline;
/// use elpa_harvester::{HarvestConfig, MemoryStore};
/// use std::sync::Arc;
///
/// let pipeline = UploadPipeline::new(Arc::new(MemoryStore::new()), HarvestConfig::default());
/// let result = pipeline.execute("foo.el", bytes).await?;
/// println!("Published {} {}", result.descriptor.name, result.descriptor.latest_version);
/// ```
pub struct UploadPipeline<S: PackageStore> {
    formats: Vec<Arc<dyn PackageFormat>>,
    executor: HarvesterExecutor,
    store: Arc<S>,
}

impl<S: PackageStore> UploadPipeline<S> {
    /// Creates a pipeline with every built-in format.
    pub fn new(store: Arc<S>, config: HarvestConfig) -> Self {
        Self {
            formats: default_formats(&config),
            executor: HarvesterExecutor::from_config(&config),
            store,
        }
    }

    /// Replaces the registered formats. Detection tries them in order.
    pub fn with_formats(mut self, formats: Vec<Arc<dyn PackageFormat>>) -> Self {
        self.formats = formats;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Extracts and publishes one upload.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if:
    /// - No format recognizes the upload
    /// - Extraction fails (malformed header, bad archive layout, ...)
    /// - The store rejects the publication
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn execute(
        &self,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<UploadResult, PipelineError> {
        let start = Instant::now();
        let mut stats = HarvestStats {
            content_bytes: content.len() as u64,
            ..Default::default()
        };

        // ====================================================================
        // Stage 1: Detection
        // ====================================================================

        let head = &content[..content.len().min(DETECTION_HEAD_BYTES)];
        let Some(format) = detect(&self.formats, file_name, head) else {
            warn!("No format recognizes the upload");
            return Err(ExtractionError::UnsupportedFormat(file_name.to_string()).into());
        };
        let format_name = format.name().to_string();

        // ====================================================================
        // Stage 2: Extraction
        // ====================================================================

        info!(format = %format_name, "Starting extraction stage");
        let extraction_start = Instant::now();

        let content: Arc<[u8]> = Arc::from(content);
        let descriptor = self.executor.execute(format, Arc::clone(&content)).await?;

        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        info!(
            duration_ms = stats.extraction_duration_ms,
            package = %descriptor.name,
            version = %descriptor.latest_version,
            "Extraction completed"
        );

        // ====================================================================
        // Stage 3: Publication
        // ====================================================================

        let contents = StoredContents {
            version: descriptor.latest_version.clone(),
            content: content.to_vec(),
            upload_time: SystemTime::now(),
        };
        self.store.publish(descriptor.clone(), contents).await?;

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            package = %descriptor.name,
            duration_ms = stats.total_duration_ms,
            "Package published"
        );

        Ok(UploadResult {
            descriptor,
            format: format_name,
            stats,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
