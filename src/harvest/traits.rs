//! Core traits and error types for package extraction.
//!
//! This module defines the seams of the harvester:
//! - Source-shape implementations via [`PackageFormat`]
//! - Stage errors via [`ExtractionError`] and [`CodecError`]

use std::io::Read;
use thiserror::Error;

use crate::model::{PackageDescriptor, PackageKind};

// ============================================================================
// Package Format Trait
// ============================================================================

/// Abstraction over the upload shapes the archive accepts (single `.el`
/// file, tar archive).
///
/// Each shape provides:
/// - Detection from the uploaded file name and leading bytes
/// - Streaming extraction into a fully populated [`PackageDescriptor`]
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the executor can run them on the
/// blocking pool.
pub trait PackageFormat: Send + Sync {
    /// Returns the unique identifier for this format.
    ///
    /// Examples: `"single"`, `"tar"`
    fn name(&self) -> &str;

    /// Index kind recorded on descriptors extracted by this format.
    fn kind(&self) -> PackageKind;

    /// Detects if an upload matches this format.
    ///
    /// # Arguments
    ///
    /// * `file_name` - Name the upload was submitted under (may be empty)
    /// * `head` - Leading bytes of the upload; at least 512 bytes when the
    ///   upload is that long
    fn can_handle(&self, file_name: &str, head: &[u8]) -> bool;

    /// Extracts package metadata from a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if the upload is malformed, the declared
    /// identity is inconsistent, or required fields are missing. No partial
    /// descriptor is ever returned.
    fn extract(&self, reader: &mut dyn Read) -> Result<PackageDescriptor, ExtractionError>;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while extracting package metadata.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Input ended in the middle of a token
    #[error("Input ended inside {fragment} starting at byte {offset}")]
    IncompleteInput { fragment: String, offset: u64 },

    /// Wrong token kind or value at a grammar position
    #[error("Expected {expected} at byte {offset}, found {actual}")]
    StructuralMismatch {
        expected: String,
        actual: String,
        offset: u64,
    },

    /// Declared name or version disagrees with the expected identity
    #[error("Package {field} in package definition ({declared}) didn't match directory name ({expected})")]
    IdentityMismatch {
        field: &'static str,
        declared: String,
        expected: String,
    },

    /// Missing, misnamed, or multiple top-level archive directories
    #[error("Invalid archive layout: {0}")]
    DirectoryShape(String),

    /// Name, version, or description absent after a header scan
    #[error("Required attributes (name, version, or description) were missing: name={name:?} version={version:?} description={description:?}")]
    RequiredFieldMissing {
        name: String,
        version: String,
        description: String,
    },

    /// Upload doesn't match any known format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Details blob could not be produced
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Generic I/O error while reading the upload
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from encoding or decoding [`crate::model::PackageDetails`].
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode package details: {0}")]
    Encode(#[source] bincode::Error),

    #[error("Malformed package details: {0}")]
    Decode(#[source] bincode::Error),
}

// ============================================================================
// Tests
// ============================================================================
