//! Harvest module - package metadata extraction for Emacs Lisp uploads.
//!
//! This module provides the extraction machinery:
//! - **Tokenizer**: [`sexp::Tokenizer`], a streaming S-expression lexer
//! - **Definition parser**: [`definition::parse_package_definition`] for
//!   `-pkg.el` files
//! - **Formats**: [`PackageFormat`] implementations for single files and
//!   tar archives
//! - **Codec**: [`codec`] for the opaque details blob
//! - **Pipeline**: upload workflow via [`pipeline::UploadPipeline`]

pub mod codec;
pub mod definition;
pub mod formats;
pub mod pipeline;
pub mod sexp;
pub mod traits;

// Re-export commonly used types
pub use traits::{CodecError, ExtractionError, PackageFormat};

pub use codec::{decode_details, encode_details};
pub use definition::{parse_package_definition, PackageDefinition};
pub use formats::{ArchiveFormat, SingleFileFormat};
pub use pipeline::{HarvestStats, PipelineError, UploadPipeline, UploadResult};
pub use sexp::{Token, TokenKind, Tokenizer};
