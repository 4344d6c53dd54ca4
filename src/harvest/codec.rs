//! Binary encoding of [`PackageDetails`] for storage inside a descriptor.
//!
//! Details travel as an opaque blob so the store only ever indexes the
//! descriptor's scalar fields. Decoding is strict: trailing bytes or a
//! length prefix reaching past the end of the blob are rejected rather than
//! partially read.

use bincode::Options;

use super::traits::CodecError;
use crate::model::PackageDetails;

fn options() -> impl Options {
    bincode::DefaultOptions::new().reject_trailing_bytes()
}

/// Encodes details into an opaque byte blob.
pub fn encode_details(details: &PackageDetails) -> Result<Vec<u8>, CodecError> {
    options().serialize(details).map_err(CodecError::Encode)
}

/// Decodes a blob produced by [`encode_details`].
///
/// No field may claim more bytes than the blob holds, so a forged length
/// prefix fails before anything is allocated for it.
pub fn decode_details(bytes: &[u8]) -> Result<PackageDetails, CodecError> {
    options()
        .with_limit(bytes.len() as u64)
        .deserialize(bytes)
        .map_err(CodecError::Decode)
}
