//! Stable job identifiers.

use std::io::Cursor;

use crate::error::CoreError;

/// Derive the job id from its name: the 128-bit MurmurHash3 (x64 variant,
/// seed 0) of the name, hex encoded as the two 64-bit halves in big-endian.
pub fn generate_job_id(name: &str) -> Result<String, CoreError> {
    let hash = murmur3::murmur3_x64_128(&mut Cursor::new(name.as_bytes()), 0)
        .map_err(|e| CoreError::JobId(e.to_string()))?;

    let h1 = hash as u64;
    let h2 = (hash >> 64) as u64;
    let mut digest = [0u8; 16];
    digest[..8].copy_from_slice(&h1.to_be_bytes());
    digest[8..].copy_from_slice(&h2.to_be_bytes());
    Ok(hex::encode(digest))
}
