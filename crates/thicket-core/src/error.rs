use std::io;

use crate::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

/// Failure to load or assemble a grammar table.
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    #[error("invalid magic: expected TKLG")]
    BadMagic,
    #[error("incompatible language version {version} (supported {min}..={max})")]
    IncompatibleVersion { version: u32, min: u32, max: u32 },
    #[error("checksum mismatch: header says {expected:#010x}, body hashes to {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("artifact is truncated")]
    Truncated,
    #[error("failed to decode tables: {0}")]
    Decode(#[from] postcard::Error),
    #[error("malformed tables: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl LanguageError {
    pub(crate) fn incompatible(version: u32) -> Self {
        Self::IncompatibleVersion {
            version,
            min: MIN_COMPATIBLE_LANGUAGE_VERSION,
            max: LANGUAGE_VERSION,
        }
    }
}
