//! Binary grammar artifacts.
//!
//! Layout: a 32-byte little-endian header followed by the
//! postcard-encoded [`LanguageData`].
//!
//! - 0..4: magic `b"TKLG"`
//! - 4..8: ABI version
//! - 8..12: CRC32 of the body
//! - 12..16: body length in bytes
//! - 16..32: reserved

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use super::Language;
use super::table::LanguageData;
use crate::{LANGUAGE_VERSION, LanguageError, MIN_COMPATIBLE_LANGUAGE_VERSION};

pub const MAGIC: [u8; 4] = *b"TKLG";
pub const HEADER_SIZE: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Header {
    magic: [u8; 4],
    version: u32,
    checksum: u32,
    body_len: u32,
}

impl Header {
    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Some(Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: word(4),
            checksum: word(8),
            body_len: word(12),
        })
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.body_len.to_le_bytes());
        bytes
    }
}

impl Language {
    /// Loads tables from an artifact, checking magic, version and checksum.
    pub fn from_artifact(bytes: &[u8]) -> Result<Self, LanguageError> {
        let header = Header::from_bytes(bytes).ok_or(LanguageError::Truncated)?;
        if header.magic != MAGIC {
            return Err(LanguageError::BadMagic);
        }
        if !(MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&header.version) {
            return Err(LanguageError::incompatible(header.version));
        }

        let body = bytes
            .get(HEADER_SIZE..HEADER_SIZE + header.body_len as usize)
            .ok_or(LanguageError::Truncated)?;
        let actual = crc32fast::hash(body);
        if actual != header.checksum {
            return Err(LanguageError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let data: LanguageData = postcard::from_bytes(body)?;
        Language::with_version(data, header.version)
    }

    /// Memory-maps an artifact file and loads it.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, LanguageError> {
        let file = File::open(path)?;
        // SAFETY: the map is only read while decoding and dropped before returning.
        let map = unsafe { Mmap::map(&file)? };
        Self::from_artifact(&map)
    }

    /// Encodes the tables at the current ABI version. External scanners
    /// are code, not data, and are not part of the artifact.
    pub fn to_artifact(&self) -> Result<Vec<u8>, LanguageError> {
        let body = postcard::to_allocvec(self.data())?;
        let header = Header {
            magic: MAGIC,
            version: LANGUAGE_VERSION,
            checksum: crc32fast::hash(&body),
            body_len: body.len() as u32,
        };
        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }
}
