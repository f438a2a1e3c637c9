use std::io::Write;

use super::artifact::HEADER_SIZE;
use super::builder_tests::tiny;
use crate::{LANGUAGE_VERSION, Language, LanguageError};

#[test]
fn artifact_preserves_tables() {
    let lang = tiny();
    let bytes = lang.to_artifact().unwrap();

    assert_eq!(&bytes[..4], b"TKLG");
    let loaded = Language::from_artifact(&bytes).unwrap();
    assert_eq!(loaded.data(), lang.data());
    assert_eq!(loaded.version(), LANGUAGE_VERSION);
    // a freshly loaded table is a different language
    assert_ne!(loaded, lang);
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = tiny().to_artifact().unwrap();
    bytes[0] = b'X';

    let err = Language::from_artifact(&bytes).unwrap_err();
    assert!(matches!(err, LanguageError::BadMagic));
}

#[test]
fn rejects_incompatible_versions() {
    let mut bytes = tiny().to_artifact().unwrap();
    bytes[4..8].copy_from_slice(&12u32.to_le_bytes());

    let err = Language::from_artifact(&bytes).unwrap_err();
    assert!(matches!(
        err,
        LanguageError::IncompatibleVersion {
            version: 12,
            min: 13,
            max: 15
        }
    ));
    assert_eq!(
        err.to_string(),
        "incompatible language version 12 (supported 13..=15)"
    );
}

#[test]
fn accepts_older_compatible_versions() {
    let mut bytes = tiny().to_artifact().unwrap();
    bytes[4..8].copy_from_slice(&13u32.to_le_bytes());

    let loaded = Language::from_artifact(&bytes).unwrap();
    assert_eq!(loaded.version(), 13);
}

#[test]
fn rejects_truncated_input() {
    let bytes = tiny().to_artifact().unwrap();

    assert!(matches!(
        Language::from_artifact(&bytes[..10]),
        Err(LanguageError::Truncated)
    ));
    assert!(matches!(
        Language::from_artifact(&bytes[..bytes.len() - 1]),
        Err(LanguageError::Truncated)
    ));
}

#[test]
fn rejects_corrupted_body() {
    let mut bytes = tiny().to_artifact().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;

    let err = Language::from_artifact(&bytes).unwrap_err();
    assert!(matches!(err, LanguageError::ChecksumMismatch { .. }));
}

#[test]
fn loads_from_file() {
    let bytes = tiny().to_artifact().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let loaded = Language::load_file(file.path()).unwrap();
    assert_eq!(loaded.name(), "tiny");
    assert!(bytes.len() > HEADER_SIZE);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let err = Language::load_file(dir.path().join("nope.tklg")).unwrap_err();
    assert!(matches!(err, LanguageError::Io(_)));
}
