use std::io::Write;

use thicket::{LANGUAGE_VERSION, Language, LanguageError, MIN_COMPATIBLE_LANGUAGE_VERSION, Parser};

#[test]
fn version_window() {
    assert!(MIN_COMPATIBLE_LANGUAGE_VERSION <= LANGUAGE_VERSION);
}

#[test]
fn loaded_artifact_parses_like_the_original() {
    let original = thicket::langs::toy();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&original.to_artifact().unwrap()).unwrap();
    file.flush().unwrap();

    let loaded = Language::load_file(file.path()).unwrap();
    assert_ne!(loaded, original);
    assert_eq!(loaded.version(), LANGUAGE_VERSION);
    assert_eq!(loaded.node_kind_count(), original.node_kind_count());

    let text = "def main() { print(x); }";
    let from_loaded = Parser::new(loaded).parse(text, None).unwrap().tree().unwrap();
    let from_original = Parser::new(original).parse(text, None).unwrap().tree().unwrap();
    assert_eq!(
        from_loaded.root_node().to_sexp(),
        from_original.root_node().to_sexp()
    );
}

#[test]
fn truncated_file_is_rejected() {
    let bytes = thicket::langs::arithmetic().to_artifact().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes[..bytes.len() / 2]).unwrap();
    file.flush().unwrap();

    let err = Language::load_file(file.path()).unwrap_err();
    assert!(matches!(err, LanguageError::Truncated));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Language::load_file(dir.path().join("absent.tklg")).unwrap_err();
    assert!(matches!(err, LanguageError::Io(_)));
}
