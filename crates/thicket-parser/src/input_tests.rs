use std::str::FromStr;

use thicket_core::Point;

use crate::error::ConfigError;
use crate::input::{InputEncoding, Source};

fn latin1(bytes: &[u8]) -> (Option<char>, u32) {
    (bytes.first().map(|&b| b as char), 1)
}

#[test]
fn encoding_names() {
    assert_eq!(InputEncoding::from_str("utf-8").unwrap(), InputEncoding::Utf8);
    assert_eq!(InputEncoding::from_str("UTF8").unwrap(), InputEncoding::Utf8);
    assert_eq!(InputEncoding::from_str("utf16").unwrap(), InputEncoding::Utf16Le);
    assert_eq!(InputEncoding::from_str("utf_16_le").unwrap(), InputEncoding::Utf16Le);
    assert_eq!(InputEncoding::from_str("UTF-16BE").unwrap(), InputEncoding::Utf16Be);
}

#[test]
fn unknown_encoding_is_rejected() {
    let err = InputEncoding::from_str("ebcdic").unwrap_err();
    assert_eq!(err, ConfigError::UnknownEncoding("ebcdic".to_owned()));
    insta::assert_snapshot!(err.to_string(), @"unknown input encoding `ebcdic`");
}

#[test]
fn custom_encodings_compare_by_function() {
    assert_eq!(InputEncoding::Custom(latin1), InputEncoding::Custom(latin1));
    assert_ne!(InputEncoding::Custom(latin1), InputEncoding::Utf8);
    assert_eq!(format!("{:?}", InputEncoding::Custom(latin1)), "Custom");
}

#[test]
fn utf8_decoding() {
    let utf8 = InputEncoding::Utf8;
    assert_eq!(utf8.decode(b"a"), (Some('a'), 1));
    assert_eq!(utf8.decode("é!".as_bytes()), (Some('é'), 2));
    assert_eq!(utf8.decode("€".as_bytes()), (Some('€'), 3));
    assert_eq!(utf8.decode("🦀".as_bytes()), (Some('🦀'), 4));
}

#[test]
fn invalid_utf8_consumes_one_byte() {
    let utf8 = InputEncoding::Utf8;
    assert_eq!(utf8.decode(&[0xff, b'a']), (None, 1));
    assert_eq!(utf8.decode(&[0xc3]), (None, 1));
    assert_eq!(utf8.decode(&[0xe2, 0x82, b'a']), (None, 1));
}

#[test]
fn utf16_decoding() {
    let le: Vec<u8> = "a🦀".encode_utf16().flat_map(u16::to_le_bytes).collect();
    assert_eq!(InputEncoding::Utf16Le.decode(&le), (Some('a'), 2));
    assert_eq!(InputEncoding::Utf16Le.decode(&le[2..]), (Some('🦀'), 4));

    let be: Vec<u8> = "z".encode_utf16().flat_map(u16::to_be_bytes).collect();
    assert_eq!(InputEncoding::Utf16Be.decode(&be), (Some('z'), 2));
}

#[test]
fn unpaired_surrogate_is_an_error() {
    let lone = 0xd800u16.to_le_bytes();
    assert_eq!(InputEncoding::Utf16Le.decode(&lone), (None, 2));

    let mut followed = lone.to_vec();
    followed.extend_from_slice(&u16::to_le_bytes('x' as u16));
    assert_eq!(InputEncoding::Utf16Le.decode(&followed), (None, 2));
}

#[test]
fn custom_decoder_always_advances() {
    fn stuck(_: &[u8]) -> (Option<char>, u32) {
        (None, 0)
    }
    assert_eq!(InputEncoding::Custom(stuck).decode(b"x"), (None, 1));
    assert_eq!(InputEncoding::Custom(latin1).decode(&[0xe9]), (Some('é'), 1));
}

#[test]
fn buffer_source_reads_from_offset() {
    let mut source = Source::Buffer(b"hello");
    assert_eq!(&*source.read(2, Point::new(0, 2)), b"llo");
    assert!(source.read(9, Point::new(0, 9)).is_empty());
}

#[test]
fn reader_source_forwards_offsets() {
    let mut seen = Vec::new();
    let mut read = |byte: usize, point: Point| {
        seen.push((byte, point));
        b"xy".to_vec()
    };
    {
        let mut source = Source::Reader(&mut read);
        assert_eq!(&*source.read(4, Point::new(1, 2)), b"xy");
    }
    assert_eq!(seen, [(4, Point::new(1, 2))]);
}
