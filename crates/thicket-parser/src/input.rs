//! Input sources and character decoding.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use thicket_core::Point;

use crate::error::ConfigError;

/// Decodes one character from the front of `bytes`.
///
/// Returns the character (or `None` when the bytes are not a valid
/// encoding) and the number of bytes it occupies, at least one.
pub type DecodeFn = fn(&[u8]) -> (Option<char>, u32);

/// How the bytes handed to the parser map to characters.
#[derive(Clone, Copy, Default)]
pub enum InputEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Custom(DecodeFn),
}

impl InputEncoding {
    pub(crate) fn decode(self, bytes: &[u8]) -> (Option<char>, u32) {
        match self {
            InputEncoding::Utf8 => decode_utf8(bytes),
            InputEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            InputEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            InputEncoding::Custom(decode) => {
                let (c, len) = decode(bytes);
                (c, len.max(1))
            }
        }
    }
}

impl fmt::Debug for InputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEncoding::Utf8 => f.write_str("Utf8"),
            InputEncoding::Utf16Le => f.write_str("Utf16Le"),
            InputEncoding::Utf16Be => f.write_str("Utf16Be"),
            InputEncoding::Custom(_) => f.write_str("Custom"),
        }
    }
}

impl PartialEq for InputEncoding {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (InputEncoding::Custom(a), InputEncoding::Custom(b)) => std::ptr::fn_addr_eq(*a, *b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl FromStr for InputEncoding {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(InputEncoding::Utf8),
            "utf16" | "utf16le" => Ok(InputEncoding::Utf16Le),
            "utf16be" => Ok(InputEncoding::Utf16Be),
            _ => Err(ConfigError::UnknownEncoding(name.to_owned())),
        }
    }
}

fn decode_utf8(bytes: &[u8]) -> (Option<char>, u32) {
    let Some(&first) = bytes.first() else {
        return (None, 1);
    };
    let width = match first {
        0x00..=0x7f => return (Some(first as char), 1),
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => return (None, 1),
    };
    let Some(prefix) = bytes.get(..width) else {
        return (None, 1);
    };
    match std::str::from_utf8(prefix) {
        Ok(s) => (s.chars().next(), width as u32),
        Err(_) => (None, 1),
    }
}

fn decode_utf16(bytes: &[u8], read: fn([u8; 2]) -> u16) -> (Option<char>, u32) {
    let unit = |i: usize| bytes.get(i..i + 2).map(|b| read([b[0], b[1]]));
    let Some(first) = unit(0) else {
        return (None, 1);
    };
    if !(0xd800..0xe000).contains(&first) {
        return (char::from_u32(first as u32), 2);
    }
    let Some(second) = unit(2) else {
        return (None, 2);
    };
    match char::decode_utf16([first, second]).next() {
        Some(Ok(c)) => (Some(c), 4),
        _ => (None, 2),
    }
}

/// Callback-driven input: given a byte offset and its point, returns the
/// bytes starting there. An empty chunk means end of input.
pub type ReadCallback<'a> = dyn FnMut(usize, Point) -> Vec<u8> + 'a;

pub(crate) enum Source<'a> {
    Buffer(&'a [u8]),
    Reader(&'a mut ReadCallback<'a>),
}

impl<'a> Source<'a> {
    /// The chunk beginning at `byte`.
    pub fn read(&mut self, byte: u32, point: Point) -> Cow<'a, [u8]> {
        match self {
            Source::Buffer(bytes) => {
                let bytes: &'a [u8] = *bytes;
                Cow::Borrowed(bytes.get(byte as usize..).unwrap_or(&[]))
            }
            Source::Reader(read) => Cow::Owned(read(byte as usize, point)),
        }
    }
}
