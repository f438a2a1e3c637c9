//! Positions inside a source document.
//!
//! Everything is measured twice: as a byte offset and as a row/column
//! [`Point`]. Columns count bytes, not characters.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A row/column location. Both components are zero-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Point = Point { row: 0, column: 0 };
    pub const MAX: Point = Point {
        row: u32::MAX,
        column: u32::MAX,
    };

    #[inline]
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Appends a relative extent. A multi-line extent resets the column.
    #[inline]
    pub fn add(self, other: Point) -> Point {
        if other.row > 0 {
            Point::new(self.row + other.row, other.column)
        } else {
            Point::new(self.row, self.column + other.column)
        }
    }

    /// Extent from `other` to `self`, saturating at zero.
    #[inline]
    pub fn sub(self, other: Point) -> Point {
        if self.row > other.row {
            Point::new(self.row - other.row, self.column)
        } else {
            Point::new(0, self.column.saturating_sub(other.column))
        }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then(self.column.cmp(&other.column))
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// A byte count paired with the row/column extent it spans.
///
/// Used both for absolute positions (measured from the document start)
/// and for relative sizes such as a subtree's padding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Length {
    pub bytes: u32,
    pub extent: Point,
}

impl Length {
    pub const ZERO: Length = Length {
        bytes: 0,
        extent: Point::ZERO,
    };

    #[inline]
    pub const fn new(bytes: u32, extent: Point) -> Self {
        Self { bytes, extent }
    }

    #[inline]
    pub fn add(self, other: Length) -> Length {
        Length {
            bytes: self.bytes + other.bytes,
            extent: self.extent.add(other.extent),
        }
    }

    #[inline]
    pub fn sub(self, other: Length) -> Length {
        Length {
            bytes: self.bytes.saturating_sub(other.bytes),
            extent: self.extent.sub(other.extent),
        }
    }

    /// Like [`Length::sub`], but yields zero when `other` is not strictly smaller.
    #[inline]
    pub fn saturating_sub(self, other: Length) -> Length {
        if self.bytes > other.bytes {
            self.sub(other)
        } else {
            Length::ZERO
        }
    }
}

/// A span of the document in both coordinate systems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_point: Point,
    pub end_point: Point,
}

impl Range {
    /// The range covering every possible document.
    pub const EVERYTHING: Range = Range {
        start_byte: 0,
        end_byte: u32::MAX,
        start_point: Point::ZERO,
        end_point: Point::MAX,
    };

    pub fn new(start_byte: u32, end_byte: u32, start_point: Point, end_point: Point) -> Self {
        Self {
            start_byte,
            end_byte,
            start_point,
            end_point,
        }
    }

    #[inline]
    pub fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_point)
    }

    #[inline]
    pub fn end(&self) -> Length {
        Length::new(self.end_byte, self.end_point)
    }

    #[inline]
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start_byte as usize..self.end_byte as usize
    }

    /// Smallest range covering both inputs.
    pub fn union(&self, other: &Range) -> Range {
        let (start_byte, start_point) = if other.start_byte < self.start_byte {
            (other.start_byte, other.start_point)
        } else {
            (self.start_byte, self.start_point)
        };
        let (end_byte, end_point) = if other.end_byte > self.end_byte {
            (other.end_byte, other.end_point)
        } else {
            (self.end_byte, self.end_point)
        };
        Range::new(start_byte, end_byte, start_point, end_point)
    }
}

/// Describes one textual change, in the coordinates of the old and new text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputEdit {
    pub start_byte: u32,
    pub old_end_byte: u32,
    pub new_end_byte: u32,
    pub start_position: Point,
    pub old_end_position: Point,
    pub new_end_position: Point,
}

impl InputEdit {
    #[inline]
    pub fn start(&self) -> Length {
        Length::new(self.start_byte, self.start_position)
    }

    #[inline]
    pub fn old_end(&self) -> Length {
        Length::new(self.old_end_byte, self.old_end_position)
    }

    #[inline]
    pub fn new_end(&self) -> Length {
        Length::new(self.new_end_byte, self.new_end_position)
    }

    /// Shifts an absolute position to where it lands after this edit.
    ///
    /// Positions before the edit are untouched, positions inside the replaced
    /// span collapse onto the edit's new end.
    pub fn apply(&self, position: Length) -> Length {
        if position.bytes >= self.old_end_byte {
            self.new_end().add(position.sub(self.old_end()))
        } else if position.bytes > self.start_byte {
            self.new_end()
        } else {
            position
        }
    }
}

/// Computes the extent of `text` in bytes and rows.
pub fn extent_of(text: &[u8]) -> Length {
    let mut point = Point::ZERO;
    for &byte in text {
        if byte == b'\n' {
            point.row += 1;
            point.column = 0;
        } else {
            point.column += 1;
        }
    }
    Length::new(text.len() as u32, point)
}
