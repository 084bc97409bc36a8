//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data or applying lookups
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    /// A sub-table carried a format tag this crate does not understand.
    BadFormat(u16),
    BadOffset,
    BadIndex,
    LimitExceeded,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadFormat(format) => write!(f, "unknown sub-table format {}", format),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Error returned when a layout table could not be read from font data
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FontReadingError {
    /// Tag of the table that failed to parse.
    pub table: u32,
    pub cause: ParseError,
}

impl FontReadingError {
    pub fn new(table: u32, cause: ParseError) -> Self {
        FontReadingError { table, cause }
    }
}

impl fmt::Display for FontReadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error reading '{}' table: {}",
            DisplayTag(self.table),
            self.cause
        )
    }
}

impl std::error::Error for FontReadingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}
