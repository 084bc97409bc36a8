//! Four byte OpenType tags for tables, scripts, languages and features.

use crate::error::ParseError;
use std::fmt;

/// Generate a 4-byte tag from a byte string
macro_rules! tag {
    ($w:expr) => {
        tag(*$w)
    };
}

/// Wrapper that formats a tag as its characters.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct DisplayTag(pub u32);

const fn tag(chars: [u8; 4]) -> u32 {
    u32::from_be_bytes(chars)
}

/// Build a tag from a string of up to four ASCII characters, padding with spaces.
pub fn from_string(s: &str) -> Result<u32, ParseError> {
    if s.len() > 4 {
        return Err(ParseError::BadValue);
    }

    let mut bytes = [b' '; 4];
    for (byte, c) in bytes.iter_mut().zip(s.chars()) {
        if !c.is_ascii() || c.is_ascii_control() {
            return Err(ParseError::BadValue);
        }
        *byte = c as u8;
    }

    Ok(u32::from_be_bytes(bytes))
}

impl fmt::Display for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().any(|b| !b.is_ascii() || b.is_ascii_control()) {
            write!(f, "0x{:08x}", self.0)
        } else {
            let s: String = bytes.iter().map(|&b| char::from(b)).collect();
            s.fmt(f)
        }
    }
}

impl fmt::Debug for DisplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_string().fmt(f)
    }
}

pub const ARAB: u32 = tag!(b"arab");
pub const CALT: u32 = tag!(b"calt");
pub const CCMP: u32 = tag!(b"ccmp");
pub const CLIG: u32 = tag!(b"clig");
pub const DEU: u32 = tag!(b"DEU ");
pub const DFLT: u32 = tag!(b"DFLT");
pub const GDEF: u32 = tag!(b"GDEF");
pub const GPOS: u32 = tag!(b"GPOS");
pub const GSUB: u32 = tag!(b"GSUB");
pub const KERN: u32 = tag!(b"kern");
pub const LATN: u32 = tag!(b"latn");
pub const LIGA: u32 = tag!(b"liga");
pub const MARK: u32 = tag!(b"mark");
pub const MKMK: u32 = tag!(b"mkmk");
pub const RLIG: u32 = tag!(b"rlig");
pub const SMCP: u32 = tag!(b"smcp");
