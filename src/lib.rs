#![warn(rust_2018_idioms)]

//! # OpenType layout tables
//!
//! Reading of the `GSUB` and `GPOS` tables of OpenType fonts and application of their lookups
//! to a line of glyphs: ligatures, contextual forms, kerning and mark attachment.
//!
//! A [LayoutTableReader](layout::LayoutTableReader) is built once per table from the table
//! data, the font's `GDEF` table, its glyphs, and its units per em. It resolves the features of
//! a script and language, and applies a lookup to a [GlyphLine](glyph_line::GlyphLine) in
//! place. Positioning values are converted to text space, 1000 units per em.
//!
//! Everything a reader holds is parsed up front and immutable afterwards, so one reader can be
//! shared by any number of threads shaping their own lines.

pub mod actual_text;
/// Reading of binary data.
pub mod binary;
pub mod context;
pub mod error;
pub mod gdef;
pub mod glyph;
pub mod glyph_line;
pub mod gpos;
pub mod gsub;
pub mod layout;
pub mod size;
pub mod tag;
#[cfg(test)]
mod tests;
