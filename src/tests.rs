//! Shared test code.

include!("../tests/common.rs");

use crate::context::{GlyphSource, LookupFlag};
use crate::gdef::{GdefTable, GLYPH_CLASS_MARK};
use crate::glyph::Glyph;
use crate::glyph_line::GlyphLine;
use crate::layout::ClassDef;

/// Glyph source where glyph `n` has Unicode value `n` and is 500 units wide.
pub(crate) struct TestSource {
    gdef: GdefTable,
    no_unicode: Vec<u16>,
}

impl TestSource {
    pub(crate) fn new(gdef: GdefTable) -> Self {
        TestSource {
            gdef,
            no_unicode: Vec::new(),
        }
    }

    /// A source whose GDEF classes `marks` as marks.
    pub(crate) fn with_marks(marks: &[u16]) -> Self {
        let classdef = ClassDef::from_classes(marks.iter().map(|&glyph| (glyph, GLYPH_CLASS_MARK)));
        TestSource::new(GdefTable {
            opt_glyph_classdef: Some(classdef),
            opt_mark_attach_classdef: None,
        })
    }

    /// Give `glyphs` no Unicode value.
    pub(crate) fn without_unicode(mut self, glyphs: &[u16]) -> Self {
        self.no_unicode.extend_from_slice(glyphs);
        self
    }
}

impl GlyphSource for TestSource {
    fn glyph(&self, glyph_id: u16) -> Glyph {
        let unicode = if self.no_unicode.contains(&glyph_id) {
            None
        } else {
            char::from_u32(u32::from(glyph_id))
        };
        let is_mark = self.gdef.glyph_class(glyph_id) == GLYPH_CLASS_MARK;
        Glyph::new(glyph_id, 500, unicode).with_mark(is_mark)
    }

    fn is_skip(&self, glyph_id: u16, lookup_flag: LookupFlag) -> bool {
        self.gdef.is_skip(glyph_id, lookup_flag)
    }
}

/// A line of glyphs whose Unicode values equal their ids.
pub(crate) fn line_of(codes: &[u16]) -> GlyphLine {
    let glyphs = codes
        .iter()
        .map(|&code| Glyph::new(code, 500, char::from_u32(u32::from(code))))
        .collect();
    GlyphLine::new(glyphs)
}
