//! `GDEF` font table utilities.
//!
//! Only the parts used to decide which glyphs a lookup skips are read: the glyph class
//! definitions and the mark attachment class definitions.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gdef>

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::context::LookupFlag;
use crate::error::{FontReadingError, ParseError};
use crate::layout::ClassDef;
use crate::size;
use crate::tag;

pub const GLYPH_CLASS_NONE: u16 = 0;
pub const GLYPH_CLASS_BASE: u16 = 1;
pub const GLYPH_CLASS_LIGATURE: u16 = 2;
pub const GLYPH_CLASS_MARK: u16 = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GdefTable {
    pub opt_glyph_classdef: Option<ClassDef>,
    pub opt_mark_attach_classdef: Option<ClassDef>,
}

impl GdefTable {
    /// Read a `GDEF` table from `data`, which starts at the table header.
    pub fn parse(data: &[u8]) -> Result<GdefTable, FontReadingError> {
        ReadScope::new(data)
            .read::<GdefTable>()
            .map_err(|cause| FontReadingError::new(tag::GDEF, cause))
    }

    /// Whether a lookup with `lookup_flag` passes over `glyph`.
    pub fn is_skip(&self, glyph: u16, lookup_flag: LookupFlag) -> bool {
        let glyph_classdef = match &self.opt_glyph_classdef {
            Some(glyph_classdef) => glyph_classdef,
            None => return false,
        };
        let class = glyph_classdef.glyph_class_value(glyph);
        match class {
            GLYPH_CLASS_BASE if lookup_flag.get_ignore_bases() => return true,
            GLYPH_CLASS_LIGATURE if lookup_flag.get_ignore_ligatures() => return true,
            GLYPH_CLASS_MARK if lookup_flag.get_ignore_marks() => return true,
            _ => {}
        }

        // A lookup restricted to one mark attachment class passes over marks of other classes.
        let mark_attachment_type = lookup_flag.get_mark_attachment_type();
        mark_attachment_type != 0
            && class == GLYPH_CLASS_MARK
            && self.mark_attach_class(glyph) != mark_attachment_type
    }

    pub fn glyph_class(&self, glyph: u16) -> u16 {
        self.opt_glyph_classdef
            .as_ref()
            .map_or(GLYPH_CLASS_NONE, |classdef| classdef.glyph_class_value(glyph))
    }

    pub fn mark_attach_class(&self, glyph: u16) -> u16 {
        self.opt_mark_attach_classdef
            .as_ref()
            .map_or(GLYPH_CLASS_NONE, |classdef| classdef.glyph_class_value(glyph))
    }
}

pub fn is_skip(opt_gdef_table: Option<&GdefTable>, glyph: u16, lookup_flag: LookupFlag) -> bool {
    opt_gdef_table.is_some_and(|gdef| gdef.is_skip(glyph, lookup_flag))
}

pub fn glyph_class(opt_gdef_table: Option<&GdefTable>, glyph: u16) -> u16 {
    opt_gdef_table.map_or(GLYPH_CLASS_NONE, |gdef| gdef.glyph_class(glyph))
}

impl ReadBinary for GdefTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let glyph_classdef_offset = usize::from(ctxt.read_u16be()?);
        let _attach_list_offset = ctxt.read_u16be()?;
        let _lig_caret_list_offset = ctxt.read_u16be()?;
        // MarkAttachClassDef was added in OpenType 1.2 without a version bump, so it is always
        // read, as HarfBuzz does.
        let mark_attach_classdef_offset = usize::from(ctxt.read_u16be()?);

        let gdef_header_size = 6 * size::U16;
        let read_classdef = |offset: usize| -> Result<Option<ClassDef>, ParseError> {
            if offset < gdef_header_size {
                // Zero, or pointing into the header
                Ok(None)
            } else {
                table.offset(offset).read::<ClassDef>().map(Some)
            }
        };

        Ok(GdefTable {
            opt_glyph_classdef: read_classdef(glyph_classdef_offset)?,
            opt_mark_attach_classdef: read_classdef(mark_attach_classdef_offset)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Table;

    // glyph classes: 1 base, 2 ligature, 3 and 4 marks; mark attach classes: 3 -> 1, 4 -> 2
    fn make_gdef_table() -> Vec<u8> {
        let glyph_classdef = Table::new()
            .u16(1)
            .u16(1)
            .u16(4)
            .u16s(&[GLYPH_CLASS_BASE, GLYPH_CLASS_LIGATURE, GLYPH_CLASS_MARK, GLYPH_CLASS_MARK]);
        let mark_attach_classdef = Table::new().u16(2).u16(2).u16s(&[3, 3, 1]).u16s(&[4, 4, 2]);
        Table::new()
            .u16(1)
            .u16(0)
            .offset16(glyph_classdef)
            .u16(0)
            .u16(0)
            .offset16(mark_attach_classdef)
            .to_bytes()
    }

    #[test]
    fn test_read_gdef() {
        let gdef = GdefTable::parse(&make_gdef_table()).unwrap();
        assert_eq!(gdef.glyph_class(1), GLYPH_CLASS_BASE);
        assert_eq!(gdef.glyph_class(3), GLYPH_CLASS_MARK);
        assert_eq!(gdef.glyph_class(9), GLYPH_CLASS_NONE);
        assert_eq!(gdef.mark_attach_class(4), 2);
    }

    #[test]
    fn test_header_offsets_treated_as_absent() {
        let data = Table::new().u16s(&[1, 0, 4, 0, 0, 0]).to_bytes();
        let gdef = GdefTable::parse(&data).unwrap();
        assert_eq!(gdef, GdefTable::default());
    }

    #[test]
    fn test_bad_version() {
        let data = Table::new().u16s(&[2, 0, 0, 0, 0, 0]).to_bytes();
        let err = GdefTable::parse(&data).unwrap_err();
        assert_eq!(err.table, tag::GDEF);
        assert_eq!(err.cause, ParseError::BadVersion);
    }

    #[test]
    fn test_is_skip_ignore_flags() {
        let gdef = GdefTable::parse(&make_gdef_table()).unwrap();
        let ignore_marks = LookupFlag(LookupFlag::IGNORE_MARKS);
        assert!(gdef.is_skip(3, ignore_marks));
        assert!(!gdef.is_skip(1, ignore_marks));
        assert!(gdef.is_skip(1, LookupFlag(LookupFlag::IGNORE_BASE_GLYPHS)));
        assert!(gdef.is_skip(2, LookupFlag(LookupFlag::IGNORE_LIGATURES)));
        assert!(!gdef.is_skip(2, LookupFlag(0)));
    }

    #[test]
    fn test_is_skip_mark_attachment_type() {
        let gdef = GdefTable::parse(&make_gdef_table()).unwrap();
        let flag = LookupFlag(0x0100);
        assert!(!gdef.is_skip(3, flag));
        assert!(gdef.is_skip(4, flag));
        // Non-marks are never skipped because of the attachment type
        assert!(!gdef.is_skip(1, flag));
    }

    #[test]
    fn test_is_skip_without_gdef() {
        assert!(!is_skip(None, 3, LookupFlag(LookupFlag::IGNORE_MARKS)));
        let empty = GdefTable::default();
        assert!(!empty.is_skip(3, LookupFlag(LookupFlag::IGNORE_MARKS)));
    }
}
