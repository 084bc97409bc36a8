//! Glyph positioning (`GPOS`) lookups.
//!
//! Adjustments accumulate on the glyphs of the line in text space. Advances are added to,
//! so several lookups can adjust the same glyph. Mark attachment sets the mark's placement
//! and records in `anchor_delta` how many glyphs back the glyph it is attached to is.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gpos>

use log::warn;
use rustc_hash::FxHashMap;

use crate::binary::read::{ReadCtxt, ReadScope};
use crate::binary::U16Be;
use crate::context::{
    apply_context, next_glyph, previous_glyph, read_context_subtables, ChainedSequenceContext,
    ContextTable, GlyphSource, LookupFlag, SequenceContext,
};
use crate::error::ParseError;
use crate::gdef::GLYPH_CLASS_MARK;
use crate::glyph::Glyph;
use crate::glyph_line::GlyphLine;
use crate::layout::{
    read_anchor, Anchor, ApplyContext, ClassDef, Coverage, LayoutTableReader, LayoutTableType,
    LookupTable, ValueFormat, ValueRecord, GPOS,
};
use crate::tag;

/// A parsed `GPOS` table.
pub type GlyphPositioningTableReader = LayoutTableReader<GPOS>;

/// The decoded subtables of a GPOS lookup.
#[derive(Debug)]
pub enum PosLookup {
    /// Type 1: glyph to its adjustment. The first subtable covering a glyph wins.
    SinglePos(FxHashMap<u16, ValueRecord>),
    /// Type 2.
    PairPos(Vec<PairPos>),
    /// Type 4.
    MarkBasePos(Vec<MarkBasePos>),
    /// Type 5.
    MarkLigPos(Vec<MarkLigPos>),
    /// Type 6. The bases are the marks that other marks attach to.
    MarkMarkPos(Vec<MarkBasePos>),
    /// Type 7. Only class based (format 2) subtables are read.
    ContextPos(Vec<ContextTable>),
    /// Type 8.
    ChainContextPos(Vec<ContextTable>),
}

/// A pair adjustment subtable.
#[derive(Debug)]
pub enum PairPos {
    /// Adjustments for pairs of glyphs, keyed by first then second glyph.
    Format1 {
        pairs: FxHashMap<u16, FxHashMap<u16, (ValueRecord, ValueRecord)>>,
    },
    /// Adjustments for pairs of classes.
    Format2 {
        coverage: Coverage,
        classdef1: ClassDef,
        classdef2: ClassDef,
        class1_count: usize,
        class2_count: usize,
        /// `class1_count` rows of `class2_count` records.
        class_records: Vec<(ValueRecord, ValueRecord)>,
    },
}

impl PairPos {
    /// The adjustments for `glyph1` followed by `glyph2`.
    pub fn apply_glyph_pair(&self, glyph1: u16, glyph2: u16) -> Option<(ValueRecord, ValueRecord)> {
        match self {
            PairPos::Format1 { pairs } => pairs.get(&glyph1)?.get(&glyph2).copied(),
            PairPos::Format2 {
                coverage,
                classdef1,
                classdef2,
                class1_count,
                class2_count,
                class_records,
            } => {
                if !coverage.contains(glyph1) {
                    return None;
                }
                let class1 = usize::from(classdef1.glyph_class_value(glyph1));
                let class2 = usize::from(classdef2.glyph_class_value(glyph2));
                if class1 >= *class1_count || class2 >= *class2_count {
                    return None;
                }
                class_records.get(class1 * class2_count + class2).copied()
            }
        }
    }
}

/// The class of a mark and the anchor it attaches by.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MarkRecord {
    pub mark_class: u16,
    pub anchor: Anchor,
}

/// Marks and the glyphs they attach to, with an anchor per mark class.
#[derive(Debug, Default)]
pub struct MarkBasePos {
    pub marks: FxHashMap<u16, MarkRecord>,
    pub bases: FxHashMap<u16, Vec<Option<Anchor>>>,
}

impl MarkBasePos {
    fn base_anchor(&self, base_glyph: u16, mark_class: u16) -> Option<Anchor> {
        self.bases
            .get(&base_glyph)?
            .get(usize::from(mark_class))
            .copied()
            .flatten()
    }
}

/// Marks and the ligatures they attach to, with anchors per component and mark class.
#[derive(Debug, Default)]
pub struct MarkLigPos {
    pub marks: FxHashMap<u16, MarkRecord>,
    pub ligatures: FxHashMap<u16, Vec<Vec<Option<Anchor>>>>,
}

impl LayoutTableType for GPOS {
    type Lookup = PosLookup;

    const TABLE_TAG: u32 = tag::GPOS;
    const EXTENSION_LOOKUP_TYPE: u16 = 9;

    fn read_lookup(
        lookup_type: u16,
        subtables: &[ReadScope<'_>],
        units_per_em: u16,
    ) -> Result<Option<PosLookup>, ParseError> {
        let lookup = match lookup_type {
            1 => {
                let mut adjustments = FxHashMap::default();
                for &subtable in subtables {
                    read_single_pos(subtable, units_per_em, &mut adjustments)?;
                }
                PosLookup::SinglePos(adjustments)
            }
            2 => PosLookup::PairPos(
                subtables
                    .iter()
                    .map(|&subtable| read_pair_pos(subtable, units_per_em))
                    .collect::<Result<_, _>>()?,
            ),
            4 => PosLookup::MarkBasePos(
                subtables
                    .iter()
                    .map(|&subtable| read_mark_base_pos(subtable, units_per_em))
                    .collect::<Result<_, _>>()?,
            ),
            5 => PosLookup::MarkLigPos(
                subtables
                    .iter()
                    .map(|&subtable| read_mark_lig_pos(subtable, units_per_em))
                    .collect::<Result<_, _>>()?,
            ),
            6 => PosLookup::MarkMarkPos(
                subtables
                    .iter()
                    .map(|&subtable| read_mark_base_pos(subtable, units_per_em))
                    .collect::<Result<_, _>>()?,
            ),
            7 => PosLookup::ContextPos(read_class_context_subtables(subtables)?),
            8 => PosLookup::ChainContextPos(read_context_subtables::<ChainedSequenceContext>(
                subtables,
            )?),
            _ => return Ok(None),
        };
        Ok(Some(lookup))
    }

    fn transform_one(
        lookup: &LookupTable<PosLookup>,
        ctxt: ApplyContext<'_, GPOS>,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError> {
        if line.idx >= line.end {
            return Ok(false);
        }
        let reader = ctxt.reader();
        let lookup_flag = lookup.lookup_flag;
        let changed = match &lookup.subtables {
            PosLookup::ContextPos(subtables) | PosLookup::ChainContextPos(subtables) => {
                return apply_context(&ctxt, lookup_flag, subtables, line);
            }
            _ if reader.is_skip(line.get(line.idx).code, lookup_flag) => false,
            PosLookup::SinglePos(adjustments) => singlepos(adjustments, line),
            PosLookup::PairPos(subtables) => {
                match pairpos(reader, subtables, lookup_flag, line) {
                    Some(second_index) => {
                        // The second glyph may be the first of the next pair.
                        line.idx = second_index;
                        return Ok(true);
                    }
                    None => false,
                }
            }
            PosLookup::MarkBasePos(subtables) => {
                match markbasepos_would_apply(reader, subtables, lookup_flag, line) {
                    Some((base_index, base_anchor, mark_anchor)) => {
                        attach_mark(line, base_index, base_anchor, mark_anchor);
                        true
                    }
                    None => false,
                }
            }
            PosLookup::MarkLigPos(subtables) => {
                match markligpos_would_apply(reader, subtables, lookup_flag, line) {
                    Some((ligature_index, ligature_anchor, mark_anchor)) => {
                        attach_mark(line, ligature_index, ligature_anchor, mark_anchor);
                        true
                    }
                    None => false,
                }
            }
            PosLookup::MarkMarkPos(subtables) => {
                match markmarkpos_would_apply(reader, subtables, lookup_flag, line) {
                    Some((mark2_index, mark2_anchor, mark1_anchor)) => {
                        attach_mark(line, mark2_index, mark2_anchor, mark1_anchor);
                        true
                    }
                    None => false,
                }
            }
        };
        line.idx += 1;
        Ok(changed)
    }
}

fn read_single_pos(
    scope: ReadScope<'_>,
    units_per_em: u16,
    adjustments: &mut FxHashMap<u16, ValueRecord>,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1 || format == 2)?;
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let value_format = ctxt.read::<ValueFormat>()?;
    let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
    if format == 1 {
        let value_record = ctxt.read_dep::<ValueRecord>((value_format, units_per_em))?;
        for &glyph in coverage.glyphs() {
            adjustments.entry(glyph).or_insert(value_record);
        }
    } else {
        let value_count = usize::from(ctxt.read_u16be()?);
        let value_records =
            ctxt.read_array_dep::<ValueRecord>(value_count, (value_format, units_per_em))?;
        for (&glyph, value_record) in coverage.glyphs().iter().zip(value_records.iter_res()) {
            let value_record = value_record?;
            adjustments.entry(glyph).or_insert(value_record);
        }
    }
    Ok(())
}

fn read_value_pair(
    ctxt: &mut ReadCtxt<'_>,
    value_format1: ValueFormat,
    value_format2: ValueFormat,
    units_per_em: u16,
) -> Result<(ValueRecord, ValueRecord), ParseError> {
    let value_record1 = ctxt.read_dep::<ValueRecord>((value_format1, units_per_em))?;
    let value_record2 = ctxt.read_dep::<ValueRecord>((value_format2, units_per_em))?;
    Ok((value_record1, value_record2))
}

fn read_pair_pos(scope: ReadScope<'_>, units_per_em: u16) -> Result<PairPos, ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1 || format == 2)?;
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let value_format1 = ctxt.read::<ValueFormat>()?;
    let value_format2 = ctxt.read::<ValueFormat>()?;
    let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
    if format == 1 {
        let pair_set_count = usize::from(ctxt.read_u16be()?);
        let pair_set_offsets = ctxt.read_array::<U16Be>(pair_set_count)?;
        let mut pairs = FxHashMap::default();
        for (&glyph1, pair_set_offset) in coverage.glyphs().iter().zip(pair_set_offsets.iter()) {
            let mut pair_set_ctxt = scope.offset(usize::from(pair_set_offset)).ctxt();
            let pair_value_count = pair_set_ctxt.read_u16be()?;
            let mut second_glyphs = FxHashMap::default();
            for _ in 0..pair_value_count {
                let glyph2 = pair_set_ctxt.read_u16be()?;
                let values = read_value_pair(
                    &mut pair_set_ctxt,
                    value_format1,
                    value_format2,
                    units_per_em,
                )?;
                second_glyphs.entry(glyph2).or_insert(values);
            }
            pairs.entry(glyph1).or_insert(second_glyphs);
        }
        Ok(PairPos::Format1 { pairs })
    } else {
        let classdef1_offset = usize::from(ctxt.read_u16be()?);
        let classdef2_offset = usize::from(ctxt.read_u16be()?);
        let class1_count = usize::from(ctxt.read_u16be()?);
        let class2_count = usize::from(ctxt.read_u16be()?);
        let record_count = class1_count
            .checked_mul(class2_count)
            .ok_or(ParseError::BadValue)?;
        let mut class_records = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            class_records.push(read_value_pair(
                &mut ctxt,
                value_format1,
                value_format2,
                units_per_em,
            )?);
        }
        Ok(PairPos::Format2 {
            coverage,
            classdef1: scope.offset(classdef1_offset).read::<ClassDef>()?,
            classdef2: scope.offset(classdef2_offset).read::<ClassDef>()?,
            class1_count,
            class2_count,
            class_records,
        })
    }
}

// The mark glyphs of `mark_coverage` with their classes and anchors. Marks with a null anchor
// can't be attached and are left out. A class outside `mark_class_count` is a bad index.
fn read_mark_array(
    scope: ReadScope<'_>,
    mark_coverage: &Coverage,
    mark_class_count: usize,
    units_per_em: u16,
) -> Result<FxHashMap<u16, MarkRecord>, ParseError> {
    let mut ctxt = scope.ctxt();
    let mark_count = usize::from(ctxt.read_u16be()?);
    let mark_records = ctxt.read_array::<(U16Be, U16Be)>(mark_count)?;
    let mut marks = FxHashMap::default();
    for (&glyph, (mark_class, anchor_offset)) in mark_coverage.glyphs().iter().zip(&mark_records) {
        if usize::from(mark_class) >= mark_class_count {
            return Err(ParseError::BadIndex);
        }
        if let Some(anchor) = read_anchor(&scope, anchor_offset, units_per_em)? {
            marks.insert(glyph, MarkRecord { mark_class, anchor });
        }
    }
    Ok(marks)
}

// A count followed by that many rows of `mark_class_count` anchor offsets, relative to `scope`.
fn read_anchor_matrix(
    scope: ReadScope<'_>,
    mark_class_count: usize,
    units_per_em: u16,
) -> Result<Vec<Vec<Option<Anchor>>>, ParseError> {
    let mut ctxt = scope.ctxt();
    let row_count = usize::from(ctxt.read_u16be()?);
    if mark_class_count == 0 {
        return Ok(vec![Vec::new(); row_count]);
    }
    let offset_count = row_count
        .checked_mul(mark_class_count)
        .ok_or(ParseError::BadValue)?;
    let anchor_offsets = ctxt.read_array::<U16Be>(offset_count)?.to_vec();
    anchor_offsets
        .chunks(mark_class_count)
        .map(|row| {
            row.iter()
                .map(|&anchor_offset| read_anchor(&scope, anchor_offset, units_per_em))
                .collect()
        })
        .collect()
}

// Mark-to-base and mark-to-mark subtables share a layout.
fn read_mark_base_pos(scope: ReadScope<'_>, units_per_em: u16) -> Result<MarkBasePos, ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1)?;
    let mark_coverage_offset = usize::from(ctxt.read_u16be()?);
    let base_coverage_offset = usize::from(ctxt.read_u16be()?);
    let mark_class_count = usize::from(ctxt.read_u16be()?);
    let mark_array_offset = usize::from(ctxt.read_u16be()?);
    let base_array_offset = usize::from(ctxt.read_u16be()?);

    let mark_coverage = scope.offset(mark_coverage_offset).read::<Coverage>()?;
    let base_coverage = scope.offset(base_coverage_offset).read::<Coverage>()?;
    let marks = read_mark_array(
        scope.offset(mark_array_offset),
        &mark_coverage,
        mark_class_count,
        units_per_em,
    )?;
    let base_anchors = read_anchor_matrix(
        scope.offset(base_array_offset),
        mark_class_count,
        units_per_em,
    )?;
    let bases = base_coverage
        .glyphs()
        .iter()
        .copied()
        .zip(base_anchors)
        .collect();
    Ok(MarkBasePos { marks, bases })
}

fn read_mark_lig_pos(scope: ReadScope<'_>, units_per_em: u16) -> Result<MarkLigPos, ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1)?;
    let mark_coverage_offset = usize::from(ctxt.read_u16be()?);
    let ligature_coverage_offset = usize::from(ctxt.read_u16be()?);
    let mark_class_count = usize::from(ctxt.read_u16be()?);
    let mark_array_offset = usize::from(ctxt.read_u16be()?);
    let ligature_array_offset = usize::from(ctxt.read_u16be()?);

    let mark_coverage = scope.offset(mark_coverage_offset).read::<Coverage>()?;
    let ligature_coverage = scope.offset(ligature_coverage_offset).read::<Coverage>()?;
    let marks = read_mark_array(
        scope.offset(mark_array_offset),
        &mark_coverage,
        mark_class_count,
        units_per_em,
    )?;

    let ligature_array_scope = scope.offset(ligature_array_offset);
    let mut ligature_array_ctxt = ligature_array_scope.ctxt();
    let ligature_count = usize::from(ligature_array_ctxt.read_u16be()?);
    let ligature_attach_offsets = ligature_array_ctxt.read_array::<U16Be>(ligature_count)?;
    let mut ligatures = FxHashMap::default();
    for (&glyph, ligature_attach_offset) in ligature_coverage
        .glyphs()
        .iter()
        .zip(ligature_attach_offsets.iter())
    {
        let component_anchors = read_anchor_matrix(
            ligature_array_scope.offset(usize::from(ligature_attach_offset)),
            mark_class_count,
            units_per_em,
        )?;
        ligatures.insert(glyph, component_anchors);
    }
    Ok(MarkLigPos { marks, ligatures })
}

// Contextual positioning by glyph or by coverage is not supported, those subtables are dropped.
fn read_class_context_subtables(
    subtables: &[ReadScope<'_>],
) -> Result<Vec<ContextTable>, ParseError> {
    let mut context_tables = Vec::with_capacity(subtables.len());
    for subtable in subtables {
        let format = subtable.ctxt().read_u16be()?;
        if format == 2 {
            context_tables.push(subtable.read::<SequenceContext>()?);
        } else {
            warn!(
                "contextual positioning subtable format {} is not supported",
                format
            );
        }
    }
    Ok(context_tables)
}

fn singlepos(adjustments: &FxHashMap<u16, ValueRecord>, line: &mut GlyphLine) -> bool {
    let glyph = line.get_mut(line.idx);
    match adjustments.get(&glyph.code) {
        Some(value_record) => {
            add_advance(glyph, value_record);
            true
        }
        None => false,
    }
}

fn add_advance(glyph: &mut Glyph, value_record: &ValueRecord) {
    glyph.x_advance += value_record.x_advance;
    glyph.y_advance += value_record.y_advance;
}

fn pairpos_would_apply(
    subtables: &[PairPos],
    glyph1: u16,
    glyph2: u16,
) -> Option<(ValueRecord, ValueRecord)> {
    subtables
        .iter()
        .find_map(|subtable| subtable.apply_glyph_pair(glyph1, glyph2))
}

// Adjust the glyph at the cursor and the next one, returning the index of the second.
fn pairpos(
    reader: &GlyphPositioningTableReader,
    subtables: &[PairPos],
    lookup_flag: LookupFlag,
    line: &mut GlyphLine,
) -> Option<usize> {
    let first_index = line.idx;
    let second_index = next_glyph(reader, line, lookup_flag, first_index)?;
    let (value_record1, value_record2) = pairpos_would_apply(
        subtables,
        line.get(first_index).code,
        line.get(second_index).code,
    )?;
    add_advance(line.get_mut(first_index), &value_record1);
    add_advance(line.get_mut(second_index), &value_record2);
    Some(second_index)
}

// A glyph is a mark if it was flagged as one or the GDEF table classes it as one.
fn is_mark(reader: &GlyphPositioningTableReader, glyph: &Glyph) -> bool {
    glyph.is_mark || reader.glyph_class(glyph.code) == GLYPH_CLASS_MARK
}

// The nearest glyph before the cursor that is not a mark.
fn previous_base(
    reader: &GlyphPositioningTableReader,
    lookup_flag: LookupFlag,
    line: &GlyphLine,
) -> Option<usize> {
    let mut index = line.idx;
    loop {
        index = previous_glyph(reader, line, lookup_flag, index)?;
        if !is_mark(reader, line.get(index)) {
            return Some(index);
        }
    }
}

fn markbasepos_would_apply(
    reader: &GlyphPositioningTableReader,
    subtables: &[MarkBasePos],
    lookup_flag: LookupFlag,
    line: &GlyphLine,
) -> Option<(usize, Anchor, Anchor)> {
    let mark_glyph = line.get(line.idx).code;
    if !subtables
        .iter()
        .any(|subtable| subtable.marks.contains_key(&mark_glyph))
    {
        return None;
    }
    let base_index = previous_base(reader, lookup_flag, line)?;
    let base_glyph = line.get(base_index).code;
    subtables.iter().find_map(|subtable| {
        let mark = subtable.marks.get(&mark_glyph)?;
        let base_anchor = subtable.base_anchor(base_glyph, mark.mark_class)?;
        Some((base_index, base_anchor, mark.anchor))
    })
}

fn markligpos_would_apply(
    reader: &GlyphPositioningTableReader,
    subtables: &[MarkLigPos],
    lookup_flag: LookupFlag,
    line: &GlyphLine,
) -> Option<(usize, Anchor, Anchor)> {
    let mark_glyph = line.get(line.idx).code;
    if !subtables
        .iter()
        .any(|subtable| subtable.marks.contains_key(&mark_glyph))
    {
        return None;
    }
    let ligature_index = previous_base(reader, lookup_flag, line)?;
    let ligature_glyph = line.get(ligature_index).code;
    for subtable in subtables {
        let mark = match subtable.marks.get(&mark_glyph) {
            Some(mark) => mark,
            None => continue,
        };
        let component_anchors = match subtable.ligatures.get(&ligature_glyph) {
            Some(component_anchors) => component_anchors,
            None => continue,
        };
        // The components a mark belongs to are not tracked, so the mark goes on the last
        // component that has an anchor for its class.
        let mark_class = usize::from(mark.mark_class);
        return component_anchors
            .iter()
            .rev()
            .find_map(|anchors| anchors.get(mark_class).copied().flatten())
            .map(|ligature_anchor| (ligature_index, ligature_anchor, mark.anchor));
    }
    None
}

fn markmarkpos_would_apply(
    reader: &GlyphPositioningTableReader,
    subtables: &[MarkBasePos],
    lookup_flag: LookupFlag,
    line: &GlyphLine,
) -> Option<(usize, Anchor, Anchor)> {
    let mark1_glyph = line.get(line.idx).code;
    let covering: Vec<&MarkBasePos> = subtables
        .iter()
        .filter(|subtable| subtable.marks.contains_key(&mark1_glyph))
        .collect();
    if covering.is_empty() {
        return None;
    }

    // Search back for a mark to attach to, without crossing a glyph that is not a mark.
    let mut index = line.idx;
    let mark2_index = loop {
        let previous = previous_glyph(reader, line, lookup_flag, index)?;
        if (previous..index).any(|i| !is_mark(reader, line.get(i))) {
            return None;
        }
        let glyph = line.get(previous).code;
        if covering
            .iter()
            .any(|subtable| subtable.bases.contains_key(&glyph))
        {
            break previous;
        }
        index = previous;
    };

    let mark2_glyph = line.get(mark2_index).code;
    covering.iter().find_map(|subtable| {
        let mark1 = subtable.marks.get(&mark1_glyph)?;
        let mark2_anchor = subtable.base_anchor(mark2_glyph, mark1.mark_class)?;
        Some((mark2_index, mark2_anchor, mark1.anchor))
    })
}

// Place the mark at the cursor so its anchor meets `target_anchor` of the glyph at
// `target_index`. The advance of the mark is left as is.
fn attach_mark(
    line: &mut GlyphLine,
    target_index: usize,
    target_anchor: Anchor,
    mark_anchor: Anchor,
) {
    let distance = i32::try_from(line.idx - target_index).unwrap_or(i32::MAX);
    let mark = line.get_mut(line.idx);
    mark.x_placement = target_anchor.x - mark_anchor.x;
    mark.y_placement = target_anchor.y - mark_anchor.y;
    mark.anchor_delta = -distance;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gdef::GdefTable;
    use crate::glyph::GlyphMap;
    use crate::tests::{line_of, Table};

    fn coverage(glyphs: &[u16]) -> Table {
        Table::new().u16(1).u16(glyphs.len() as u16).u16s(glyphs)
    }

    fn anchor(x: i16, y: i16) -> Table {
        Table::new().u16(1).i16(x).i16(y)
    }

    fn lookup(lookup_type: u16, lookup_flag: u16, subtables: Vec<Table>) -> Table {
        let table = Table::new()
            .u16(lookup_type)
            .u16(lookup_flag)
            .u16(subtables.len() as u16);
        subtables.into_iter().fold(table, Table::offset16)
    }

    fn gpos_table(lookups: Vec<Table>) -> Vec<u8> {
        let lookup_list = Table::new().u16(lookups.len() as u16);
        let lookup_list = lookups.into_iter().fold(lookup_list, Table::offset16);
        Table::new()
            .u32(0x00010000)
            .null16()
            .null16()
            .offset16(lookup_list)
            .to_bytes()
    }

    // Glyphs 1-9 are bases, 10-19 ligatures and 20-29 marks.
    fn gdef() -> Arc<GdefTable> {
        let classes = (1..30).map(|glyph| {
            let class = match glyph {
                1..=9 => 1,
                10..=19 => 2,
                _ => 3,
            };
            (glyph, class)
        });
        Arc::new(GdefTable {
            opt_glyph_classdef: Some(ClassDef::from_classes(classes)),
            opt_mark_attach_classdef: None,
        })
    }

    fn read_gpos(data: &[u8], units_per_em: u16) -> GlyphPositioningTableReader {
        let glyphs = Arc::new(GlyphMap::default());
        GlyphPositioningTableReader::new(data, Some(gdef()), glyphs, units_per_em).unwrap()
    }

    fn apply_first_lookup(gpos: &GlyphPositioningTableReader, line: &mut GlyphLine) -> bool {
        gpos.transform_line(gpos.lookup_table(0).unwrap(), line).unwrap()
    }

    #[test]
    fn test_single_pos_adds_advance() {
        let format1 = Table::new()
            .u16(1)
            .offset16(coverage(&[1, 2]))
            .u16(0x0005)
            .i16(-20)
            .i16(100);
        let format2 = Table::new()
            .u16(2)
            .offset16(coverage(&[2, 3]))
            .u16(0x0004)
            .u16(2)
            .i16(7)
            .i16(50);
        let data = gpos_table(vec![lookup(1, 0, vec![format1, format2])]);
        let gpos = read_gpos(&data, 2000);
        let mut line = line_of(&[1, 2, 3, 4]);
        line.get_mut(0).x_advance = 10;
        assert!(apply_first_lookup(&gpos, &mut line));
        assert_eq!(line.get(0).x_advance, 60);
        // Placement is not applied by single positioning
        assert_eq!(line.get(0).x_placement, 0);
        assert_eq!(line.get(1).x_advance, 50);
        assert_eq!(line.get(2).x_advance, 25);
        assert!(!line.get(3).has_offsets());
    }

    #[test]
    fn test_pair_pos_format1() {
        let pair_set = Table::new()
            .u16(2)
            .u16(2)
            .i16(-50)
            .i16(0)
            .u16(3)
            .i16(-30)
            .i16(10);
        let subtable = Table::new()
            .u16(1)
            .offset16(coverage(&[1]))
            .u16(0x0004)
            .u16(0x0004)
            .u16(1)
            .offset16(pair_set);
        let data = gpos_table(vec![lookup(2, 0, vec![subtable])]);
        let gpos = read_gpos(&data, 1000);
        let lookup = gpos.lookup_table(0).unwrap();

        let mut line = line_of(&[1, 3, 4]);
        assert!(gpos.transform_one(lookup, &mut line).unwrap());
        assert_eq!(line.idx, 1);
        assert_eq!(line.get(0).x_advance, -30);
        assert_eq!(line.get(1).x_advance, 10);

        let mut line = line_of(&[1, 4]);
        assert!(!gpos.transform_one(lookup, &mut line).unwrap());
        assert_eq!(line.idx, 1);
    }

    #[test]
    fn test_pair_pos_skips_marks() {
        let pair_set = Table::new().u16(1).u16(2).i16(-50).i16(0);
        let subtable = Table::new()
            .u16(1)
            .offset16(coverage(&[1]))
            .u16(0x0004)
            .u16(0x0000)
            .u16(1)
            .offset16(pair_set);
        let data = gpos_table(vec![lookup(2, LookupFlag::IGNORE_MARKS, vec![subtable])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[1, 20, 2]);
        assert!(apply_first_lookup(&gpos, &mut line));
        assert_eq!(line.get(0).x_advance, -50);
        assert_eq!(line.get(1).x_advance, 0);
    }

    #[test]
    fn test_pair_pos_format2() {
        // Glyphs 1 and 2 are first class 1, glyph 3 is second class 1
        let classdef1 = Table::new().u16(1).u16(1).u16(2).u16s(&[1, 1]);
        let classdef2 = Table::new().u16(1).u16(3).u16(1).u16(1);
        let subtable = Table::new()
            .u16(2)
            .offset16(coverage(&[1, 2]))
            .u16(0x0004)
            .u16(0x0000)
            .offset16(classdef1)
            .offset16(classdef2)
            .u16(2)
            .u16(2)
            .i16(0)
            .i16(0)
            .i16(0)
            .i16(-80);
        let data = gpos_table(vec![lookup(2, 0, vec![subtable])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[2, 3, 1, 4]);
        assert!(apply_first_lookup(&gpos, &mut line));
        assert_eq!(line.get(0).x_advance, -80);
        // Class 0 pairs are in the table too
        assert_eq!(line.get(2).x_advance, 0);
    }

    fn mark_base_subtable() -> Table {
        let mark_array = Table::new()
            .u16(2)
            .u16(0)
            .offset16(anchor(100, 600))
            .u16(1)
            .offset16(anchor(50, -20));
        let base_array = Table::new()
            .u16(1)
            .offset16(anchor(300, 700))
            .offset16(anchor(250, 0));
        Table::new()
            .u16(1)
            .offset16(coverage(&[20, 21]))
            .offset16(coverage(&[1]))
            .u16(2)
            .offset16(mark_array)
            .offset16(base_array)
    }

    #[test]
    fn test_mark_to_base() {
        let data = gpos_table(vec![lookup(4, 0, vec![mark_base_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[1, 20, 21]);
        assert!(apply_first_lookup(&gpos, &mut line));

        let mark1 = line.get(1);
        assert_eq!((mark1.x_placement, mark1.y_placement), (200, 100));
        assert_eq!(mark1.anchor_delta, -1);
        let mark2 = line.get(2);
        // Searching back passes over the first mark
        assert_eq!((mark2.x_placement, mark2.y_placement), (200, 20));
        assert_eq!(mark2.anchor_delta, -2);
    }

    #[test]
    fn test_mark_without_base() {
        let data = gpos_table(vec![lookup(4, 0, vec![mark_base_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[20, 2, 21]);
        // Glyph 2 is a base but has no anchors in the subtable
        assert!(!apply_first_lookup(&gpos, &mut line));
        assert!(!line.get(0).has_offsets());
        assert!(!line.get(2).has_offsets());
    }

    #[test]
    fn test_mark_to_ligature_uses_last_component() {
        let mark_array = Table::new().u16(1).u16(0).offset16(anchor(0, 500));
        let ligature_attach = Table::new()
            .u16(3)
            .offset16(anchor(100, 600))
            .offset16(anchor(400, 600))
            .null16();
        let ligature_array = Table::new().u16(1).offset16(ligature_attach);
        let subtable = Table::new()
            .u16(1)
            .offset16(coverage(&[20]))
            .offset16(coverage(&[10]))
            .u16(1)
            .offset16(mark_array)
            .offset16(ligature_array);
        let data = gpos_table(vec![lookup(5, 0, vec![subtable])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[10, 20]);
        assert!(apply_first_lookup(&gpos, &mut line));
        let mark = line.get(1);
        assert_eq!((mark.x_placement, mark.y_placement), (400, 100));
        assert_eq!(mark.anchor_delta, -1);
    }

    fn mark_mark_subtable() -> Table {
        let mark1_array = Table::new().u16(1).u16(0).offset16(anchor(0, 0));
        let mark2_array = Table::new().u16(1).offset16(anchor(10, 300));
        Table::new()
            .u16(1)
            .offset16(coverage(&[21]))
            .offset16(coverage(&[20]))
            .u16(1)
            .offset16(mark1_array)
            .offset16(mark2_array)
    }

    #[test]
    fn test_mark_to_mark() {
        let data = gpos_table(vec![lookup(6, 0, vec![mark_mark_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[1, 20, 22, 21]);
        assert!(apply_first_lookup(&gpos, &mut line));
        let mark = line.get(3);
        assert_eq!((mark.x_placement, mark.y_placement), (10, 300));
        assert_eq!(mark.anchor_delta, -2);
    }

    #[test]
    fn test_mark_to_mark_stops_at_base() {
        let data = gpos_table(vec![lookup(6, 0, vec![mark_mark_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[20, 1, 21]);
        assert!(!apply_first_lookup(&gpos, &mut line));
        assert!(!line.get(2).has_offsets());
    }

    #[test]
    fn test_mark_to_mark_stops_at_ligature() {
        let data = gpos_table(vec![lookup(6, 0, vec![mark_mark_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let mut line = line_of(&[20, 10, 21]);
        assert!(!apply_first_lookup(&gpos, &mut line));
        assert!(!line.get(2).has_offsets());
    }

    #[test]
    fn test_mark_to_mark_passes_over_flagged_marks() {
        // Glyph 35 has no GDEF class but is flagged as a mark
        let data = gpos_table(vec![lookup(6, 0, vec![mark_mark_subtable()])]);
        let gpos = read_gpos(&data, 1000);
        let glyphs = vec![
            Glyph::new(20, 500, None),
            Glyph::new(35, 500, None).with_mark(true),
            Glyph::new(21, 500, None),
        ];
        let mut line = GlyphLine::new(glyphs);
        assert!(apply_first_lookup(&gpos, &mut line));
        assert_eq!(line.get(2).anchor_delta, -2);
        assert_eq!(line.get(1).anchor_delta, 0);
    }

    #[test]
    fn test_mark_class_out_of_range() {
        let mark_array = Table::new().u16(1).u16(1).offset16(anchor(0, 0));
        let base_array = Table::new().u16(1).offset16(anchor(0, 0));
        let subtable = Table::new()
            .u16(1)
            .offset16(coverage(&[20]))
            .offset16(coverage(&[1]))
            .u16(1)
            .offset16(mark_array)
            .offset16(base_array);
        let data = gpos_table(vec![lookup(4, 0, vec![subtable])]);
        let err = GlyphPositioningTableReader::new(&data, None, Arc::new(GlyphMap::default()), 1000)
            .err()
            .unwrap();
        assert_eq!(err.cause, ParseError::BadIndex);
    }

    #[test]
    fn test_context_pos_formats_1_and_3_are_dropped() {
        let format1 = Table::new().u16(1).offset16(coverage(&[1])).u16(0);
        let data = gpos_table(vec![lookup(7, 0, vec![format1])]);
        let gpos = read_gpos(&data, 1000);
        match &gpos.lookup_table(0).unwrap().subtables {
            PosLookup::ContextPos(subtables) => assert!(subtables.is_empty()),
            other => panic!("unexpected lookup {:?}", other),
        }
        let mut line = line_of(&[1, 2]);
        assert!(!apply_first_lookup(&gpos, &mut line));
    }

    #[test]
    fn test_cursive_pos_is_unsupported() {
        let subtable = Table::new().u16(1).offset16(coverage(&[1])).u16(0);
        let data = gpos_table(vec![lookup(3, 0, vec![subtable])]);
        let gpos = read_gpos(&data, 1000);
        assert_eq!(gpos.lookup_count(), 1);
        assert!(gpos.lookup_table(0).is_none());
    }
}
