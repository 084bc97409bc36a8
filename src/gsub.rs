//! Glyph substitution (`GSUB`) lookups.
//!
//! Subtables are merged per lookup into glyph-keyed maps when the table is read. Where more
//! than one subtable covers a glyph the first one wins, except for ligatures, where the
//! candidates of later subtables are tried after those of earlier ones.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gsub>

use rustc_hash::FxHashMap;
use tinyvec::TinyVec;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::binary::U16Be;
use crate::context::{
    apply_context, next_glyph, read_context_subtables, ChainedSequenceContext, ContextTable,
    GlyphSource, LookupFlag, SequenceContext,
};
use crate::error::ParseError;
use crate::glyph_line::GlyphLine;
use crate::layout::{
    ApplyContext, Coverage, LayoutTableReader, LayoutTableType, LookupTable, GSUB,
};
use crate::tag;

/// A parsed `GSUB` table.
pub type GlyphSubstitutionTableReader = LayoutTableReader<GSUB>;

/// The decoded subtables of a GSUB lookup.
#[derive(Debug)]
pub enum SubstLookup {
    /// Type 1: glyph to replacement glyph.
    SingleSubst(FxHashMap<u16, u16>),
    /// Type 2: glyph to the sequence replacing it.
    MultipleSubst(FxHashMap<u16, Vec<u16>>),
    /// Type 3: glyph to its alternates.
    AlternateSubst(FxHashMap<u16, Vec<u16>>),
    /// Type 4: first component to the ligatures starting with it, in table order.
    LigatureSubst(FxHashMap<u16, Vec<Ligature>>),
    /// Type 5.
    ContextSubst(Vec<ContextTable>),
    /// Type 6.
    ChainContextSubst(Vec<ContextTable>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ligature {
    pub ligature_glyph: u16,
    /// The components after the first.
    pub component_glyphs: TinyVec<[u16; 4]>,
}

impl ReadBinary for Ligature {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ligature_glyph = ctxt.read_u16be()?;
        let component_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(component_count > 0)?;
        let component_glyphs = ctxt
            .read_array::<U16Be>(component_count - 1)?
            .iter()
            .collect();
        Ok(Ligature {
            ligature_glyph,
            component_glyphs,
        })
    }
}

impl Ligature {
    /// Whether the glyphs after `line.idx` that `lookup_flag` does not skip are the components.
    pub fn matches<S: GlyphSource + ?Sized>(
        &self,
        source: &S,
        lookup_flag: LookupFlag,
        line: &GlyphLine,
    ) -> bool {
        let mut index = line.idx;
        for &component in &self.component_glyphs {
            match next_glyph(source, line, lookup_flag, index) {
                Some(next) if line.get(next).code == component => index = next,
                _ => return false,
            }
        }
        true
    }
}

impl LayoutTableType for GSUB {
    type Lookup = SubstLookup;

    const TABLE_TAG: u32 = tag::GSUB;
    const EXTENSION_LOOKUP_TYPE: u16 = 7;

    fn read_lookup(
        lookup_type: u16,
        subtables: &[ReadScope<'_>],
        _units_per_em: u16,
    ) -> Result<Option<SubstLookup>, ParseError> {
        let lookup = match lookup_type {
            1 => {
                let mut substitutions = FxHashMap::default();
                for &subtable in subtables {
                    read_single_subst(subtable, &mut substitutions)?;
                }
                SubstLookup::SingleSubst(substitutions)
            }
            2 => SubstLookup::MultipleSubst(read_sequence_substs(subtables)?),
            3 => SubstLookup::AlternateSubst(read_sequence_substs(subtables)?),
            4 => {
                let mut ligatures = FxHashMap::default();
                for &subtable in subtables {
                    read_ligature_subst(subtable, &mut ligatures)?;
                }
                SubstLookup::LigatureSubst(ligatures)
            }
            5 => SubstLookup::ContextSubst(read_context_subtables::<SequenceContext>(subtables)?),
            6 => SubstLookup::ChainContextSubst(read_context_subtables::<ChainedSequenceContext>(
                subtables,
            )?),
            _ => return Ok(None),
        };
        Ok(Some(lookup))
    }

    fn transform_one(
        lookup: &LookupTable<SubstLookup>,
        ctxt: ApplyContext<'_, GSUB>,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError> {
        if line.idx >= line.end {
            return Ok(false);
        }
        let reader = ctxt.reader();
        let lookup_flag = lookup.lookup_flag;
        let changed = match &lookup.subtables {
            SubstLookup::ContextSubst(subtables) | SubstLookup::ChainContextSubst(subtables) => {
                return apply_context(&ctxt, lookup_flag, subtables, line);
            }
            _ if reader.is_skip(line.get(line.idx).code, lookup_flag) => false,
            SubstLookup::SingleSubst(substitutions) => singlesubst(reader, substitutions, line),
            SubstLookup::MultipleSubst(sequences) => multiplesubst(reader, sequences, line),
            SubstLookup::AlternateSubst(alternates) => alternatesubst(reader, alternates, line),
            SubstLookup::LigatureSubst(ligatures) => {
                ligaturesubst(reader, ligatures, lookup_flag, line)
            }
        };
        line.idx += 1;
        Ok(changed)
    }
}

fn read_single_subst(
    scope: ReadScope<'_>,
    substitutions: &mut FxHashMap<u16, u16>,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1 || format == 2)?;
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
    if format == 1 {
        let delta_glyph_id = ctxt.read_i16be()?;
        for &glyph in coverage.glyphs() {
            // Addition is modulo 65536.
            substitutions
                .entry(glyph)
                .or_insert_with(|| glyph.wrapping_add_signed(delta_glyph_id));
        }
    } else {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        let substitutes = ctxt.read_array::<U16Be>(glyph_count)?;
        for (&glyph, substitute) in coverage.glyphs().iter().zip(substitutes.iter()) {
            substitutions.entry(glyph).or_insert(substitute);
        }
    }
    Ok(())
}

// Multiple and alternate substitution subtables share a layout: a coverage and, per covered
// glyph, an offset to a list of glyphs.
fn read_sequence_substs(
    subtables: &[ReadScope<'_>],
) -> Result<FxHashMap<u16, Vec<u16>>, ParseError> {
    let mut sequences = FxHashMap::default();
    for &scope in subtables {
        let mut ctxt = scope.ctxt();
        let format = ctxt.read_u16be()?;
        ctxt.check_format(format, format == 1)?;
        let coverage_offset = usize::from(ctxt.read_u16be()?);
        let sequence_count = usize::from(ctxt.read_u16be()?);
        let sequence_offsets = ctxt.read_array::<U16Be>(sequence_count)?;
        let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
        for (&glyph, sequence_offset) in coverage.glyphs().iter().zip(sequence_offsets.iter()) {
            if sequences.contains_key(&glyph) {
                continue;
            }
            let mut sequence_ctxt = scope.offset(usize::from(sequence_offset)).ctxt();
            let glyph_count = usize::from(sequence_ctxt.read_u16be()?);
            let glyphs = sequence_ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
            sequences.insert(glyph, glyphs);
        }
    }
    Ok(sequences)
}

fn read_ligature_subst(
    scope: ReadScope<'_>,
    ligatures: &mut FxHashMap<u16, Vec<Ligature>>,
) -> Result<(), ParseError> {
    let mut ctxt = scope.ctxt();
    let format = ctxt.read_u16be()?;
    ctxt.check_format(format, format == 1)?;
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let ligature_set_count = usize::from(ctxt.read_u16be()?);
    let ligature_set_offsets = ctxt.read_array::<U16Be>(ligature_set_count)?;
    let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
    for (&glyph, ligature_set_offset) in coverage.glyphs().iter().zip(ligature_set_offsets.iter())
    {
        let ligature_set_scope = scope.offset(usize::from(ligature_set_offset));
        let mut ligature_set_ctxt = ligature_set_scope.ctxt();
        let ligature_count = usize::from(ligature_set_ctxt.read_u16be()?);
        let ligature_offsets = ligature_set_ctxt.read_array::<U16Be>(ligature_count)?;
        let candidates = ligatures.entry(glyph).or_default();
        for ligature_offset in &ligature_offsets {
            let ligature = ligature_set_scope
                .offset(usize::from(ligature_offset))
                .read::<Ligature>()?;
            candidates.push(ligature);
        }
    }
    Ok(())
}

fn singlesubst_would_apply(substitutions: &FxHashMap<u16, u16>, glyph: u16) -> Option<u16> {
    substitutions
        .get(&glyph)
        .copied()
        .filter(|&output_glyph| output_glyph != glyph)
}

fn singlesubst<S: GlyphSource + ?Sized>(
    source: &S,
    substitutions: &FxHashMap<u16, u16>,
    line: &mut GlyphLine,
) -> bool {
    match singlesubst_would_apply(substitutions, line.get(line.idx).code) {
        Some(output_glyph) => {
            line.substitute_one_to_one(source, output_glyph);
            true
        }
        None => false,
    }
}

fn multiplesubst_would_apply(sequences: &FxHashMap<u16, Vec<u16>>, glyph: u16) -> Option<&[u16]> {
    sequences
        .get(&glyph)
        .map(Vec::as_slice)
        // Deleting a glyph with an empty sequence is not allowed.
        .filter(|sequence| !sequence.is_empty())
}

fn multiplesubst<S: GlyphSource + ?Sized>(
    source: &S,
    sequences: &FxHashMap<u16, Vec<u16>>,
    line: &mut GlyphLine,
) -> bool {
    match multiplesubst_would_apply(sequences, line.get(line.idx).code) {
        Some(sequence) => {
            line.substitute_one_to_many(source, sequence);
            true
        }
        None => false,
    }
}

fn alternatesubst_would_apply(alternates: &FxHashMap<u16, Vec<u16>>, glyph: u16) -> Option<u16> {
    // Always the first alternate.
    alternates
        .get(&glyph)?
        .first()
        .copied()
        .filter(|&alternate| alternate != glyph)
}

fn alternatesubst<S: GlyphSource + ?Sized>(
    source: &S,
    alternates: &FxHashMap<u16, Vec<u16>>,
    line: &mut GlyphLine,
) -> bool {
    match alternatesubst_would_apply(alternates, line.get(line.idx).code) {
        Some(alternate) => {
            line.substitute_one_to_one(source, alternate);
            true
        }
        None => false,
    }
}

fn ligaturesubst_would_apply<'a, S: GlyphSource + ?Sized>(
    source: &S,
    ligatures: &'a FxHashMap<u16, Vec<Ligature>>,
    lookup_flag: LookupFlag,
    line: &GlyphLine,
) -> Option<&'a Ligature> {
    ligatures
        .get(&line.get(line.idx).code)?
        .iter()
        .find(|ligature| ligature.matches(source, lookup_flag, line))
}

fn ligaturesubst<S: GlyphSource + ?Sized>(
    source: &S,
    ligatures: &FxHashMap<u16, Vec<Ligature>>,
    lookup_flag: LookupFlag,
    line: &mut GlyphLine,
) -> bool {
    match ligaturesubst_would_apply(source, ligatures, lookup_flag, line) {
        Some(ligature) => {
            line.substitute_many_to_one(
                source,
                lookup_flag,
                ligature.component_glyphs.len(),
                ligature.ligature_glyph,
            );
            true
        }
        None => false,
    }
}
