//! Reading of the common OpenType layout structures shared by GSUB and GPOS, and the generic
//! table reader that resolves features and applies lookups.
//!
//! Everything is decoded eagerly when the table is read. Coverage tables become ordered glyph
//! lists, class definitions become sparse maps, and design units are converted to text space.
//! Lookup subtables are parsed by the `LayoutTableType` implementations in the `gsub` and
//! `gpos` modules.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use itertools::Itertools;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use tinyvec::tiny_vec;

use crate::binary::read::{
    ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadFrom, ReadScope,
};
use crate::binary::U16Be;
use crate::context::{GlyphSource, LookupFlag};
use crate::error::{FontReadingError, ParseError};
use crate::gdef::{self, GdefTable};
use crate::glyph::{Glyph, GlyphMap};
use crate::glyph_line::GlyphLine;
use crate::size;
use crate::tag::{self, DisplayTag};

/// Design units are scaled so that one em is this many text space units.
pub const TEXT_SPACE_UNITS: i32 = 1000;

/// Deepest chain of contextual lookups invoking other lookups that will be followed.
pub const MAX_NESTING_LEVEL: usize = 64;

// Coverage indices are 16-bit.
const MAX_COVERAGE_GLYPHS: usize = 1 << 16;

/// Convert a value in font design units to text space.
pub fn to_text_space(value: i16, units_per_em: u16) -> i32 {
    i32::from(value) * TEXT_SPACE_UNITS / i32::from(units_per_em)
}

/// Type-level marker for the glyph substitution table.
pub enum GSUB {}

/// Type-level marker for the glyph positioning table.
pub enum GPOS {}

/// The parts that differ between GSUB and GPOS.
pub trait LayoutTableType: Sized {
    /// The decoded subtables of one lookup.
    type Lookup: fmt::Debug;

    /// Tag of the table, used in errors.
    const TABLE_TAG: u32;

    /// The lookup type whose subtables point at subtables of another type.
    const EXTENSION_LOOKUP_TYPE: u16;

    /// Parse the subtables of a lookup of `lookup_type`.
    ///
    /// Returns `Ok(None)` for lookup types that are not supported.
    fn read_lookup(
        lookup_type: u16,
        subtables: &[ReadScope<'_>],
        units_per_em: u16,
    ) -> Result<Option<Self::Lookup>, ParseError>;

    /// Apply `lookup` at `line.idx`, advancing `line.idx` past what was consumed.
    fn transform_one(
        lookup: &LookupTable<Self::Lookup>,
        ctxt: ApplyContext<'_, Self>,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError>;
}

/// A parsed lookup.
#[derive(Debug)]
pub struct LookupTable<L> {
    /// Position of this lookup in the lookup list.
    pub lookup_index: usize,
    /// The lookup type after extension lookups have been resolved.
    pub lookup_type: u16,
    /// Flags controlling which glyphs the lookup skips.
    pub lookup_flag: LookupFlag,
    /// The decoded subtables.
    pub subtables: L,
}

/// A script and the languages it defines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptRecord {
    /// Script tag, such as `latn`.
    pub script_tag: u32,
    /// Language system used when no specific language matches.
    pub opt_default_language: Option<LanguageRecord>,
    /// Language systems with their own tags.
    pub language_records: Vec<LanguageRecord>,
}

/// A language system: the features that apply for one language of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageRecord {
    /// Language tag. The default language system of a script is tagged `DFLT`.
    pub language_tag: u32,
    /// Index of a feature that is always applied.
    pub opt_required_feature: Option<u16>,
    /// Indices into the feature list.
    pub feature_indices: Vec<u16>,
}

/// A feature and the lookups that implement it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRecord {
    /// Feature tag, such as `liga`.
    pub feature_tag: u32,
    /// Indices into the lookup list, in the order the font lists them.
    pub lookup_indices: Vec<u16>,
}

/// Parsed GSUB or GPOS table together with the font data needed to apply it.
pub struct LayoutTableReader<T: LayoutTableType> {
    script_records: Vec<ScriptRecord>,
    feature_records: Vec<FeatureRecord>,
    lookups: Vec<Option<LookupTable<T::Lookup>>>,
    opt_gdef_table: Option<Arc<GdefTable>>,
    glyphs: Arc<GlyphMap>,
    units_per_em: u16,
}

/// State for one application of a lookup, including any lookups it invokes.
pub struct ApplyContext<'a, T: LayoutTableType> {
    reader: &'a LayoutTableReader<T>,
    depth: usize,
}

impl<T: LayoutTableType> LayoutTableReader<T> {
    /// Read a GSUB or GPOS table from `data`, which starts at the table header.
    pub fn new(
        data: &[u8],
        opt_gdef_table: Option<Arc<GdefTable>>,
        glyphs: Arc<GlyphMap>,
        units_per_em: u16,
    ) -> Result<Self, FontReadingError> {
        Self::read_table(ReadScope::new(data), opt_gdef_table, glyphs, units_per_em)
            .map_err(|cause| FontReadingError::new(T::TABLE_TAG, cause))
    }

    fn read_table(
        scope: ReadScope<'_>,
        opt_gdef_table: Option<Arc<GdefTable>>,
        glyphs: Arc<GlyphMap>,
        units_per_em: u16,
    ) -> Result<Self, ParseError> {
        if units_per_em == 0 {
            return Err(ParseError::BadValue);
        }

        let mut ctxt = scope.ctxt();
        let _version = ctxt.read_u32be()?;
        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);

        let script_records = match script_list_offset {
            0 => Vec::new(),
            offset => read_record_list::<ScriptRecord>(scope.offset(offset))?,
        };
        let feature_records = match feature_list_offset {
            0 => Vec::new(),
            offset => read_record_list::<FeatureRecord>(scope.offset(offset))?,
        };
        let lookups = match lookup_list_offset {
            0 => Vec::new(),
            offset => read_lookup_list::<T>(scope.offset(offset), units_per_em)?,
        };

        Ok(LayoutTableReader {
            script_records,
            feature_records,
            lookups,
            opt_gdef_table,
            glyphs,
            units_per_em,
        })
    }

    /// Units per em of the font, as supplied at construction.
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// The GDEF table supplied at construction.
    pub fn gdef_table(&self) -> Option<&GdefTable> {
        self.opt_gdef_table.as_deref()
    }

    /// The GDEF class of `glyph`, or 0 when unknown.
    pub fn glyph_class(&self, glyph: u16) -> u16 {
        gdef::glyph_class(self.gdef_table(), glyph)
    }

    /// All scripts defined by the table.
    pub fn script_records(&self) -> &[ScriptRecord] {
        &self.script_records
    }

    /// All features defined by the table.
    pub fn feature_records(&self) -> &[FeatureRecord] {
        &self.feature_records
    }

    /// Number of entries in the lookup list, including unsupported ones.
    pub fn lookup_count(&self) -> usize {
        self.lookups.len()
    }

    /// The lookup at `lookup_index`, if it exists and is of a supported type.
    pub fn lookup_table(&self, lookup_index: usize) -> Option<&LookupTable<T::Lookup>> {
        self.lookups.get(lookup_index)?.as_ref()
    }

    /// Find the first script of `script_tags` defined by the font, falling back to `DFLT`.
    pub fn find_script_or_default(&self, script_tags: &[u32]) -> Option<&ScriptRecord> {
        script_tags
            .iter()
            .find_map(|&script_tag| self.find_script(script_tag))
            .or_else(|| self.find_script(tag::DFLT))
    }

    fn find_script(&self, script_tag: u32) -> Option<&ScriptRecord> {
        self.script_records
            .iter()
            .find(|script_record| script_record.script_tag == script_tag)
    }

    /// Resolve the language system for a script preference list and an optional language.
    ///
    /// The language falls back to the script's default language system.
    pub fn language_record(
        &self,
        script_tags: &[u32],
        opt_lang_tag: Option<u32>,
    ) -> Option<&LanguageRecord> {
        self.find_script_or_default(script_tags)?
            .find_language_or_default(opt_lang_tag)
    }

    /// The features of the resolved language system, in language system order.
    ///
    /// Feature indices that are out of range are ignored. Returns `None` if no language system
    /// could be resolved.
    pub fn features(
        &self,
        script_tags: &[u32],
        opt_lang_tag: Option<u32>,
    ) -> Option<Vec<&FeatureRecord>> {
        let language = self.language_record(script_tags, opt_lang_tag)?;
        let features = language
            .feature_indices
            .iter()
            .filter_map(|&index| self.feature_records.get(usize::from(index)))
            .collect();
        Some(features)
    }

    /// The required feature of the resolved language system, if it has one.
    pub fn required_feature(
        &self,
        script_tags: &[u32],
        opt_lang_tag: Option<u32>,
    ) -> Option<&FeatureRecord> {
        let index = self
            .language_record(script_tags, opt_lang_tag)?
            .opt_required_feature?;
        self.feature_records.get(usize::from(index))
    }

    /// The lookups of `features`, de-duplicated and in lookup list order.
    pub fn lookups(&self, features: &[&FeatureRecord]) -> Vec<&LookupTable<T::Lookup>> {
        let mut lookup_indices = tiny_vec!([u16; 64]);
        for feature in features {
            lookup_indices.extend(feature.lookup_indices.iter().copied());
        }
        lookup_indices.sort_unstable();
        lookup_indices
            .into_iter()
            .dedup()
            .filter_map(|index| self.lookup_table(usize::from(index)))
            .collect()
    }

    /// The lookups of one feature, in the order the feature lists them.
    pub fn feature_lookups(&self, feature: &FeatureRecord) -> Vec<&LookupTable<T::Lookup>> {
        feature
            .lookup_indices
            .iter()
            .filter_map(|&index| self.lookup_table(usize::from(index)))
            .collect()
    }

    /// Apply `lookup` at `line.idx`.
    pub fn transform_one(
        &self,
        lookup: &LookupTable<T::Lookup>,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError> {
        let ctxt = ApplyContext {
            reader: self,
            depth: 0,
        };
        T::transform_one(lookup, ctxt, line)
    }

    /// Apply `lookup` to every position of the window of `line`.
    pub fn transform_line(
        &self,
        lookup: &LookupTable<T::Lookup>,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError> {
        let mut changed = false;
        line.idx = line.start;
        while line.idx < line.end && line.idx >= line.start {
            changed = self.transform_one(lookup, line)? || changed;
        }
        Ok(changed)
    }
}

impl<T: LayoutTableType> GlyphSource for LayoutTableReader<T> {
    fn glyph(&self, glyph_id: u16) -> Glyph {
        match self.glyphs.get(&glyph_id) {
            Some(glyph) => glyph.clone(),
            None => Glyph::new(glyph_id, 0, None),
        }
    }

    fn is_skip(&self, glyph_id: u16, lookup_flag: LookupFlag) -> bool {
        gdef::is_skip(self.gdef_table(), glyph_id, lookup_flag)
    }
}

impl<'a, T: LayoutTableType> ApplyContext<'a, T> {
    /// The reader the lookup being applied belongs to.
    pub fn reader(&self) -> &'a LayoutTableReader<T> {
        self.reader
    }

    /// Apply the lookup at `lookup_index` at `line.idx`, one nesting level deeper.
    pub fn apply_nested(
        &self,
        lookup_index: u16,
        line: &mut GlyphLine,
    ) -> Result<bool, ParseError> {
        let depth = self.depth + 1;
        if depth > MAX_NESTING_LEVEL {
            return Err(ParseError::LimitExceeded);
        }
        match self.reader.lookup_table(usize::from(lookup_index)) {
            Some(lookup) => {
                let ctxt = ApplyContext {
                    reader: self.reader,
                    depth,
                };
                T::transform_one(lookup, ctxt, line)
            }
            None => {
                warn!(
                    "'{}' lookup record refers to missing lookup {}",
                    DisplayTag(T::TABLE_TAG),
                    lookup_index
                );
                Ok(false)
            }
        }
    }
}

impl ScriptRecord {
    /// The language system tagged `lang_tag`, or the default one.
    pub fn find_language_or_default(&self, opt_lang_tag: Option<u32>) -> Option<&LanguageRecord> {
        opt_lang_tag
            .and_then(|lang_tag| {
                self.language_records
                    .iter()
                    .find(|language| language.language_tag == lang_tag)
            })
            .or(self.opt_default_language.as_ref())
    }
}

/// Keep the features of `features` whose tag is in `feature_tags`, preserving order.
pub fn specific_features<'b>(
    features: &[&'b FeatureRecord],
    feature_tags: &[u32],
) -> Vec<&'b FeatureRecord> {
    features
        .iter()
        .copied()
        .filter(|feature| feature_tags.contains(&feature.feature_tag))
        .collect()
}

// A list of tag + offset records, each offset relative to the start of the list.
fn read_record_list<'a, R>(scope: ReadScope<'a>) -> Result<Vec<R>, ParseError>
where
    R: ReadFixedSizeDep<Args<'a> = ReadScope<'a>, HostType<'a> = R>,
{
    let mut ctxt = scope.ctxt();
    let count = usize::from(ctxt.read_u16be()?);
    ctxt.read_array_dep::<R>(count, scope)?.read_to_vec()
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: ReadScope<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_tag()?;
        let script_offset = usize::from(ctxt.read_u16be()?);
        let script_scope = scope.offset(script_offset);

        let mut ctxt = script_scope.ctxt();
        let default_language_offset = usize::from(ctxt.read_u16be()?);
        let language_count = usize::from(ctxt.read_u16be()?);
        let language_records = ctxt
            .read_array_dep::<LanguageRecord>(language_count, script_scope)?
            .read_to_vec()?;
        let opt_default_language = match default_language_offset {
            0 => None,
            offset => Some(read_language_system(
                script_scope.offset(offset),
                tag::DFLT,
            )?),
        };

        Ok(ScriptRecord {
            script_tag,
            opt_default_language,
            language_records,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: ReadScope<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinaryDep for LanguageRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LanguageRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: ReadScope<'a>) -> Result<Self, ParseError> {
        let language_tag = ctxt.read_tag()?;
        let language_offset = usize::from(ctxt.read_u16be()?);
        read_language_system(scope.offset(language_offset), language_tag)
    }
}

impl ReadFixedSizeDep for LanguageRecord {
    fn size(_scope: ReadScope<'_>) -> usize {
        size::U32 + size::U16
    }
}

fn read_language_system(
    scope: ReadScope<'_>,
    language_tag: u32,
) -> Result<LanguageRecord, ParseError> {
    let mut ctxt = scope.ctxt();
    let _lookup_order = ctxt.read_u16be()?;
    let required_feature_index = ctxt.read_u16be()?;
    let feature_index_count = usize::from(ctxt.read_u16be()?);
    let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
    let opt_required_feature = match required_feature_index {
        0xFFFF => None,
        index => Some(index),
    };
    Ok(LanguageRecord {
        language_tag,
        opt_required_feature,
        feature_indices,
    })
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: ReadScope<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_tag()?;
        let feature_offset = usize::from(ctxt.read_u16be()?);

        let mut ctxt = scope.offset(feature_offset).ctxt();
        let _feature_params = ctxt.read_u16be()?;
        let lookup_index_count = usize::from(ctxt.read_u16be()?);
        let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
        Ok(FeatureRecord {
            feature_tag,
            lookup_indices,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: ReadScope<'_>) -> usize {
        size::U32 + size::U16
    }
}

fn read_lookup_list<T: LayoutTableType>(
    scope: ReadScope<'_>,
    units_per_em: u16,
) -> Result<Vec<Option<LookupTable<T::Lookup>>>, ParseError> {
    let mut ctxt = scope.ctxt();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;

    let mut lookups = Vec::with_capacity(lookup_count);
    for (lookup_index, lookup_offset) in lookup_offsets.iter().enumerate() {
        if lookup_offset == 0 {
            debug!(
                "'{}' lookup {} has a null offset",
                DisplayTag(T::TABLE_TAG),
                lookup_index
            );
            lookups.push(None);
            continue;
        }
        let lookup_scope = scope.offset(usize::from(lookup_offset));
        lookups.push(read_lookup::<T>(lookup_scope, lookup_index, units_per_em)?);
    }
    Ok(lookups)
}

fn read_lookup<T: LayoutTableType>(
    scope: ReadScope<'_>,
    lookup_index: usize,
    units_per_em: u16,
) -> Result<Option<LookupTable<T::Lookup>>, ParseError> {
    let mut ctxt = scope.ctxt();
    let mut lookup_type = ctxt.read_u16be()?;
    let lookup_flag = LookupFlag(ctxt.read_u16be()?);
    let subtable_count = usize::from(ctxt.read_u16be()?);
    let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
    let mut subtables = subtable_offsets
        .iter()
        .map(|offset| scope.offset(usize::from(offset)))
        .collect::<Vec<_>>();

    if lookup_type == T::EXTENSION_LOOKUP_TYPE {
        let mut opt_extension_type = None;
        for subtable in subtables.iter_mut() {
            let extension = subtable.read::<ExtensionSubtable>()?;
            if extension.extension_lookup_type == T::EXTENSION_LOOKUP_TYPE {
                return Err(ParseError::BadValue);
            }
            match opt_extension_type {
                Some(extension_type) if extension_type != extension.extension_lookup_type => {
                    return Err(ParseError::BadValue)
                }
                _ => opt_extension_type = Some(extension.extension_lookup_type),
            }
            *subtable = subtable.offset(extension.extension_offset);
        }
        if let Some(extension_type) = opt_extension_type {
            lookup_type = extension_type;
        }
    }

    match T::read_lookup(lookup_type, &subtables, units_per_em)? {
        Some(subtables) => Ok(Some(LookupTable {
            lookup_index,
            lookup_type,
            lookup_flag,
            subtables,
        })),
        None => {
            warn!(
                "'{}' lookup {} has unsupported type {}",
                DisplayTag(T::TABLE_TAG),
                lookup_index,
                lookup_type
            );
            Ok(None)
        }
    }
}

/// Extension subtable: redirects to a subtable of another lookup type through a 32-bit offset.
struct ExtensionSubtable {
    extension_lookup_type: u16,
    extension_offset: usize,
}

impl ReadBinary for ExtensionSubtable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let format = ctxt.read_u16be()?;
        ctxt.check_format(format, format == 1)?;
        let extension_lookup_type = ctxt.read_u16be()?;
        let extension_offset = usize::try_from(ctxt.read_u32be()?)?;
        Ok(ExtensionSubtable {
            extension_lookup_type,
            extension_offset,
        })
    }
}

/// A coverage table decoded to the ordered list of glyphs it covers.
///
/// The position of a glyph in the list is its coverage index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    glyphs: Vec<u16>,
    indices: FxHashMap<u16, u16>,
}

struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let format = ctxt.read_u16be()?;
        match format {
            1 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Coverage::from_glyphs(glyphs)
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                let mut ranges = ctxt
                    .read_array::<CoverageRangeRecord>(range_count)?
                    .to_vec();
                for range in &ranges {
                    ctxt.check(range.start_glyph <= range.end_glyph)?;
                }
                ranges.sort_by_key(|range| range.start_coverage_index);
                let mut glyph_count = 0;
                for range in &ranges {
                    glyph_count += usize::from(range.end_glyph - range.start_glyph) + 1;
                    ctxt.check(glyph_count <= MAX_COVERAGE_GLYPHS)?;
                }
                let glyphs = ranges
                    .iter()
                    .flat_map(|range| range.start_glyph..=range.end_glyph)
                    .collect();
                Coverage::from_glyphs(glyphs)
            }
            _ => Err(ParseError::BadFormat(format)),
        }
    }
}

impl Coverage {
    /// Build a coverage from glyphs in coverage index order.
    ///
    /// Fails with `ParseError::BadValue` if there are more glyphs than 16-bit coverage indices.
    pub fn from_glyphs(glyphs: Vec<u16>) -> Result<Coverage, ParseError> {
        let mut indices = FxHashMap::default();
        for (index, &glyph) in glyphs.iter().enumerate() {
            indices.entry(glyph).or_insert(u16::try_from(index)?);
        }
        Ok(Coverage { glyphs, indices })
    }

    /// The covered glyphs in coverage index order.
    pub fn glyphs(&self) -> &[u16] {
        &self.glyphs
    }

    /// Number of glyphs covered.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// The coverage index of `glyph`, if covered.
    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        self.indices.get(&glyph).copied()
    }

    /// Whether `glyph` is covered.
    pub fn contains(&self, glyph: u16) -> bool {
        self.indices.contains_key(&glyph)
    }
}

/// A class definition table decoded to a sparse map. Glyphs not in the map are class 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassDef {
    classes: FxHashMap<u16, u16>,
}

struct ClassRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let format = ctxt.read_u16be()?;
        let mut classes = FxHashMap::default();
        match format {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let class_values = ctxt.read_array::<U16Be>(glyph_count)?;
                for (glyph, class_value) in (start_glyph..=u16::MAX).zip(class_values.iter()) {
                    if class_value != 0 {
                        classes.insert(glyph, class_value);
                    }
                }
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_ranges = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)
                    // In the lookahead classdef table for a chaining context substitution
                    // (Format 2; PSTS feature), the Mangal font specifies a class_range_count that
                    // exceeds the number of elements that can be contained in the class_range_array.
                    // We use this hack as a fallback to cap the length based on available bytes
                    .or_else(|_| ctxt.read_array_upto_hack::<ClassRangeRecord>(class_range_count))?;
                // Where ranges overlap the first range listed wins.
                for range in &class_ranges {
                    if range.class_value == 0 {
                        continue;
                    }
                    for glyph in range.start_glyph..=range.end_glyph {
                        classes.entry(glyph).or_insert(range.class_value);
                    }
                }
            }
            _ => return Err(ParseError::BadFormat(format)),
        }
        Ok(ClassDef { classes })
    }
}

impl ClassDef {
    /// Build a class definition from (glyph, class) pairs.
    pub fn from_classes(classes: impl IntoIterator<Item = (u16, u16)>) -> ClassDef {
        let classes = classes
            .into_iter()
            .filter(|&(_glyph, class)| class != 0)
            .collect();
        ClassDef { classes }
    }

    /// The class of `glyph`, 0 if it is not assigned one.
    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        self.classes.get(&glyph).copied().unwrap_or(0)
    }

    /// Whether no glyph is assigned a non-zero class.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

bitflags! {
    /// Which fields are present in a value record.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ValueFormat: u16 {
        /// Horizontal placement adjustment.
        const X_PLACEMENT = 0x0001;
        /// Vertical placement adjustment.
        const Y_PLACEMENT = 0x0002;
        /// Horizontal advance adjustment.
        const X_ADVANCE = 0x0004;
        /// Vertical advance adjustment.
        const Y_ADVANCE = 0x0008;
        /// Device table offset for horizontal placement.
        const X_PLACEMENT_DEVICE = 0x0010;
        /// Device table offset for vertical placement.
        const Y_PLACEMENT_DEVICE = 0x0020;
        /// Device table offset for horizontal advance.
        const X_ADVANCE_DEVICE = 0x0040;
        /// Device table offset for vertical advance.
        const Y_ADVANCE_DEVICE = 0x0080;
    }
}

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let value_format = ctxt.read_u16be()?;
        ValueFormat::from_bits(value_format).ok_or(ParseError::BadValue)
    }
}

impl ValueFormat {
    /// Size in bytes of a value record of this format.
    pub fn size(self) -> usize {
        self.bits().count_ones() as usize * size::U16
    }
}

/// Positioning adjustments in text space. Device table adjustments are not applied.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueRecord {
    /// Horizontal placement adjustment.
    pub x_placement: i32,
    /// Vertical placement adjustment.
    pub y_placement: i32,
    /// Horizontal advance adjustment.
    pub x_advance: i32,
    /// Vertical advance adjustment.
    pub y_advance: i32,
}

impl ReadBinaryDep for ValueRecord {
    type Args<'a> = (ValueFormat, u16);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format, units_per_em): (ValueFormat, u16),
    ) -> Result<Self, ParseError> {
        let mut read_value = |flag: ValueFormat| -> Result<i32, ParseError> {
            if value_format.contains(flag) {
                Ok(to_text_space(ctxt.read_i16be()?, units_per_em))
            } else {
                Ok(0)
            }
        };
        let x_placement = read_value(ValueFormat::X_PLACEMENT)?;
        let y_placement = read_value(ValueFormat::Y_PLACEMENT)?;
        let x_advance = read_value(ValueFormat::X_ADVANCE)?;
        let y_advance = read_value(ValueFormat::Y_ADVANCE)?;
        let device_offsets = value_format
            & (ValueFormat::X_PLACEMENT_DEVICE
                | ValueFormat::Y_PLACEMENT_DEVICE
                | ValueFormat::X_ADVANCE_DEVICE
                | ValueFormat::Y_ADVANCE_DEVICE);
        ctxt.skip(device_offsets.size())?;
        Ok(ValueRecord {
            x_placement,
            y_placement,
            x_advance,
            y_advance,
        })
    }
}

impl ReadFixedSizeDep for ValueRecord {
    fn size((value_format, _units_per_em): (ValueFormat, u16)) -> usize {
        value_format.size()
    }
}

/// An attachment point in text space.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Anchor {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl ReadBinaryDep for Anchor {
    type Args<'a> = u16;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, units_per_em: u16) -> Result<Self, ParseError> {
        let format = ctxt.read_u16be()?;
        match format {
            // Contour points and device tables of formats 2 and 3 are not used.
            1..=3 => {
                let x = to_text_space(ctxt.read_i16be()?, units_per_em);
                let y = to_text_space(ctxt.read_i16be()?, units_per_em);
                Ok(Anchor { x, y })
            }
            _ => Err(ParseError::BadFormat(format)),
        }
    }
}

/// Read an anchor at `offset` from `scope`, where a zero offset means no anchor.
pub(crate) fn read_anchor(
    scope: &ReadScope<'_>,
    offset: u16,
    units_per_em: u16,
) -> Result<Option<Anchor>, ParseError> {
    match offset {
        0 => Ok(None),
        offset => Ok(Some(
            scope.offset(usize::from(offset)).read_dep::<Anchor>(units_per_em)?,
        )),
    }
}

/// Read the coverage tables at `offsets`, shared so contextual rules can refer to them.
pub(crate) fn read_coverages<'a>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Arc<Coverage>>, ParseError> {
    let mut coverages = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let coverage = scope.offset(usize::from(offset)).read::<Coverage>()?;
        coverages.push(Arc::new(coverage));
    }
    Ok(coverages)
}
