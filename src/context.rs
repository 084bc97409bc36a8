//! Utilities for performing contextual lookup in gpos and gsub.
//!
//! Contextual subtables of all three formats, chained or not, are decoded into a list of
//! `ContextRule`s keyed by the glyph at the current position. A rule matches when each of its
//! sequences matches the glyphs found by stepping over skipped glyphs from that position. On a
//! match the rule's lookup records are applied inside a window narrowed to the matched input.

use std::sync::Arc;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U16Be;
use crate::error::ParseError;
use crate::glyph::Glyph;
use crate::glyph_line::GlyphLine;
use crate::layout::{read_coverages, ApplyContext, ClassDef, Coverage, LayoutTableType};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupFlag(pub u16);

impl LookupFlag {
    pub const RIGHT_TO_LEFT: u16 = 0x0001;
    pub const IGNORE_BASE_GLYPHS: u16 = 0x0002;
    pub const IGNORE_LIGATURES: u16 = 0x0004;
    pub const IGNORE_MARKS: u16 = 0x0008;
    pub const USE_MARK_FILTERING_SET: u16 = 0x0010;
    pub const MARK_ATTACHMENT_TYPE: u16 = 0xFF00;

    pub fn get_rtl(self) -> bool {
        (self.0 & Self::RIGHT_TO_LEFT) != 0
    }

    pub fn get_ignore_bases(self) -> bool {
        (self.0 & Self::IGNORE_BASE_GLYPHS) != 0
    }

    pub fn get_ignore_ligatures(self) -> bool {
        (self.0 & Self::IGNORE_LIGATURES) != 0
    }

    pub fn get_ignore_marks(self) -> bool {
        (self.0 & Self::IGNORE_MARKS) != 0
    }

    /// The mark attachment class marks must have to be matched, 0 for any.
    pub fn get_mark_attachment_type(self) -> u16 {
        (self.0 & Self::MARK_ATTACHMENT_TYPE) >> 8
    }
}

/// Source of glyphs for substitution and of skip decisions for matching.
pub trait GlyphSource {
    /// The font's glyph for `glyph_id`.
    fn glyph(&self, glyph_id: u16) -> Glyph;

    /// Whether a lookup with `lookup_flag` passes over `glyph_id`.
    fn is_skip(&self, glyph_id: u16, lookup_flag: LookupFlag) -> bool;
}

/// Index of the first glyph after `index`, within the window of `line`, that is not skipped.
pub fn next_glyph<S: GlyphSource + ?Sized>(
    source: &S,
    line: &GlyphLine,
    lookup_flag: LookupFlag,
    mut index: usize,
) -> Option<usize> {
    while index + 1 < line.end {
        index += 1;
        if !source.is_skip(line.get(index).code, lookup_flag) {
            return Some(index);
        }
    }
    None
}

/// Index of the first glyph before `index`, within the window of `line`, that is not skipped.
pub fn previous_glyph<S: GlyphSource + ?Sized>(
    source: &S,
    line: &GlyphLine,
    lookup_flag: LookupFlag,
    mut index: usize,
) -> Option<usize> {
    while index > line.start {
        index -= 1;
        if !source.is_skip(line.get(index).code, lookup_flag) {
            return Some(index);
        }
    }
    None
}

/// Step forward over `count` non-skipped glyphs from `index`.
pub fn nth_next_glyph<S: GlyphSource + ?Sized>(
    source: &S,
    line: &GlyphLine,
    lookup_flag: LookupFlag,
    mut index: usize,
    count: usize,
) -> Option<usize> {
    for _ in 0..count {
        index = next_glyph(source, line, lookup_flag, index)?;
    }
    Some(index)
}

/// Per-position glyph predicates of one sequence of a rule.
#[derive(Clone, Debug)]
pub enum GlyphTable {
    Empty,
    ById(Vec<u16>),
    ByClassDef(Arc<ClassDef>, Vec<u16>),
    ByCoverage(Vec<Arc<Coverage>>),
}

impl GlyphTable {
    pub fn len(&self) -> usize {
        match self {
            GlyphTable::Empty => 0,
            GlyphTable::ById(glyphs) => glyphs.len(),
            GlyphTable::ByClassDef(_, classes) => classes.len(),
            GlyphTable::ByCoverage(coverages) => coverages.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `glyph` satisfies the predicate at `position`.
    pub fn matches(&self, position: usize, glyph: u16) -> bool {
        match self {
            GlyphTable::Empty => false,
            GlyphTable::ById(glyphs) => glyphs.get(position) == Some(&glyph),
            GlyphTable::ByClassDef(classdef, classes) => {
                classes.get(position) == Some(&classdef.glyph_class_value(glyph))
            }
            GlyphTable::ByCoverage(coverages) => coverages
                .get(position)
                .is_some_and(|coverage| coverage.contains(glyph)),
        }
    }

    fn by_id(glyphs: Vec<u16>) -> GlyphTable {
        if glyphs.is_empty() {
            GlyphTable::Empty
        } else {
            GlyphTable::ById(glyphs)
        }
    }

    fn by_class(classdef: &Arc<ClassDef>, classes: Vec<u16>) -> GlyphTable {
        if classes.is_empty() {
            GlyphTable::Empty
        } else {
            GlyphTable::ByClassDef(Arc::clone(classdef), classes)
        }
    }

    fn by_coverage(coverages: Vec<Arc<Coverage>>) -> GlyphTable {
        if coverages.is_empty() {
            GlyphTable::Empty
        } else {
            GlyphTable::ByCoverage(coverages)
        }
    }
}

/// Apply the lookup at `lookup_list_index` to the glyph `sequence_index` non-skipped glyphs
/// after the start of the match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LookupRecord {
    pub sequence_index: u16,
    pub lookup_list_index: u16,
}

impl ReadFrom for LookupRecord {
    type ReadType = (U16Be, U16Be);
    fn read_from((sequence_index, lookup_list_index): (u16, u16)) -> Self {
        LookupRecord {
            sequence_index,
            lookup_list_index,
        }
    }
}

/// One rule of a contextual subtable.
///
/// `input` holds the predicates for the input positions after the first, which is matched when
/// the rule is selected. Backtrack predicates run outwards from the current position, nearest
/// first. Rules of non-chaining subtables have empty backtrack and lookahead.
#[derive(Clone, Debug)]
pub struct ContextRule {
    pub backtrack: GlyphTable,
    pub input: GlyphTable,
    pub lookahead: GlyphTable,
    pub lookup_records: Vec<LookupRecord>,
}

impl ContextRule {
    /// Number of input glyphs, including the first.
    pub fn context_length(&self) -> usize {
        self.input.len() + 1
    }

    /// Match the rule with its first input glyph at `index`, returning the index of the last
    /// input glyph.
    pub fn matches<S: GlyphSource + ?Sized>(
        &self,
        source: &S,
        lookup_flag: LookupFlag,
        line: &GlyphLine,
        index: usize,
    ) -> Option<usize> {
        let mut input_end = index;
        for position in 0..self.input.len() {
            input_end = next_glyph(source, line, lookup_flag, input_end)?;
            if !self.input.matches(position, line.get(input_end).code) {
                return None;
            }
        }

        let mut lookahead_index = input_end;
        for position in 0..self.lookahead.len() {
            lookahead_index = next_glyph(source, line, lookup_flag, lookahead_index)?;
            if !self.lookahead.matches(position, line.get(lookahead_index).code) {
                return None;
            }
        }

        let mut backtrack_index = index;
        for position in 0..self.backtrack.len() {
            backtrack_index = previous_glyph(source, line, lookup_flag, backtrack_index)?;
            if !self.backtrack.matches(position, line.get(backtrack_index).code) {
                return None;
            }
        }

        Some(input_end)
    }
}

/// A decoded contextual or chained contextual subtable.
#[derive(Clone, Debug)]
pub enum ContextTable {
    /// Format 1: rule sets indexed by the coverage index of the first glyph.
    ByGlyph {
        coverage: Arc<Coverage>,
        rule_sets: Vec<Vec<ContextRule>>,
    },
    /// Format 2: rule sets indexed by the input class of the first glyph.
    ByClass {
        coverage: Arc<Coverage>,
        classdef: Arc<ClassDef>,
        rule_sets: Vec<Vec<ContextRule>>,
    },
    /// Format 3: a single rule whose first input glyph must be in `coverage`.
    ByCoverage {
        coverage: Arc<Coverage>,
        rule: ContextRule,
    },
}

impl ContextTable {
    /// The rules to try when `glyph` is the first input glyph, in table order.
    pub fn rules_for_glyph(&self, glyph: u16) -> &[ContextRule] {
        match self {
            ContextTable::ByGlyph {
                coverage,
                rule_sets,
            } => coverage
                .glyph_coverage_value(glyph)
                .and_then(|index| rule_sets.get(usize::from(index)))
                .map_or(&[], Vec::as_slice),
            ContextTable::ByClass {
                coverage,
                classdef,
                rule_sets,
            } => {
                if coverage.contains(glyph) {
                    let class = classdef.glyph_class_value(glyph);
                    rule_sets
                        .get(usize::from(class))
                        .map_or(&[], Vec::as_slice)
                } else {
                    &[]
                }
            }
            ContextTable::ByCoverage { coverage, rule } => {
                if coverage.contains(glyph) {
                    std::slice::from_ref(rule)
                } else {
                    &[]
                }
            }
        }
    }

    /// The first rule matching at `line.idx` and the index of its last input glyph.
    pub fn matching_rule<S: GlyphSource + ?Sized>(
        &self,
        source: &S,
        lookup_flag: LookupFlag,
        line: &GlyphLine,
    ) -> Option<(&ContextRule, usize)> {
        if line.idx >= line.end {
            return None;
        }
        let glyph = line.get(line.idx).code;
        if source.is_skip(glyph, lookup_flag) {
            return None;
        }
        self.rules_for_glyph(glyph).iter().find_map(|rule| {
            rule.matches(source, lookup_flag, line, line.idx)
                .map(|last_index| (rule, last_index))
        })
    }
}

/// Apply the first rule of `subtables` that matches at `line.idx`.
///
/// The window is narrowed to the matched input while the rule's lookup records run, then
/// restored, growing or shrinking with any glyphs the nested lookups inserted or removed. The
/// cursor is left after the matched input, or on the next glyph when nothing matched.
pub fn apply_context<T: LayoutTableType>(
    ctxt: &ApplyContext<'_, T>,
    lookup_flag: LookupFlag,
    subtables: &[ContextTable],
    line: &mut GlyphLine,
) -> Result<bool, ParseError> {
    let reader = ctxt.reader();
    let matched = subtables
        .iter()
        .find_map(|subtable| subtable.matching_rule(reader, lookup_flag, line));
    let (rule, last_index) = match matched {
        Some(matched) => matched,
        None => {
            line.idx += 1;
            return Ok(false);
        }
    };

    let old_start = line.start;
    let old_end = line.end;
    let initial_index = line.idx;
    line.start = initial_index;
    line.end = last_index + 1;
    let end_before = line.end;

    let result = apply_lookup_records(ctxt, lookup_flag, rule, initial_index, line);

    line.idx = line.end;
    line.start = old_start;
    line.end = old_end - end_before + line.end;
    result
}

fn apply_lookup_records<T: LayoutTableType>(
    ctxt: &ApplyContext<'_, T>,
    lookup_flag: LookupFlag,
    rule: &ContextRule,
    initial_index: usize,
    line: &mut GlyphLine,
) -> Result<bool, ParseError> {
    let mut changed = false;
    for record in &rule.lookup_records {
        let sequence_index = usize::from(record.sequence_index);
        let index =
            match nth_next_glyph(ctxt.reader(), line, lookup_flag, initial_index, sequence_index) {
                Some(index) => index,
                None => continue,
            };
        line.idx = index;
        changed = ctxt.apply_nested(record.lookup_list_index, line)? || changed;
    }
    Ok(changed)
}

/// Reads a contextual subtable (GSUB type 5, GPOS type 7).
pub enum SequenceContext {}

/// Reads a chained contextual subtable (GSUB type 6, GPOS type 8).
pub enum ChainedSequenceContext {}

// A rule before its sequences are bound to glyph ids, classes or coverages.
struct SequenceRule {
    backtrack: Vec<u16>,
    input: Vec<u16>,
    lookahead: Vec<u16>,
    lookup_records: Vec<LookupRecord>,
}

type RuleReader = fn(&mut ReadCtxt<'_>) -> Result<SequenceRule, ParseError>;

fn read_sequence_rule(ctxt: &mut ReadCtxt<'_>) -> Result<SequenceRule, ParseError> {
    let glyph_count = usize::from(ctxt.read_u16be()?);
    ctxt.check(glyph_count > 0)?;
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let input = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
    let lookup_records = ctxt.read_array::<LookupRecord>(lookup_count)?.to_vec();
    Ok(SequenceRule {
        backtrack: Vec::new(),
        input,
        lookahead: Vec::new(),
        lookup_records,
    })
}

fn read_chained_sequence_rule(ctxt: &mut ReadCtxt<'_>) -> Result<SequenceRule, ParseError> {
    let backtrack_count = usize::from(ctxt.read_u16be()?);
    let backtrack = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
    let input_count = usize::from(ctxt.read_u16be()?);
    ctxt.check(input_count > 0)?;
    let input = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
    let lookahead_count = usize::from(ctxt.read_u16be()?);
    let lookahead = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_records = ctxt.read_array::<LookupRecord>(lookup_count)?.to_vec();
    Ok(SequenceRule {
        backtrack,
        input,
        lookahead,
        lookup_records,
    })
}

// Rule sets at `offsets`, a null offset being an empty set.
fn read_rule_sets<'a>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
    read_rule: RuleReader,
) -> Result<Vec<Vec<SequenceRule>>, ParseError> {
    let mut rule_sets = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        if offset == 0 {
            rule_sets.push(Vec::new());
            continue;
        }
        let rule_set_scope = scope.offset(usize::from(offset));
        let mut ctxt = rule_set_scope.ctxt();
        let rule_count = usize::from(ctxt.read_u16be()?);
        let rule_offsets = ctxt.read_array::<U16Be>(rule_count)?;
        let mut rules = Vec::with_capacity(rule_count);
        for rule_offset in &rule_offsets {
            let mut rule_ctxt = rule_set_scope.offset(usize::from(rule_offset)).ctxt();
            rules.push(read_rule(&mut rule_ctxt)?);
        }
        rule_sets.push(rules);
    }
    Ok(rule_sets)
}

fn read_glyph_rules<'a>(
    scope: ReadScope<'a>,
    ctxt: &mut ReadCtxt<'a>,
    read_rule: RuleReader,
) -> Result<ContextTable, ParseError> {
    let coverage_offset = usize::from(ctxt.read_u16be()?);
    let rule_set_count = usize::from(ctxt.read_u16be()?);
    let rule_set_offsets = ctxt.read_array::<U16Be>(rule_set_count)?;
    let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
    let rule_sets = read_rule_sets(&scope, rule_set_offsets, read_rule)?
        .into_iter()
        .map(|rules| {
            rules
                .into_iter()
                .map(|rule| ContextRule {
                    backtrack: GlyphTable::by_id(rule.backtrack),
                    input: GlyphTable::by_id(rule.input),
                    lookahead: GlyphTable::by_id(rule.lookahead),
                    lookup_records: rule.lookup_records,
                })
                .collect()
        })
        .collect();
    Ok(ContextTable::ByGlyph {
        coverage: Arc::new(coverage),
        rule_sets,
    })
}

fn bind_class_rules(
    rule_sets: Vec<Vec<SequenceRule>>,
    backtrack_classdef: &Arc<ClassDef>,
    input_classdef: &Arc<ClassDef>,
    lookahead_classdef: &Arc<ClassDef>,
) -> Vec<Vec<ContextRule>> {
    rule_sets
        .into_iter()
        .map(|rules| {
            rules
                .into_iter()
                .map(|rule| ContextRule {
                    backtrack: GlyphTable::by_class(backtrack_classdef, rule.backtrack),
                    input: GlyphTable::by_class(input_classdef, rule.input),
                    lookahead: GlyphTable::by_class(lookahead_classdef, rule.lookahead),
                    lookup_records: rule.lookup_records,
                })
                .collect()
        })
        .collect()
}

impl ReadBinary for SequenceContext {
    type HostType<'a> = ContextTable;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<ContextTable, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        match format {
            1 => read_glyph_rules(scope, ctxt, read_sequence_rule),
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let classdef_offset = usize::from(ctxt.read_u16be()?);
                let class_set_count = usize::from(ctxt.read_u16be()?);
                let class_set_offsets = ctxt.read_array::<U16Be>(class_set_count)?;
                let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
                let classdef = Arc::new(scope.offset(classdef_offset).read::<ClassDef>()?);
                let rule_sets = read_rule_sets(&scope, class_set_offsets, read_sequence_rule)?;
                let empty = Arc::new(ClassDef::default());
                Ok(ContextTable::ByClass {
                    coverage: Arc::new(coverage),
                    rule_sets: bind_class_rules(rule_sets, &empty, &classdef, &empty),
                    classdef,
                })
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let coverage_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let lookup_records = ctxt.read_array::<LookupRecord>(lookup_count)?.to_vec();
                let mut input_coverages = read_coverages(&scope, coverage_offsets)?;
                let coverage = input_coverages.remove(0);
                Ok(ContextTable::ByCoverage {
                    coverage,
                    rule: ContextRule {
                        backtrack: GlyphTable::Empty,
                        input: GlyphTable::by_coverage(input_coverages),
                        lookahead: GlyphTable::Empty,
                        lookup_records,
                    },
                })
            }
            _ => Err(ParseError::BadFormat(format)),
        }
    }
}

impl ReadBinary for ChainedSequenceContext {
    type HostType<'a> = ContextTable;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<ContextTable, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        match format {
            1 => read_glyph_rules(scope, ctxt, read_chained_sequence_rule),
            2 => {
                let coverage_offset = usize::from(ctxt.read_u16be()?);
                let backtrack_classdef_offset = usize::from(ctxt.read_u16be()?);
                let input_classdef_offset = usize::from(ctxt.read_u16be()?);
                let lookahead_classdef_offset = usize::from(ctxt.read_u16be()?);
                let class_set_count = usize::from(ctxt.read_u16be()?);
                let class_set_offsets = ctxt.read_array::<U16Be>(class_set_count)?;
                let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
                let read_classdef = |offset: usize| -> Result<Arc<ClassDef>, ParseError> {
                    match offset {
                        0 => Ok(Arc::new(ClassDef::default())),
                        offset => Ok(Arc::new(scope.offset(offset).read::<ClassDef>()?)),
                    }
                };
                let backtrack_classdef = read_classdef(backtrack_classdef_offset)?;
                let input_classdef = read_classdef(input_classdef_offset)?;
                let lookahead_classdef = read_classdef(lookahead_classdef_offset)?;
                let rule_sets =
                    read_rule_sets(&scope, class_set_offsets, read_chained_sequence_rule)?;
                Ok(ContextTable::ByClass {
                    coverage: Arc::new(coverage),
                    rule_sets: bind_class_rules(
                        rule_sets,
                        &backtrack_classdef,
                        &input_classdef,
                        &lookahead_classdef,
                    ),
                    classdef: input_classdef,
                })
            }
            3 => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_offsets = ctxt.read_array::<U16Be>(input_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = ctxt.read_array::<LookupRecord>(lookup_count)?.to_vec();
                let mut input_coverages = read_coverages(&scope, input_offsets)?;
                let coverage = input_coverages.remove(0);
                Ok(ContextTable::ByCoverage {
                    coverage,
                    rule: ContextRule {
                        backtrack: GlyphTable::by_coverage(read_coverages(
                            &scope,
                            backtrack_offsets,
                        )?),
                        input: GlyphTable::by_coverage(input_coverages),
                        lookahead: GlyphTable::by_coverage(read_coverages(
                            &scope,
                            lookahead_offsets,
                        )?),
                        lookup_records,
                    },
                })
            }
            _ => Err(ParseError::BadFormat(format)),
        }
    }
}

/// Read contextual subtables with `T`, one context table per subtable.
pub(crate) fn read_context_subtables<'a, T>(
    subtables: &[ReadScope<'a>],
) -> Result<Vec<ContextTable>, ParseError>
where
    T: ReadBinary<HostType<'a> = ContextTable>,
{
    subtables
        .iter()
        .map(|subtable| subtable.read::<T>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gdef::GdefTable;
    use crate::tests::{line_of, TestSource};

    fn ignore_marks() -> LookupFlag {
        LookupFlag(LookupFlag::IGNORE_MARKS)
    }

    #[test]
    fn test_lookup_flag() {
        let flag = LookupFlag(0x0309);
        assert!(flag.get_rtl());
        assert!(flag.get_ignore_marks());
        assert!(!flag.get_ignore_bases());
        assert!(!flag.get_ignore_ligatures());
        assert_eq!(flag.get_mark_attachment_type(), 3);
    }

    #[test]
    fn test_next_and_previous_glyph_skip_marks() {
        // glyph 3 is a mark
        let source = TestSource::with_marks(&[3]);
        let line = line_of(&[1, 3, 2, 3]);
        assert_eq!(next_glyph(&source, &line, ignore_marks(), 0), Some(2));
        assert_eq!(next_glyph(&source, &line, ignore_marks(), 2), None);
        assert_eq!(next_glyph(&source, &line, LookupFlag(0), 2), Some(3));
        assert_eq!(previous_glyph(&source, &line, ignore_marks(), 2), Some(0));
        assert_eq!(previous_glyph(&source, &line, ignore_marks(), 0), None);
        assert_eq!(nth_next_glyph(&source, &line, ignore_marks(), 0, 1), Some(2));
        assert_eq!(nth_next_glyph(&source, &line, ignore_marks(), 0, 0), Some(0));
    }

    #[test]
    fn test_glyph_search_respects_window() {
        let source = TestSource::new(GdefTable::default());
        let mut line = line_of(&[1, 2, 3, 4]);
        line.start = 1;
        line.end = 3;
        assert_eq!(next_glyph(&source, &line, LookupFlag(0), 2), None);
        assert_eq!(previous_glyph(&source, &line, LookupFlag(0), 1), None);
    }

    fn chain_rule() -> ContextRule {
        ContextRule {
            backtrack: GlyphTable::ById(vec![10]),
            input: GlyphTable::ById(vec![20]),
            lookahead: GlyphTable::ById(vec![30]),
            lookup_records: vec![LookupRecord {
                sequence_index: 0,
                lookup_list_index: 0,
            }],
        }
    }

    #[test]
    fn test_chain_rule_matches() {
        let source = TestSource::with_marks(&[]);
        let rule = chain_rule();
        let line = line_of(&[10, 15, 20, 30]);
        assert_eq!(rule.context_length(), 2);
        assert_eq!(rule.matches(&source, LookupFlag(0), &line, 1), Some(2));

        let table = ContextTable::ByGlyph {
            coverage: Arc::new(Coverage::from_glyphs(vec![15]).unwrap()),
            rule_sets: vec![vec![rule]],
        };
        let mut line = line;
        line.idx = 1;
        let (_, last_index) = table
            .matching_rule(&source, LookupFlag(0), &line)
            .expect("rule should match");
        assert_eq!(last_index, 2);
    }

    #[test]
    fn test_chain_rule_missing_backtrack() {
        let source = TestSource::with_marks(&[]);
        let line = line_of(&[15, 20, 30]);
        assert_eq!(chain_rule().matches(&source, LookupFlag(0), &line, 0), None);
    }

    #[test]
    fn test_chain_rule_lookahead_outside_window() {
        let source = TestSource::with_marks(&[]);
        let mut line = line_of(&[10, 15, 20, 30]);
        line.end = 3;
        assert_eq!(chain_rule().matches(&source, LookupFlag(0), &line, 1), None);
    }

    #[test]
    fn test_single_input_chain_rule() {
        let source = TestSource::with_marks(&[]);
        let rule = ContextRule {
            backtrack: GlyphTable::ById(vec![10]),
            input: GlyphTable::Empty,
            lookahead: GlyphTable::ById(vec![30]),
            lookup_records: Vec::new(),
        };
        assert_eq!(rule.context_length(), 1);
        let table = ContextTable::ByGlyph {
            coverage: Arc::new(Coverage::from_glyphs(vec![20]).unwrap()),
            rule_sets: vec![vec![rule]],
        };

        let mut line = line_of(&[10, 20, 30]);
        line.idx = 1;
        let (_, last_index) = table
            .matching_rule(&source, LookupFlag(0), &line)
            .expect("rule should match");
        assert_eq!(last_index, 1);

        // Wrong backtrack glyph
        let mut line = line_of(&[11, 20, 30]);
        line.idx = 1;
        assert!(table.matching_rule(&source, LookupFlag(0), &line).is_none());

        // Wrong lookahead glyph
        let mut line = line_of(&[10, 20, 31]);
        line.idx = 1;
        assert!(table.matching_rule(&source, LookupFlag(0), &line).is_none());
    }

    #[test]
    fn test_rule_matching_skips_marks() {
        let source = TestSource::with_marks(&[99]);
        let line = line_of(&[10, 99, 15, 99, 20, 30]);
        assert_eq!(chain_rule().matches(&source, ignore_marks(), &line, 2), Some(4));
        assert_eq!(chain_rule().matches(&source, LookupFlag(0), &line, 2), None);
    }

    #[test]
    fn test_class_table_rules() {
        let source = TestSource::with_marks(&[]);
        let classdef = Arc::new(
            crate::binary::read::ReadScope::new(
                &crate::tests::Table::new()
                    .u16(1)
                    .u16(2)
                    .u16s(&[2, 1, 2])
                    .to_bytes(),
            )
            .read::<ClassDef>()
            .unwrap(),
        );
        let rule = ContextRule {
            backtrack: GlyphTable::Empty,
            input: GlyphTable::ByClassDef(Arc::clone(&classdef), vec![2]),
            lookahead: GlyphTable::Empty,
            lookup_records: Vec::new(),
        };
        let table = ContextTable::ByClass {
            coverage: Arc::new(Coverage::from_glyphs(vec![1, 2]).unwrap()),
            classdef,
            rule_sets: vec![Vec::new(), vec![rule]],
        };
        assert_eq!(table.rules_for_glyph(2).len(), 1);
        assert!(table.rules_for_glyph(3).is_empty());
        let line = line_of(&[2, 3]);
        assert!(table.matching_rule(&source, LookupFlag(0), &line).is_some());
        let line = line_of(&[2, 1]);
        assert!(table.matching_rule(&source, LookupFlag(0), &line).is_none());
    }
}
