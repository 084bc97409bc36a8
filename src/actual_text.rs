//! Splitting a glyph line into runs by replacement text.
//!
//! A run only needs its replacement text when the Unicode values of its glyphs do not already
//! spell that text. Consecutive runs that don't need it are reported as one part.

use std::iter::FusedIterator;
use std::sync::Arc;

use crate::glyph_line::{ActualText, GlyphLine};

/// A run of glyphs `start..end` and the replacement text it must be written with, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphLinePart {
    pub start: usize,
    pub end: usize,
    pub actual_text: Option<String>,
}

/// Iterator over the parts of a range of a glyph line.
#[derive(Clone, Debug)]
pub struct ActualTextIterator<'a> {
    line: &'a GlyphLine,
    pos: usize,
    end: usize,
}

impl<'a> ActualTextIterator<'a> {
    /// Parts of the window of `line`.
    pub fn new(line: &'a GlyphLine) -> Self {
        Self::with_range(line, line.start, line.end)
    }

    /// Parts of `start..end`, clamped to the glyphs of `line`.
    pub fn with_range(line: &'a GlyphLine, start: usize, end: usize) -> Self {
        let end = end.min(line.len());
        ActualTextIterator {
            line,
            pos: start.min(end),
            end,
        }
    }

    // The glyphs from `start` sharing one annotation, or sharing none.
    fn raw_part(&self, start: usize) -> GlyphLinePart {
        let annotation = self.line.actual_text(start);
        let mut end = start + 1;
        while end < self.end && same_annotation(annotation, self.line.actual_text(end)) {
            end += 1;
        }
        GlyphLinePart {
            start,
            end,
            actual_text: annotation.map(|actual_text| actual_text.value.clone()),
        }
    }

    fn needs_actual_text(&self, part: &GlyphLinePart) -> bool {
        let actual_text = match &part.actual_text {
            Some(actual_text) => actual_text,
            None => return false,
        };
        let mut text = String::new();
        for glyph in &self.line.glyphs()[part.start..part.end] {
            match glyph.unicode {
                Some(ch) => text.push(ch),
                None => return true,
            }
        }
        text != *actual_text
    }
}

fn same_annotation(a: Option<&Arc<ActualText>>, b: Option<&Arc<ActualText>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl Iterator for ActualTextIterator<'_> {
    type Item = GlyphLinePart;

    fn next(&mut self) -> Option<GlyphLinePart> {
        if self.pos >= self.end {
            return None;
        }

        let mut part = self.raw_part(self.pos);
        self.pos = part.end;
        if self.needs_actual_text(&part) {
            return Some(part);
        }

        part.actual_text = None;
        while self.pos < self.end {
            let next = self.raw_part(self.pos);
            if self.needs_actual_text(&next) {
                break;
            }
            part.end = next.end;
            self.pos = next.end;
        }
        Some(part)
    }
}

impl FusedIterator for ActualTextIterator<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyph::Glyph;

    fn part(start: usize, end: usize, actual_text: Option<&str>) -> GlyphLinePart {
        GlyphLinePart {
            start,
            end,
            actual_text: actual_text.map(String::from),
        }
    }

    fn text_line(text: &str) -> GlyphLine {
        let glyphs = text
            .chars()
            .enumerate()
            .map(|(i, ch)| Glyph::new(i as u16 + 1, 500, Some(ch)))
            .collect();
        GlyphLine::new(glyphs)
    }

    #[test]
    fn test_unannotated_line_is_one_part() {
        let line = text_line("abc");
        let parts: Vec<_> = line.iter().collect();
        assert_eq!(parts, vec![part(0, 3, None)]);
    }

    #[test]
    fn test_annotation_matching_unicode_not_needed() {
        let mut line = text_line("abc");
        line.set_actual_text(0, 3, "abc");
        let parts: Vec<_> = line.iter().collect();
        assert_eq!(parts, vec![part(0, 3, None)]);
    }

    #[test]
    fn test_ligature_needs_actual_text() {
        let mut line = GlyphLine::new(vec![
            Glyph::new(1, 500, Some('x')),
            Glyph::new(100, 500, None),
            Glyph::new(2, 500, Some('y')),
        ]);
        line.set_actual_text(1, 2, "fi");
        let parts: Vec<_> = line.iter().collect();
        assert_eq!(
            parts,
            vec![part(0, 1, None), part(1, 2, Some("fi")), part(2, 3, None)]
        );
    }

    #[test]
    fn test_mismatched_text_needs_actual_text() {
        let mut line = text_line("ab");
        line.set_actual_text(0, 2, "xy");
        let parts: Vec<_> = line.iter().collect();
        assert_eq!(parts, vec![part(0, 2, Some("xy"))]);
    }

    #[test]
    fn test_separate_annotations_with_same_text() {
        let mut line = GlyphLine::new(vec![Glyph::new(1, 0, None), Glyph::new(2, 0, None)]);
        line.set_actual_text(0, 1, "a");
        line.set_actual_text(1, 2, "a");
        let parts: Vec<_> = line.iter().collect();
        assert_eq!(parts, vec![part(0, 1, Some("a")), part(1, 2, Some("a"))]);
    }

    #[test]
    fn test_range() {
        let mut line = text_line("abcd");
        line.set_actual_text(1, 3, "q");
        let parts: Vec<_> = ActualTextIterator::with_range(&line, 2, 10).collect();
        assert_eq!(parts, vec![part(2, 3, Some("q")), part(3, 4, None)]);
        assert_eq!(ActualTextIterator::with_range(&line, 3, 3).next(), None);
    }
}
