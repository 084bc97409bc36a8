//! A line of glyphs being shaped.
//!
//! Lookups only see the glyphs between `start` and `end`, and work at the cursor `idx`.
//! Substitutions keep the text each glyph stands for, so the original text of a line can be
//! recovered after shaping. Runs of glyphs can also carry replacement text ("actual text"),
//! shared by every glyph of the run.

use std::borrow::Cow;
use std::sync::Arc;

use crate::actual_text::ActualTextIterator;
use crate::context::{next_glyph, GlyphSource, LookupFlag};
use crate::glyph::Glyph;

/// Replacement text for a run of glyphs.
///
/// Glyphs belong to the same run when their slots hold the same `Arc`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActualText {
    pub value: String,
}

impl ActualText {
    pub fn new(value: impl Into<String>) -> ActualText {
        ActualText {
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlyphLine {
    glyphs: Vec<Glyph>,
    // Allocated on first use, then always as long as `glyphs`.
    actual_text: Option<Vec<Option<Arc<ActualText>>>>,
    pub start: usize,
    pub end: usize,
    pub idx: usize,
}

impl GlyphLine {
    pub fn new(glyphs: Vec<Glyph>) -> GlyphLine {
        let end = glyphs.len();
        GlyphLine {
            glyphs,
            actual_text: None,
            start: 0,
            end,
            idx: 0,
        }
    }

    /// A line whose window is `start..end`, clamped to the glyphs given.
    pub fn with_window(glyphs: Vec<Glyph>, start: usize, end: usize) -> GlyphLine {
        let end = end.min(glyphs.len());
        let start = start.min(end);
        GlyphLine {
            glyphs,
            actual_text: None,
            start,
            end,
            idx: start,
        }
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn get(&self, index: usize) -> &Glyph {
        &self.glyphs[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Glyph {
        &mut self.glyphs[index]
    }

    /// Replace the glyph at `index`, returning the old one.
    pub fn set(&mut self, index: usize, glyph: Glyph) -> Glyph {
        std::mem::replace(&mut self.glyphs[index], glyph)
    }

    /// Append a glyph after the last one. The window is not changed.
    pub fn add(&mut self, glyph: Glyph) {
        self.glyphs.push(glyph);
        if let Some(actual_text) = &mut self.actual_text {
            actual_text.push(None);
        }
    }

    /// The replacement text run the glyph at `index` belongs to.
    pub fn actual_text(&self, index: usize) -> Option<&Arc<ActualText>> {
        self.actual_text.as_ref()?.get(index)?.as_ref()
    }

    /// Make this line a copy of `other`, window and cursor included.
    pub fn replace_content(&mut self, other: &GlyphLine) {
        self.clone_from(other);
    }

    /// Replace the glyph at the cursor, keeping the text it stood for.
    pub fn substitute_one_to_one<S: GlyphSource + ?Sized>(&mut self, source: &S, glyph_id: u16) {
        let old_glyph = &self.glyphs[self.idx];
        let mut new_glyph = source.glyph(glyph_id);
        new_glyph.chars = old_glyph.chars.clone().or_else(|| {
            new_glyph
                .unicode
                .or(old_glyph.unicode)
                .map(String::from)
        });
        self.glyphs[self.idx] = new_glyph;
    }

    /// Replace the glyph at the cursor by `glyph_ids`, leaving the cursor on the last of them.
    ///
    /// The window grows with the line. The expanded glyphs form one replacement text run
    /// carrying the text of the glyph they replace.
    pub fn substitute_one_to_many<S: GlyphSource + ?Sized>(
        &mut self,
        source: &S,
        glyph_ids: &[u16],
    ) {
        let (&first, rest) = match glyph_ids.split_first() {
            Some(split) => split,
            None => return,
        };
        let old_glyph = self.set(self.idx, source.glyph(first));
        if rest.is_empty() {
            return;
        }

        let insert_at = self.idx + 1;
        self.glyphs
            .splice(insert_at..insert_at, rest.iter().map(|&id| source.glyph(id)));
        if let Some(actual_text) = &mut self.actual_text {
            actual_text.splice(insert_at..insert_at, rest.iter().map(|_| None));
        }

        let opt_annotation = match self.actual_text(self.idx) {
            Some(annotation) => Some(Arc::clone(annotation)),
            None => old_glyph
                .unicode_chars()
                .map(|text| Arc::new(ActualText::new(text))),
        };
        if let Some(annotation) = opt_annotation {
            let span = self.idx..=self.idx + rest.len();
            for slot in &mut self.annotations_mut()[span] {
                *slot = Some(Arc::clone(&annotation));
            }
        }

        self.idx += rest.len();
        self.end += rest.len();
    }

    /// Merge the glyph at the cursor and the next `right_part_len` glyphs that `lookup_flag`
    /// does not skip into `glyph_id`.
    ///
    /// The new glyph carries the concatenated text of the merged glyphs. Skipped glyphs between
    /// them stay in the line, after the new glyph.
    pub fn substitute_many_to_one<S: GlyphSource + ?Sized>(
        &mut self,
        source: &S,
        lookup_flag: LookupFlag,
        right_part_len: usize,
        glyph_id: u16,
    ) {
        let mut chars = String::new();
        push_text(&mut chars, &self.glyphs[self.idx]);

        let mut index = self.idx;
        for _ in 0..right_part_len {
            let next = match next_glyph(source, self, lookup_flag, index) {
                Some(next) => next,
                None => break,
            };
            push_text(&mut chars, &self.glyphs[next]);
            self.remove(next);
            self.end -= 1;
            index = next - 1;
        }

        let mut glyph = source.glyph(glyph_id);
        glyph.chars = if chars.is_empty() { None } else { Some(chars) };
        self.glyphs[self.idx] = glyph;
    }

    /// Mark `left..right` as one run whose text is `text`.
    pub fn set_actual_text(&mut self, left: usize, right: usize, text: impl Into<String>) {
        let annotation = Arc::new(ActualText::new(text));
        for slot in &mut self.annotations_mut()[left..right] {
            *slot = Some(Arc::clone(&annotation));
        }
    }

    /// The glyphs of the window for which `predicate` holds, as a new line.
    ///
    /// When every glyph passes, this line itself is returned.
    pub fn filter(&self, mut predicate: impl FnMut(&Glyph) -> bool) -> Cow<'_, GlyphLine> {
        let mut any_filtered = false;
        let mut glyphs = Vec::with_capacity(self.end - self.start);
        let mut opt_actual_text = self.actual_text.as_ref().map(|_| Vec::new());
        for index in self.start..self.end {
            let glyph = &self.glyphs[index];
            if !predicate(glyph) {
                any_filtered = true;
                continue;
            }
            glyphs.push(glyph.clone());
            if let Some(filtered) = &mut opt_actual_text {
                filtered.push(self.actual_text(index).cloned());
            }
        }

        if any_filtered {
            let end = glyphs.len();
            Cow::Owned(GlyphLine {
                glyphs,
                actual_text: opt_actual_text,
                start: 0,
                end,
                idx: 0,
            })
        } else {
            Cow::Borrowed(self)
        }
    }

    /// A new line holding the glyphs `left..right`, with its window covering all of them.
    pub fn copy(&self, left: usize, right: usize) -> GlyphLine {
        let glyphs = self.glyphs[left..right].to_vec();
        let actual_text = self
            .actual_text
            .as_ref()
            .map(|actual_text| actual_text[left..right].to_vec());
        GlyphLine {
            glyphs,
            actual_text,
            start: 0,
            end: right - left,
            idx: 0,
        }
    }

    /// The text of `start..end`, using replacement text where a run needs it.
    pub fn to_unicode_string(&self, start: usize, end: usize) -> String {
        let mut text = String::new();
        for part in ActualTextIterator::with_range(self, start, end) {
            match part.actual_text {
                Some(actual_text) => text.push_str(&actual_text),
                None => {
                    for glyph in &self.glyphs[part.start..part.end] {
                        push_text(&mut text, glyph);
                    }
                }
            }
        }
        text
    }

    /// The text runs of the window.
    pub fn iter(&self) -> ActualTextIterator<'_> {
        ActualTextIterator::new(self)
    }

    fn remove(&mut self, index: usize) -> Glyph {
        if let Some(actual_text) = &mut self.actual_text {
            actual_text.remove(index);
        }
        self.glyphs.remove(index)
    }

    fn annotations_mut(&mut self) -> &mut Vec<Option<Arc<ActualText>>> {
        let len = self.glyphs.len();
        self.actual_text.get_or_insert_with(|| vec![None; len])
    }
}

fn push_text(text: &mut String, glyph: &Glyph) {
    match (&glyph.chars, glyph.unicode) {
        (Some(chars), _) => text.push_str(chars),
        (None, Some(ch)) => text.push(ch),
        (None, None) => {}
    }
}
