//! Glyphs as they flow through substitution and positioning.

use rustc_hash::FxHashMap;

/// The font's glyphs keyed by glyph id.
pub type GlyphMap = FxHashMap<u16, Glyph>;

/// A glyph together with the text it represents and the positioning applied to it.
///
/// Positioning values are in text space (1000 units per em). `anchor_delta` is the signed
/// distance, in glyphs, from a mark to the glyph it is attached to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Glyph {
    pub code: u16,
    pub width: i32,
    pub unicode: Option<char>,
    /// Text the glyph stands for. Ligatures carry the text of all their components here.
    pub chars: Option<String>,
    pub is_mark: bool,
    pub x_placement: i32,
    pub y_placement: i32,
    pub x_advance: i32,
    pub y_advance: i32,
    pub anchor_delta: i32,
}

impl Glyph {
    pub fn new(code: u16, width: i32, unicode: Option<char>) -> Glyph {
        Glyph {
            code,
            width,
            unicode,
            chars: unicode.map(String::from),
            ..Glyph::default()
        }
    }

    pub fn with_mark(mut self, is_mark: bool) -> Glyph {
        self.is_mark = is_mark;
        self
    }

    pub fn with_chars(mut self, chars: impl Into<String>) -> Glyph {
        self.chars = Some(chars.into());
        self
    }

    pub fn has_valid_unicode(&self) -> bool {
        self.unicode.is_some()
    }

    /// The text this glyph represents, if any.
    pub fn unicode_chars(&self) -> Option<String> {
        match (&self.chars, self.unicode) {
            (Some(chars), _) => Some(chars.clone()),
            (None, Some(ch)) => Some(String::from(ch)),
            (None, None) => None,
        }
    }

    pub fn has_placement(&self) -> bool {
        self.anchor_delta != 0 || self.x_placement != 0 || self.y_placement != 0
    }

    pub fn has_advance(&self) -> bool {
        self.x_advance != 0 || self.y_advance != 0
    }

    pub fn has_offsets(&self) -> bool {
        self.has_placement() || self.has_advance()
    }
}
