//! Document text and coordinate handling.
//!
//! A [`Buffer`] wraps a [`ropey::Rope`] built from the text the host passes
//! in. The engine never edits it: every call builds a fresh buffer, scans it
//! once and throws it away. What the buffer adds on top of the rope is the
//! coordinate work the rest of the engine would otherwise repeat:
//!
//! - **Line content length.** Lines are measured without their terminator
//!   (`\n`, `\r\n` or `\r`). Nothing else ends a line.
//!
//! - **Clamping.** Hosts routinely send coordinates that were valid a
//!   keystroke ago. [`Buffer::clamp`] maps any position onto the nearest real
//!   one instead of failing.
//!
//! - **Column units.** The engine counts chars; editors count UTF-16 code
//!   units (VS Code, LSP) or bytes (tree-sitter points). [`ColumnUnit`]
//!   converts at the boundary, per line, through the rope's own indices.

use std::fmt;
use std::str::FromStr;

use ropey::{Rope, RopeSlice};
use serde::{Deserialize, Serialize};

use crate::position::Position;

// ---------------------------------------------------------------------------
// Column units
// ---------------------------------------------------------------------------

/// The unit a host measures columns in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnUnit {
    /// Unicode scalar values. The engine's native unit.
    Char,
    /// UTF-16 code units, as reported by VS Code and LSP clients.
    #[default]
    Utf16,
    /// UTF-8 bytes.
    Byte,
}

impl fmt::Display for ColumnUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char => f.write_str("char"),
            Self::Utf16 => f.write_str("utf16"),
            Self::Byte => f.write_str("byte"),
        }
    }
}

impl FromStr for ColumnUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "char" | "chars" => Ok(Self::Char),
            "utf16" | "utf-16" => Ok(Self::Utf16),
            "byte" | "bytes" | "utf8" | "utf-8" => Ok(Self::Byte),
            other => Err(format!("unknown column unit `{other}`")),
        }
    }
}

/// True for `\n` and `\r`. Ropey is built with `cr_lines` only, so lines
/// are numbered as editors number them: form feeds and U+2028 are ordinary
/// chars.
#[inline]
pub(crate) const fn is_line_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r')
}

/// Chars in `line` excluding its terminator.
fn content_len(line: RopeSlice<'_>) -> usize {
    let total = line.len_chars();
    if total == 0 {
        return 0;
    }
    let last = line.char(total - 1);
    if !is_line_break(last) {
        return total;
    }
    if last == '\n' && total >= 2 && line.char(total - 2) == '\r' {
        total - 2
    } else {
        total - 1
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// Immutable document text for a single navigation call.
pub struct Buffer {
    rope: Rope,
}

impl Buffer {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    #[inline]
    #[must_use]
    pub const fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Number of lines. An empty document has one (empty) line, and a
    /// document ending in a newline has a trailing empty line.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// A line including its terminator, or `None` past the last line.
    #[inline]
    #[must_use]
    pub fn line(&self, line: usize) -> Option<RopeSlice<'_>> {
        (line < self.rope.len_lines()).then(|| self.rope.line(line))
    }

    /// Chars on `line` excluding the terminator. Zero past the last line.
    #[must_use]
    pub fn line_len(&self, line: usize) -> usize {
        self.line(line).map_or(0, content_len)
    }

    /// The position just past the last char of the document.
    #[must_use]
    pub fn end_position(&self) -> Position {
        let last = self.line_count() - 1;
        Position::new(last, self.line_len(last))
    }

    /// Map any position onto the nearest valid one.
    ///
    /// A line past the end clamps to the document end; a column past the end
    /// of its line clamps to the line's content length.
    #[must_use]
    pub fn clamp(&self, pos: Position) -> Position {
        if pos.line >= self.line_count() {
            return self.end_position();
        }
        Position::new(pos.line, pos.col.min(self.line_len(pos.line)))
    }

    /// Column of the first non-whitespace char on `line`, if it has one.
    #[must_use]
    pub fn first_non_blank(&self, line: usize) -> Option<usize> {
        let slice = self.line(line)?;
        slice
            .chars()
            .take(content_len(slice))
            .position(|ch| !ch.is_whitespace())
    }

    // -- Column units -------------------------------------------------------

    /// Convert a host position in `unit` columns to a clamped char position.
    #[must_use]
    pub fn from_unit(&self, pos: Position, unit: ColumnUnit) -> Position {
        let Some(line) = self.line(pos.line) else {
            return self.end_position();
        };
        let len = content_len(line);
        let col = match unit {
            ColumnUnit::Char => pos.col.min(len),
            ColumnUnit::Utf16 => {
                if pos.col >= line.char_to_utf16_cu(len) {
                    len
                } else {
                    line.utf16_cu_to_char(pos.col)
                }
            }
            ColumnUnit::Byte => {
                if pos.col >= line.char_to_byte(len) {
                    len
                } else {
                    line.byte_to_char(pos.col)
                }
            }
        };
        Position::new(pos.line, col)
    }

    /// Convert an engine char position to `unit` columns for the host.
    #[must_use]
    pub fn to_unit(&self, pos: Position, unit: ColumnUnit) -> Position {
        let pos = self.clamp(pos);
        let col = match (unit, self.line(pos.line)) {
            (ColumnUnit::Char, _) | (_, None) => pos.col,
            (ColumnUnit::Utf16, Some(line)) => line.char_to_utf16_cu(pos.col),
            (ColumnUnit::Byte, Some(line)) => line.char_to_byte(pos.col),
        };
        Position::new(pos.line, col)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("lines", &self.line_count())
            .field("chars", &self.rope.len_chars())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
