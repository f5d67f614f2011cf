//! # jb-engine: Block structure and semantic selection jumps
//!
//! Given a document, a language and the editor's selection, the engine
//! computes where a Down, Up or Out jump lands:
//!
//! - **[`position`]** `Position`, `Range` and the editor's `Selection`
//! - **[`buffer`]** `Buffer` wrapping a rope, with clamping and column units
//! - **[`profile`]** per-language delimiting rules and the `Registry`
//! - **[`scanner`]** lazy tokenizer that skips comments and strings
//! - **[`tree`]** `BlockTree` built by bracket matching or indentation
//! - **[`locate`]** finding the block under a position or a selection
//! - **[`navigate`]** the Down/Up/Out rules
//!
//! Every call is a pure function of its inputs. Nothing fails: unknown
//! languages use generic brackets, malformed code still builds a tree, stale
//! coordinates are clamped, and a jump with nowhere to go returns the
//! selection unchanged.

pub mod buffer;
pub mod locate;
pub mod navigate;
pub mod position;
pub mod profile;
pub mod scanner;
pub mod tree;

use serde::Serialize;

use crate::buffer::{Buffer, ColumnUnit};
use crate::navigate::{Direction, Navigator};
use crate::position::{Position, Selection};
use crate::profile::Registry;

/// One navigation call, in host coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub language_id: &'a str,
    pub text: &'a str,
    /// The moving end of the selection.
    pub cursor: Position,
    /// The fixed end; equal to `cursor` when nothing is selected.
    pub anchor: Position,
    pub direction: Direction,
    /// Unit of every column in the request and the result.
    pub unit: ColumnUnit,
}

/// The new selection, ordered by document position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SelectionResult {
    pub selection_start_row: usize,
    pub selection_start_col: usize,
    pub selection_end_row: usize,
    pub selection_end_col: usize,
}

impl SelectionResult {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self {
            selection_start_row: start.line,
            selection_start_col: start.col,
            selection_end_row: end.line,
            selection_end_col: end.col,
        }
    }
}

/// Run one jump against `registry`'s profiles.
#[must_use]
pub fn jump(request: &Request<'_>, registry: &Registry) -> SelectionResult {
    let buffer = Buffer::from_text(request.text);
    let profile = registry.resolve(request.language_id);
    let tree = tree::build(&buffer, profile);
    let selection = Selection::new(
        buffer.from_unit(request.anchor, request.unit),
        buffer.from_unit(request.cursor, request.unit),
    );
    let range = Navigator::new(&tree, &buffer, profile).jump(selection, request.direction);
    SelectionResult::new(
        buffer.to_unit(range.start, request.unit),
        buffer.to_unit(range.end, request.unit),
    )
}

fn jump_builtin(
    direction: Direction,
    language_id: &str,
    text: &str,
    cursor: (usize, usize),
    anchor: (usize, usize),
) -> SelectionResult {
    let request = Request {
        language_id,
        text,
        cursor: Position::new(cursor.0, cursor.1),
        anchor: Position::new(anchor.0, anchor.1),
        direction,
        unit: ColumnUnit::Utf16,
    };
    jump(&request, Registry::builtin())
}

/// Select the next sibling block. Columns are UTF-16 code units.
#[must_use]
pub fn jump_down(
    language_id: &str,
    text: &str,
    cursor_row: usize,
    cursor_col: usize,
    anchor_row: usize,
    anchor_col: usize,
) -> SelectionResult {
    jump_builtin(
        Direction::Down,
        language_id,
        text,
        (cursor_row, cursor_col),
        (anchor_row, anchor_col),
    )
}

/// Select the previous sibling block. Columns are UTF-16 code units.
#[must_use]
pub fn jump_up(
    language_id: &str,
    text: &str,
    cursor_row: usize,
    cursor_col: usize,
    anchor_row: usize,
    anchor_col: usize,
) -> SelectionResult {
    jump_builtin(
        Direction::Up,
        language_id,
        text,
        (cursor_row, cursor_col),
        (anchor_row, anchor_col),
    )
}

/// Select the enclosing block. Columns are UTF-16 code units.
#[must_use]
pub fn jump_out(
    language_id: &str,
    text: &str,
    cursor_row: usize,
    cursor_col: usize,
    anchor_row: usize,
    anchor_col: usize,
) -> SelectionResult {
    jump_builtin(
        Direction::Out,
        language_id,
        text,
        (cursor_row, cursor_col),
        (anchor_row, anchor_col),
    )
}
