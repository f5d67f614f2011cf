//! Down / Up / Out over the block tree.
//!
//! Navigation starts from a block `B`: the block the selection exactly covers
//! when there is one, otherwise the block under the cursor. Down and Up move
//! to `B`'s next and previous sibling, passing over empty ones (`()` has
//! nothing to select); Out moves to the closest enclosing block. When there
//! is nowhere to go the selection comes back unchanged. Every other result
//! is the exact range of a block in the tree.
//!
//! A few positions need interpreting first:
//!
//! - In indented languages the cursor is often in a line's leading
//!   whitespace. It is treated as if it were on the line's first char.
//! - A cursor on a header line (`if x:`) stands for the body that header
//!   introduces, since the header itself is not a block.
//! - A cursor outside every block (between top-level blocks) moves Down to
//!   the first top-level block after it and Up to the last one before it.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::buffer::Buffer;
use crate::locate::{locate, locate_enclosing, locate_exact};
use crate::position::{Position, Range, Selection};
use crate::profile::{LanguageProfile, Strategy};
use crate::tree::{BlockId, BlockKind, BlockTree};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Next sibling.
    Down,
    /// Previous sibling.
    Up,
    /// Enclosing block.
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => f.write_str("down"),
            Self::Up => f.write_str("up"),
            Self::Out => f.write_str("out"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" | "next" => Ok(Self::Down),
            "up" | "prev" | "previous" => Ok(Self::Up),
            "out" | "parent" => Ok(Self::Out),
            other => Err(format!("unknown direction `{other}`")),
        }
    }
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Navigation over one built tree.
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    tree: &'a BlockTree,
    buffer: &'a Buffer,
    profile: &'a LanguageProfile,
}

impl<'a> Navigator<'a> {
    #[must_use]
    pub const fn new(
        tree: &'a BlockTree,
        buffer: &'a Buffer,
        profile: &'a LanguageProfile,
    ) -> Self {
        Self {
            tree,
            buffer,
            profile,
        }
    }

    /// The new selection range: a block's range, or the selection unchanged.
    #[must_use]
    pub fn jump(&self, selection: Selection, direction: Direction) -> Range {
        let selection = self.clamp(selection);
        if let Some(id) = self.target(selection, direction) {
            let range = self.tree.range(id);
            debug!(%direction, block = id.index(), ?range, "jump");
            range
        } else {
            debug!(%direction, ?selection, "no target, selection unchanged");
            selection.range()
        }
    }

    /// The block a jump lands on, or `None` for a no-op.
    #[must_use]
    pub fn target(&self, selection: Selection, direction: Direction) -> Option<BlockId> {
        let selection = self.clamp(selection);
        match direction {
            Direction::Down => self.sibling(selection, true),
            Direction::Up => self.sibling(selection, false),
            Direction::Out => self.out(selection),
        }
    }

    fn clamp(&self, selection: Selection) -> Selection {
        Selection::new(
            self.buffer.clamp(selection.anchor),
            self.buffer.clamp(selection.active),
        )
    }

    /// Move a position in leading whitespace onto the line's first char.
    fn snap(&self, pos: Position) -> Position {
        if self.profile.strategy != Strategy::Indented {
            return pos;
        }
        match self.buffer.first_non_blank(pos.line) {
            Some(col) if pos.col < col => Position::new(pos.line, col),
            _ => pos,
        }
    }

    /// The block the selection exactly covers, if it covers one.
    fn exact(&self, selection: Selection) -> Option<BlockId> {
        if selection.is_collapsed() {
            None
        } else {
            locate_exact(self.tree, selection.range())
        }
    }

    /// The block under a cursor, with header lines standing for their body.
    fn block_at(&self, pos: Position) -> BlockId {
        let block = locate(self.tree, pos);
        if self.profile.strategy != Strategy::Indented {
            return block;
        }
        let children = self.tree.children(block);
        let i = children.partition_point(|&c| self.tree.range(c).end <= pos);
        children
            .get(i)
            .copied()
            .filter(|&c| self.tree.get(c).kind == BlockKind::Body)
            .unwrap_or(block)
    }

    fn sibling(&self, selection: Selection, down: bool) -> Option<BlockId> {
        let tree = self.tree;
        let focus = self.snap(selection.active);
        let block = self.exact(selection).unwrap_or_else(|| self.block_at(focus));

        let (Some(parent), Some(index)) = (tree.parent(block), tree.index_in_parent(block)) else {
            return self.from_root(focus, down);
        };
        let siblings = tree.children(parent);
        let selectable = |&id: &BlockId| !tree.range(id).is_empty();
        if down {
            siblings[index + 1..].iter().copied().find(selectable)
        } else {
            siblings[..index].iter().rev().copied().find(selectable)
        }
    }

    /// Down/Up from a cursor that is in no block at all.
    fn from_root(&self, focus: Position, down: bool) -> Option<BlockId> {
        let tree = self.tree;
        let mut top = tree
            .children(tree.root())
            .iter()
            .copied()
            .filter(|&c| !tree.range(c).is_empty());
        if down {
            top.find(|&c| tree.range(c).start >= focus)
        } else {
            top.rev().find(|&c| tree.range(c).end <= focus)
        }
    }

    fn out(&self, selection: Selection) -> Option<BlockId> {
        let tree = self.tree;
        let target = if let Some(block) = self.exact(selection) {
            self.strictly_outside(block)
        } else {
            // Both edges out of leading whitespace; a selection that was only
            // indentation becomes a cursor.
            let snapped = Selection::new(self.snap(selection.anchor), self.snap(selection.active));
            if snapped.is_collapsed() {
                self.strictly_outside(self.block_at(snapped.active))
            } else {
                let range = snapped.range();
                let enclosing = locate_enclosing(tree, range);
                if tree.range(enclosing) == range {
                    self.strictly_outside(enclosing)
                } else {
                    Some(enclosing)
                }
            }
        };
        target.filter(|&id| id != tree.root())
    }

    /// Nearest ancestor whose range differs from `id`'s.
    fn strictly_outside(&self, id: BlockId) -> Option<BlockId> {
        let range = self.tree.range(id);
        self.tree
            .ancestors(id)
            .find(|&ancestor| self.tree.range(ancestor) != range)
    }
}

/// One-shot form of [`Navigator::jump`].
#[must_use]
pub fn navigate(
    tree: &BlockTree,
    buffer: &Buffer,
    profile: &LanguageProfile,
    selection: Selection,
    direction: Direction,
) -> Range {
    Navigator::new(tree, buffer, profile).jump(selection, direction)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
