//! Finding blocks by position or range.
//!
//! All lookups descend from the root, binary searching each level's children
//! (they are sorted and disjoint), so a lookup costs O(depth · log breadth).

use crate::position::{Position, Range, Selection};
use crate::tree::{BlockId, BlockTree};

/// The innermost block whose range contains `pos`.
///
/// Ranges are half-open, but a position sitting exactly on a child's end
/// (the cursor just before `}`, or just after the last char of a statement)
/// still belongs to that child when no other child contains it. Returns the
/// root when `pos` is in no deeper block.
#[must_use]
pub fn locate(tree: &BlockTree, pos: Position) -> BlockId {
    let mut current = tree.root();
    loop {
        let children = tree.children(current);
        let i = children.partition_point(|&c| tree.range(c).end <= pos);
        let next = children
            .get(i)
            .copied()
            .filter(|&c| tree.range(c).contains(pos))
            .or_else(|| {
                let prev = *children.get(i.checked_sub(1)?)?;
                (tree.range(prev).end == pos).then_some(prev)
            });
        match next {
            Some(child) => current = child,
            None => return current,
        }
    }
}

/// The child of `parent` that encloses `range`, if one does.
fn enclosing_child(tree: &BlockTree, parent: BlockId, range: Range) -> Option<BlockId> {
    let children = tree.children(parent);
    let i = children.partition_point(|&c| tree.range(c).end < range.end);
    children
        .get(i)
        .copied()
        .filter(|&c| tree.range(c).encloses(range))
}

/// The outermost non-root block whose range is exactly `range`.
///
/// Several nested blocks can share a range (a body holding a single
/// statement); the outermost is the one sibling navigation should move.
#[must_use]
pub fn locate_exact(tree: &BlockTree, range: Range) -> Option<BlockId> {
    let mut current = tree.root();
    while let Some(child) = enclosing_child(tree, current, range) {
        if tree.range(child) == range {
            return Some(child);
        }
        current = child;
    }
    None
}

/// The innermost block that encloses `range`, edges included.
#[must_use]
pub fn locate_enclosing(tree: &BlockTree, range: Range) -> BlockId {
    let mut current = tree.root();
    while let Some(child) = enclosing_child(tree, current, range) {
        current = child;
    }
    current
}

/// Where a selection sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorContext {
    /// The block the selection is on: the block it exactly covers, else the
    /// block under its active end.
    pub block: BlockId,
    /// `block`'s position among its siblings; `None` at the root.
    pub index_in_parent: Option<usize>,
    pub is_collapsed: bool,
}

#[must_use]
pub fn context(tree: &BlockTree, selection: &Selection) -> CursorContext {
    let is_collapsed = selection.is_collapsed();
    let exact = if is_collapsed {
        None
    } else {
        locate_exact(tree, selection.range())
    };
    let block = exact.unwrap_or_else(|| locate(tree, selection.active));
    CursorContext {
        block,
        index_in_parent: tree.index_in_parent(block),
        is_collapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::profile::Registry;
    use crate::tree::build;
    use pretty_assertions::assert_eq;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn tree(lang: &str, text: &str) -> BlockTree {
        build(&Buffer::from_text(text), Registry::builtin().resolve(lang))
    }

    // `{` at 2, `(` at 6, `)` at 10, `}` at 14, second `{ f }` at 18..23.
    const C: &str = "a { b ( c ) d } e { f }";

    #[test]
    fn locate_innermost() {
        let t = tree("c", C);
        let outer = t.children(t.root())[0];
        let paren = t.children(outer)[0];
        assert_eq!(locate(&t, p(0, 4)), outer);
        assert_eq!(locate(&t, p(0, 8)), paren);
        assert_eq!(locate(&t, p(0, 12)), outer);
    }

    #[test]
    fn locate_outside_every_block_is_root() {
        let t = tree("c", C);
        assert_eq!(locate(&t, p(0, 0)), t.root());
        assert_eq!(locate(&t, p(0, 16)), t.root());
        assert_eq!(locate(&t, p(9, 9)), t.root());
    }

    #[test]
    fn end_edge_belongs_to_the_block() {
        let t = tree("c", C);
        let outer = t.children(t.root())[0];
        let paren = t.children(outer)[0];
        // On the `)` and on the `}`.
        assert_eq!(locate(&t, p(0, 10)), paren);
        assert_eq!(locate(&t, p(0, 14)), outer);
    }

    #[test]
    fn end_edge_of_statement() {
        let t = tree("python", "if a:\n    b = 1\nc");
        let body = t.children(t.root())[0];
        let stmt = t.children(body)[0];
        assert_eq!(locate(&t, p(1, 9)), stmt);
    }

    #[test]
    fn exact_prefers_the_outermost_match() {
        let t = tree("python", "if a:\n    b = 1\nc");
        let body = t.children(t.root())[0];
        let range = t.range(body);
        assert_eq!(t.range(t.children(body)[0]), range);
        assert_eq!(locate_exact(&t, range), Some(body));
    }

    #[test]
    fn exact_misses_partial_ranges() {
        let t = tree("c", C);
        let outer = t.children(t.root())[0];
        assert_eq!(locate_exact(&t, t.range(outer)), Some(outer));
        assert_eq!(locate_exact(&t, Range::new(p(0, 4), p(0, 9))), None);
        // The root is never an exact match.
        assert_eq!(locate_exact(&t, t.range(t.root())), None);
    }

    #[test]
    fn enclosing_finds_the_smallest_cover() {
        let t = tree("c", C);
        let outer = t.children(t.root())[0];
        let paren = t.children(outer)[0];
        assert_eq!(locate_enclosing(&t, Range::new(p(0, 8), p(0, 10))), paren);
        assert_eq!(locate_enclosing(&t, Range::new(p(0, 5), p(0, 9))), outer);
        assert_eq!(locate_enclosing(&t, Range::new(p(0, 4), p(0, 20))), t.root());
    }

    #[test]
    fn context_of_cursor_and_selection() {
        let t = tree("c", C);
        let second = t.children(t.root())[1];

        let cursor = context(&t, &Selection::cursor(p(0, 20)));
        assert_eq!(
            cursor,
            CursorContext {
                block: second,
                index_in_parent: Some(1),
                is_collapsed: true,
            }
        );

        let r = t.range(second);
        let selected = context(&t, &Selection::new(r.end, r.start));
        assert_eq!(selected.block, second);
        assert!(!selected.is_collapsed);

        let root = context(&t, &Selection::cursor(p(0, 0)));
        assert_eq!(root.index_in_parent, None);
    }
}
