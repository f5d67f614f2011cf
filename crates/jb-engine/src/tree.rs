//! Block tree: the nested scopes navigation walks over.
//!
//! The tree is an arena: blocks live in a `Vec` and refer to each other by
//! [`BlockId`]. Block 0 is the synthetic root spanning the whole document.
//! Children are kept in source order and never overlap; every block encloses
//! all of its descendants. [`BlockTree::check_invariants`] verifies this.
//!
//! # Strategies
//!
//! **Bracketed.** Each delimiter pair is a block covering the text strictly
//! between the delimiters. A closer that does not match the innermost open
//! family is ignored. Whatever is still open at end of input is closed at the
//! end of the document.
//!
//! **Indented.** Every logical line is a [`BlockKind::Statement`] leaf that
//! spans its code (leading whitespace and trailing comments excluded). When a
//! line is indented deeper than the current level, the line that introduced
//! it (the header, `if x:`) is turned into a [`BlockKind::Body`] that starts
//! at the first deeper line, so the body takes the header's place among its
//! siblings. A body ends where its last child ends.

use std::fmt;

use tracing::trace;

use crate::buffer::Buffer;
use crate::position::{Position, Range};
use crate::profile::{DelimiterClass, LanguageProfile, Strategy};
use crate::scanner::{scan, Opaque, Token, TokenKind};

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// Index of a block in its [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// The document root.
    pub const ROOT: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// What produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Root,
    /// Text between a pair of delimiters of the given family.
    Delimited(DelimiterClass),
    /// The indented lines under a header.
    Body,
    /// One logical line of an indented language.
    Statement,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Delimited(class) => write!(f, "delimited({})", class.0),
            Self::Body => f.write_str("body"),
            Self::Statement => f.write_str("statement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub range: Range,
    pub kind: BlockKind,
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
}

// ---------------------------------------------------------------------------
// BlockTree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTree {
    blocks: Vec<Block>,
}

impl BlockTree {
    fn with_root(doc_end: Position) -> Self {
        Self {
            blocks: vec![Block {
                range: Range::new(Position::ZERO, doc_end),
                kind: BlockKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Append an empty block at `start` as the last child of `parent`.
    fn push(&mut self, parent: BlockId, kind: BlockKind, start: Position) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            range: Range::point(start),
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.blocks[parent.0].children.push(id);
        id
    }

    fn set_end(&mut self, id: BlockId, end: Position) {
        let block = &mut self.blocks[id.0];
        block.range.end = end.max(block.range.start);
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> BlockId {
        BlockId::ROOT
    }

    /// # Panics
    ///
    /// Panics if `id` came from another tree.
    #[inline]
    #[must_use]
    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    #[inline]
    #[must_use]
    pub fn range(&self, id: BlockId) -> Range {
        self.blocks[id.0].range
    }

    #[inline]
    #[must_use]
    pub fn parent(&self, id: BlockId) -> Option<BlockId> {
        self.blocks[id.0].parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self, id: BlockId) -> &[BlockId] {
        &self.blocks[id.0].children
    }

    /// Position of `id` among its parent's children. `None` for the root.
    #[must_use]
    pub fn index_in_parent(&self, id: BlockId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Ancestors of `id`, nearest first, root last.
    pub fn ancestors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::successors(self.parent(id), |&id| self.parent(id))
    }

    /// Number of blocks, root included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether there are no blocks. A built tree always holds its root.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every block with its id, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i), b))
    }

    /// Verify containment, source order and parent links.
    ///
    /// # Errors
    ///
    /// Describes the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (id, block) in self.iter() {
            let mut prev: Option<Range> = None;
            for &child in &block.children {
                let range = self.range(child);
                if self.parent(child) != Some(id) {
                    return Err(format!("{child:?} does not point back to {id:?}"));
                }
                if !block.range.encloses(range) {
                    return Err(format!(
                        "{child:?} {range:?} escapes {id:?} {:?}",
                        block.range
                    ));
                }
                if let Some(prev) = prev.filter(|prev| prev.end > range.start) {
                    return Err(format!("{child:?} {range:?} overlaps {prev:?}"));
                }
                prev = Some(range);
            }
        }
        Ok(())
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, id: BlockId, depth: usize) -> fmt::Result {
        let block = self.get(id);
        writeln!(f, "{:indent$}{} {}", "", block.kind, block.range, indent = depth * 2)?;
        for &child in &block.children {
            self.fmt_block(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented outline, one block per line.
impl fmt::Display for BlockTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_block(f, BlockId::ROOT, 0)
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Scan `buffer` with `profile` and build its block tree.
#[must_use]
pub fn build(buffer: &Buffer, profile: &LanguageProfile) -> BlockTree {
    let tree = build_from_tokens(scan(buffer, profile), profile.strategy, buffer.end_position());
    trace!(language = %profile.name, blocks = tree.len(), "built block tree");
    debug_assert_eq!(tree.check_invariants(), Ok(()));
    tree
}

/// Build a tree from an already scanned token stream.
///
/// `doc_end` is where the root ends and where unclosed blocks are closed.
#[must_use]
pub fn build_from_tokens<I>(tokens: I, strategy: Strategy, doc_end: Position) -> BlockTree
where
    I: IntoIterator<Item = Token>,
{
    match strategy {
        Strategy::Bracketed => build_bracketed(tokens, doc_end),
        Strategy::Indented => build_indented(tokens, doc_end),
    }
}

fn build_bracketed(tokens: impl IntoIterator<Item = Token>, doc_end: Position) -> BlockTree {
    let mut tree = BlockTree::with_root(doc_end);
    let mut stack: Vec<(BlockId, DelimiterClass)> = Vec::new();

    for token in tokens {
        let top = stack.last().copied();
        match token.kind {
            TokenKind::Open(class) => {
                let parent = top.map_or(BlockId::ROOT, |(id, _)| id);
                let id = tree.push(parent, BlockKind::Delimited(class), token.range.end);
                stack.push((id, class));
            }
            TokenKind::Close(class) => match top {
                Some((id, open)) if open == class => {
                    tree.set_end(id, token.range.start);
                    stack.pop();
                }
                _ => trace!(at = ?token.range.start, "ignoring unmatched closer"),
            },
            TokenKind::Reopen(class) => match top {
                Some((id, open)) if open == class => {
                    tree.set_end(id, token.range.start);
                    let parent = tree.parent(id).unwrap_or(BlockId::ROOT);
                    let sibling = tree.push(parent, BlockKind::Delimited(class), token.range.end);
                    stack.pop();
                    stack.push((sibling, class));
                }
                _ => trace!(at = ?token.range.start, "ignoring unmatched reopen"),
            },
            TokenKind::Newline { .. } | TokenKind::CommentOrString(_) | TokenKind::Other => {}
        }
    }

    for (id, _) in stack.into_iter().rev() {
        tree.set_end(id, doc_end);
    }
    tree
}

/// One open indentation level.
#[derive(Debug, Clone, Copy)]
struct Level {
    depth: usize,
    container: BlockId,
}

fn build_indented(tokens: impl IntoIterator<Item = Token>, doc_end: Position) -> BlockTree {
    let mut tree = BlockTree::with_root(doc_end);
    // The root level is pushed by the first statement, at that statement's depth.
    let mut levels: Vec<Level> = Vec::new();
    let mut statement: Option<BlockId> = None;

    for token in tokens {
        match token.kind {
            TokenKind::Newline { depth } => {
                let start = token.range.end;
                if levels.is_empty() {
                    levels.push(Level {
                        depth,
                        container: BlockId::ROOT,
                    });
                }
                while levels.len() > 1 && levels.last().is_some_and(|l| depth < l.depth) {
                    if let Some(level) = levels.pop() {
                        close_body(&mut tree, level.container);
                    }
                }
                let Some(&top) = levels.last() else {
                    continue;
                };
                if depth > top.depth {
                    let header = tree
                        .children(top.container)
                        .last()
                        .copied()
                        .filter(|&id| tree.get(id).kind == BlockKind::Statement);
                    let body = if let Some(header) = header {
                        let block = &mut tree.blocks[header.0];
                        block.kind = BlockKind::Body;
                        block.range = Range::point(start);
                        header
                    } else {
                        tree.push(top.container, BlockKind::Body, start)
                    };
                    levels.push(Level {
                        depth,
                        container: body,
                    });
                } else if depth < top.depth {
                    // Dedent past the first line's depth: the root level moves out.
                    levels[0].depth = depth;
                }
                let container = levels.last().map_or(BlockId::ROOT, |l| l.container);
                statement = Some(tree.push(container, BlockKind::Statement, start));
            }
            TokenKind::CommentOrString(Opaque::Comment) => {}
            _ => {
                if let Some(id) = statement {
                    tree.set_end(id, token.range.end);
                }
            }
        }
    }

    while levels.len() > 1 {
        if let Some(level) = levels.pop() {
            close_body(&mut tree, level.container);
        }
    }
    tree
}

/// End a body where its last child ends.
fn close_body(tree: &mut BlockTree, body: BlockId) {
    if let Some(&last) = tree.children(body).last() {
        let end = tree.range(last).end;
        tree.set_end(body, end);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Registry;
    use pretty_assertions::assert_eq;

    fn p(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    fn r(sl: usize, sc: usize, el: usize, ec: usize) -> Range {
        Range::new(p(sl, sc), p(el, ec))
    }

    fn tree(lang: &str, text: &str) -> BlockTree {
        let buf = Buffer::from_text(text);
        let tree = build(&buf, Registry::builtin().resolve(lang));
        assert_eq!(tree.check_invariants(), Ok(()));
        tree
    }

    fn child_ranges(tree: &BlockTree, id: BlockId) -> Vec<Range> {
        tree.children(id).iter().map(|&c| tree.range(c)).collect()
    }

    // -- Bracketed ------------------------------------------------------------

    #[test]
    fn nested_braces() {
        let t = tree("c", "f() {\n  if (x) { y; }\n}");
        let root = t.root();
        assert_eq!(t.range(root), r(0, 0, 2, 1));
        assert_eq!(child_ranges(&t, root), vec![r(0, 2, 0, 2), r(0, 5, 2, 0)]);

        let body = t.children(root)[1];
        assert_eq!(child_ranges(&t, body), vec![r(1, 6, 1, 7), r(1, 10, 1, 14)]);
        assert_eq!(t.index_in_parent(body), Some(1));
        assert_eq!(t.parent(t.children(body)[0]), Some(body));
    }

    #[test]
    fn string_braces_make_no_block() {
        let t = tree("c", r#""{ not a block }" { real }"#);
        assert_eq!(child_ranges(&t, t.root()), vec![r(0, 19, 0, 25)]);
    }

    #[test]
    fn mismatched_closer_is_ignored() {
        let t = tree("c", "{ ( } )");
        let root = t.root();
        assert_eq!(child_ranges(&t, root), vec![r(0, 1, 0, 7)]);
        let brace = t.children(root)[0];
        assert_eq!(child_ranges(&t, brace), vec![r(0, 3, 0, 6)]);
    }

    #[test]
    fn unclosed_blocks_close_at_document_end() {
        let t = tree("c", "a {\n  b {\n    c");
        let outer = t.children(t.root())[0];
        let inner = t.children(outer)[0];
        assert_eq!(t.range(outer), r(0, 3, 2, 5));
        assert_eq!(t.range(inner), r(1, 5, 2, 5));
    }

    #[test]
    fn stray_closers_at_top_level() {
        let t = tree("c", "} ) ] { }");
        assert_eq!(child_ranges(&t, t.root()), vec![r(0, 7, 0, 8)]);
    }

    #[test]
    fn reopen_splits_into_siblings() {
        let t = tree("lua", "if a then\n  x()\nelse\n  y()\nend");
        let blocks = t.children(t.root());
        assert_eq!(blocks.len(), 2);
        assert_eq!(t.range(blocks[0]), r(0, 9, 2, 0));
        assert_eq!(t.range(blocks[1]), r(2, 4, 4, 0));
        assert_eq!(t.get(blocks[1]).kind, BlockKind::Delimited(DelimiterClass(3)));
    }

    #[test]
    fn reopen_of_another_family_is_ignored() {
        // `else` while a `(` is innermost leaves both blocks as they were.
        let t = tree("lua", "if a then f( else ) end");
        let blocks = t.children(t.root());
        assert_eq!(child_ranges(&t, t.root()), vec![r(0, 9, 0, 20)]);
        assert_eq!(child_ranges(&t, blocks[0]), vec![r(0, 12, 0, 18)]);
        let paren = t.children(blocks[0])[0];
        assert_eq!(t.get(paren).kind, BlockKind::Delimited(DelimiterClass(1)));

        // With nothing open at all.
        let t = tree("lua", "x else y");
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn ruby_def_with_modifier_if() {
        let t = tree("ruby", "def f\n  return 1 if x\n  g\nend\n");
        let blocks = t.children(t.root());
        assert_eq!(blocks.len(), 1);
        assert_eq!(t.range(blocks[0]), r(0, 3, 3, 0));
        assert!(t.children(blocks[0]).is_empty());
    }

    // -- Indented -------------------------------------------------------------

    const PY: &str = "def f():\n    x = 1\n    if x:\n        y = 2\n    z = 3\n";

    #[test]
    fn python_headers_become_bodies() {
        let t = tree("python", PY);
        let root = t.root();
        assert_eq!(child_ranges(&t, root), vec![r(1, 4, 4, 9)]);

        let def = t.children(root)[0];
        assert_eq!(t.get(def).kind, BlockKind::Body);
        assert_eq!(
            child_ranges(&t, def),
            vec![r(1, 4, 1, 9), r(3, 8, 3, 13), r(4, 4, 4, 9)]
        );

        let if_body = t.children(def)[1];
        assert_eq!(t.get(if_body).kind, BlockKind::Body);
        assert_eq!(child_ranges(&t, if_body), vec![r(3, 8, 3, 13)]);
    }

    #[test]
    fn comments_and_blank_lines_do_not_shape_bodies() {
        let text = "if a:\n    b = 1\n# gone\n\n    c = 2  # trailing\nd = 3";
        let t = tree("python", text);
        let blocks = t.children(t.root());
        assert_eq!(child_ranges(&t, t.root()), vec![r(1, 4, 4, 9), r(5, 0, 5, 5)]);
        assert_eq!(child_ranges(&t, blocks[0]), vec![r(1, 4, 1, 9), r(4, 4, 4, 9)]);
    }

    #[test]
    fn continuation_lines_extend_the_statement() {
        let text = "x = [\n  1,\n]\ny = 2";
        let t = tree("python", text);
        assert_eq!(child_ranges(&t, t.root()), vec![r(0, 0, 2, 1), r(3, 0, 3, 5)]);
    }

    #[test]
    fn dedent_to_unseen_depth_opens_a_fresh_body() {
        let text = "a:\n        b\n    c\nd";
        let t = tree("python", text);
        let root = t.root();
        assert_eq!(
            child_ranges(&t, root),
            vec![r(1, 8, 1, 9), r(2, 4, 2, 5), r(3, 0, 3, 1)]
        );
        let kinds: Vec<BlockKind> = t.children(root).iter().map(|&c| t.get(c).kind).collect();
        assert_eq!(kinds, vec![BlockKind::Body, BlockKind::Body, BlockKind::Statement]);
    }

    #[test]
    fn indented_first_line_sets_root_level() {
        let t = tree("python", "    a\n    b\nc");
        assert_eq!(
            child_ranges(&t, t.root()),
            vec![r(0, 4, 0, 5), r(1, 4, 1, 5), r(2, 0, 2, 1)]
        );
    }

    // -- Misc -----------------------------------------------------------------

    #[test]
    fn empty_document_has_only_a_root() {
        let t = tree("c", "");
        assert_eq!(t.len(), 1);
        assert!(!t.is_empty());
        assert_eq!(t.range(t.root()), Range::point(Position::ZERO));
        assert_eq!(t.index_in_parent(t.root()), None);
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let t = tree("c", "{ { { } } }");
        let deepest = BlockId(3);
        let chain: Vec<BlockId> = t.ancestors(deepest).collect();
        assert_eq!(chain, vec![BlockId(2), BlockId(1), BlockId::ROOT]);
    }

    #[test]
    fn outline_display() {
        let t = tree("c", "{ ( ) }");
        assert_eq!(
            t.to_string(),
            "root 1:1-1:8\n  delimited(0) 1:2-1:7\n    delimited(1) 1:4-1:5\n"
        );
    }

    #[test]
    fn invariants_hold_on_garbage() {
        for text in ["{{{{", "}}}}", "{ ) ] ( [ }", "\"{", "/* {", "({[)]}"] {
            tree("c", text);
        }
        for text in ["\t\tx\n y\n\t  z\n", "(\n", "'''\n  a\n", "a \\\n  b\n   c"] {
            tree("python", text);
        }
    }
}
