//! Whole-pipeline properties: scan, build, locate and navigate together,
//! over small documents in several languages.

use jb_engine::buffer::Buffer;
use jb_engine::locate::locate_exact;
use jb_engine::navigate::{Direction, Navigator};
use jb_engine::position::{Position, Range, Selection};
use jb_engine::profile::{LanguageProfile, Registry};
use jb_engine::tree::{build, BlockId, BlockTree};
use jb_engine::{jump_down, jump_out, jump_up, SelectionResult};
use pretty_assertions::assert_eq;

const SAMPLES: &[(&str, &str)] = &[
    (
        "c",
        "int main(void) {\n  if (x) {\n    y();\n  } else {\n    z[0] = 1;\n  }\n  return 0;\n}\n\nstatic void g() { /* } */ }\n",
    ),
    (
        "rust",
        "fn a<'a>(s: &'a str) -> bool {\n    let c = '{';\n    match s {\n        \"}\" => true,\n        _ => false,\n    }\n}\n",
    ),
    (
        "python",
        "class A:\n    def f(self):\n        x = 1\n        if x:\n            y = 2\n        z = 3\n\n    def g(self):\n        pass\n",
    ),
    (
        "lua",
        "function f(x)\n  if x then\n    return 1\n  else\n    return 2\n  end\nend\n",
    ),
    (
        "ruby",
        "class A\n  def f\n    x if y\n  end\n\n  def g\n  end\nend\n",
    ),
    ("json", "{\"a\": [1, {\"b\": \"}\"}], \"c\": {}}"),
    ("typescript", "const s = `${a} {`;\nfunction f() { return [1, 2]; }\n"),
    ("c", "{ ( } ) ] {{ \"unterminated"),
    ("python", "\tif a:\n  b\n        c\n    d\n"),
];

fn setup(lang: &str, text: &str) -> (Buffer, &'static LanguageProfile, BlockTree) {
    let buffer = Buffer::from_text(text);
    let profile = Registry::builtin().resolve(lang);
    let tree = build(&buffer, profile);
    (buffer, profile, tree)
}

fn select(range: Range) -> Selection {
    Selection::new(range.start, range.end)
}

/// Blocks a user can select and have recognized as themselves.
fn selectable(tree: &BlockTree) -> Vec<BlockId> {
    tree.iter()
        .map(|(id, _)| id)
        .filter(|&id| id != tree.root())
        .filter(|&id| {
            let range = tree.range(id);
            !range.is_empty() && locate_exact(tree, range) == Some(id)
        })
        .collect()
}

fn sel(sr: usize, sc: usize, er: usize, ec: usize) -> SelectionResult {
    SelectionResult::new(Position::new(sr, sc), Position::new(er, ec))
}

// ---------------------------------------------------------------------------
// Tree invariants
// ---------------------------------------------------------------------------

#[test]
fn children_are_contained_ordered_and_disjoint() {
    for (lang, text) in SAMPLES {
        let (_, _, tree) = setup(lang, text);
        assert_eq!(tree.check_invariants(), Ok(()), "{lang}: {text:?}");
        for (id, block) in tree.iter() {
            for pair in block.children.windows(2) {
                assert!(tree.range(pair[0]).end <= tree.range(pair[1]).start);
            }
            for &child in &block.children {
                assert!(block.range.encloses(tree.range(child)), "{lang}: {id:?}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[test]
fn exhausted_directions_return_the_selection() {
    for (lang, text) in SAMPLES {
        let (buffer, profile, tree) = setup(lang, text);
        let nav = Navigator::new(&tree, &buffer, profile);
        for id in selectable(&tree) {
            let range = tree.range(id);
            let Some(parent) = tree.parent(id) else {
                continue;
            };
            let siblings = tree.children(parent);
            if siblings.first() == Some(&id) {
                assert_eq!(nav.jump(select(range), Direction::Up), range, "{lang}");
            }
            if siblings.last() == Some(&id) {
                assert_eq!(nav.jump(select(range), Direction::Down), range, "{lang}");
            }
            if parent == tree.root() {
                assert_eq!(nav.jump(select(range), Direction::Out), range, "{lang}");
            }
        }
    }
}

#[test]
fn out_after_a_sibling_jump_selects_the_parent() {
    for (lang, text) in SAMPLES {
        let (buffer, profile, tree) = setup(lang, text);
        let nav = Navigator::new(&tree, &buffer, profile);
        for id in selectable(&tree) {
            for direction in [Direction::Down, Direction::Up] {
                let Some(target) = nav.target(select(tree.range(id)), direction) else {
                    continue;
                };
                let landed = tree.range(target);
                let parent = tree.parent(target).unwrap_or(tree.root());
                let expected = if parent == tree.root() {
                    landed
                } else {
                    tree.range(parent)
                };
                assert_eq!(nav.jump(select(landed), Direction::Out), expected, "{lang}");
            }
        }
    }
}

#[test]
fn every_result_is_a_block_or_the_original_selection() {
    for (lang, text) in SAMPLES {
        let (buffer, profile, tree) = setup(lang, text);
        let nav = Navigator::new(&tree, &buffer, profile);
        let ranges: Vec<Range> = tree.iter().map(|(_, b)| b.range).collect();
        for line in 0..buffer.line_count() {
            for col in 0..=buffer.line_len(line) {
                let cursor = Selection::cursor(Position::new(line, col));
                for direction in [Direction::Down, Direction::Up, Direction::Out] {
                    let result = nav.jump(cursor, direction);
                    assert!(
                        result == cursor.range() || ranges.contains(&result),
                        "{lang} {direction} from {line}:{col} gave {result:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn repeated_down_reaches_a_stable_end() {
    let (buffer, profile, tree) = setup("python", SAMPLES[2].1);
    let nav = Navigator::new(&tree, &buffer, profile);
    let mut selection = Selection::cursor(Position::new(2, 8));
    let mut starts = Vec::new();
    for _ in 0..10 {
        let next = nav.jump(selection, Direction::Down);
        if next == selection.range() {
            break;
        }
        starts.push(next.start);
        selection = select(next);
    }
    assert_eq!(
        starts,
        vec![Position::new(4, 12), Position::new(5, 8)]
    );
    assert_eq!(nav.jump(selection, Direction::Down), selection.range());
}

// ---------------------------------------------------------------------------
// Literal immunity and broken input
// ---------------------------------------------------------------------------

#[test]
fn string_braces_never_make_blocks() {
    let text = r#""{ not a block }" { real }"#;
    for lang in ["c", "cpp", "java", "javascript", "rust", "go", "csharp"] {
        let (_, _, tree) = setup(lang, text);
        let top = tree.children(tree.root());
        assert_eq!(top.len(), 1, "{lang}");
        assert_eq!(
            tree.range(top[0]),
            Range::new(Position::new(0, 19), Position::new(0, 25))
        );
    }
}

#[test]
fn unterminated_constructs_close_at_document_end() {
    let (buffer, _, tree) = setup("c", "int f() {\n  char *s = \"oops");
    let end = buffer.end_position();
    let body = tree.children(tree.root())[1];
    assert_eq!(tree.range(body), Range::new(Position::new(0, 9), end));

    let (buffer, _, tree) = setup("python", "def f():\n    s = '''open\n  {");
    let body = tree.children(tree.root())[0];
    assert_eq!(tree.range(body).end, buffer.end_position());
    assert_eq!(tree.check_invariants(), Ok(()));
}

// ---------------------------------------------------------------------------
// Host entry points
// ---------------------------------------------------------------------------

const PY: &str = "def f():\n    x = 1\n    if x:\n        y = 2\n    z = 3\n";

#[test]
fn python_down_and_up_through_the_if_body() {
    let if_body = jump_down("python", PY, 1, 4, 1, 4);
    assert_eq!(if_body, sel(3, 8, 3, 13));

    let z = jump_down("python", PY, 3, 13, 3, 8);
    assert_eq!(z, sel(4, 4, 4, 9));

    assert_eq!(jump_up("python", PY, 4, 9, 4, 4), sel(3, 8, 3, 13));
    assert_eq!(jump_up("python", PY, 3, 13, 3, 8), sel(1, 4, 1, 9));
    assert_eq!(jump_out("python", PY, 3, 13, 3, 8), sel(1, 4, 4, 9));
}
