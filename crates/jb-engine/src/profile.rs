//! Language profiles: how each language delimits its blocks.
//!
//! A [`LanguageProfile`] is plain data: which [`Strategy`] builds the tree,
//! which delimiter families open and close blocks, and which comment and
//! string syntax the scanner must step over. Adding a language is adding a
//! profile to the [`Registry`], never new code.
//!
//! # Delimiter families
//!
//! A [`DelimiterPair`] is one family: every token in `open` is closed by any
//! token in `close`. Tokens made only of identifier characters (`end`,
//! `then`) are *keywords* and match whole words only; everything else (`{`,
//! `(*`) is a *symbol* and matches anywhere. Two extras cover keyword
//! languages:
//!
//! | Field          | Effect                                               |
//! |----------------|------------------------------------------------------|
//! | `reopen`       | closes the open block of the family, opens a sibling |
//! | `leading_open` | opens only at the start of an expression             |
//!
//! So Ruby's `if` opens a block on its own line but not as a statement
//! modifier (`return if done`), and `else` splits the `if` body in two.
//!
//! # Built-in languages
//!
//! Identifiers are the ones editors report (`cpp`, `typescriptreact`,
//! `objective-cpp`...). Unknown identifiers resolve to
//! [`LanguageProfile::generic`]: `{}` `()` `[]` with no comment or string
//! awareness.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Strategy & flags
// ---------------------------------------------------------------------------

/// How a profile turns tokens into blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Blocks are the spans between matched delimiters.
    #[default]
    Bracketed,
    /// Blocks are runs of lines indented deeper than their header.
    Indented,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bracketed => f.write_str("bracketed"),
            Self::Indented => f.write_str("indented"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bracketed" => Ok(Self::Bracketed),
            "indented" => Ok(Self::Indented),
            other => Err(format!("unknown strategy `{other}`")),
        }
    }
}

bitflags! {
    /// Lexical switches that apply to a whole profile.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProfileFlags: u8 {
        /// Block comments nest (`/* /* */ */` is one comment).
        const NESTED_COMMENTS = 1;
        /// A trailing `\` joins the next line onto the current logical line.
        const LINE_CONTINUATION = 1 << 1;
        /// Lines inside unclosed symbol delimiters continue the logical line.
        const BRACKET_CONTINUATION = 1 << 2;
    }
}

// ---------------------------------------------------------------------------
// Lexical rules
// ---------------------------------------------------------------------------

/// Index of a delimiter family within its profile.
///
/// A closer only ever matches an opener of the same class, so `}` never
/// closes a block opened by `(`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DelimiterClass(pub usize);

/// One family of block delimiters. See the module docs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DelimiterPair {
    pub open: Vec<String>,
    pub close: Vec<String>,
    pub reopen: Vec<String>,
    pub leading_open: Vec<String>,
}

impl DelimiterPair {
    /// A symbol pair such as `{` / `}`.
    #[must_use]
    pub fn symbols(open: &str, close: &str) -> Self {
        Self {
            open: vec![open.to_owned()],
            close: vec![close.to_owned()],
            ..Self::default()
        }
    }

    /// A keyword family: any of `open` is closed by any of `close`.
    #[must_use]
    pub fn keywords(open: &[&str], close: &[&str]) -> Self {
        Self {
            open: to_owned_all(open),
            close: to_owned_all(close),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reopen(mut self, reopen: &[&str]) -> Self {
        self.reopen.extend(reopen.iter().map(|s| (*s).to_owned()));
        self
    }

    #[must_use]
    pub fn with_leading_open(mut self, leading: &[&str]) -> Self {
        self.leading_open.extend(leading.iter().map(|s| (*s).to_owned()));
        self
    }
}

/// A block comment such as `/*` ... `*/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockComment {
    pub open: String,
    pub close: String,
}

impl BlockComment {
    #[must_use]
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_owned(),
            close: close.to_owned(),
        }
    }
}

/// A string or char literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRule {
    pub open: String,
    pub close: String,
    /// Skips the char after it, so `"\""` stays one string.
    pub escape: Option<char>,
    /// May span lines. A single-line literal ends at end of line unless its
    /// last char is the escape.
    pub multiline: bool,
    /// Only a literal when it closes within a few chars (`'x'`, `'\n'`).
    /// Anything else is ordinary code, so Rust lifetimes stay code.
    pub char_literal: bool,
}

impl StringRule {
    /// A single-line literal with `\` escapes.
    #[must_use]
    pub fn quoted(quote: &str) -> Self {
        Self {
            open: quote.to_owned(),
            close: quote.to_owned(),
            escape: Some('\\'),
            multiline: false,
            char_literal: false,
        }
    }

    /// A literal that may span lines, with `\` escapes.
    #[must_use]
    pub fn multiline(quote: &str) -> Self {
        Self {
            multiline: true,
            ..Self::quoted(quote)
        }
    }

    /// A literal with no escapes that may span lines (Go raw strings, Lua
    /// long strings).
    #[must_use]
    pub fn raw(open: &str, close: &str) -> Self {
        Self {
            open: open.to_owned(),
            close: close.to_owned(),
            escape: None,
            multiline: true,
            char_literal: false,
        }
    }

    /// A `'x'` char literal.
    #[must_use]
    pub fn char_literal() -> Self {
        Self {
            char_literal: true,
            ..Self::quoted("'")
        }
    }
}

fn to_owned_all(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

// ---------------------------------------------------------------------------
// LanguageProfile
// ---------------------------------------------------------------------------

/// Everything the scanner and tree builder need to know about a language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageProfile {
    pub name: String,
    pub strategy: Strategy,
    pub delimiters: Vec<DelimiterPair>,
    pub line_comments: Vec<String>,
    pub block_comments: Vec<BlockComment>,
    pub strings: Vec<StringRule>,
    /// Columns a tab counts for when measuring indentation depth.
    pub tab_width: usize,
    pub flags: ProfileFlags,
}

impl LanguageProfile {
    /// An empty bracketed profile.
    #[must_use]
    pub fn bracketed(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            strategy: Strategy::Bracketed,
            delimiters: Vec::new(),
            line_comments: Vec::new(),
            block_comments: Vec::new(),
            strings: Vec::new(),
            tab_width: 4,
            flags: ProfileFlags::empty(),
        }
    }

    /// An empty indented profile.
    #[must_use]
    pub fn indented(name: &str) -> Self {
        Self {
            strategy: Strategy::Indented,
            ..Self::bracketed(name)
        }
    }

    /// The fallback for unknown languages: `{}` `()` `[]`, nothing else.
    #[must_use]
    pub fn generic() -> Self {
        Self::bracketed("generic").with_common_brackets()
    }

    /// Add `{}` `()` `[]` as three separate families.
    #[must_use]
    pub fn with_common_brackets(self) -> Self {
        self.delimiter(DelimiterPair::symbols("{", "}"))
            .delimiter(DelimiterPair::symbols("(", ")"))
            .delimiter(DelimiterPair::symbols("[", "]"))
    }

    #[must_use]
    pub fn delimiter(mut self, pair: DelimiterPair) -> Self {
        self.delimiters.push(pair);
        self
    }

    #[must_use]
    pub fn line_comment(mut self, marker: &str) -> Self {
        self.line_comments.push(marker.to_owned());
        self
    }

    #[must_use]
    pub fn block_comment(mut self, open: &str, close: &str) -> Self {
        self.block_comments.push(BlockComment::new(open, close));
        self
    }

    /// Add a literal rule. Rules are tried in insertion order, so add `"""`
    /// before `"`.
    #[must_use]
    pub fn string(mut self, rule: StringRule) -> Self {
        self.strings.push(rule);
        self
    }

    #[must_use]
    pub const fn tab_width(mut self, width: usize) -> Self {
        self.tab_width = width;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: ProfileFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Rename, keeping every rule. Used to derive one language from another.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        name.clone_into(&mut self.name);
        self
    }

    /// The family a class refers to.
    #[must_use]
    pub fn family(&self, class: DelimiterClass) -> Option<&DelimiterPair> {
        self.delimiters.get(class.0)
    }
}

// ---------------------------------------------------------------------------
// Built-in profiles
// ---------------------------------------------------------------------------

/// C and everything that copied its lexical syntax.
fn c_family(name: &str) -> LanguageProfile {
    LanguageProfile::bracketed(name)
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::quoted("\""))
        .string(StringRule::char_literal())
}

fn javascript(name: &str) -> LanguageProfile {
    LanguageProfile::bracketed(name)
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
        .string(StringRule::multiline("`"))
}

fn rust() -> LanguageProfile {
    LanguageProfile::bracketed("rust")
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::raw("r##\"", "\"##"))
        .string(StringRule::raw("r#\"", "\"#"))
        .string(StringRule::raw("r\"", "\""))
        .string(StringRule::multiline("\""))
        .string(StringRule::char_literal())
        .flags(ProfileFlags::NESTED_COMMENTS)
}

fn go() -> LanguageProfile {
    c_family("go").string(StringRule::raw("`", "`"))
}

fn swift() -> LanguageProfile {
    LanguageProfile::bracketed("swift")
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::multiline("\"\"\""))
        .string(StringRule::quoted("\""))
        .flags(ProfileFlags::NESTED_COMMENTS)
}

fn kotlin_like(name: &str) -> LanguageProfile {
    LanguageProfile::bracketed(name)
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::raw("\"\"\"", "\"\"\""))
        .string(StringRule::quoted("\""))
        .string(StringRule::char_literal())
}

fn dart() -> LanguageProfile {
    LanguageProfile::bracketed("dart")
        .with_common_brackets()
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::multiline("\"\"\""))
        .string(StringRule::multiline("'''"))
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
        .flags(ProfileFlags::NESTED_COMMENTS)
}

fn php() -> LanguageProfile {
    LanguageProfile::bracketed("php")
        .with_common_brackets()
        .line_comment("//")
        .line_comment("#")
        .block_comment("/*", "*/")
        .string(StringRule::multiline("\""))
        .string(StringRule::multiline("'"))
}

fn css(name: &str) -> LanguageProfile {
    LanguageProfile::bracketed(name)
        .with_common_brackets()
        .block_comment("/*", "*/")
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
}

fn json(name: &str) -> LanguageProfile {
    LanguageProfile::bracketed(name)
        .delimiter(DelimiterPair::symbols("{", "}"))
        .delimiter(DelimiterPair::symbols("[", "]"))
        .line_comment("//")
        .block_comment("/*", "*/")
        .string(StringRule::quoted("\""))
}

fn python() -> LanguageProfile {
    LanguageProfile::indented("python")
        .with_common_brackets()
        .line_comment("#")
        .string(StringRule::multiline("\"\"\""))
        .string(StringRule::multiline("'''"))
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
        .tab_width(8)
        .flags(ProfileFlags::LINE_CONTINUATION | ProfileFlags::BRACKET_CONTINUATION)
}

fn coffeescript() -> LanguageProfile {
    LanguageProfile::indented("coffeescript")
        .with_common_brackets()
        .block_comment("###", "###")
        .line_comment("#")
        .string(StringRule::multiline("\"\"\""))
        .string(StringRule::multiline("'''"))
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
        .flags(ProfileFlags::LINE_CONTINUATION | ProfileFlags::BRACKET_CONTINUATION)
}

fn yaml() -> LanguageProfile {
    LanguageProfile::indented("yaml")
        .delimiter(DelimiterPair::symbols("{", "}"))
        .delimiter(DelimiterPair::symbols("[", "]"))
        .line_comment("#")
        .string(StringRule::quoted("\""))
        .string(StringRule {
            escape: None,
            ..StringRule::quoted("'")
        })
        .tab_width(1)
        .flags(ProfileFlags::BRACKET_CONTINUATION)
}

fn nim() -> LanguageProfile {
    LanguageProfile::indented("nim")
        .with_common_brackets()
        .block_comment("#[", "]#")
        .line_comment("#")
        .string(StringRule::raw("\"\"\"", "\"\"\""))
        .string(StringRule::quoted("\""))
        .string(StringRule::char_literal())
        .flags(ProfileFlags::NESTED_COMMENTS | ProfileFlags::BRACKET_CONTINUATION)
}

fn lua() -> LanguageProfile {
    LanguageProfile::bracketed("lua")
        .with_common_brackets()
        .delimiter(
            DelimiterPair::keywords(&["function", "do", "then"], &["end", "elseif"])
                .with_reopen(&["else"]),
        )
        .delimiter(DelimiterPair::keywords(&["repeat"], &["until"]))
        .block_comment("--[[", "]]")
        .line_comment("--")
        .string(StringRule::raw("[[", "]]"))
        .string(StringRule::quoted("\""))
        .string(StringRule::quoted("'"))
}

fn ruby() -> LanguageProfile {
    LanguageProfile::bracketed("ruby")
        .with_common_brackets()
        .delimiter(
            DelimiterPair::keywords(&["class", "module", "def", "do", "begin", "case"], &["end"])
                .with_leading_open(&["if", "unless", "while", "until", "for"])
                .with_reopen(&["else", "elsif", "when", "rescue", "ensure"]),
        )
        .block_comment("=begin", "=end")
        .line_comment("#")
        .string(StringRule::multiline("\""))
        .string(StringRule::multiline("'"))
}

type Entry = (&'static [&'static str], LanguageProfile);

fn entry(ids: &'static [&'static str], profile: LanguageProfile) -> Entry {
    (ids, profile)
}

/// Identifiers and the profile each group resolves to.
fn builtin_table() -> Vec<Entry> {
    vec![
        entry(&["c"], c_family("c")),
        entry(&["cpp", "cuda-cpp", "objective-c", "objective-cpp"], c_family("cpp")),
        entry(&["csharp"], c_family("csharp")),
        entry(&["java"], c_family("java")),
        entry(&["groovy"], kotlin_like("groovy")),
        entry(&["kotlin"], kotlin_like("kotlin")),
        entry(&["scala"], kotlin_like("scala")),
        entry(&["go"], go()),
        entry(&["rust"], rust()),
        entry(&["swift"], swift()),
        entry(&["dart"], dart()),
        entry(&["php"], php()),
        entry(
            &["javascript", "javascriptreact", "typescript", "typescriptreact"],
            javascript("javascript"),
        ),
        entry(&["css"], css("css")),
        entry(&["scss", "less"], css("scss").line_comment("//")),
        entry(&["json", "jsonc", "jsonl"], json("json")),
        entry(&["python"], python()),
        entry(&["coffeescript"], coffeescript()),
        entry(&["yaml"], yaml()),
        entry(&["nim"], nim()),
        entry(&["lua"], lua()),
        entry(&["ruby"], ruby()),
    ]
}

/// The built-in language id for a file extension, if there is one.
#[must_use]
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let id = match ext.to_ascii_lowercase().as_str() {
        "c" => "c",
        "cc" | "cpp" | "cxx" | "c++" | "h" | "hh" | "hpp" | "hxx" => "cpp",
        "cu" => "cuda-cpp",
        "m" => "objective-c",
        "mm" => "objective-cpp",
        "cs" => "csharp",
        "java" => "java",
        "groovy" | "gradle" => "groovy",
        "kt" | "kts" => "kotlin",
        "scala" | "sc" => "scala",
        "go" => "go",
        "rs" => "rust",
        "swift" => "swift",
        "dart" => "dart",
        "php" => "php",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "css" => "css",
        "scss" => "scss",
        "less" => "less",
        "json" => "json",
        "jsonc" => "jsonc",
        "jsonl" => "jsonl",
        "py" | "pyw" | "pyi" => "python",
        "coffee" => "coffeescript",
        "yaml" | "yml" => "yaml",
        "nim" | "nims" => "nim",
        "lua" => "lua",
        "rb" | "rake" | "gemspec" => "ruby",
        _ => return None,
    };
    Some(id)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::with_builtins);

/// Maps editor language identifiers to profiles.
///
/// Lookups are case-insensitive. Several identifiers may share one profile
/// (`typescript` and `javascript` scan the same way).
#[derive(Debug, Clone)]
pub struct Registry {
    profiles: Vec<LanguageProfile>,
    ids: HashMap<String, usize>,
    generic: LanguageProfile,
}

impl Registry {
    /// A registry that knows no languages; everything resolves to generic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: Vec::new(),
            ids: HashMap::new(),
            generic: LanguageProfile::generic(),
        }
    }

    /// A fresh registry holding every built-in profile. Hosts that want to
    /// add or override languages start from this.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (ids, profile) in builtin_table() {
            registry.insert(ids, profile);
        }
        registry
    }

    /// The shared built-in registry, built on first use.
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Register `profile` under every id in `ids`, replacing what they
    /// pointed at before.
    pub fn insert<S: AsRef<str>>(&mut self, ids: &[S], profile: LanguageProfile) {
        let index = self.profiles.len();
        self.profiles.push(profile);
        for id in ids {
            self.ids.insert(id.as_ref().to_ascii_lowercase(), index);
        }
    }

    /// Make `id` resolve to whatever `target` resolves to. Returns `false`
    /// when `target` is unknown.
    pub fn alias(&mut self, id: &str, target: &str) -> bool {
        match self.ids.get(&target.to_ascii_lowercase()).copied() {
            Some(index) => {
                self.ids.insert(id.to_ascii_lowercase(), index);
                true
            }
            None => false,
        }
    }

    /// The profile registered under `id`, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LanguageProfile> {
        self.ids
            .get(&id.to_ascii_lowercase())
            .map(|&index| &self.profiles[index])
    }

    /// The profile for `id`, falling back to the generic bracket profile.
    #[must_use]
    pub fn resolve(&self, id: &str) -> &LanguageProfile {
        self.get(id).unwrap_or_else(|| {
            debug!(language = id, "no profile registered, using generic brackets");
            &self.generic
        })
    }

    /// Every registered id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
