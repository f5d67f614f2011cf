//! Lexical scanner: the token stream the tree builder consumes.
//!
//! The scanner only cares about what shapes blocks: delimiters, the
//! comments and strings that hide delimiters, and (for indented languages)
//! where each logical line starts and how deep it is indented. Everything
//! else collapses into [`TokenKind::Other`] runs.
//!
//! # Laziness
//!
//! [`Scanner`] is an iterator that scans one line of the rope at a time and
//! hands out that line's tokens before touching the next. Comment and string
//! state carries across lines. Cloning a scanner restarts from the clone
//! point, and [`scan`] always starts from the top.
//!
//! # Failure
//!
//! There is none. An unterminated comment or multi-line string produces a
//! token that runs to the end of the document; a single-line string that
//! never closes ends at the end of its line.
//!
//! # Logical lines
//!
//! For [`Strategy::Indented`] profiles each line that starts a logical line
//! gets a [`TokenKind::Newline`] token first, covering its leading
//! whitespace and carrying its depth. A line does not start a logical line
//! when it is blank, starts with a comment, starts inside a multi-line
//! string or comment, follows a trailing `\`
//! ([`ProfileFlags::LINE_CONTINUATION`]), or sits inside unclosed brackets
//! ([`ProfileFlags::BRACKET_CONTINUATION`]).

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::mem;

use crate::buffer::{is_line_break, Buffer};
use crate::position::{Position, Range};
use crate::profile::{
    BlockComment, DelimiterClass, LanguageProfile, ProfileFlags, Strategy, StringRule,
};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// What a skipped span was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opaque {
    Comment,
    String,
}

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Opens a block of the given family.
    Open(DelimiterClass),
    /// Closes a block of the given family.
    Close(DelimiterClass),
    /// Closes a block of the family and opens its next sibling (`else`).
    Reopen(DelimiterClass),
    /// Start of a logical line in an indented language.
    Newline { depth: usize },
    /// A comment or literal; its contents were never classified.
    CommentOrString(Opaque),
    /// A run of ordinary code.
    Other,
}

/// A classified span of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range,
}

// ---------------------------------------------------------------------------
// Lexicon
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Open,
    LeadingOpen,
    Close,
    Reopen,
}

/// A profile's delimiters, split into symbols and keywords for lookup.
#[derive(Debug, Clone)]
struct Lexicon<'p> {
    /// Longest first, so `(*` wins over `(`.
    symbols: Vec<(&'p str, DelimiterClass, Role)>,
    words: HashMap<&'p str, (DelimiterClass, Role)>,
}

impl<'p> Lexicon<'p> {
    fn new(profile: &'p LanguageProfile) -> Self {
        let mut symbols = Vec::new();
        let mut words = HashMap::new();
        for (index, pair) in profile.delimiters.iter().enumerate() {
            let class = DelimiterClass(index);
            let roles = [
                (&pair.open, Role::Open),
                (&pair.leading_open, Role::LeadingOpen),
                (&pair.close, Role::Close),
                (&pair.reopen, Role::Reopen),
            ];
            for (tokens, role) in roles {
                for token in tokens.iter().filter(|t| !t.is_empty()) {
                    if token.chars().all(is_word_char) {
                        words.entry(token.as_str()).or_insert((class, role));
                    } else {
                        symbols.push((token.as_str(), class, role));
                    }
                }
            }
        }
        symbols.sort_by_key(|(symbol, ..)| Reverse(symbol.chars().count()));
        Self { symbols, words }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[inline]
fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// True when `pattern` occurs in `chars` at `at`.
fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    !pattern.is_empty()
        && pattern
            .chars()
            .enumerate()
            .all(|(k, p)| chars.get(at + k) == Some(&p))
}

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Whether a `leading_open` keyword preceded by `prev` starts an expression.
fn is_leading(prev: Option<char>) -> bool {
    prev.is_none_or(|ch| matches!(ch, '=' | '(' | '[' | '{' | ',' | ';' | '|' | '&' | '!'))
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Mode {
    Code,
    Comment {
        rule: usize,
        depth: usize,
        start: Position,
    },
    Str {
        rule: usize,
        start: Position,
    },
}

/// Lazy token stream over a buffer. Created by [`scan`].
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    buffer: &'a Buffer,
    profile: &'a LanguageProfile,
    lexicon: Lexicon<'a>,
    /// Next line to scan.
    line: usize,
    /// Chars of the line being scanned, terminator stripped.
    chars: Vec<char>,
    pending: VecDeque<Token>,
    mode: Mode,
    /// Unclosed symbol delimiters, for bracket continuation.
    bracket_depth: usize,
    /// The previous line ended with a continuation `\`.
    continued: bool,
    finished: bool,
}

/// Start scanning `buffer` from the top with `profile`'s rules.
#[must_use]
pub fn scan<'a>(buffer: &'a Buffer, profile: &'a LanguageProfile) -> Scanner<'a> {
    Scanner {
        buffer,
        profile,
        lexicon: Lexicon::new(profile),
        line: 0,
        chars: Vec::new(),
        pending: VecDeque::new(),
        mode: Mode::Code,
        bracket_depth: 0,
        continued: false,
        finished: false,
    }
}

impl<'a> Scanner<'a> {
    #[inline]
    const fn at(&self, col: usize) -> Position {
        Position::new(self.line, col)
    }

    fn emit(&mut self, kind: TokenKind, start: Position, end: Position) {
        self.pending.push_back(Token {
            kind,
            range: Range::new(start, end),
        });
    }

    fn flush_run(&mut self, run: &mut Option<usize>, end: usize) {
        if let Some(start) = run.take() {
            self.emit(TokenKind::Other, self.at(start), self.at(end));
        }
    }

    /// Scan `self.line` into `pending`.
    fn scan_line(&mut self) {
        let Some(slice) = self.buffer.line(self.line) else {
            return;
        };
        self.chars.clear();
        self.chars
            .extend(slice.chars().take_while(|&ch| !is_line_break(ch)));

        let flags = self.profile.flags;
        let starts_logical = matches!(self.mode, Mode::Code)
            && !self.continued
            && !(self.bracket_depth > 0 && flags.contains(ProfileFlags::BRACKET_CONTINUATION));
        self.continued = false;
        if self.profile.strategy == Strategy::Indented && starts_logical {
            self.emit_indentation();
        }

        let len = self.chars.len();
        let mut i = 0;
        let mut run: Option<usize> = None;
        // Last code char seen on this line, whitespace excluded.
        let mut prev: Option<char> = None;
        let mut escaped_eol = false;

        while i < len {
            match self.mode {
                Mode::Comment { rule, depth, start } => {
                    i = self.scan_comment(i, rule, depth, start);
                }
                Mode::Str { rule, start } => {
                    i = self.scan_string(i, rule, start, &mut escaped_eol);
                }
                Mode::Code => {
                    let ch = self.chars[i];
                    if ch.is_whitespace() {
                        self.flush_run(&mut run, i);
                        i += 1;
                    } else if let Some((rule, open_len)) = self.block_comment_at(i) {
                        self.flush_run(&mut run, i);
                        self.mode = Mode::Comment {
                            rule,
                            depth: 1,
                            start: self.at(i),
                        };
                        i += open_len;
                    } else if self.line_comment_at(i) {
                        self.flush_run(&mut run, i);
                        self.emit(
                            TokenKind::CommentOrString(Opaque::Comment),
                            self.at(i),
                            self.at(len),
                        );
                        i = len;
                    } else if let Some((rule, open_len)) = self.string_at(i) {
                        self.flush_run(&mut run, i);
                        self.mode = Mode::Str {
                            rule,
                            start: self.at(i),
                        };
                        prev = Some(ch);
                        i += open_len;
                    } else if let Some((symbol, class, role)) = self.symbol_at(i) {
                        self.flush_run(&mut run, i);
                        let n = char_len(symbol);
                        self.delimiter(role, class, i, i + n, true);
                        prev = self.chars.get(i + n - 1).copied();
                        i += n;
                    } else if is_word_char(ch) {
                        let mut j = i + 1;
                        while j < len && is_word_char(self.chars[j]) {
                            j += 1;
                        }
                        if let Some((class, role)) = self.keyword_at(i, j, prev) {
                            self.flush_run(&mut run, i);
                            self.delimiter(role, class, i, j, false);
                        } else {
                            run.get_or_insert(i);
                        }
                        prev = Some(self.chars[j - 1]);
                        i = j;
                    } else {
                        run.get_or_insert(i);
                        prev = Some(ch);
                        i += 1;
                    }
                }
            }
        }
        self.flush_run(&mut run, len);

        match self.mode {
            Mode::Str { rule, start }
                if !self.profile.strings[rule].multiline && !escaped_eol =>
            {
                self.emit(
                    TokenKind::CommentOrString(Opaque::String),
                    start,
                    self.at(len),
                );
                self.mode = Mode::Code;
            }
            Mode::Code => {
                self.continued =
                    flags.contains(ProfileFlags::LINE_CONTINUATION) && prev == Some('\\');
            }
            _ => {}
        }
    }

    /// Emit the `Newline` token for the current line if it carries code.
    fn emit_indentation(&mut self) {
        let tab_width = self.profile.tab_width;
        let mut depth = 0;
        let mut k = 0;
        while k < self.chars.len() && self.chars[k].is_whitespace() {
            depth += if self.chars[k] == '\t' { tab_width } else { 1 };
            k += 1;
        }
        if k == self.chars.len() || self.line_comment_at(k) || self.block_comment_at(k).is_some()
        {
            return;
        }
        self.emit(TokenKind::Newline { depth }, self.at(0), self.at(k));
    }

    /// Continue a block comment from `i`. Returns where scanning resumes.
    fn scan_comment(
        &mut self,
        mut i: usize,
        rule: usize,
        mut depth: usize,
        start: Position,
    ) -> usize {
        let profile = self.profile;
        let comment = &profile.block_comments[rule];
        let nested = profile.flags.contains(ProfileFlags::NESTED_COMMENTS);
        while i < self.chars.len() {
            if nested && starts_with(&self.chars, i, &comment.open) {
                depth += 1;
                i += char_len(&comment.open);
            } else if starts_with(&self.chars, i, &comment.close) {
                i += char_len(&comment.close);
                depth -= 1;
                if depth == 0 {
                    self.emit(TokenKind::CommentOrString(Opaque::Comment), start, self.at(i));
                    self.mode = Mode::Code;
                    return i;
                }
            } else {
                i += 1;
            }
        }
        self.mode = Mode::Comment { rule, depth, start };
        i
    }

    /// Continue a literal from `i`. Returns where scanning resumes.
    fn scan_string(
        &mut self,
        mut i: usize,
        rule: usize,
        start: Position,
        escaped_eol: &mut bool,
    ) -> usize {
        let rule = &self.profile.strings[rule];
        let len = self.chars.len();
        while i < len {
            let ch = self.chars[i];
            if Some(ch) == rule.escape {
                if i + 1 == len {
                    *escaped_eol = true;
                    return len;
                }
                i += 2;
            } else if starts_with(&self.chars, i, &rule.close) {
                i += char_len(&rule.close);
                self.emit(TokenKind::CommentOrString(Opaque::String), start, self.at(i));
                self.mode = Mode::Code;
                return i;
            } else {
                i += 1;
            }
        }
        len
    }

    fn block_comment_at(&self, i: usize) -> Option<(usize, usize)> {
        self.profile
            .block_comments
            .iter()
            .position(|c| starts_with(&self.chars, i, &c.open) && !self.fence_runs_on(i, c))
            .map(|rule| (rule, char_len(&self.profile.block_comments[rule].open)))
    }

    /// A fence comment (`###` ... `###`) only opens on an exact fence: in
    /// `#### Section` the `###` is part of a line comment.
    fn fence_runs_on(&self, i: usize, comment: &BlockComment) -> bool {
        comment.open == comment.close
            && comment
                .open
                .chars()
                .last()
                .is_some_and(|last| self.chars.get(i + char_len(&comment.open)) == Some(&last))
    }

    fn line_comment_at(&self, i: usize) -> bool {
        self.profile
            .line_comments
            .iter()
            .any(|marker| starts_with(&self.chars, i, marker))
    }

    fn string_at(&self, i: usize) -> Option<(usize, usize)> {
        self.profile
            .strings
            .iter()
            .enumerate()
            .find(|(_, rule)| {
                starts_with(&self.chars, i, &rule.open)
                    && (!rule.char_literal || self.closes_soon(i + char_len(&rule.open), rule))
            })
            .map(|(index, rule)| (index, char_len(&rule.open)))
    }

    /// Whether a char literal whose body starts at `body` closes within a
    /// few chars (`'x'`, `'\n'`, `'\u{1F600}'`).
    fn closes_soon(&self, body: usize, rule: &StringRule) -> bool {
        let Some(&first) = self.chars.get(body) else {
            return false;
        };
        if Some(first) == rule.escape {
            let limit = (body + 12).min(self.chars.len());
            (body + 2..limit).any(|k| starts_with(&self.chars, k, &rule.close))
        } else {
            starts_with(&self.chars, body + 1, &rule.close)
        }
    }

    fn symbol_at(&self, i: usize) -> Option<(&'a str, DelimiterClass, Role)> {
        self.lexicon
            .symbols
            .iter()
            .find(|(symbol, ..)| starts_with(&self.chars, i, symbol))
            .copied()
    }

    /// The delimiter role of the word `chars[i..j]`, if it acts as one here.
    fn keyword_at(&self, i: usize, j: usize, prev: Option<char>) -> Option<(DelimiterClass, Role)> {
        if self.lexicon.words.is_empty() || self.chars[i].is_ascii_digit() {
            return None;
        }
        // Method calls, symbols and sigils: `x.end`, `:end`, `@end`.
        if i > 0 && matches!(self.chars[i - 1], '.' | ':' | '@' | '$') {
            return None;
        }
        // Labels and hash keys: `if: 1` (but not `Foo::Bar`).
        if self.chars.get(j) == Some(&':') && self.chars.get(j + 1) != Some(&':') {
            return None;
        }
        let word: String = self.chars[i..j].iter().collect();
        let &(class, role) = self.lexicon.words.get(word.as_str())?;
        if role == Role::LeadingOpen && !is_leading(prev) {
            return None;
        }
        Some((class, role))
    }

    fn delimiter(
        &mut self,
        role: Role,
        class: DelimiterClass,
        start: usize,
        end: usize,
        symbolic: bool,
    ) {
        let kind = match role {
            Role::Open | Role::LeadingOpen => {
                if symbolic {
                    self.bracket_depth += 1;
                }
                TokenKind::Open(class)
            }
            Role::Close => {
                if symbolic {
                    self.bracket_depth = self.bracket_depth.saturating_sub(1);
                }
                TokenKind::Close(class)
            }
            Role::Reopen => TokenKind::Reopen(class),
        };
        self.emit(kind, self.at(start), self.at(end));
    }

    /// Close whatever is still open at end of input.
    fn finish(&mut self) {
        let end = self.buffer.end_position();
        match mem::replace(&mut self.mode, Mode::Code) {
            Mode::Comment { start, .. } => {
                self.emit(TokenKind::CommentOrString(Opaque::Comment), start, end);
            }
            Mode::Str { start, .. } => {
                self.emit(TokenKind::CommentOrString(Opaque::String), start, end);
            }
            Mode::Code => {}
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.line < self.buffer.line_count() {
                self.scan_line();
                self.line += 1;
            } else if self.finished {
                return None;
            } else {
                self.finished = true;
                self.finish();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
