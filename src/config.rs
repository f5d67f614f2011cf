//! Optional TOML configuration: extra languages and filename associations.
//!
//! ```toml
//! [languages.pascal]
//! line_comments = ["//"]
//! block_comments = [{ open = "(*", close = "*)" }]
//! strings = [{ open = "'", raw = true }]
//!
//! [[languages.pascal.delimiters]]
//! open = ["begin", "record"]
//! close = ["end"]
//!
//! [languages.python]
//! tab_width = 4
//!
//! [[associations]]
//! pattern = '\.inc$'
//! language = "cpp"
//! ```
//!
//! A language that names a built-in (or sets `extends`) starts from that
//! profile: scalar settings replace the base's, list settings are appended
//! to it. Anything else starts from an empty bracketed profile.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use jb_engine::profile::{
    DelimiterPair, LanguageProfile, ProfileFlags, Registry, Strategy, StringRule,
};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::CliError;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageConfig>,
    #[serde(default)]
    pub associations: Vec<AssociationConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    /// Language whose profile this one starts from.
    pub extends: Option<String>,
    pub strategy: Option<Strategy>,
    /// More ids that resolve to this language.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub delimiters: Vec<DelimiterConfig>,
    #[serde(default)]
    pub line_comments: Vec<String>,
    #[serde(default)]
    pub block_comments: Vec<BlockCommentConfig>,
    #[serde(default)]
    pub strings: Vec<StringConfig>,
    pub tab_width: Option<usize>,
    pub nested_comments: Option<bool>,
    pub line_continuation: Option<bool>,
    pub bracket_continuation: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelimiterConfig {
    pub open: Vec<String>,
    pub close: Vec<String>,
    #[serde(default)]
    pub reopen: Vec<String>,
    #[serde(default)]
    pub leading_open: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockCommentConfig {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringConfig {
    pub open: String,
    /// Defaults to `open`.
    pub close: Option<String>,
    /// Defaults to `\`.
    pub escape: Option<char>,
    /// No escape char at all.
    #[serde(default)]
    pub raw: bool,
    #[serde(default)]
    pub multiline: bool,
    #[serde(default)]
    pub char_literal: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationConfig {
    /// Regex matched against the file path.
    pub pattern: String,
    pub language: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from `path`.
    ///
    /// # Errors
    ///
    /// The file cannot be read or is not a valid config.
    pub fn load_from_file(path: &Path) -> Result<Self, CliError> {
        let content = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CliError::Config {
            path: path.to_owned(),
            source,
        })
    }

    /// `<config dir>/jumpblock/config.toml`.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jumpblock").join("config.toml"))
    }

    /// Load `explicit` if given, else the default file if it exists, else
    /// an empty config.
    ///
    /// # Errors
    ///
    /// A file that exists but does not load. An explicit path must exist.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, CliError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading config");
                Self::load_from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// The built-in registry with this config's languages added.
    ///
    /// # Errors
    ///
    /// An `extends` that names no known language or forms a loop.
    pub fn registry(&self) -> Result<Registry, CliError> {
        let mut registry = Registry::with_builtins();
        let mut defined = HashSet::new();
        for id in self.languages.keys() {
            self.define(id, &mut registry, &mut defined, &mut Vec::new())?;
        }
        Ok(registry)
    }

    fn define(
        &self,
        id: &str,
        registry: &mut Registry,
        defined: &mut HashSet<String>,
        chain: &mut Vec<String>,
    ) -> Result<(), CliError> {
        if defined.contains(id) {
            return Ok(());
        }
        let Some(language) = self.languages.get(id) else {
            return Ok(());
        };
        let unknown = |base: &str| CliError::UnknownBase {
            language: id.to_owned(),
            base: base.to_owned(),
        };

        let base = match language.extends.as_deref() {
            Some(base) => {
                if chain.iter().any(|c| c == base) {
                    return Err(unknown(base));
                }
                // `extends` naming itself means the built-in of that name.
                if base != id && self.languages.contains_key(base) {
                    chain.push(id.to_owned());
                    self.define(base, registry, defined, chain)?;
                    chain.pop();
                }
                registry.get(base).cloned().ok_or_else(|| unknown(base))?
            }
            None => registry
                .get(id)
                .cloned()
                .unwrap_or_else(|| LanguageProfile::bracketed(id)),
        };

        let profile = language.apply(base.named(id));
        debug!(language = id, strategy = %profile.strategy, "language from config");
        let mut ids = vec![id.to_owned()];
        ids.extend(language.aliases.iter().cloned());
        registry.insert(&ids, profile);
        defined.insert(id.to_owned());
        Ok(())
    }

    /// Compile the filename associations.
    ///
    /// # Errors
    ///
    /// A pattern that is not a valid regex.
    pub fn associations(&self) -> Result<Associations, CliError> {
        let rules = self
            .associations
            .iter()
            .map(|a| {
                Regex::new(&a.pattern)
                    .map(|re| (re, a.language.clone()))
                    .map_err(|source| CliError::Pattern {
                        pattern: a.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Associations { rules })
    }
}

impl LanguageConfig {
    fn apply(&self, mut profile: LanguageProfile) -> LanguageProfile {
        if let Some(strategy) = self.strategy {
            profile.strategy = strategy;
        }
        if let Some(width) = self.tab_width {
            profile.tab_width = width;
        }
        profile.delimiters.extend(self.delimiters.iter().map(|d| DelimiterPair {
            open: d.open.clone(),
            close: d.close.clone(),
            reopen: d.reopen.clone(),
            leading_open: d.leading_open.clone(),
        }));
        profile.line_comments.extend(self.line_comments.iter().cloned());
        for comment in &self.block_comments {
            profile = profile.block_comment(&comment.open, &comment.close);
        }
        profile.strings.extend(self.strings.iter().map(|s| StringRule {
            open: s.open.clone(),
            close: s.close.clone().unwrap_or_else(|| s.open.clone()),
            escape: if s.raw { None } else { Some(s.escape.unwrap_or('\\')) },
            multiline: s.multiline,
            char_literal: s.char_literal,
        }));

        let switches = [
            (self.nested_comments, ProfileFlags::NESTED_COMMENTS),
            (self.line_continuation, ProfileFlags::LINE_CONTINUATION),
            (self.bracket_continuation, ProfileFlags::BRACKET_CONTINUATION),
        ];
        for (value, flag) in switches {
            if let Some(on) = value {
                profile.flags.set(flag, on);
            }
        }
        profile
    }
}

// ---------------------------------------------------------------------------
// Associations
// ---------------------------------------------------------------------------

/// Filename patterns mapped to language ids, first match wins.
#[derive(Debug, Clone, Default)]
pub struct Associations {
    rules: Vec<(Regex, String)>,
}

impl Associations {
    #[must_use]
    pub fn language_for(&self, path: &Path) -> Option<&str> {
        let name = path.to_string_lossy();
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(&name))
            .map(|(_, language)| language.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use jb_engine::buffer::ColumnUnit;
    use jb_engine::navigate::Direction;
    use jb_engine::position::Position;
    use jb_engine::{Request, SelectionResult};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    fn out(registry: &Registry, language_id: &str, text: &str, col: usize) -> SelectionResult {
        let at = Position::new(0, col);
        let request = Request {
            language_id,
            text,
            cursor: at,
            anchor: at,
            direction: Direction::Out,
            unit: ColumnUnit::Char,
        };
        jb_engine::jump(&request, registry)
    }

    const PASCAL: &str = r#"
[languages.pascal]
aliases = ["delphi"]
line_comments = ["//"]
block_comments = [{ open = "(*", close = "*)" }]
strings = [{ open = "'", raw = true }]

[[languages.pascal.delimiters]]
open = ["begin"]
close = ["end"]

[[associations]]
pattern = '\.(pas|dpr)$'
language = "pascal"
"#;

    #[test]
    fn new_language_from_config() {
        let registry = parse(PASCAL).registry().unwrap();
        let pascal = registry.get("pascal").unwrap();
        assert_eq!(pascal.name, "pascal");
        assert_eq!(pascal.strategy, Strategy::Bracketed);
        assert_eq!(pascal.delimiters.len(), 1);
        assert_eq!(pascal.strings[0].escape, None);
        assert_eq!(registry.get("delphi"), Some(pascal));

        //          0         1         2
        //          012345678901234567890123
        let text = "begin x begin y end end";
        let result = out(&registry, "delphi", text, 14);
        assert_eq!(result, SelectionResult::new(Position::new(0, 5), Position::new(0, 20)));
    }

    #[test]
    fn keywords_inside_comments_and_strings_are_skipped() {
        let registry = parse(PASCAL).registry().unwrap();
        let text = "begin (* end *) 'end' x end";
        let result = out(&registry, "pascal", text, 22);
        assert_eq!(result, SelectionResult::new(Position::new(0, 22), Position::new(0, 22)));
        let result = out(&registry, "pascal", "begin begin (* end *) 'end' x end end", 28);
        assert_eq!(result, SelectionResult::new(Position::new(0, 5), Position::new(0, 34)));
    }

    #[test]
    fn builtin_is_overridden_in_place() {
        let config = parse("[languages.python]\ntab_width = 4\nline_continuation = false\n");
        let registry = config.registry().unwrap();
        let python = registry.get("python").unwrap();
        assert_eq!(python.strategy, Strategy::Indented);
        assert_eq!(python.tab_width, 4);
        assert!(!python.flags.contains(ProfileFlags::LINE_CONTINUATION));
        assert!(python.flags.contains(ProfileFlags::BRACKET_CONTINUATION));
        // The shared built-in table is untouched.
        assert_eq!(Registry::builtin().resolve("python").tab_width, 8);
    }

    #[test]
    fn extends_another_config_language() {
        let config = parse(
            r#"
[languages.a]
extends = "b"
line_comments = [";"]

[languages.b]
extends = "c"
strategy = "indented"
"#,
        );
        let registry = config.registry().unwrap();
        let a = registry.get("a").unwrap();
        assert_eq!(a.strategy, Strategy::Indented);
        assert_eq!(a.line_comments, vec!["//".to_owned(), ";".to_owned()]);
    }

    #[test]
    fn unknown_or_looping_bases_are_errors() {
        let err = parse("[languages.x]\nextends = \"nope\"\n").registry().unwrap_err();
        assert!(matches!(err, CliError::UnknownBase { ref base, .. } if base == "nope"));

        let looped = parse("[languages.x]\nextends = \"y\"\n[languages.y]\nextends = \"x\"\n");
        assert!(matches!(looped.registry(), Err(CliError::UnknownBase { .. })));
    }

    #[test]
    fn associations_match_paths() {
        let associations = parse(PASCAL).associations().unwrap();
        assert_eq!(associations.language_for(Path::new("src/main.pas")), Some("pascal"));
        assert_eq!(associations.language_for(Path::new("main.rs")), None);
    }

    #[test]
    fn bad_pattern_is_an_error() {
        let config = parse("[[associations]]\npattern = \"(\"\nlanguage = \"c\"\n");
        assert!(matches!(config.associations(), Err(CliError::Pattern { .. })));
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PASCAL.as_bytes()).unwrap();
        let config = Config::load_or_default(Some(file.path())).unwrap();
        assert!(config.languages.contains_key("pascal"));
        assert_eq!(config.associations.len(), 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[languages.c]\ncolour = \"red\"\n").unwrap();
        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_or_default(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }
}
