//! Errors the command line can hit. The engine itself never fails; only
//! reading input and configuration can.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("reading stdin: {0}")]
    Stdin(#[source] io::Error),

    /// The config file is not valid TOML or has unknown keys.
    #[error("{}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("association pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A language's `extends` names nothing known, or the chain loops.
    #[error("language `{language}` extends unknown language `{base}`")]
    UnknownBase { language: String, base: String },

    #[error("bad position `{0}`, expected ROW:COL")]
    BadPosition(String),

    #[error("encoding result: {0}")]
    Json(#[from] serde_json::Error),
}
