//! Error taxonomy for parsing and expanding templates.

use std::{fmt, path::PathBuf};
use thiserror::Error;

/// A location inside template source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, counted in characters.
    pub column: usize,
}

impl Position {
    /// Resolve a byte offset in `src` to a line/column position.
    pub fn locate(src: &str, offset: usize) -> Self {
        let before = &src[..offset.min(src.len())];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed template at {at}: {reason}")]
    MalformedTemplate { reason: String, at: Position },

    #[error("invalid placeholder name '{name}' at {at}")]
    InvalidPlaceholderName { name: String, at: Position },

    #[error("unresolved variable(s): {}", names.join(", "))]
    UnresolvedVariable { names: Vec<String> },

    #[error("invalid variable binding '{0}': expected NAME=VALUE")]
    InvalidBinding(String),

    #[error("read template {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn malformed(src: &str, offset: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            reason: reason.into(),
            at: Position::locate(src, offset),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_counts_lines_and_chars() {
        let src = "ab\ncd{{";
        let pos = Position::locate(src, 5);
        assert_eq!((pos.line, pos.column), (2, 3));
        assert_eq!(pos.to_string(), "2:3");
    }

    #[test]
    fn locate_columns_are_char_based() {
        let src = "héllo {{";
        let pos = Position::locate(src, src.find("{{").unwrap());
        assert_eq!((pos.line, pos.column), (1, 7));
    }

    #[test]
    fn unresolved_lists_every_name() {
        let err = Error::UnresolvedVariable {
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "unresolved variable(s): a, b");
    }
}
