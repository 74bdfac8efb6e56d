//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

/// What went wrong. The position (if any) lives on [`Error`].
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("don't know comment delimiters for content type '{content_type}' (file '{file}')")]
    UnknownCommentDelimiters { content_type: String, file: String },
    #[error("bogus content.types line, there must be one or more patterns: '{0}'")]
    BogusContentTypesLine(String),
    #[error("bad regular expression /{pattern}/: {source}")]
    BadRegex {
        pattern: String,
        source: regex::Error,
    },
    #[error("{0}")]
    Evaluation(String),
    #[error("#{0} stmt without leading #if stmt")]
    DanglingDirective(&'static str),
    #[error("illegal #{0} after #else in same #if block")]
    AfterElse(&'static str),
    #[error("unterminated #if block")]
    UnterminatedIf,
    #[error("superfluous #endif before this line")]
    SuperfluousEndif,
    #[error("superfluous #endif on or before this line")]
    SuperfluousEndifAtEnd,
    #[error("detected recursive #include of '{0}'")]
    RecursiveInclude(String),
    #[error("could not find #include'd file \"{name}\" on include path: {search_path:?}")]
    IncludeNotFound {
        name: String,
        search_path: Vec<PathBuf>,
    },
    #[error("use of undefined variable '{0}' in #include stmt")]
    UndefinedIncludeVariable(String),
    #[error("#error: {0}")]
    UserError(String),
    #[error("output file '{0}' already exists (use --force to overwrite)")]
    OutputExists(PathBuf),
    #[error("invalid definition expression `{0}`")]
    BadDefinition(String),
    #[error("invalid definition symbol `{0}`")]
    BadDefinitionSymbol(String),
}

/// A preprocessing failure, rendered as `file:line: message` with the
/// positional parts dropped when unknown.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            file: None,
            line: None,
        }
    }

    /// Attach the position the failing directive or line was read from.
    pub fn at(mut self, file: &Path, line: usize) -> Self {
        self.file = Some(file.to_path_buf());
        self.line = Some(line);
        self
    }

    pub fn in_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file.display(), line, self.kind),
            (Some(file), None) => write!(f, "{}: {}", file.display(), self.kind),
            (None, Some(line)) => write!(f, "{}: {}", line, self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(error))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    #[test]
    fn display_with_file_and_line() {
        let err = Error::new(ErrorKind::UnterminatedIf).at(Path::new("somefile.py"), 20);
        assert_eq!(err.to_string(), "somefile.py:20: unterminated #if block");
    }

    #[test]
    fn display_with_file_only() {
        let err = Error::new(ErrorKind::UnterminatedIf).in_file(Path::new("somefile.py"));
        assert_eq!(err.to_string(), "somefile.py: unterminated #if block");
    }

    #[test]
    fn display_bare() {
        let err = Error::new(ErrorKind::RecursiveInclude("a.py".into()));
        assert_eq!(err.to_string(), "detected recursive #include of 'a.py'");
    }
}
