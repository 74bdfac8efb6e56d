//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use regex::Regex;

use crate::content_types::{CommentStyle, Delimiter};
use crate::error::{ErrorKind, Result};

/// The operand of an `#include`: a quoted literal path, or the name of a
/// define holding the path. The literal form is tried first.
#[derive(Debug, Clone, PartialEq)]
pub enum IncludeRef {
    Path(String),
    Variable(String),
}

/// A recognized preprocessor statement, extracted from a native comment.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    If(String),
    Elif(String),
    Ifdef(String),
    Ifndef(String),
    Else,
    Endif,
    Error(String),
    Define { name: String, value: Option<String> },
    Undef(String),
    Include(IncludeRef),
}

/// Classifies lines for one content type. A line is a directive when,
/// after optional leading whitespace, it consists of a registered comment
/// prefix, a `#` statement, the matching comment suffix (for block
/// styles), and nothing else but whitespace.
pub struct DirectiveMatcher {
    wrappers: Vec<Regex>,
}

impl DirectiveMatcher {
    pub fn new(styles: &[CommentStyle]) -> Result<Self> {
        let mut wrappers = Vec::with_capacity(styles.len());
        for style in styles {
            let mut pattern = String::new();
            match style.prefix {
                Delimiter::Literal(prefix) => {
                    pattern.push_str(r"^\s*");
                    pattern.push_str(&regex::escape(prefix));
                    pattern.push_str(r"\s*");
                }
                Delimiter::Pattern(prefix) => pattern.push_str(prefix),
            }
            pattern.push_str(r"#\s*(?P<stmt>.*?)");
            match style.suffix {
                Delimiter::Literal(suffix) => {
                    pattern.push_str(r"\s*");
                    pattern.push_str(&regex::escape(suffix));
                    pattern.push_str(r"\s*$");
                }
                Delimiter::Pattern(suffix) => pattern.push_str(suffix),
            }
            let regex = Regex::new(&pattern).map_err(|e| ErrorKind::BadRegex {
                pattern: pattern.clone(),
                source: e,
            })?;
            wrappers.push(regex);
        }
        Ok(Self { wrappers })
    }

    /// `None` means the line is ordinary content. Comment styles are tried
    /// in registration order; a comment whose body is not a recognized
    /// statement is content, not an error.
    pub fn match_line(&self, line: &str) -> Option<Directive> {
        let line = line.trim_end_matches(['\n', '\r']);
        for wrapper in &self.wrappers {
            if let Some(captures) = wrapper.captures(line) {
                if let Some(directive) = parse_statement(&captures["stmt"]) {
                    return Some(directive);
                }
            }
        }
        None
    }
}

/// Parse a statement body (everything after the `#`, already stripped of
/// the comment suffix and surrounding whitespace) against the closed
/// directive grammar.
fn parse_statement(stmt: &str) -> Option<Directive> {
    let op_end = stmt
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(stmt.len());
    let (op, rest) = stmt.split_at(op_end);

    if matches!(op, "else" | "endif") {
        // No operands allowed; trailing junk makes this a content line.
        if !rest.is_empty() {
            return None;
        }
        return Some(match op {
            "else" => Directive::Else,
            _ => Directive::Endif,
        });
    }

    // Every other operator requires whitespace before its operands.
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let rest = rest.trim_start();

    match op {
        "if" => Some(Directive::If(rest.to_string())),
        "elif" => Some(Directive::Elif(rest.to_string())),
        "ifdef" => Some(Directive::Ifdef(rest.to_string())),
        "ifndef" => Some(Directive::Ifndef(rest.to_string())),
        "error" => Some(Directive::Error(rest.to_string())),
        "define" => {
            let name_end = rest
                .find(|c: char| c.is_whitespace())
                .unwrap_or(rest.len());
            let (name, remainder) = rest.split_at(name_end);
            if name.is_empty() {
                return None;
            }
            let value = remainder.trim_start();
            Some(Directive::Define {
                name: name.to_string(),
                value: (!value.is_empty()).then(|| value.to_string()),
            })
        }
        "undef" => {
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                return None;
            }
            Some(Directive::Undef(rest.to_string()))
        }
        "include" => {
            if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
                return Some(Directive::Include(IncludeRef::Path(
                    rest[1..rest.len() - 1].to_string(),
                )));
            }
            if rest.is_empty() || rest.contains(char::is_whitespace) {
                return None;
            }
            Some(Directive::Include(IncludeRef::Variable(rest.to_string())))
        }
        _ => None,
    }
}
