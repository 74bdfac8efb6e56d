//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, ErrorKind, Result};

/// One side of a comment delimiter: a literal matched with optional
/// surrounding whitespace, or a raw regex fragment used verbatim.
#[derive(Debug, Clone, Copy)]
pub enum Delimiter {
    Literal(&'static str),
    Pattern(&'static str),
}

/// A comment style for a content type. An empty literal suffix means a
/// line comment running to end of line.
#[derive(Debug, Clone, Copy)]
pub struct CommentStyle {
    pub prefix: Delimiter,
    pub suffix: Delimiter,
}

const fn line(prefix: &'static str) -> CommentStyle {
    CommentStyle {
        prefix: Delimiter::Literal(prefix),
        suffix: Delimiter::Literal(""),
    }
}

const fn block(prefix: &'static str, suffix: &'static str) -> CommentStyle {
    CommentStyle {
        prefix: Delimiter::Literal(prefix),
        suffix: Delimiter::Literal(suffix),
    }
}

/// Comment delimiters per content type, in match-priority order. A type
/// may carry several styles (CSS and JavaScript comments are allowed in
/// XML/HTML, for instance).
static COMMENT_GROUPS: Lazy<HashMap<&'static str, Vec<CommentStyle>>> = Lazy::new(|| {
    let mut groups = HashMap::new();
    groups.insert("Python", vec![line("#")]);
    groups.insert("Perl", vec![line("#")]);
    groups.insert("PHP", vec![block("/*", "*/"), line("//"), line("#")]);
    groups.insert("Ruby", vec![line("#")]);
    groups.insert("Tcl", vec![line("#")]);
    groups.insert("Shell", vec![line("#")]);
    groups.insert("XML", vec![block("<!--", "-->"), block("/*", "*/"), line("//")]);
    groups.insert("HTML", vec![block("<!--", "-->"), block("/*", "*/"), line("//")]);
    groups.insert("Makefile", vec![line("#")]);
    groups.insert("JavaScript", vec![block("/*", "*/"), line("//")]);
    groups.insert("CSS", vec![block("/*", "*/")]);
    groups.insert("C", vec![block("/*", "*/")]);
    groups.insert("C++", vec![block("/*", "*/"), line("//")]);
    groups.insert("Java", vec![block("/*", "*/"), line("//")]);
    groups.insert("C#", vec![block("/*", "*/"), line("//")]);
    groups.insert("IDL", vec![block("/*", "*/"), line("//")]);
    groups.insert("Text", vec![line("#")]);
    groups.insert(
        "Fortran",
        vec![
            CommentStyle {
                prefix: Delimiter::Pattern(r"^[a-zA-Z*$]\s*"),
                suffix: Delimiter::Literal(""),
            },
            line("!"),
        ],
    );
    groups.insert("TeX", vec![line("%")]);
    groups
});

/// Look up the comment styles registered for a content type.
pub fn comment_styles(content_type: &str) -> Option<&'static [CommentStyle]> {
    COMMENT_GROUPS.get(content_type).map(|styles| styles.as_slice())
}

/// The built-in content.types table, in the same format user override
/// files use: `TYPE PATTERN...`, where a pattern starting with `.` is a
/// suffix, `/.../` is a regex against the basename, and anything else is
/// an exact filename. `#` comments to end of line.
const DEFAULT_CONTENT_TYPES: &str = r#"
# Default file types understood by the preprocessor.

Python              .py
Python              .pyw
Perl                .pl
Ruby                .rb
Tcl                 .tcl
XML                 .xml
XML                 .kpf
XML                 .xul
XML                 .rdf
XML                 .xslt
XML                 .xsl
XML                 .wxs
XML                 .wxi
HTML                .htm
HTML                .html
XML                 .xhtml
Makefile            /^[Mm]akefile.*$/
PHP                 .php
JavaScript          .js
CSS                 .css
C++                 .c       # C++ so that //-style comments work
C++                 .cpp
C++                 .cxx
C++                 .cc
C++                 .h
C++                 .hpp
C++                 .hxx
C++                 .hh
IDL                 .idl
Text                .txt
Fortran             .f
Fortran             .f90
Shell               .sh
Shell               .csh
Shell               .ksh
Shell               .zsh
Java                .java
C#                  .cs
TeX                 .tex
Text                .kkf
Python              .ksf
"#;

/// Whether suffix matching folds case. The platform default follows the
/// host filesystem convention, but callers may pin either policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        if cfg!(windows) {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        }
    }
}

/// Maps file names to content-type labels. Lookup order: exact basename,
/// suffix, registered regexes in registration order, then `<?xml` content
/// sniffing as a last resort.
#[derive(Debug)]
pub struct ContentTypesRegistry {
    filename_map: HashMap<String, String>,
    suffix_map: HashMap<String, String>,
    regexes: Vec<(String, Regex, String)>,
    suffix_case: CaseSensitivity,
}

impl ContentTypesRegistry {
    /// The built-in table alone.
    pub fn builtin() -> Result<Self> {
        Self::builtin_with_case(CaseSensitivity::default())
    }

    pub fn builtin_with_case(suffix_case: CaseSensitivity) -> Result<Self> {
        let mut registry = Self {
            filename_map: HashMap::new(),
            suffix_map: HashMap::new(),
            regexes: Vec::new(),
            suffix_case,
        };
        registry.load_str(DEFAULT_CONTENT_TYPES)?;
        Ok(registry)
    }

    /// The built-in table extended by user override files, loaded in the
    /// given order so that later entries win on pattern collisions.
    pub fn with_config_files(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut registry = Self::builtin()?;
        for path in paths {
            registry.load_file(path.as_ref())?;
        }
        Ok(registry)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        log::debug!("loading content.types file '{}'", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| Error::new(ErrorKind::Io(e)).in_file(path))?;
        self.load_str(&content)
    }

    pub fn load_str(&mut self, content: &str) -> Result<()> {
        for raw_line in content.lines() {
            let mut words: Vec<&str> = raw_line.split_whitespace().collect();
            if let Some(comment_start) = words.iter().position(|w| w.starts_with('#')) {
                words.truncate(comment_start);
            }
            if words.is_empty() {
                continue;
            }
            let (content_type, patterns) = (words[0], &words[1..]);
            if patterns.is_empty() {
                return Err(ErrorKind::BogusContentTypesLine(raw_line.to_string()).into());
            }
            for pattern in patterns {
                if pattern.starts_with('.') {
                    let key = match self.suffix_case {
                        CaseSensitivity::Insensitive => pattern.to_lowercase(),
                        CaseSensitivity::Sensitive => pattern.to_string(),
                    };
                    self.suffix_map.insert(key, content_type.to_string());
                } else if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
                    let source = &pattern[1..pattern.len() - 1];
                    let regex = Regex::new(source).map_err(|e| ErrorKind::BadRegex {
                        pattern: source.to_string(),
                        source: e,
                    })?;
                    // Re-registering the same pattern text replaces the
                    // earlier entry, keeping its position in match order.
                    match self.regexes.iter_mut().find(|(p, _, _)| p == source) {
                        Some(entry) => entry.2 = content_type.to_string(),
                        None => {
                            self.regexes
                                .push((source.to_string(), regex, content_type.to_string()))
                        }
                    }
                } else {
                    self.filename_map
                        .insert(pattern.to_string(), content_type.to_string());
                }
            }
        }
        Ok(())
    }

    /// Determine the content type for `path`, or `None` if nothing matches.
    pub fn resolve(&self, path: &Path) -> Option<String> {
        let basename = path.file_name()?.to_string_lossy();

        if let Some(content_type) = self.filename_map.get(basename.as_ref()) {
            log::debug!(
                "content type of '{}' is '{}' (exact filename)",
                path.display(),
                content_type
            );
            return Some(content_type.clone());
        }

        if let Some((_, extension)) = basename.rsplit_once('.') {
            let mut suffix = format!(".{}", extension);
            if self.suffix_case == CaseSensitivity::Insensitive {
                suffix = suffix.to_lowercase();
            }
            if let Some(content_type) = self.suffix_map.get(&suffix) {
                log::debug!(
                    "content type of '{}' is '{}' (suffix '{}')",
                    path.display(),
                    content_type,
                    suffix
                );
                return Some(content_type.clone());
            }
        }

        for (pattern, regex, content_type) in &self.regexes {
            if regex.is_match(&basename) {
                log::debug!(
                    "content type of '{}' is '{}' (regex /{}/)",
                    path.display(),
                    content_type,
                    pattern
                );
                return Some(content_type.clone());
            }
        }

        if sniff_xml(path) {
            log::debug!("content type of '{}' is 'XML' (content sniffing)", path.display());
            return Some("XML".to_string());
        }

        None
    }
}

/// Cheap XML sniffing: does the file start with `<?xml`?
fn sniff_xml(path: &Path) -> bool {
    let mut head = [0u8; 5];
    match fs::File::open(path).and_then(|mut f| f.read(&mut head)) {
        Ok(n) => head[..n].starts_with(b"<?xml"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::Path;

    #[test]
    fn resolve_by_suffix() {
        let registry = ContentTypesRegistry::builtin().unwrap();
        assert_eq!(
            registry.resolve(Path::new("script.py")).as_deref(),
            Some("Python")
        );
        assert_eq!(
            registry.resolve(Path::new("page.html")).as_deref(),
            Some("HTML")
        );
        assert_eq!(
            registry.resolve(Path::new("dir/with.dots/style.css")).as_deref(),
            Some("CSS")
        );
    }

    #[test]
    fn resolve_by_regex() {
        let registry = ContentTypesRegistry::builtin().unwrap();
        assert_eq!(
            registry.resolve(Path::new("Makefile")).as_deref(),
            Some("Makefile")
        );
        assert_eq!(
            registry.resolve(Path::new("makefile.win")).as_deref(),
            Some("Makefile")
        );
    }

    #[test]
    fn unknown_extension_resolves_to_none() {
        let registry = ContentTypesRegistry::builtin().unwrap();
        assert_eq!(registry.resolve(Path::new("unknown.zzz")), None);
    }

    #[test]
    fn case_sensitivity_policy() {
        let sensitive =
            ContentTypesRegistry::builtin_with_case(CaseSensitivity::Sensitive).unwrap();
        assert_eq!(sensitive.resolve(Path::new("SCRIPT.PY")), None);

        let insensitive =
            ContentTypesRegistry::builtin_with_case(CaseSensitivity::Insensitive).unwrap();
        assert_eq!(
            insensitive.resolve(Path::new("SCRIPT.PY")).as_deref(),
            Some("Python")
        );
    }

    #[test]
    fn later_entries_override_earlier_ones() {
        let mut registry = ContentTypesRegistry::builtin().unwrap();
        registry.load_str("Text .py").unwrap();
        assert_eq!(
            registry.resolve(Path::new("script.py")).as_deref(),
            Some("Text")
        );
    }

    #[test]
    fn exact_filename_beats_suffix() {
        let mut registry = ContentTypesRegistry::builtin().unwrap();
        registry.load_str("Shell special.py").unwrap();
        assert_eq!(
            registry.resolve(Path::new("special.py")).as_deref(),
            Some("Shell")
        );
        assert_eq!(
            registry.resolve(Path::new("other.py")).as_deref(),
            Some("Python")
        );
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let mut registry = ContentTypesRegistry::builtin().unwrap();
        registry
            .load_str("# a comment\n\nTcl .tickle # trailing comment\n")
            .unwrap();
        assert_eq!(
            registry.resolve(Path::new("x.tickle")).as_deref(),
            Some("Tcl")
        );
    }

    #[test]
    fn type_without_patterns_is_an_error() {
        let mut registry = ContentTypesRegistry::builtin().unwrap();
        let err = registry.load_str("Lonely\n").unwrap_err();
        assert!(err.to_string().contains("bogus content.types line"));
    }

    #[test]
    fn sniffs_xml_content() {
        let registry = ContentTypesRegistry::builtin().unwrap();
        assert_eq!(
            registry
                .resolve(Path::new("tests/fixtures/xml_sniff.config"))
                .as_deref(),
            Some("XML")
        );
    }

    #[test]
    fn comment_styles_lookup() {
        assert_eq!(comment_styles("Python").unwrap().len(), 1);
        assert_eq!(comment_styles("HTML").unwrap().len(), 3);
        assert!(comment_styles("Klingon").is_none());
    }
}
