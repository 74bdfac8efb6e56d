//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::content_types::{comment_styles, ContentTypesRegistry};
use crate::defines::{parse_define_value, DefineTable, Value};
use crate::directive::{Directive, DirectiveMatcher, IncludeRef};
use crate::error::{Error, ErrorKind, Result};
use crate::expr::EvalError;

/// Processing options, shared across `#include` recursion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Overwrite an existing output file instead of refusing.
    pub force_overwrite: bool,
    /// Emit a bare newline for every dropped line so line numbers in the
    /// output match the input.
    pub keep_lines: bool,
    /// Replace occurrences of defined names in emitted lines with their
    /// values.
    pub substitute: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockState {
    Emit,
    Skip,
}

/// One open `#if` block. The bottom of the stack is a sentinel frame for
/// the top level of the file; a stray `#endif` can pop it, which is only
/// diagnosed on the following line (or at end of file).
#[derive(Debug, Clone, Copy)]
struct Block {
    state: BlockState,
    emitted: bool,
    seen_else: bool,
}

impl Block {
    fn sentinel() -> Self {
        Block {
            state: BlockState::Emit,
            emitted: false,
            seen_else: false,
        }
    }
}

/// Preprocess `input`, writing the result to `output`.
///
/// The define table is mutated in place by `#define`/`#undef` and shared
/// down `#include` chains, so definitions made in an included file are
/// visible to the includer afterwards. `content_type` overrides registry
/// resolution for the top-level file only; included files are always
/// resolved by the registry.
pub fn preprocess(
    input: &Path,
    output: &mut dyn Write,
    defines: &mut DefineTable,
    options: &Options,
    include_paths: &[PathBuf],
    content_type: Option<&str>,
    registry: &ContentTypesRegistry,
) -> Result<()> {
    let mut active = Vec::new();
    preprocess_inner(
        input,
        output,
        defines,
        options,
        include_paths,
        content_type,
        registry,
        &mut active,
    )
}

/// Recursion guard around [`process_file`]. `active` holds the canonical
/// paths of the files currently being processed, so a file may appear
/// several times in the include graph as long as it is not its own
/// (transitive) includer.
#[allow(clippy::too_many_arguments)]
fn preprocess_inner(
    input: &Path,
    output: &mut dyn Write,
    defines: &mut DefineTable,
    options: &Options,
    include_paths: &[PathBuf],
    content_type: Option<&str>,
    registry: &ContentTypesRegistry,
    active: &mut Vec<PathBuf>,
) -> Result<()> {
    let canonical = fs::canonicalize(input)
        .map_err(|e| Error::new(ErrorKind::Io(e)).in_file(input))?;
    if active.contains(&canonical) {
        return Err(ErrorKind::RecursiveInclude(input.display().to_string()).into());
    }
    active.push(canonical);
    let result = process_file(
        input,
        output,
        defines,
        options,
        include_paths,
        content_type,
        registry,
        active,
    );
    active.pop();
    result
}

#[allow(clippy::too_many_arguments)]
fn process_file(
    input: &Path,
    output: &mut dyn Write,
    defines: &mut DefineTable,
    options: &Options,
    include_paths: &[PathBuf],
    content_type: Option<&str>,
    registry: &ContentTypesRegistry,
    active: &mut Vec<PathBuf>,
) -> Result<()> {
    let content_type = match content_type {
        Some(content_type) => content_type.to_string(),
        None => registry.resolve(input).unwrap_or_else(|| {
            log::warn!(
                "defaulting content type for '{}' to 'Text'",
                input.display()
            );
            "Text".to_string()
        }),
    };
    log::debug!(
        "preprocessing '{}' as '{}'",
        input.display(),
        content_type
    );

    let styles = comment_styles(&content_type).ok_or_else(|| {
        Error::new(ErrorKind::UnknownCommentDelimiters {
            content_type: content_type.clone(),
            file: input.display().to_string(),
        })
    })?;
    let matcher = DirectiveMatcher::new(styles)?;

    let text = fs::read_to_string(input)
        .map_err(|e| Error::new(ErrorKind::Io(e)).in_file(input))?;

    let mut blocks = vec![Block::sentinel()];
    let mut line_num = 0usize;

    for line in text.split_inclusive('\n') {
        line_num += 1;
        defines.set_position(input, line_num);

        // A stray #endif popped the sentinel on an earlier line.
        if blocks.is_empty() {
            return Err(Error::new(ErrorKind::SuperfluousEndif).at(input, line_num));
        }

        let Some(directive) = matcher.match_line(line) else {
            if blocks.last().is_some_and(|b| b.state == BlockState::Emit) {
                if options.substitute {
                    output.write_all(substitute_line(line, defines).as_bytes())?;
                } else {
                    output.write_all(line.as_bytes())?;
                }
            } else if options.keep_lines {
                output.write_all(b"\n")?;
            }
            continue;
        };

        if options.keep_lines {
            output.write_all(b"\n")?;
        }

        log::trace!("{}:{}: {:?}", input.display(), line_num, directive);

        let emitting = blocks.last().is_some_and(|b| b.state == BlockState::Emit);

        match directive {
            Directive::If(_) | Directive::Ifdef(_) | Directive::Ifndef(_) if !emitting => {
                // Inside a skipped region the condition is not evaluated.
                blocks.push(Block {
                    state: BlockState::Skip,
                    emitted: false,
                    seen_else: false,
                });
            }
            Directive::If(expr) => {
                let truthy =
                    evaluate_expr(&expr, defines, input, line_num)?.is_truthy();
                blocks.push(Block {
                    state: if truthy { BlockState::Emit } else { BlockState::Skip },
                    emitted: truthy,
                    seen_else: false,
                });
            }
            Directive::Ifdef(name) => {
                let defined = defines.contains(&name);
                blocks.push(Block {
                    state: if defined { BlockState::Emit } else { BlockState::Skip },
                    emitted: defined,
                    seen_else: false,
                });
            }
            Directive::Ifndef(name) => {
                let undefined = !defines.contains(&name);
                blocks.push(Block {
                    state: if undefined { BlockState::Emit } else { BlockState::Skip },
                    emitted: undefined,
                    seen_else: false,
                });
            }
            Directive::Elif(expr) => {
                if blocks.len() == 1 {
                    return Err(Error::new(ErrorKind::DanglingDirective("elif"))
                        .at(input, line_num));
                }
                let top = blocks.len() - 1;
                let block = blocks[top];
                if block.seen_else {
                    return Err(
                        Error::new(ErrorKind::AfterElse("elif")).at(input, line_num)
                    );
                }
                if block.emitted {
                    blocks[top].state = BlockState::Skip;
                } else if blocks[top - 1].state == BlockState::Skip {
                    blocks[top].state = BlockState::Skip;
                } else {
                    let truthy =
                        evaluate_expr(&expr, defines, input, line_num)?.is_truthy();
                    blocks[top].state =
                        if truthy { BlockState::Emit } else { BlockState::Skip };
                    blocks[top].emitted = truthy;
                }
            }
            Directive::Else => {
                if blocks.len() == 1 {
                    return Err(Error::new(ErrorKind::DanglingDirective("else"))
                        .at(input, line_num));
                }
                let top = blocks.len() - 1;
                let block = blocks[top];
                if block.seen_else {
                    return Err(
                        Error::new(ErrorKind::AfterElse("else")).at(input, line_num)
                    );
                }
                blocks[top].seen_else = true;
                if block.emitted || blocks[top - 1].state == BlockState::Skip {
                    blocks[top].state = BlockState::Skip;
                } else {
                    blocks[top].state = BlockState::Emit;
                    blocks[top].emitted = true;
                }
            }
            Directive::Endif => {
                blocks.pop();
            }
            Directive::Define { name, value } if emitting => {
                let value = match value {
                    Some(token) => parse_define_value(&token),
                    None => Value::Absent,
                };
                defines.define(name, value);
            }
            Directive::Undef(name) if emitting => {
                defines.undef(&name);
            }
            Directive::Error(message) if emitting => {
                return Err(
                    Error::new(ErrorKind::UserError(message)).at(input, line_num)
                );
            }
            Directive::Include(include) if emitting => {
                let name = match include {
                    IncludeRef::Path(path) => path,
                    IncludeRef::Variable(var) => match defines.get(&var) {
                        Some(value) => value.to_string(),
                        None => {
                            return Err(Error::new(
                                ErrorKind::UndefinedIncludeVariable(var),
                            )
                            .at(input, line_num))
                        }
                    },
                };
                let resolved = resolve_include(&name, input, include_paths)?;
                log::debug!("including '{}'", resolved.display());
                preprocess_inner(
                    &resolved,
                    output,
                    defines,
                    options,
                    include_paths,
                    None,
                    registry,
                    active,
                )?;
            }
            // Definition, include and error directives are inert in a
            // skipped region.
            Directive::Define { .. }
            | Directive::Undef(_)
            | Directive::Error(_)
            | Directive::Include(_) => {}
        }
    }

    if blocks.is_empty() {
        return Err(Error::new(ErrorKind::SuperfluousEndifAtEnd).at(input, line_num));
    }
    if blocks.len() > 1 {
        return Err(Error::new(ErrorKind::UnterminatedIf).at(input, line_num));
    }

    Ok(())
}

/// Find an included file. Search order is the directory of the including
/// file, then the configured include paths.
fn resolve_include(name: &str, includer: &Path, include_paths: &[PathBuf]) -> Result<PathBuf> {
    let mut search_path = Vec::with_capacity(include_paths.len() + 1);
    if let Some(dir) = includer.parent() {
        search_path.push(dir.to_path_buf());
    }
    search_path.extend(include_paths.iter().cloned());

    for dir in &search_path {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(ErrorKind::IncludeNotFound {
        name: name.to_string(),
        search_path,
    }
    .into())
}

/// Attach position and render an evaluation failure the way the error
/// report expects, with a hint for the common `defined(FOO)` bare-name
/// mistake.
fn evaluate_expr(
    expr: &str,
    defines: &DefineTable,
    file: &Path,
    line: usize,
) -> Result<Value> {
    crate::expr::evaluate(expr, defines).map_err(|e| {
        let message = match e {
            EvalError::UndefinedName(name) => {
                let mut message = format!("name '{}' is not defined", name);
                if expr.contains(&format!("defined({})", name)) {
                    message.push_str(&format!(
                        " (perhaps you want \"defined('{}')\" instead of \"defined({})\")",
                        name, name
                    ));
                }
                message
            }
            EvalError::Syntax => format!("invalid syntax: '{}'", expr),
            EvalError::Unsupported(message) => message,
        };
        Error::new(ErrorKind::Evaluation(message)).at(file, line)
    })
}

/// Replace occurrences of defined names with their values, longest name
/// first so that `FOOBAR` is never clobbered by a substitution for `FOO`.
fn substitute_line(line: &str, defines: &DefineTable) -> String {
    let mut names: Vec<&String> = defines.names().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut result = line.to_string();
    for name in names {
        if result.contains(name.as_str()) {
            let value = match defines.get(name) {
                Some(value) => value.to_string(),
                None => continue,
            };
            result = result.replace(name.as_str(), &value);
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(entries: &[(&str, Value)]) -> DefineTable {
        let mut defines = DefineTable::new();
        for (name, value) in entries {
            defines.define(*name, value.clone());
        }
        defines
    }

    #[test]
    fn substitute_longest_name_first() {
        let defines = table(&[
            ("FOO", Value::Str("x".to_string())),
            ("FOOBAR", Value::Int(42)),
        ]);
        assert_eq!(substitute_line("FOOBAR FOO\n", &defines), "42 x\n");
    }

    #[test]
    fn substitute_replaces_every_occurrence() {
        let defines = table(&[("N", Value::Int(5))]);
        assert_eq!(substitute_line("N + N = NN\n", &defines), "5 + 5 = 55\n");
    }

    #[test]
    fn substitute_renders_typed_values() {
        let defines = table(&[
            ("F", Value::Float(5.0)),
            ("B", Value::Bool(true)),
            ("A", Value::Absent),
        ]);
        assert_eq!(substitute_line("F B A", &defines), "5.0 True None");
    }

    #[test]
    fn resolve_include_prefers_the_includer_directory() {
        let dir = std::env::temp_dir().join("preprocess-resolve-test");
        std::fs::create_dir_all(&dir).unwrap();
        let header = dir.join("header.py");
        std::fs::write(&header, "# nothing\n").unwrap();

        let includer = dir.join("main.py");
        let resolved = resolve_include("header.py", &includer, &[]).unwrap();
        assert_eq!(resolved, header);

        let err = resolve_include("missing.py", &includer, &[]).unwrap_err();
        assert!(err.to_string().contains("could not find #include'd file"));
    }
}
