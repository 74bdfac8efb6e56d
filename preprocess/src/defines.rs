//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ErrorKind, Result};

/// Name of the reserved define holding the path of the file currently being
/// processed. Rewritten on every line, including inside `#include`s.
pub const FILE_KEY: &str = "__FILE__";
/// Name of the reserved define holding the current 1-based line number.
pub const LINE_KEY: &str = "__LINE__";

/// A define's value. `Absent` is the value of a `#define NAME` with no
/// value operand; it is falsy but the name still counts as defined.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Absent,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Absent => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Absent => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            // An integral float still prints a decimal point, so that a
            // substituted value round-trips as a float.
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// The symbol table consulted by `#if` expressions and by substitution,
/// mutated in place by `#define`/`#undef` and shared down `#include` chains.
#[derive(Debug, Clone, Default)]
pub struct DefineTable {
    map: HashMap<String, Value>,
}

impl DefineTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.map.insert(name.into(), value);
    }

    /// `#undef` of an unknown name is a no-op, not an error.
    pub fn undef(&mut self, name: &str) {
        self.map.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Rewrite the reserved `__FILE__`/`__LINE__` defines. Called on every
    /// line processed so expressions and error reports always see the
    /// current position, even right after returning from an include.
    pub fn set_position(&mut self, file: &Path, line: usize) {
        self.map.insert(
            FILE_KEY.to_string(),
            Value::Str(file.display().to_string()),
        );
        self.map.insert(LINE_KEY.to_string(), Value::Int(line as i64));
    }
}

/// Parse the value operand of a `#define` (or the right hand side of a
/// `-D NAME=VAL`). Boolean spellings are accepted in any case (`TRUE`,
/// `FAlse`); any other token is opportunistically evaluated as a constant
/// expression, so `0x40`, `2.5`, `'blue'` and even `5+5` become typed
/// values, and anything that does not evaluate is kept as the raw token.
pub fn parse_define_value(token: &str) -> Value {
    if token.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    match crate::expr::evaluate(token, &DefineTable::default()) {
        Ok(value) => value,
        Err(_) => Value::Str(token.to_string()),
    }
}

/// Parse one `-D` argument of the form `NAME[=VAL]`. A bare `NAME` defines
/// the name with no value, which is falsy but defined.
pub fn parse_definition_expr(expr: &str) -> Result<(String, Value)> {
    let (name, value) = match expr.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (expr, None),
    };
    let name = name.trim();
    if name.is_empty() {
        if expr.is_empty() {
            return Err(ErrorKind::BadDefinition(expr.to_string()).into());
        }
        return Err(ErrorKind::BadDefinitionSymbol(expr.to_string()).into());
    }
    let value = match value {
        Some(token) => parse_define_value(token),
        None => Value::Absent,
    };
    Ok((name.to_string(), value))
}

/// Build a symbol table from the repeated `-D` command line arguments.
pub fn parse_definitions(definitions: &[String]) -> Result<DefineTable> {
    let mut defines = DefineTable::new();
    for definition in definitions {
        let (name, value) = parse_definition_expr(definition)?;
        defines.define(name, value);
    }
    Ok(defines)
}
