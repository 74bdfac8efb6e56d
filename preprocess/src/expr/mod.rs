//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! The `#if`/`#elif` expression language: a small Python-flavored
//! interpreter over the define table's value algebra. `and`/`or`
//! short-circuit, identifiers resolve through the table, and the sole
//! builtin is `defined(name)`, which tests key presence rather than value
//! truthiness.

use crate::defines::{DefineTable, Value};

mod lexer;

use lexer::Token;

/// Raw evaluation failure. The engine turns this into a positioned error,
/// formatting the message with the offending expression text.
#[derive(Debug, PartialEq)]
pub enum EvalError {
    /// An identifier that is not a key of the define table.
    UndefinedName(String),
    /// The expression did not tokenize or parse.
    Syntax,
    /// The expression parsed but an operation was not applicable.
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    Name(String),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Pos(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

/// Evaluate `input` against `defines`. The result is a [`Value`]; callers
/// apply their own truthiness on top.
pub fn evaluate(input: &str, defines: &DefineTable) -> Result<Value, EvalError> {
    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.peek().is_some() {
        return Err(EvalError::Syntax);
    }
    eval(&expr, defines)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), EvalError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(EvalError::Syntax)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_not()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_not()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    /// A single (non-chaining) comparison between two additive expressions.
    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => CmpOp::Eq,
            Some(Token::Ne) => CmpOp::Ne,
            Some(Token::Lt) => CmpOp::Lt,
            Some(Token::Le) => CmpOp::Le,
            Some(Token::Gt) => CmpOp::Gt,
            Some(Token::Ge) => CmpOp::Ge,
            Some(Token::In) => CmpOp::In,
            Some(Token::Not) => {
                // `x not in y`
                self.pos += 1;
                self.expect(&Token::In)?;
                let rhs = self.parse_additive()?;
                return Ok(Expr::Cmp(CmpOp::NotIn, Box::new(lhs), Box::new(rhs)));
            }
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            expr = Expr::Arith(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            expr = Expr::Arith(op, Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(operand)));
        }
        if self.eat(&Token::Plus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Pos(Box::new(operand)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::None) => Ok(Expr::Literal(Value::Absent)),
            Some(Token::Name(name)) => {
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.parse_or()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(&Token::Comma)?;
                        }
                    }
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            _ => Err(EvalError::Syntax),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Absent => "NoneType",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Float(_) => "float",
        Value::Str(_) => "str",
    }
}

/// Numeric view of a value; bools coerce to 0/1 the way the expression
/// language treats them everywhere else.
fn as_number(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Int(*b as i64)),
        Value::Int(_) | Value::Float(_) => Some(value.clone()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        Value::Bool(b) => *b as i64 as f64,
        _ => 0.0,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => match (&x, &y) {
            (Value::Int(i), Value::Int(j)) => i == j,
            _ => as_f64(&x) == as_f64(&y),
        },
        _ => match (a, b) {
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Absent, Value::Absent) => true,
            _ => false,
        },
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    let symbol = match op {
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
        _ => unreachable!("compare() is for ordering operators"),
    };
    let ordering = match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => match (&x, &y) {
            (Value::Int(i), Value::Int(j)) => i.cmp(j),
            _ => as_f64(&x)
                .partial_cmp(&as_f64(&y))
                .ok_or_else(|| EvalError::Unsupported("float comparison with NaN".to_string()))?,
        },
        _ => match (a, b) {
            (Value::Str(x), Value::Str(y)) => x.cmp(y),
            _ => {
                return Err(EvalError::Unsupported(format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    symbol,
                    type_name(a),
                    type_name(b)
                )))
            }
        },
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    })
}

fn arith(op: ArithOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    if op == ArithOp::Add {
        if let (Value::Str(x), Value::Str(y)) = (a, b) {
            return Ok(Value::Str(format!("{}{}", x, y)));
        }
    }
    let symbol = match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::Mod => "%",
    };
    let (x, y) = match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            return Err(EvalError::Unsupported(format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                symbol,
                type_name(a),
                type_name(b)
            )))
        }
    };
    match op {
        ArithOp::Add | ArithOp::Sub | ArithOp::Mul => match (&x, &y) {
            (Value::Int(i), Value::Int(j)) => {
                let result = match op {
                    ArithOp::Add => i.checked_add(*j),
                    ArithOp::Sub => i.checked_sub(*j),
                    ArithOp::Mul => i.checked_mul(*j),
                    _ => unreachable!(),
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| EvalError::Unsupported("integer overflow".to_string()))
            }
            _ => {
                let (x, y) = (as_f64(&x), as_f64(&y));
                Ok(Value::Float(match op {
                    ArithOp::Add => x + y,
                    ArithOp::Sub => x - y,
                    ArithOp::Mul => x * y,
                    _ => unreachable!(),
                }))
            }
        },
        ArithOp::Div => {
            if as_f64(&y) == 0.0 {
                return Err(EvalError::Unsupported("division by zero".to_string()));
            }
            // True division: integer operands still produce a float.
            Ok(Value::Float(as_f64(&x) / as_f64(&y)))
        }
        ArithOp::Mod => match (&x, &y) {
            (Value::Int(i), Value::Int(j)) => {
                if *j == 0 {
                    return Err(EvalError::Unsupported("modulo by zero".to_string()));
                }
                // Result takes the sign of the divisor.
                Ok(Value::Int(((i % j) + j) % j))
            }
            _ => {
                let (x, y) = (as_f64(&x), as_f64(&y));
                if y == 0.0 {
                    return Err(EvalError::Unsupported("modulo by zero".to_string()));
                }
                Ok(Value::Float(x - y * (x / y).floor()))
            }
        },
    }
}

fn eval(expr: &Expr, defines: &DefineTable) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => defines
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::UndefinedName(name.clone())),
        Expr::Call(name, args) => {
            if name == "defined" {
                if args.len() != 1 {
                    return Err(EvalError::Unsupported(
                        "defined() takes exactly one argument".to_string(),
                    ));
                }
                let key = match eval(&args[0], defines)? {
                    Value::Str(s) => s,
                    other => other.to_string(),
                };
                return Ok(Value::Bool(defines.contains(&key)));
            }
            match defines.get(name) {
                Some(value) => Err(EvalError::Unsupported(format!(
                    "'{}' object is not callable",
                    type_name(value)
                ))),
                None => Err(EvalError::UndefinedName(name.clone())),
            }
        }
        Expr::Not(operand) => Ok(Value::Bool(!eval(operand, defines)?.is_truthy())),
        Expr::Neg(operand) => {
            let value = eval(operand, defines)?;
            match as_number(&value) {
                Some(Value::Int(i)) => Ok(Value::Int(-i)),
                Some(Value::Float(x)) => Ok(Value::Float(-x)),
                _ => Err(EvalError::Unsupported(format!(
                    "bad operand type for unary -: '{}'",
                    type_name(&value)
                ))),
            }
        }
        Expr::Pos(operand) => {
            let value = eval(operand, defines)?;
            match as_number(&value) {
                Some(number) => Ok(number),
                None => Err(EvalError::Unsupported(format!(
                    "bad operand type for unary +: '{}'",
                    type_name(&value)
                ))),
            }
        }
        // `and`/`or` short-circuit and yield the deciding operand, so the
        // untaken side is parsed but never evaluated.
        Expr::And(lhs, rhs) => {
            let left = eval(lhs, defines)?;
            if left.is_truthy() {
                eval(rhs, defines)
            } else {
                Ok(left)
            }
        }
        Expr::Or(lhs, rhs) => {
            let left = eval(lhs, defines)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                eval(rhs, defines)
            }
        }
        Expr::Cmp(op, lhs, rhs) => {
            let a = eval(lhs, defines)?;
            let b = eval(rhs, defines)?;
            let result = match op {
                CmpOp::Eq => values_equal(&a, &b),
                CmpOp::Ne => !values_equal(&a, &b),
                CmpOp::In | CmpOp::NotIn => {
                    let contains = match (&a, &b) {
                        (Value::Str(needle), Value::Str(haystack)) => haystack.contains(needle),
                        _ => {
                            return Err(EvalError::Unsupported(format!(
                                "'in' requires string operands, got '{}' and '{}'",
                                type_name(&a),
                                type_name(&b)
                            )))
                        }
                    };
                    if *op == CmpOp::In {
                        contains
                    } else {
                        !contains
                    }
                }
                _ => compare(*op, &a, &b)?,
            };
            Ok(Value::Bool(result))
        }
        Expr::Arith(op, lhs, rhs) => {
            let a = eval(lhs, defines)?;
            let b = eval(rhs, defines)?;
            arith(*op, &a, &b)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table(entries: &[(&str, Value)]) -> DefineTable {
        let mut defines = DefineTable::new();
        for (name, value) in entries {
            defines.define(name.to_string(), value.clone());
        }
        defines
    }

    #[test]
    fn arithmetic_precedence() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("1 + 2 * 3", &empty).unwrap(), Value::Int(7));
        assert_eq!(evaluate("(1 + 2) * 3", &empty).unwrap(), Value::Int(9));
        assert_eq!(evaluate("-2 * 3", &empty).unwrap(), Value::Int(-6));
    }

    #[test]
    fn division_is_true_division() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("10 / 4", &empty).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn modulo_takes_sign_of_divisor() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("7 % 3", &empty).unwrap(), Value::Int(1));
        assert_eq!(evaluate("-7 % 3", &empty).unwrap(), Value::Int(2));
    }

    #[test]
    fn division_by_zero() {
        let empty = DefineTable::new();
        assert!(matches!(
            evaluate("1 / 0", &empty),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn radix_literals() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("0x10 + 010", &empty).unwrap(), Value::Int(24));
    }

    #[test]
    fn string_operations() {
        let empty = DefineTable::new();
        assert_eq!(
            evaluate("'a' + 'b'", &empty).unwrap(),
            Value::Str("ab".to_string())
        );
        assert_eq!(
            evaluate("'blue' == \"blue\"", &empty).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(evaluate("'a' < 'b'", &empty).unwrap(), Value::Bool(true));
        assert_eq!(evaluate("'lu' in 'blue'", &empty).unwrap(), Value::Bool(true));
        assert_eq!(
            evaluate("'x' not in 'blue'", &empty).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn name_lookup() {
        let defines = table(&[("FAV_COLOR", Value::Str("blue".to_string()))]);
        assert_eq!(
            evaluate("FAV_COLOR == 'blue'", &defines).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn undefined_name() {
        let empty = DefineTable::new();
        assert_eq!(
            evaluate("BAR", &empty),
            Err(EvalError::UndefinedName("BAR".to_string()))
        );
    }

    #[test]
    fn defined_tests_key_presence_not_truthiness() {
        let defines = table(&[("FOO", Value::Int(0))]);
        assert_eq!(
            evaluate("defined('FOO')", &defines).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate("defined('BAR')", &defines).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn defined_with_bare_name_reports_the_name() {
        // The classic mistake: defined(FOO) instead of defined('FOO').
        let empty = DefineTable::new();
        assert_eq!(
            evaluate("defined(FOO)", &empty),
            Err(EvalError::UndefinedName("FOO".to_string()))
        );
    }

    #[test]
    fn short_circuit_protects_undefined_names() {
        let empty = DefineTable::new();
        assert_eq!(
            evaluate("defined('X') and X == 1", &empty).unwrap(),
            Value::Bool(false)
        );
        let defines = table(&[("X", Value::Int(1))]);
        assert_eq!(
            evaluate("defined('X') and X == 1", &defines).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn and_or_yield_operands() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("True and 2", &empty).unwrap(), Value::Int(2));
        assert_eq!(
            evaluate("0 or 'fallback'", &empty).unwrap(),
            Value::Str("fallback".to_string())
        );
    }

    #[test]
    fn not_yields_bool() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("not ''", &empty).unwrap(), Value::Bool(true));
        assert_eq!(evaluate("not 5", &empty).unwrap(), Value::Bool(false));
    }

    #[test]
    fn bools_coerce_in_numeric_contexts() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("True + 1", &empty).unwrap(), Value::Int(2));
        assert_eq!(evaluate("True == 1", &empty).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mismatched_equality_is_false_not_an_error() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("'1' == 1", &empty).unwrap(), Value::Bool(false));
        assert_eq!(evaluate("'1' != 1", &empty).unwrap(), Value::Bool(true));
        assert_eq!(evaluate("None == None", &empty).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mismatched_ordering_is_an_error() {
        let empty = DefineTable::new();
        assert!(matches!(
            evaluate("'a' < 1", &empty),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn syntax_errors() {
        let empty = DefineTable::new();
        assert_eq!(evaluate("", &empty), Err(EvalError::Syntax));
        assert_eq!(evaluate("1 +", &empty), Err(EvalError::Syntax));
        assert_eq!(evaluate("(1", &empty), Err(EvalError::Syntax));
        assert_eq!(evaluate("1 2", &empty), Err(EvalError::Syntax));
    }

    #[test]
    fn calling_a_plain_value_is_an_error() {
        let defines = table(&[("FOO", Value::Int(5))]);
        assert!(matches!(
            evaluate("FOO(1)", &defines),
            Err(EvalError::Unsupported(_))
        ));
    }
}
