//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use super::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Bool(bool),
    None,
    And,
    Or,
    Not,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse a numeric token: `0x` hex, leading-zero octal, decimal, or a float
/// when a decimal point is present.
fn parse_number(token: &str) -> Result<Token, EvalError> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map(Token::Int)
            .map_err(|_| EvalError::Syntax);
    }
    if token.contains('.') {
        return token.parse::<f64>().map(Token::Float).map_err(|_| EvalError::Syntax);
    }
    if token.len() > 1 && token.starts_with('0') {
        return i64::from_str_radix(&token[1..], 8)
            .map(Token::Int)
            .map_err(|_| EvalError::Syntax);
    }
    token.parse::<i64>().map(Token::Int).map_err(|_| EvalError::Syntax)
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '.' {
                    token.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(parse_number(&token)?);
            continue;
        }

        if is_name_start(c) {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if is_name_continue(c) {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(match name.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "True" | "true" => Token::Bool(true),
                "False" | "false" => Token::Bool(false),
                "None" => Token::None,
                _ => Token::Name(name),
            });
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some('\\') => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('\\') => s.push('\\'),
                        Some('\'') => s.push('\''),
                        Some('"') => s.push('"'),
                        Some(other) => {
                            // Unknown escapes keep the backslash.
                            s.push('\\');
                            s.push(other);
                        }
                        None => return Err(EvalError::Syntax),
                    },
                    Some(c) => s.push(c),
                    None => return Err(EvalError::Syntax),
                }
            }
            tokens.push(Token::Str(s));
            continue;
        }

        chars.next();
        let token = match c {
            '=' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Eq
                }
                _ => return Err(EvalError::Syntax),
            },
            '!' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Ne
                }
                _ => return Err(EvalError::Syntax),
            },
            '<' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Le
                }
                _ => Token::Lt,
            },
            '>' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Ge
                }
                _ => Token::Gt,
            },
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            _ => return Err(EvalError::Syntax),
        };
        tokens.push(token);
    }

    Ok(tokens)
}
