//! @acp:module "Directive Expressions"
//! @acp:summary "Restricted literal and boolean expression grammar for $WIZ$ directives"
//! @acp:domain cli
//! @acp:layer logic
//!
//! Directive assignments are tokenized, parsed into a small tagged AST and
//! evaluated against an explicit identifier table. The grammar only knows
//! literals, tuples and `and`/`or`/`not`/`in`/`==`/`!=`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating an expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: String,
    },

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("invalid integer literal '{0}'")]
    InvalidInteger(String),

    #[error("'{op}' cannot be applied to {operand}")]
    Type { op: &'static str, operand: String },
}

/// @acp:summary "Evaluated directive value"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Value>),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Tuple(_) => None,
        }
    }

    /// Strings and tuples of strings as a list; a single string becomes a one-element list
    pub fn to_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::Str(s) => Some(vec![s.clone()]),
            Value::Tuple(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Tuple(_) => "tuple",
        }
    }
}

/// Renders the value back in directive literal syntax
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Identifier table used during evaluation
pub trait Environment {
    fn lookup(&self, ident: &str) -> Option<Value>;
}

/// Environment without identifiers; directive assignments are evaluated against it
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn lookup(&self, _ident: &str) -> Option<Value> {
        None
    }
}

impl Environment for BTreeMap<String, bool> {
    fn lookup(&self, ident: &str) -> Option<Value> {
        self.get(ident).map(|b| Value::Bool(*b))
    }
}

impl Environment for HashMap<String, Value> {
    fn lookup(&self, ident: &str) -> Option<Value> {
        self.get(ident).cloned()
    }
}

/// @acp:summary "Expression AST"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Ident(String),
    Tuple(Vec<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    In {
        item: Box<Expr>,
        container: Box<Expr>,
        negated: bool,
    },
    Eq {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
}

impl Expr {
    pub fn eval(&self, env: &dyn Environment) -> Result<Value, ExprError> {
        match self {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
            Expr::Tuple(items) => Ok(Value::Tuple(
                items
                    .iter()
                    .map(|e| e.eval(env))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Not(inner) => Ok(Value::Bool(!inner.eval(env)?.truthy())),
            Expr::And(lhs, rhs) => {
                if !lhs.eval(env)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(rhs.eval(env)?.truthy()))
            }
            Expr::Or(lhs, rhs) => {
                if lhs.eval(env)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(rhs.eval(env)?.truthy()))
            }
            Expr::In {
                item,
                container,
                negated,
            } => {
                let item = item.eval(env)?;
                let found = match container.eval(env)? {
                    Value::Tuple(items) => items.contains(&item),
                    Value::Str(haystack) => match &item {
                        Value::Str(needle) => haystack.contains(needle.as_str()),
                        other => {
                            return Err(ExprError::Type {
                                op: "in",
                                operand: other.kind().to_string(),
                            })
                        }
                    },
                    other => {
                        return Err(ExprError::Type {
                            op: "in",
                            operand: other.kind().to_string(),
                        })
                    }
                };
                Ok(Value::Bool(found != *negated))
            }
            Expr::Eq { lhs, rhs, negated } => {
                let equal = lhs.eval(env)? == rhs.eval(env)?;
                Ok(Value::Bool(equal != *negated))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Int(i64),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    Semi,
    EqEq,
    NotEq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::Int(i) => write!(f, "integer {}", i),
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Comma => write!(f, "','"),
            Token::Assign => write!(f, "'='"),
            Token::Semi => write!(f, "';'"),
            Token::EqEq => write!(f, "'=='"),
            Token::NotEq => write!(f, "'!='"),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            // Trailing comment
            '#' => break,
            '(' | ')' | '[' | ']' | ',' | ';' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    _ => Token::Semi,
                });
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    tokens.push(Token::Assign);
                }
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some(&(_, '='))) {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    return Err(ExprError::UnexpectedChar('!', pos));
                }
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars, c)?));
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' => {
                tokens.push(Token::Int(lex_integer(&mut chars)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(ExprError::UnexpectedChar(other, pos)),
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &mut Peekable<CharIndices<'_>>, quote: char) -> Result<String, ExprError> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(out),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\'')) => out.push('\''),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(ExprError::UnterminatedString),
            },
            c => out.push(c),
        }
    }
    Err(ExprError::UnterminatedString)
}

fn lex_integer(chars: &mut Peekable<CharIndices<'_>>) -> Result<i64, ExprError> {
    let mut text = String::new();
    if let Some(&(_, c)) = chars.peek() {
        if c == '-' || c == '+' {
            text.push(c);
            chars.next();
        }
    }
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_alphanumeric() {
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.trim_start_matches('+')),
    };
    let parsed = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    };
    match parsed {
        Ok(v) if negative => Ok(-v),
        Ok(v) => Ok(v),
        Err(_) => Err(ExprError::InvalidInteger(text)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == keyword)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn found(&self) -> String {
        self.peek()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), ExprError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ExprError::Expected {
                expected,
                found: self.found(),
            })
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn assignments(&mut self) -> Result<Vec<(String, Expr)>, ExprError> {
        let mut out = Vec::new();
        while !self.at_end() {
            let name = match self.advance() {
                Some(Token::Ident(name)) if !is_keyword(&name) => name,
                other => {
                    return Err(ExprError::Expected {
                        expected: "identifier",
                        found: other
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "end of input".to_string()),
                    })
                }
            };
            self.expect(Token::Assign, "'='")?;
            let value = self.bare_tuple()?;
            out.push((name, value));

            if self.at_end() {
                break;
            }
            self.expect(Token::Semi, "';'")?;
        }
        Ok(out)
    }

    /// Right-hand side of an assignment: `a, b` without parentheses is a tuple
    fn bare_tuple(&mut self) -> Result<Expr, ExprError> {
        let first = self.expression()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            if self.at_end() || self.peek() == Some(&Token::Semi) {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.and_expr()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.not_expr()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, ExprError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.atom()?;

        if self.peek_keyword("in") {
            self.pos += 1;
            let container = self.atom()?;
            return Ok(Expr::In {
                item: Box::new(lhs),
                container: Box::new(container),
                negated: false,
            });
        }
        if self.peek_keyword("not")
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Ident(s)) if s == "in")
        {
            self.pos += 2;
            let container = self.atom()?;
            return Ok(Expr::In {
                item: Box::new(lhs),
                container: Box::new(container),
                negated: true,
            });
        }
        match self.peek() {
            Some(Token::EqEq) | Some(Token::NotEq) => {
                let negated = self.advance() == Some(Token::NotEq);
                let rhs = self.atom()?;
                Ok(Expr::Eq {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    negated,
                })
            }
            _ => Ok(lhs),
        }
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Int(i)) => Ok(Expr::Int(i)),
            Some(Token::Ident(name)) => match name.as_str() {
                "True" | "true" => Ok(Expr::Bool(true)),
                "False" | "false" => Ok(Expr::Bool(false)),
                "and" | "or" | "not" | "in" => Err(ExprError::Expected {
                    expected: "operand",
                    found: format!("'{}'", name),
                }),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::LParen) => self.parenthesized(),
            Some(Token::LBracket) => {
                let items = self.sequence(Token::RBracket, "']'")?.0;
                Ok(Expr::Tuple(items))
            }
            other => Err(ExprError::Expected {
                expected: "operand",
                found: other
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "end of input".to_string()),
            }),
        }
    }

    /// `( … )` is grouping unless it is empty or contains a comma
    fn parenthesized(&mut self) -> Result<Expr, ExprError> {
        let (mut items, saw_comma) = self.sequence(Token::RParen, "')'")?;
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Expr::Tuple(items))
    }

    fn sequence(
        &mut self,
        close: Token,
        expected: &'static str,
    ) -> Result<(Vec<Expr>, bool), ExprError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                return Ok((items, saw_comma));
            }
            items.push(self.expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    saw_comma = true;
                    self.pos += 1;
                }
                Some(t) if *t == close => {}
                _ => {
                    return Err(ExprError::Expected {
                        expected,
                        found: self.found(),
                    })
                }
            }
        }
    }
}

fn is_keyword(s: &str) -> bool {
    matches!(s, "and" | "or" | "not" | "in" | "True" | "False")
}

/// Parse a single expression (used for `supports` strings)
pub fn parse_expression(src: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(tokenize(src)?);
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(ExprError::Expected {
            expected: "end of expression",
            found: parser.found(),
        });
    }
    Ok(expr)
}

/// Parse a `key = expr; key = expr` list
pub fn parse_assignments(src: &str) -> Result<Vec<(String, Expr)>, ExprError> {
    Parser::new(tokenize(src)?).assignments()
}

/// Parse and evaluate an assignment list against an empty environment
pub fn evaluate_assignments(src: &str) -> Result<Vec<(String, Value)>, ExprError> {
    parse_assignments(src)?
        .into_iter()
        .map(|(name, expr)| Ok((name, expr.eval(&EmptyEnvironment)?)))
        .collect()
}
