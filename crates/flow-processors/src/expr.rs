//! Sandboxed expression evaluation for transform, filter, and condition nodes
//!
//! Workflow definitions embed small predicate and mapping expressions such
//! as `item.price > 100` or `input.name + '!'`. These come from untrusted
//! documents, so they are never handed to a general-purpose interpreter.
//! Instead [`Expr::parse`] compiles the source into a small AST once, and
//! [`Expr::eval`] runs that AST against a subject value as many times as
//! needed. The language covers literals, dotted field paths, arithmetic,
//! comparisons, and short-circuit boolean operators; there are no function
//! calls and no way to reach anything beyond the subject value.
//!
//! ```
//! use flow_processors::expr::Expr;
//! use serde_json::json;
//!
//! let expr = Expr::parse("item.price * item.qty > 100", "item").unwrap();
//! assert!(expr.eval_bool(&json!({"price": 30, "qty": 4})).unwrap());
//! assert!(!expr.eval_bool(&json!({"price": 30, "qty": 2})).unwrap());
//! ```

use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

use crate::values::{as_f64_lossy, coerce_string, number_value, truthy, value_eq, walk_path};

/// Error raised while parsing or evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The source text is not a valid expression
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    /// The expression is valid but could not be evaluated against the subject
    #[error("{0}")]
    Eval(String),
}

/// A parsed expression, ready to evaluate against subject values
///
/// The binding name given at parse time (for example `item`) refers to the
/// subject; a path starting with it is resolved relative to the subject, as
/// is any other bare path. Parsing strips the binding so evaluation never
/// needs it again.
#[derive(Debug, Clone)]
pub struct Expr {
    ast: Ast,
}

impl Expr {
    /// Parse an expression with the given subject binding name
    pub fn parse(source: &str, binding: &str) -> Result<Self, ExprError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            binding,
        };
        let ast = parser.parse_expression(0)?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(ExprError::Parse {
                offset: *offset,
                message: format!("unexpected trailing {}", describe(token)),
            });
        }
        Ok(Expr { ast })
    }

    /// Evaluate against a subject value
    pub fn eval(&self, subject: &Value) -> Result<Value, ExprError> {
        eval_ast(&self.ast, subject)
    }

    /// Evaluate and reduce the result to its truthiness
    pub fn eval_bool(&self, subject: &Value) -> Result<bool, ExprError> {
        Ok(truthy(&self.eval(subject)?))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Literal(Value),
    /// Dot-path relative to the subject; empty means the subject itself
    Path(Vec<String>),
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Left binding power; all binary operators associate left
    fn power(self) -> u8 {
        match self {
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => 9,
            BinaryOp::Add | BinaryOp::Sub => 10,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 11,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Gt => ">",
            BinaryOp::Lt => "<",
            BinaryOp::Ge => ">=",
            BinaryOp::Le => "<=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    GreaterEq,
    LessEq,
    Greater,
    Less,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    OpenParen,
    CloseParen,
    Dot,
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {}", n),
        Token::Str(text) => format!("string \"{}\"", text),
        Token::Ident(name) => format!("'{}'", name),
        Token::AndAnd => "'&&'".to_string(),
        Token::OrOr => "'||'".to_string(),
        Token::EqEq => "'=='".to_string(),
        Token::NotEq => "'!='".to_string(),
        Token::GreaterEq => "'>='".to_string(),
        Token::LessEq => "'<='".to_string(),
        Token::Greater => "'>'".to_string(),
        Token::Less => "'<'".to_string(),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Percent => "'%'".to_string(),
        Token::Bang => "'!'".to_string(),
        Token::OpenParen => "'('".to_string(),
        Token::CloseParen => "')'".to_string(),
        Token::Dot => "'.'".to_string(),
    }
}

fn lex(source: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&(_, d)) = chars.get(i) {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    text.push(d);
                    i += 1;
                }
                // A dot only joins the number when a digit follows, so
                // `items.0.name` lexes as a path rather than `0.n...`.
                let fraction_follows = matches!(chars.get(i), Some(&(_, '.')))
                    && matches!(chars.get(i + 1), Some(&(_, d)) if d.is_ascii_digit());
                if fraction_follows {
                    text.push('.');
                    i += 1;
                    while let Some(&(_, d)) = chars.get(i) {
                        if !d.is_ascii_digit() {
                            break;
                        }
                        text.push(d);
                        i += 1;
                    }
                }
                let number = text.parse::<f64>().map_err(|_| ExprError::Parse {
                    offset,
                    message: format!("invalid number '{}'", text),
                })?;
                tokens.push((offset, Token::Number(number)));
            }
            '"' | '\'' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                let mut closed = false;
                while let Some(&(escape_offset, d)) = chars.get(i) {
                    if d == quote {
                        i += 1;
                        closed = true;
                        break;
                    }
                    if d == '\\' {
                        let escaped = chars.get(i + 1).map(|&(_, e)| e);
                        match escaped {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some('\'') => text.push('\''),
                            Some('"') => text.push('"'),
                            Some(other) => {
                                return Err(ExprError::Parse {
                                    offset: escape_offset,
                                    message: format!("unknown escape '\\{}'", other),
                                })
                            }
                            None => break,
                        }
                        i += 2;
                    } else {
                        text.push(d);
                        i += 1;
                    }
                }
                if !closed {
                    return Err(ExprError::Parse {
                        offset,
                        message: "unterminated string literal".to_string(),
                    });
                }
                tokens.push((offset, Token::Str(text)));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, d)) = chars.get(i) {
                    if !d.is_alphanumeric() && d != '_' {
                        break;
                    }
                    name.push(d);
                    i += 1;
                }
                tokens.push((offset, Token::Ident(name)));
            }
            '&' => {
                if matches!(chars.get(i + 1), Some(&(_, '&'))) {
                    tokens.push((offset, Token::AndAnd));
                    i += 2;
                } else {
                    return Err(ExprError::Parse {
                        offset,
                        message: "expected '&&'".to_string(),
                    });
                }
            }
            '|' => {
                if matches!(chars.get(i + 1), Some(&(_, '|'))) {
                    tokens.push((offset, Token::OrOr));
                    i += 2;
                } else {
                    return Err(ExprError::Parse {
                        offset,
                        message: "expected '||'".to_string(),
                    });
                }
            }
            '=' => {
                if matches!(chars.get(i + 1), Some(&(_, '='))) {
                    tokens.push((offset, Token::EqEq));
                    i += 2;
                } else {
                    return Err(ExprError::Parse {
                        offset,
                        message: "expected '==' (assignment is not supported)".to_string(),
                    });
                }
            }
            '!' => {
                if matches!(chars.get(i + 1), Some(&(_, '='))) {
                    tokens.push((offset, Token::NotEq));
                    i += 2;
                } else {
                    tokens.push((offset, Token::Bang));
                    i += 1;
                }
            }
            '>' => {
                if matches!(chars.get(i + 1), Some(&(_, '='))) {
                    tokens.push((offset, Token::GreaterEq));
                    i += 2;
                } else {
                    tokens.push((offset, Token::Greater));
                    i += 1;
                }
            }
            '<' => {
                if matches!(chars.get(i + 1), Some(&(_, '='))) {
                    tokens.push((offset, Token::LessEq));
                    i += 2;
                } else {
                    tokens.push((offset, Token::Less));
                    i += 1;
                }
            }
            '+' => {
                tokens.push((offset, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((offset, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((offset, Token::Star));
                i += 1;
            }
            '/' => {
                tokens.push((offset, Token::Slash));
                i += 1;
            }
            '%' => {
                tokens.push((offset, Token::Percent));
                i += 1;
            }
            '(' => {
                tokens.push((offset, Token::OpenParen));
                i += 1;
            }
            ')' => {
                tokens.push((offset, Token::CloseParen));
                i += 1;
            }
            '.' => {
                tokens.push((offset, Token::Dot));
                i += 1;
            }
            other => {
                return Err(ExprError::Parse {
                    offset,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    binding: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn advance(&mut self) -> Option<(usize, Token)> {
        let entry = self.tokens.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.end)
    }

    /// Precedence-climbing loop over left-associative binary operators
    fn parse_expression(&mut self, min_power: u8) -> Result<Ast, ExprError> {
        let mut left = self.parse_prefix()?;
        while let Some(op) = self.peek().and_then(binary_op) {
            let power = op.power();
            if power < min_power {
                break;
            }
            self.advance();
            let right = self.parse_expression(power + 1)?;
            left = Ast::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Ast, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some((_, Token::Bang)) => Ok(Ast::Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.parse_prefix()?),
            }),
            Some((_, Token::Minus)) => Ok(Ast::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(self.parse_prefix()?),
            }),
            Some((_, Token::Number(n))) => Ok(Ast::Literal(number_value(n))),
            Some((_, Token::Str(text))) => Ok(Ast::Literal(Value::String(text))),
            Some((_, Token::Ident(name))) => self.parse_path(name),
            Some((_, Token::OpenParen)) => {
                let inner = self.parse_expression(0)?;
                match self.advance() {
                    Some((_, Token::CloseParen)) => Ok(inner),
                    Some((close_offset, token)) => Err(ExprError::Parse {
                        offset: close_offset,
                        message: format!("expected ')', found {}", describe(&token)),
                    }),
                    None => Err(ExprError::Parse {
                        offset: self.end,
                        message: "expected ')'".to_string(),
                    }),
                }
            }
            Some((token_offset, token)) => Err(ExprError::Parse {
                offset: token_offset,
                message: format!("unexpected {}", describe(&token)),
            }),
            None => Err(ExprError::Parse {
                offset,
                message: "unexpected end of expression".to_string(),
            }),
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Ast, ExprError> {
        match first.as_str() {
            "true" => return Ok(Ast::Literal(Value::Bool(true))),
            "false" => return Ok(Ast::Literal(Value::Bool(false))),
            "null" => return Ok(Ast::Literal(Value::Null)),
            _ => {}
        }
        let mut segments = vec![first];
        while matches!(self.peek(), Some(Token::Dot)) {
            self.advance();
            let offset = self.offset();
            match self.advance() {
                Some((_, Token::Ident(name))) => segments.push(name),
                Some((_, Token::Number(n))) if n.fract() == 0.0 && n >= 0.0 => {
                    segments.push(format!("{}", n as u64));
                }
                _ => {
                    return Err(ExprError::Parse {
                        offset,
                        message: "expected a field name after '.'".to_string(),
                    })
                }
            }
        }
        // The binding prefix is implicit at evaluation time; bare paths are
        // also resolved against the subject.
        if segments.first().map(String::as_str) == Some(self.binding) {
            segments.remove(0);
        }
        Ok(Ast::Path(segments))
    }
}

fn binary_op(token: &Token) -> Option<BinaryOp> {
    Some(match token {
        Token::AndAnd => BinaryOp::And,
        Token::OrOr => BinaryOp::Or,
        Token::EqEq => BinaryOp::Eq,
        Token::NotEq => BinaryOp::Ne,
        Token::Greater => BinaryOp::Gt,
        Token::Less => BinaryOp::Lt,
        Token::GreaterEq => BinaryOp::Ge,
        Token::LessEq => BinaryOp::Le,
        Token::Plus => BinaryOp::Add,
        Token::Minus => BinaryOp::Sub,
        Token::Star => BinaryOp::Mul,
        Token::Slash => BinaryOp::Div,
        Token::Percent => BinaryOp::Rem,
        _ => return None,
    })
}

fn eval_ast(ast: &Ast, subject: &Value) -> Result<Value, ExprError> {
    match ast {
        Ast::Literal(value) => Ok(value.clone()),
        Ast::Path(segments) => Ok(walk_path(subject, segments.iter().map(String::as_str))),
        Ast::Unary {
            op: UnaryOp::Not,
            operand,
        } => Ok(Value::Bool(!truthy(&eval_ast(operand, subject)?))),
        Ast::Unary {
            op: UnaryOp::Neg,
            operand,
        } => {
            let value = eval_ast(operand, subject)?;
            let n = as_f64_lossy(&value).ok_or_else(|| {
                ExprError::Eval("unary '-' requires a numeric operand".to_string())
            })?;
            Ok(number_value(-n))
        }
        Ast::Binary { op, left, right } => eval_binary(*op, left, right, subject),
    }
}

fn eval_binary(op: BinaryOp, left: &Ast, right: &Ast, subject: &Value) -> Result<Value, ExprError> {
    // Boolean operators short-circuit and yield the deciding operand itself,
    // so `input.name || 'anonymous'` works as a fallback.
    match op {
        BinaryOp::And => {
            let l = eval_ast(left, subject)?;
            if !truthy(&l) {
                return Ok(l);
            }
            return eval_ast(right, subject);
        }
        BinaryOp::Or => {
            let l = eval_ast(left, subject)?;
            if truthy(&l) {
                return Ok(l);
            }
            return eval_ast(right, subject);
        }
        _ => {}
    }
    let l = eval_ast(left, subject)?;
    let r = eval_ast(right, subject)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(value_eq(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!value_eq(&l, &r))),
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
            Ok(Value::Bool(compare(op, &l, &r)))
        }
        BinaryOp::Add => {
            if l.is_string() || r.is_string() {
                return Ok(Value::String(format!(
                    "{}{}",
                    coerce_string(&l),
                    coerce_string(&r)
                )));
            }
            let (x, y) = numeric_operands(op, &l, &r)?;
            Ok(number_value(x + y))
        }
        BinaryOp::Sub => {
            let (x, y) = numeric_operands(op, &l, &r)?;
            Ok(number_value(x - y))
        }
        BinaryOp::Mul => {
            let (x, y) = numeric_operands(op, &l, &r)?;
            Ok(number_value(x * y))
        }
        BinaryOp::Div => {
            let (x, y) = numeric_operands(op, &l, &r)?;
            if y == 0.0 {
                return Err(ExprError::Eval("division by zero".to_string()));
            }
            Ok(number_value(x / y))
        }
        BinaryOp::Rem => {
            let (x, y) = numeric_operands(op, &l, &r)?;
            if y == 0.0 {
                return Err(ExprError::Eval("remainder by zero".to_string()));
            }
            Ok(number_value(x % y))
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled before strict evaluation"),
    }
}

/// Ordered comparison: string pairs compare lexicographically, everything
/// else goes through loose numeric coercion. Incomparable operands are
/// simply not ordered, so every comparison on them is false.
fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    let ordering = if let (Value::String(a), Value::String(b)) = (l, r) {
        Some(a.cmp(b))
    } else {
        match (as_f64_lossy(l), as_f64_lossy(r)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        }
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Ge => ordering != Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        _ => false,
    }
}

fn numeric_operands(op: BinaryOp, l: &Value, r: &Value) -> Result<(f64, f64), ExprError> {
    match (as_f64_lossy(l), as_f64_lossy(r)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ExprError::Eval(format!(
            "operator '{}' requires numeric operands",
            op.symbol()
        ))),
    }
}
