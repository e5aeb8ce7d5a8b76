//! Activation expression evaluator.
//!
//! Marker bundles embed small boolean/arithmetic expressions over child
//! marker counts, e.g. `"hedge >= 2 and (not denial)"`. These are
//! author-supplied data, not code: this module parses a restricted grammar
//! into an AST and walks it directly, with no `eval`-equivalent anywhere,
//! so a malicious or malformed expression can only fail to parse or
//! evaluate — it can never execute arbitrary code.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EvalError {
    UnexpectedChar(char),
    UnexpectedEnd,
    UnexpectedToken(String),
    TrailingInput(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            EvalError::UnexpectedEnd => write!(f, "unexpected end of expression"),
            EvalError::UnexpectedToken(t) => write!(f, "unexpected token '{t}'"),
            EvalError::TrailingInput(t) => write!(f, "trailing input starting at '{t}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    And,
    Or,
    Not,
    Op(&'static str), // == != < <= > >=
    LParen,
    RParen,
}

fn lex(src: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("=="));
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("<="));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(">="));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n = s.parse::<f64>().map_err(|_| EvalError::UnexpectedToken(s))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Name(String),
    Number(f64),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(&'static str, Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    // expr := or_expr
    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, EvalError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, EvalError> {
        let lhs = self.parse_atom()?;
        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.advance();
            let rhs = self.parse_atom()?;
            return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Expr::Name(name.clone())),
            Some(Token::Number(n)) => Ok(Expr::Number(*n)),
            Some(Token::Not) => {
                let inner = self.parse_not()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(EvalError::UnexpectedToken(format!("{other:?}"))),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(other) => Err(EvalError::UnexpectedToken(format!("{other:?}"))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

/// A value is either a number (comparisons, counts) or a boolean (logical
/// connectives, comparison results) — mirroring Python's duck-typed
/// truthiness just enough to let `hedge` and `hedge >= 2` both work.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

impl Value {
    fn truthy(self) -> bool {
        match self {
            Value::Num(n) => n != 0.0,
            Value::Bool(b) => b,
        }
    }

    fn as_num(self) -> f64 {
        match self {
            Value::Num(n) => n,
            Value::Bool(b) => if b { 1.0 } else { 0.0 },
        }
    }
}

fn eval_expr(expr: &Expr, counts: &HashMap<String, f64>) -> Value {
    match expr {
        Expr::Name(name) => Value::Num(*counts.get(name).unwrap_or(&0.0)),
        Expr::Number(n) => Value::Num(*n),
        Expr::Not(inner) => Value::Bool(!eval_expr(inner, counts).truthy()),
        Expr::And(a, b) => {
            let av = eval_expr(a, counts);
            if !av.truthy() {
                av
            } else {
                eval_expr(b, counts)
            }
        }
        Expr::Or(a, b) => {
            let av = eval_expr(a, counts);
            if av.truthy() {
                av
            } else {
                eval_expr(b, counts)
            }
        }
        Expr::Compare(op, a, b) => {
            let (x, y) = (eval_expr(a, counts).as_num(), eval_expr(b, counts).as_num());
            let r = match *op {
                "==" => x == y,
                "!=" => x != y,
                "<" => x < y,
                "<=" => x <= y,
                ">" => x > y,
                ">=" => x >= y,
                _ => unreachable!(),
            };
            Value::Bool(r)
        }
    }
}

/// Parse `src` into an AST once per compile (cached by the caller), ready
/// for repeated evaluation against different per-window `counts` maps.
pub(crate) struct Activation {
    expr: Expr,
}

impl Activation {
    pub fn parse(src: &str) -> Result<Self, EvalError> {
        let tokens = lex(src)?;
        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_expr()?;
        if parser.pos != tokens.len() {
            let rest = format!("{:?}", tokens[parser.pos]);
            return Err(EvalError::TrailingInput(rest));
        }
        Ok(Self { expr })
    }

    /// Evaluate against a window's environment (child marker counts plus
    /// any derived values like `total_children`/`score`); unknown names
    /// default to 0.
    pub fn eval(&self, counts: &HashMap<String, f64>) -> bool {
        eval_expr(&self.expr, counts).truthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn bare_name_truthy_when_nonzero() {
        let a = Activation::parse("hedge").unwrap();
        assert!(a.eval(&counts(&[("hedge", 1.0)])));
        assert!(!a.eval(&counts(&[("hedge", 0.0)])));
    }

    #[test]
    fn unknown_name_defaults_to_zero() {
        let a = Activation::parse("ghost >= 1").unwrap();
        assert!(!a.eval(&counts(&[])));
    }

    #[test]
    fn comparison_and_boolean_combination() {
        let a = Activation::parse("hedge >= 2 and not denial").unwrap();
        assert!(a.eval(&counts(&[("hedge", 2.0), ("denial", 0.0)])));
        assert!(!a.eval(&counts(&[("hedge", 2.0), ("denial", 1.0)])));
        assert!(!a.eval(&counts(&[("hedge", 1.0), ("denial", 0.0)])));
    }

    #[test]
    fn or_short_circuits_left_to_right() {
        let a = Activation::parse("hedge or denial").unwrap();
        assert!(a.eval(&counts(&[("hedge", 1.0), ("denial", 0.0)])));
        assert!(a.eval(&counts(&[("hedge", 0.0), ("denial", 1.0)])));
        assert!(!a.eval(&counts(&[("hedge", 0.0), ("denial", 0.0)])));
    }

    #[test]
    fn parenthesized_precedence() {
        let a = Activation::parse("(hedge or denial) and not booster").unwrap();
        assert!(a.eval(&counts(&[("hedge", 1.0), ("denial", 0.0), ("booster", 0.0)])));
        assert!(!a.eval(&counts(&[("hedge", 1.0), ("denial", 0.0), ("booster", 1.0)])));
    }

    #[test]
    fn malformed_expression_is_parse_error_not_panic() {
        assert!(Activation::parse("hedge >=").is_err());
        assert!(Activation::parse("(hedge").is_err());
        assert!(Activation::parse("hedge ^ 2").is_err());
        assert!(Activation::parse("hedge 3").is_err());
    }
}
