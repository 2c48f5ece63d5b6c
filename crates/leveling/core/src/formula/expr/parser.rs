//! Tokenizer and recursive-descent parser.
//!
//! Grammar:
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident | ident '(' args? ')' | '(' expr ')'
//! args    := expr (',' expr)*
//! ```

use super::{BinaryOp, Expr, Function};
use crate::error::{FormulaError, Result};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

pub(super) fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    if let Some((offset, token)) = parser.tokens.get(parser.pos) {
        return Err(syntax_error(*offset, format!("unexpected {token:?}")));
    }
    Ok(expr)
}

fn syntax_error(offset: usize, message: impl std::fmt::Display) -> FormulaError {
    FormulaError::config(format!("invalid expression at offset {offset}: {message}"))
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push((offset, Token::Op(c)));
                i += 1;
            }
            '(' => {
                tokens.push((offset, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((offset, Token::RParen));
                i += 1;
            }
            ',' => {
                tokens.push((offset, Token::Comma));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                // Exponent only when digits follow, so `2e` stays `2` then `e`.
                if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j].1, '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].1.is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
                let text = &source[offset..end];
                let value: f64 = text
                    .parse()
                    .map_err(|_| syntax_error(chars[start].0, format!("bad number '{text}'")))?;
                tokens.push((offset, Token::Number(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
                tokens.push((offset, Token::Ident(source[offset..end].to_string())));
            }
            other => return Err(syntax_error(offset, format!("unexpected character '{other}'"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(offset, _)| *offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let offset = self.offset();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(syntax_error(offset, format!("expected {expected:?}, found {token:?}"))),
            None => Err(syntax_error(offset, format!("expected {expected:?}, found end of input"))),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat_op('+') {
                BinaryOp::Add
            } else if self.eat_op('-') {
                BinaryOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_op('*') {
                BinaryOp::Mul
            } else if self.eat_op('/') {
                BinaryOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat_op('-') {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat_op('+') {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if self.eat_op('^') {
            let exponent = self.unary()?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Ident(name)) => {
                if self.peek() != Some(&Token::LParen) {
                    return Ok(Expr::Var(name));
                }
                let func = Function::from_name(&name)
                    .ok_or_else(|| syntax_error(offset, format!("unknown function '{name}'")))?;
                self.pos += 1;
                let args = self.args()?;
                let (min, max) = func.arity();
                if args.len() < min || args.len() > max {
                    return Err(syntax_error(
                        offset,
                        format!("'{name}' does not accept {} argument(s)", args.len()),
                    ));
                }
                Ok(Expr::Call { func, args })
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(syntax_error(offset, format!("unexpected {token:?}"))),
            None => Err(syntax_error(offset, "unexpected end of input")),
        }
    }

    /// Arguments after an opening parenthesis, consuming the closing one.
    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            let offset = self.offset();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => {
                    return Err(syntax_error(offset, format!("expected ',' or ')', found {token:?}")));
                }
                None => return Err(syntax_error(offset, "unclosed argument list")),
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}
