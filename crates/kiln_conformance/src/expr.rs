//! Function bodies of the script language.
//!
//! Bodies are blocks of `val` bindings and expressions separated by newlines
//! or `;`. Expressions are integer arithmetic over literals, names, calls,
//! and `fn() { ... }` closures passed to handlers.

use kiln_source::Pos;
use std::fmt;

/// A body line together with its logical line number.
pub type BodyLine<'a> = (u32, &'a str);

/// A syntax error in a body.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyntaxError {
    /// Where the error was detected.
    pub pos: Pos,
    /// Number of columns to underline.
    pub len: u32,
    /// What went wrong.
    pub message: String,
}

impl SyntaxError {
    fn new(pos: Pos, len: u32, message: impl Into<String>) -> Self {
        Self {
            pos,
            len: len.max(1),
            message: message.into(),
        }
    }
}

/// Binary operators.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
        })
    }
}

/// An expression with the position of its first token.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Expr {
    /// The expression.
    pub kind: ExprKind,
    /// Position of the first token.
    pub pos: Pos,
    /// Width of the first token.
    pub len: u32,
}

/// Expression forms.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExprKind {
    /// Integer literal.
    Int(i64),
    /// `true` or `false`.
    Bool(bool),
    /// String literal.
    Str(String),
    /// `()`.
    Unit,
    /// A local or a function used as a value.
    Name(String),
    /// A call.
    Call(String, Vec<Expr>),
    /// A zero-argument closure.
    Lambda(Block),
    /// Arithmetic.
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// A statement of a block.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Stmt {
    /// `val name = expr`; `_` discards.
    Val(String, Expr),
    /// An expression evaluated for its effects or value.
    Expr(Expr),
}

/// A sequence of statements ending in an expression.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    /// Statements in order; the last is always [`Stmt::Expr`].
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Returns the final expression.
    pub fn result(&self) -> Option<&Expr> {
        match self.stmts.last() {
            Some(Stmt::Expr(expr)) => Some(expr),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
enum Tok {
    Int(i64),
    Str(String),
    Ident(String),
    Sym(char),
    Newline,
}

#[derive(Clone, Debug)]
struct Token {
    tok: Tok,
    pos: Pos,
    len: u32,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '@' || c == '/'
}

fn lex(lines: &[BodyLine<'_>]) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    for &(line, text) in lines {
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let pos = Pos::new(line, i as u32 + 1);
            if c.is_whitespace() {
                i += 1;
            } else if c == '/' && chars.get(i + 1) == Some(&'/') {
                break;
            } else if c.is_ascii_digit() {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let value = digits
                    .parse()
                    .map_err(|_| SyntaxError::new(pos, (i - start) as u32, "integer literal too large"))?;
                tokens.push(Token {
                    tok: Tok::Int(value),
                    pos,
                    len: (i - start) as u32,
                });
            } else if c == '"' {
                let start = i;
                i += 1;
                let mut value = String::new();
                loop {
                    match chars.get(i) {
                        Some('"') => break,
                        Some(&ch) => value.push(ch),
                        None => return Err(SyntaxError::new(pos, 1, "unterminated string literal")),
                    }
                    i += 1;
                }
                i += 1;
                tokens.push(Token {
                    tok: Tok::Str(value),
                    pos,
                    len: (i - start) as u32,
                });
            } else if is_ident_start(c) {
                let start = i;
                while i < chars.len() {
                    let ch = chars[i];
                    let dash = ch == '-'
                        && chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic());
                    if !(is_ident_char(ch) || dash) {
                        break;
                    }
                    i += 1;
                }
                tokens.push(Token {
                    tok: Tok::Ident(chars[start..i].iter().collect()),
                    pos,
                    len: (i - start) as u32,
                });
            } else if "(){},;=+-*".contains(c) {
                tokens.push(Token {
                    tok: Tok::Sym(c),
                    pos,
                    len: 1,
                });
                i += 1;
            } else {
                return Err(SyntaxError::new(pos, 1, format!("unexpected character '{c}'")));
            }
        }
        tokens.push(Token {
            tok: Tok::Newline,
            pos: Pos::new(line, chars.len() as u32 + 1),
            len: 1,
        });
    }
    Ok(tokens)
}

/// Parses the lines of a function body.
pub fn parse_body(lines: &[BodyLine<'_>]) -> Result<Block, SyntaxError> {
    let tokens = lex(lines)?;
    let end = tokens
        .last()
        .map(|t| t.pos)
        .unwrap_or_else(|| Pos::new(1, 1));
    let mut parser = Parser {
        tokens,
        at: 0,
        end,
    };
    let block = parser.block(false)?;
    Ok(block)
}

struct Parser {
    tokens: Vec<Token>,
    at: usize,
    end: Pos,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.at).cloned();
        self.at += 1;
        token
    }

    fn at_sym(&self, sym: char) -> bool {
        matches!(self.peek(), Some(Token { tok: Tok::Sym(c), .. }) if *c == sym)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token { tok: Tok::Newline, .. })) {
            self.at += 1;
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::new(token.pos, token.len, message),
            None => SyntaxError::new(self.end, 1, message),
        }
    }

    fn expect(&mut self, sym: char) -> Result<(), SyntaxError> {
        self.skip_newlines();
        if self.at_sym(sym) {
            self.at += 1;
            Ok(())
        } else {
            Err(self.error_here(format!("expected '{sym}'")))
        }
    }

    fn block(&mut self, braced: bool) -> Result<Block, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            while matches!(
                self.peek(),
                Some(Token { tok: Tok::Newline, .. }) | Some(Token { tok: Tok::Sym(';'), .. })
            ) {
                self.at += 1;
            }
            match self.peek() {
                None if braced => return Err(self.error_here("expected '}'")),
                None => break,
                Some(Token { tok: Tok::Sym('}'), .. }) if braced => break,
                _ => {}
            }
            stmts.push(self.stmt()?);
            match self.peek() {
                None
                | Some(Token { tok: Tok::Newline, .. })
                | Some(Token { tok: Tok::Sym(';'), .. }) => {}
                Some(Token { tok: Tok::Sym('}'), .. }) if braced => {}
                _ => return Err(self.error_here("expected end of statement")),
            }
        }
        let block = Block { stmts };
        if block.result().is_none() {
            return Err(self.error_here("block must end with an expression"));
        }
        Ok(block)
    }

    fn stmt(&mut self) -> Result<Stmt, SyntaxError> {
        if matches!(self.peek(), Some(Token { tok: Tok::Ident(word), .. }) if word == "val") {
            self.at += 1;
            let name = match self.next() {
                Some(Token {
                    tok: Tok::Ident(name),
                    ..
                }) => name,
                _ => {
                    self.at -= 1;
                    return Err(self.error_here("expected a name after 'val'"));
                }
            };
            self.expect('=')?;
            let value = self.expr()?;
            return Ok(Stmt::Val(name, value));
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.at_sym('+') {
                BinOp::Add
            } else if self.at_sym('-') {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            self.at += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.atom()?;
        while self.at_sym('*') {
            self.at += 1;
            let rhs = self.atom()?;
            lhs = binary(BinOp::Mul, lhs, rhs);
        }
        Ok(lhs)
    }

    fn atom(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.next() else {
            return Err(SyntaxError::new(self.end, 1, "unexpected end of expression"));
        };
        let at = |kind| Expr {
            kind,
            pos: token.pos,
            len: token.len,
        };
        match &token.tok {
            Tok::Int(value) => Ok(at(ExprKind::Int(*value))),
            Tok::Str(value) => Ok(at(ExprKind::Str(value.clone()))),
            Tok::Sym('(') => {
                self.skip_newlines();
                if self.at_sym(')') {
                    self.at += 1;
                    return Ok(at(ExprKind::Unit));
                }
                let inner = self.expr()?;
                self.expect(')')?;
                Ok(inner)
            }
            Tok::Ident(word) if word == "true" || word == "false" => {
                Ok(at(ExprKind::Bool(word == "true")))
            }
            Tok::Ident(word) if word == "fn" => {
                self.expect('(')?;
                self.expect(')')?;
                self.expect('{')?;
                let body = self.block(true)?;
                self.expect('}')?;
                Ok(at(ExprKind::Lambda(body)))
            }
            Tok::Ident(name) => {
                if !self.at_sym('(') {
                    return Ok(at(ExprKind::Name(name.clone())));
                }
                self.at += 1;
                let mut args = Vec::new();
                self.skip_newlines();
                if !self.at_sym(')') {
                    loop {
                        self.skip_newlines();
                        args.push(self.expr()?);
                        self.skip_newlines();
                        if !self.at_sym(',') {
                            break;
                        }
                        self.at += 1;
                    }
                }
                self.expect(')')?;
                Ok(at(ExprKind::Call(name.clone(), args)))
            }
            Tok::Newline => {
                self.at -= 1;
                Err(self.error_here("unexpected end of line"))
            }
            Tok::Sym(c) => Err(SyntaxError::new(
                token.pos,
                token.len,
                format!("unexpected '{c}'"),
            )),
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    let (pos, len) = (lhs.pos, lhs.len);
    Expr {
        kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)),
        pos,
        len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Block, SyntaxError> {
        let lines: Vec<BodyLine<'_>> = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i as u32 + 1, l))
            .collect();
        parse_body(&lines)
    }

    #[test]
    fn precedence() {
        let block = parse("1 + 2 * 3").unwrap();
        let Some(Expr {
            kind: ExprKind::Binary(BinOp::Add, _, rhs),
            ..
        }) = block.result()
        else {
            panic!("expected addition");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
    }

    #[test]
    fn dashed_and_qualified_names() {
        let block = parse("std/core/default-exn(fn() { println(@expr()) })").unwrap();
        let Some(Expr {
            kind: ExprKind::Call(name, args),
            ..
        }) = block.result()
        else {
            panic!("expected call");
        };
        assert_eq!(name, "std/core/default-exn");
        assert!(matches!(args[0].kind, ExprKind::Lambda(_)));
    }

    #[test]
    fn minus_between_names_needs_no_letter() {
        let block = parse("val x = 3\nx - 1").unwrap();
        assert_eq!(block.stmts.len(), 2);
        assert!(matches!(
            block.result().map(|e| &e.kind),
            Some(ExprKind::Binary(BinOp::Sub, _, _))
        ));
    }

    #[test]
    fn statements_split_on_semicolon() {
        let block = parse("val _ = f(); ()").unwrap();
        assert!(matches!(block.stmts[0], Stmt::Val(ref n, _) if n == "_"));
        assert!(matches!(
            block.result().map(|e| &e.kind),
            Some(ExprKind::Unit)
        ));
    }

    #[test]
    fn dangling_operator_reports_position() {
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.pos.line, 1);
        assert_eq!(err.message, "unexpected end of line");
    }

    #[test]
    fn block_must_end_in_expression() {
        assert!(parse("val x = 1").is_err());
    }
}
