//! Lexer and parser for the scripted engine's script subset
//!
//! Supported statements: `var`/`let`/`const` declarations, function
//! declarations, `return`, `throw`, blocks and expression statements.
//! Expressions cover literals, identifiers, member access, calls, object
//! literals, function expressions, assignment, `typeof`, unary `-`/`!`
//! and binary `+ - * /`. Semicolons are optional between statements.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use logos::Logos;

/// Byte range in the source
pub type Span = Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
enum Token {
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("typeof")]
    Typeof,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("undefined")]
    Undefined,

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("!")]
    Bang,
}

fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Typeof,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Function(Rc<FunctionDef>),
    Assign(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Statement node
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Declare(Vec<(String, Option<Expr>)>),
    Function(Rc<FunctionDef>),
    Return(Option<Expr>),
    Throw(Expr),
    Block(Vec<Stmt>),
    Expr(Expr),
    Empty,
}

/// Function literal or declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// Parsed script
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

/// Syntax error with the byte offset it was detected at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }

    /// `line:column` of the error, both 1-based
    pub fn location(&self, source: &str) -> (usize, usize) {
        let before = &source[..self.offset.min(source.len())];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        (line, column)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyntaxError: {}", self.message)
    }
}

/// Tokenize and parse `source`.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                return Err(SyntaxError::new(
                    format!("Invalid or unexpected token '{}'", lexer.slice()),
                    lexer.span().start,
                ))
            }
        }
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let mut body = Vec::new();
    while !parser.at_end() {
        body.push(parser.statement()?);
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, span)| span.start)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), SyntaxError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, what: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::new(
                format!("Unexpected token {:?}, expected {}", token, what),
                self.offset(),
            ),
            None => SyntaxError::new("Unexpected end of input", self.offset()),
        }
    }

    fn ident(&mut self) -> Result<String, SyntaxError> {
        if let Some(Token::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        let stmt = match self.peek() {
            Some(Token::Var | Token::Let | Token::Const) => {
                self.advance();
                let mut bindings = Vec::new();
                loop {
                    let name = self.ident()?;
                    let init = if self.eat(&Token::Assign) {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    bindings.push((name, init));
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                Stmt::Declare(bindings)
            }
            Some(Token::Function) => {
                self.advance();
                let name = self.ident()?;
                return Ok(Stmt::Function(Rc::new(self.function_rest(Some(name))?)));
            }
            Some(Token::Return) => {
                self.advance();
                match self.peek() {
                    None | Some(Token::Semi | Token::RBrace) => Stmt::Return(None),
                    _ => Stmt::Return(Some(self.expression()?)),
                }
            }
            Some(Token::Throw) => {
                self.advance();
                Stmt::Throw(self.expression()?)
            }
            Some(Token::LBrace) => {
                self.advance();
                return Ok(Stmt::Block(self.block_rest()?));
            }
            Some(Token::Semi) => {
                self.advance();
                return Ok(Stmt::Empty);
            }
            _ => Stmt::Expr(self.expression()?),
        };
        self.eat(&Token::Semi);
        Ok(stmt)
    }

    fn block_rest(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        while !self.eat(&Token::RBrace) {
            if self.at_end() {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn function_rest(&mut self, name: Option<String>) -> Result<FunctionDef, SyntaxError> {
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                params.push(self.ident()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma, "',' or ')'")?;
            }
        }
        self.expect(Token::LBrace, "'{'")?;
        let body = self.block_rest()?;
        Ok(FunctionDef { name, params, body })
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.offset();
        let target = self.additive()?;
        if !self.eat(&Token::Assign) {
            return Ok(target);
        }
        if !matches!(target, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
            return Err(SyntaxError::new(
                "Invalid left-hand side in assignment",
                start,
            ));
        }
        let value = self.expression()?;
        Ok(Expr::Assign(Box::new(target), Box::new(value)))
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Typeof) => UnaryOp::Typeof,
            _ => return self.postfix(),
        };
        self.advance();
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.property_name()?;
                    expr = Expr::Member(Box::new(expr), name);
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if self.eat(&Token::RParen) {
                                break;
                            }
                            self.expect(Token::Comma, "',' or ')'")?;
                        }
                    }
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    /// Identifier or keyword used as a property name
    fn property_name(&mut self) -> Result<String, SyntaxError> {
        let name = match self.peek() {
            Some(Token::Ident(_)) => return self.ident(),
            Some(Token::Str(text)) => text.clone(),
            Some(token) => match keyword_text(token) {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected("property name")),
            },
            None => return Err(self.unexpected("property name")),
        };
        self.advance();
        Ok(name)
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(SyntaxError::new("Unexpected end of input", offset));
        };
        Ok(match token {
            Token::Number(n) => Expr::Number(n),
            Token::Str(text) => Expr::Str(text),
            Token::True => Expr::Bool(true),
            Token::False => Expr::Bool(false),
            Token::Null => Expr::Null,
            Token::Undefined => Expr::Undefined,
            Token::Ident(name) => Expr::Ident(name),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(Token::RParen, "')'")?;
                inner
            }
            Token::LBrace => {
                let mut props = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = self.property_name()?;
                        self.expect(Token::Colon, "':'")?;
                        props.push((key, self.expression()?));
                        if self.eat(&Token::RBrace) {
                            break;
                        }
                        self.expect(Token::Comma, "',' or '}'")?;
                    }
                }
                Expr::Object(props)
            }
            Token::Function => {
                let name = match self.peek() {
                    Some(Token::Ident(_)) => Some(self.ident()?),
                    _ => None,
                };
                Expr::Function(Rc::new(self.function_rest(name)?))
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected token {:?}", other),
                    offset,
                ))
            }
        })
    }
}

fn keyword_text(token: &Token) -> Option<&'static str> {
    Some(match token {
        Token::Var => "var",
        Token::Let => "let",
        Token::Const => "const",
        Token::Function => "function",
        Token::Return => "return",
        Token::Throw => "throw",
        Token::Typeof => "typeof",
        Token::True => "true",
        Token::False => "false",
        Token::Null => "null",
        Token::Undefined => "undefined",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_declaration_and_call() {
        let program = parse("var x = greet('a', 2);").unwrap();
        assert_eq!(
            program.body,
            vec![Stmt::Declare(vec![(
                "x".to_string(),
                Some(Expr::Call(
                    Box::new(Expr::Ident("greet".into())),
                    vec![Expr::Str("a".into()), Expr::Number(2.0)]
                ))
            )])]
        );
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            program.body,
            vec![Stmt::Expr(Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0))
                ))
            ))]
        );
    }

    #[test]
    fn test_statements_without_semicolons() {
        let program = parse("var a = 1\nvar b = 2\na").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_function_declaration() {
        let program = parse("function add(a, b) { return a + b; }").unwrap();
        let Stmt::Function(def) = &program.body[0] else {
            panic!("expected function");
        };
        assert_eq!(def.name.as_deref(), Some("add"));
        assert_eq!(def.params, vec!["a", "b"]);
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn test_string_escapes() {
        let program = parse(r#"'it\'s' + "a\nb""#).unwrap();
        let Stmt::Expr(Expr::Binary(_, left, right)) = &program.body[0] else {
            panic!("expected binary");
        };
        assert_eq!(**left, Expr::Str("it's".into()));
        assert_eq!(**right, Expr::Str("a\nb".into()));
    }

    #[test]
    fn test_syntax_error_location() {
        let source = "var x = 1;\nvar = 2;";
        let err = parse(source).unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError:"));
        assert_eq!(err.location(source), (2, 5));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse("1 = 2").unwrap_err();
        assert_eq!(err.message, "Invalid left-hand side in assignment");
    }
}
