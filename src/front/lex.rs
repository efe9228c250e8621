//! The lexer (spec §4.1). Never fails: an unrecognized character becomes an
//! `Illegal` token, which the parser is the one to reject (spec "Failure
//! semantics: the lexer never fails").

use derive_more::Display;
use regex::Regex;

/// A single lexeme, with the line it started on (spec §4.1).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{kind} '{lexeme}' (line {line})")]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub line: usize,
    pub lexeme: &'src str,
}

/// Token classes (spec §4.1). The keyword kinds are recognized only after a
/// full identifier has been scanned and matched against the keyword table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    #[display("illegal")]
    Illegal,
    #[display("eof")]
    Eof,
    #[display("integer")]
    Integer,
    #[display("(")]
    ParenL,
    #[display(")")]
    ParenR,
    #[display("{{")]
    CurlyL,
    #[display("}}")]
    CurlyR,
    #[display(",")]
    Comma,
    #[display(":")]
    Colon,
    #[display("ident")]
    Ident,
    #[display("func")]
    Func,
    #[display("var")]
    Var,
    #[display("u64")]
    U64,
    #[display("set")]
    Set,
    #[display("ret")]
    Ret,
    #[display("reti")]
    Reti,
    #[display("jmp")]
    Jmp,
    #[display("jnz")]
    Jnz,
    #[display("add")]
    Add,
    #[display("addi")]
    Addi,
    #[display("sub")]
    Sub,
    #[display("mul")]
    Mul,
}

// Linear scan — the table is tiny (spec §4.1's canonical keyword set).
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("add", TokenKind::Add),
    ("addi", TokenKind::Addi),
    ("func", TokenKind::Func),
    ("jmp", TokenKind::Jmp),
    ("jnz", TokenKind::Jnz),
    ("mul", TokenKind::Mul),
    ("ret", TokenKind::Ret),
    ("reti", TokenKind::Reti),
    ("set", TokenKind::Set),
    ("sub", TokenKind::Sub),
    ("u64", TokenKind::U64),
    ("var", TokenKind::Var),
];

fn keyword_kind(ident: &str) -> Option<TokenKind> {
    KEYWORDS
        .iter()
        .find(|(kw, _)| *kw == ident)
        .map(|(_, kind)| *kind)
}

fn is_bin_digit(c: char) -> bool {
    c == '0' || c == '1'
}

fn is_dec_digit(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

pub struct Lexer<'input> {
    filename: String,
    input: &'input str,
    pos: usize,
    line: usize,
    // Matches a run of skippable whitespace classes and `;`-comments
    // anchored at the current position.
    whitespace: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(filename: impl Into<String>, input: &'input str) -> Self {
        Lexer {
            filename: filename.into(),
            input,
            pos: 0,
            line: 1,
            whitespace: Regex::new(r"\A(?:[ \t\r\n\x0B\x0C\u{85}\u{A0}]|;[^\n]*)*")
                .expect("whitespace regex is a compile-time constant"),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn scan_run(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(self.rest()) {
            self.line += m.as_str().chars().filter(|&c| c == '\n').count();
            self.pos += m.end();
        }
    }

    fn scan_number_body(&mut self, first_digit: char) -> TokenKind {
        if first_digit == '0' {
            if self.peek_char() == Some('b') {
                self.advance_char();
                self.scan_run(is_bin_digit);
                return TokenKind::Integer;
            } else if self.peek_char() == Some('x') {
                self.advance_char();
                self.scan_run(is_hex_digit);
                return TokenKind::Integer;
            }
        }
        self.scan_run(is_dec_digit);
        TokenKind::Integer
    }

    /// `first` is the already-consumed leading character: `-` or a decimal
    /// digit. An isolated `-` not followed by a digit yields `Illegal`
    /// (spec §4.1: "not a valid token ... never accepted by the core
    /// parser").
    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '-' {
            match self.peek_char() {
                Some(d) if is_dec_digit(d) => {
                    self.advance_char();
                    self.scan_number_body(d)
                }
                _ => TokenKind::Illegal,
            }
        } else {
            self.scan_number_body(first)
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        self.scan_run(|c| c == '_' || c.is_alphanumeric());
        TokenKind::Ident
    }

    /// Get the next token. Always succeeds; an unrecognized character
    /// becomes `TokenKind::Illegal` rather than an error.
    pub fn scan(&mut self) -> Token<'input> {
        self.skip_whitespace();

        let start = self.pos;
        let line = self.line;

        let ch = match self.advance_char() {
            None => return Token { kind: TokenKind::Eof, line, lexeme: "" },
            Some(c) => c,
        };

        let mut kind = match ch {
            '(' => TokenKind::ParenL,
            ')' => TokenKind::ParenR,
            '{' => TokenKind::CurlyL,
            '}' => TokenKind::CurlyR,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            c if c == '-' || is_dec_digit(c) => self.scan_number(c),
            c if c == '_' || c.is_alphabetic() => self.scan_identifier(),
            _ => TokenKind::Illegal,
        };

        let lexeme = &self.input[start..self.pos];

        if kind == TokenKind::Ident {
            kind = keyword_kind(lexeme).unwrap_or(TokenKind::Ident);
        }

        Token { kind, line, lexeme }
    }
}
