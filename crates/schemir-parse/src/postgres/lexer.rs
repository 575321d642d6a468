//! PostgreSQL tokenizer.
//!
//! Keywords are not distinguished from identifiers here; the parser matches
//! them case-insensitively. Every token keeps its byte span so expression
//! text can be recovered verbatim from the source.

use std::ops::Range;

use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Bare word, as written
    Word(String),
    /// `"Quoted"` identifier, unescaped
    QuotedIdent(String),
    /// `'string'`, `E'string'` or `$tag$string$tag$`, unescaped
    Str(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    /// `::`
    Cast,
    /// Any other operator run (`=`, `<>`, `>=`, `||`, `-`, ...)
    Op(String),
    /// `$1` style parameter
    Param(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    /// Whether this is the (case-insensitive) keyword `kw`.
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(kw))
    }
}

const OPERATOR_CHARS: &str = "+-*/<>=~!@#%^&|`?";

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error(&self, offset: usize, message: &str) -> ParseError {
        ParseError::lex("postgres", self.source, offset, message)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let start = self.pos;

            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if c == '-' && self.peek_at(1) == Some(b'-') {
                self.skip_line_comment();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some(b'*') {
                self.skip_block_comment()?;
                continue;
            }

            let kind = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                ':' if self.peek_at(1) == Some(b':') => {
                    self.pos += 2;
                    TokenKind::Cast
                }
                '.' if !self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) => {
                    self.single(TokenKind::Dot)
                }
                '\'' => TokenKind::Str(self.read_string(false)?),
                'e' | 'E' if self.peek_at(1) == Some(b'\'') => {
                    self.pos += 1;
                    TokenKind::Str(self.read_string(true)?)
                }
                '"' => TokenKind::QuotedIdent(self.read_quoted_ident()?),
                '$' => self.read_dollar()?,
                c if c.is_ascii_digit() || c == '.' => TokenKind::Number(self.read_number()),
                c if c.is_alphabetic() || c == '_' => TokenKind::Word(self.read_word()),
                c if OPERATOR_CHARS.contains(c) => TokenKind::Op(self.read_operator()),
                ':' => TokenKind::Op(self.read_operator_char()),
                other => {
                    return Err(self.error(start, &format!("unexpected character `{other}`")));
                }
            };

            tokens.push(Token {
                kind,
                span: start..self.pos,
            });
        }

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_line_comment(&mut self) {
        match self.source[self.pos..].find('\n') {
            Some(nl) => self.pos += nl + 1,
            None => self.pos = self.source.len(),
        }
    }

    /// Block comments nest in PostgreSQL.
    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            match (self.bytes[self.pos], self.peek_at(1)) {
                (b'/', Some(b'*')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (b'*', Some(b'/')) => {
                    depth -= 1;
                    self.pos += 2;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error(start, "unterminated block comment"))
    }

    fn read_string(&mut self, backslash_escapes: bool) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                '\'' if self.peek() == Some('\'') => {
                    out.push('\'');
                    self.pos += 1;
                }
                '\'' => return Ok(out),
                '\\' if backslash_escapes => {
                    let Some(escaped) = self.peek() else { break };
                    self.pos += escaped.len_utf8();
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c => out.push(c),
            }
        }
        Err(self.error(start, "unterminated string literal"))
    }

    fn read_quoted_ident(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                '"' if self.peek() == Some('"') => {
                    out.push('"');
                    self.pos += 1;
                }
                '"' => return Ok(out),
                c => out.push(c),
            }
        }
        Err(self.error(start, "unterminated quoted identifier"))
    }

    /// `$1` parameters and `$tag$ ... $tag$` strings.
    fn read_dollar(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let rest = &self.source[self.pos + 1..];

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            self.pos += 1 + digits;
            return Ok(TokenKind::Param(self.source[start..self.pos].to_string()));
        }

        let tag_len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if rest.as_bytes().get(tag_len) != Some(&b'$') {
            return Err(self.error(start, "unexpected character `$`"));
        }
        let delimiter = &self.source[start..start + tag_len + 2];
        let body_start = start + delimiter.len();
        match self.source[body_start..].find(delimiter) {
            Some(end) => {
                self.pos = body_start + end + delimiter.len();
                Ok(TokenKind::Str(
                    self.source[body_start..body_start + end].to_string(),
                ))
            }
            None => Err(self.error(start, "unterminated dollar-quoted string")),
        }
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(b) = self.peek_at(0) {
            match b {
                b'0'..=b'9' | b'_' => self.pos += 1,
                b'.' if !seen_dot && !seen_exp && self.peek_at(1) != Some(b'.') => {
                    seen_dot = true;
                    self.pos += 1;
                }
                b'e' | b'E' if !seen_exp => {
                    let sign = matches!(self.peek_at(1), Some(b'+' | b'-'));
                    let digit_at = if sign { 2 } else { 1 };
                    if !self.peek_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                        break;
                    }
                    seen_exp = true;
                    self.pos += digit_at;
                }
                _ => break,
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    fn read_operator(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !OPERATOR_CHARS.contains(c) {
                break;
            }
            // a comment starts mid-run
            if (c == '-' && self.peek_at(1) == Some(b'-'))
                || (c == '/' && self.peek_at(1) == Some(b'*'))
            {
                if self.pos > start {
                    break;
                }
            }
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    fn read_operator_char(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        self.source[start..self.pos].to_string()
    }
}
