//! Tokenizer for the TypeScript subset found in Drizzle schema files.

use std::ops::Range;

use crate::ParseError;

/// Multi-character punctuators, longest first.
const PUNCTUATORS: &[&str] = &[
    "...", "===", "!==", "**=", "??=", "=>", "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "++",
    "--", "+=", "-=", "*=", "/=", "**", "(", ")", "[", "]", "{", "}", ",", ".", ";", ":", "?", "=",
    "<", ">", "+", "-", "*", "/", "%", "!", "&", "|", "^", "~", "@", "#",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifiers and keywords (`const`, `pgTable`, `$type`)
    Ident(String),
    /// String contents with escapes resolved
    Str(String),
    /// Template literal body, `${...}` interpolations kept as written
    Template(String),
    Number(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(i) if i == name)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self.kind, TokenKind::Punct(p) if p == punct)
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        source,
        pos: 0,
        newline: false,
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    newline: bool,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(offset)
    }

    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn error(&self, offset: usize, message: &str) -> ParseError {
        ParseError::lex("drizzle", self.source, offset, message)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;

            if c == '\n' {
                self.newline = true;
                self.pos += 1;
                continue;
            }
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if self.rest().starts_with("//") {
                match self.rest().find('\n') {
                    Some(nl) => self.pos += nl,
                    None => self.pos = self.source.len(),
                }
                continue;
            }
            if self.rest().starts_with("/*") {
                let Some(end) = self.rest()[2..].find("*/") else {
                    return Err(self.error(start, "unterminated block comment"));
                };
                if self.rest()[..end + 2].contains('\n') {
                    self.newline = true;
                }
                self.pos += end + 4;
                continue;
            }

            let kind = match c {
                '"' | '\'' => TokenKind::Str(self.read_string(c)?),
                '`' => TokenKind::Template(self.read_template()?),
                c if c.is_ascii_digit() => TokenKind::Number(self.read_number()),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    TokenKind::Number(self.read_number())
                }
                c if c.is_alphabetic() || c == '_' || c == '$' => {
                    TokenKind::Ident(self.read_identifier())
                }
                _ => match PUNCTUATORS.iter().find(|p| self.rest().starts_with(**p)) {
                    Some(punct) => {
                        self.pos += punct.len();
                        TokenKind::Punct(punct)
                    }
                    None => {
                        return Err(self.error(start, &format!("unexpected character `{c}`")));
                    }
                },
            };
            self.tokens.push(Token {
                kind,
                span: start..self.pos,
                newline_before: std::mem::take(&mut self.newline),
            });
        }
        Ok(self.tokens)
    }

    fn read_identifier(&mut self) -> String {
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

    fn read_number(&mut self) -> String {
        let start = self.pos;
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | 'a'..='f' | 'A'..='F' | '_' | '.' => {
                    // `e` is a hex digit; the sign after an exponent needs care
                    self.pos += 1;
                    if matches!(c, 'e' | 'E') && matches!(self.peek(), Some('+' | '-')) {
                        self.pos += 1;
                    }
                }
                'n' => {
                    // BigInt suffix
                    self.pos += 1;
                    break;
                }
                _ => break,
            }
        }
        self.source[start..self.pos]
            .trim_end_matches('n')
            .replace('_', "")
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                c if c == quote => return Ok(out),
                '\n' => break,
                '\\' => {
                    let Some(escaped) = self.peek() else { break };
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        // line continuation
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                c => out.push(c),
            }
        }
        Err(self.error(start, "unterminated string literal"))
    }

    /// Body of a template literal. Interpolations are copied through with
    /// their `${` `}` delimiters so the caller can resolve them.
    fn read_template(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                '`' => return Ok(out),
                '\\' => {
                    let Some(escaped) = self.peek() else { break };
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        other => out.push(other),
                    }
                }
                '$' if self.peek() == Some('{') => {
                    self.pos += 1;
                    out.push_str("${");
                    let mut depth = 1;
                    while let Some(c) = self.peek() {
                        self.pos += c.len_utf8();
                        match c {
                            '{' => depth += 1,
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        out.push(c);
                    }
                    if depth != 0 {
                        break;
                    }
                    out.push('}');
                }
                c => out.push(c),
            }
        }
        Err(self.error(start, "unterminated template literal"))
    }
}
