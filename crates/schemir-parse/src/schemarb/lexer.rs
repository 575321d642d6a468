//! Tokenizer for the Ruby subset found in `db/schema.rb`.
//!
//! Newlines are significant in Ruby, so they are kept as tokens; the parser
//! decides where a newline ends a statement and where it is just layout.

use std::ops::Range;

use crate::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// `name`, `t`, `do`, `end`, `true`, ... (may end in `?` or `!`)
    Ident(String),
    /// `ActiveRecord`, `Schema`
    Const(String),
    /// `name:` hash key shorthand
    Label(String),
    /// `:name` or `:"name"`
    Symbol(String),
    /// String contents with escapes resolved. `#{...}` is kept as written.
    Str(String),
    Number(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    /// `::`
    Scope,
    /// `=>`
    Rocket,
    /// `->`
    Lambda,
    Pipe,
    Semicolon,
    Newline,
    Op(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(i) if i == name)
    }
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer {
        source,
        pos: 0,
        tokens: Vec::new(),
        heredocs: Vec::new(),
    }
    .run()
}

struct PendingHeredoc {
    token: usize,
    terminator: String,
    squiggly: bool,
    start: usize,
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    /// Heredocs opened on the current line; their bodies start after it.
    heredocs: Vec<PendingHeredoc>,
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
        ParseError::lex("schemarb", self.source, offset, message)
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.source[..self.pos].ends_with('\n')
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: start..self.pos,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(c) = self.peek() {
            let start = self.pos;

            if c == '\n' {
                self.pos += 1;
                self.push(TokenKind::Newline, start);
                self.read_heredoc_bodies()?;
                continue;
            }
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if c == '\\' && self.peek_at(1) == Some('\n') {
                // explicit line continuation
                self.pos += 2;
                continue;
            }
            if c == '#' {
                self.skip_line();
                continue;
            }
            if c == '=' && self.at_line_start() && self.rest().starts_with("=begin") {
                self.skip_block_comment()?;
                continue;
            }
            if self.at_line_start() && self.rest().starts_with("__END__") {
                break;
            }

            let kind = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semicolon),
                '|' if self.peek_at(1) != Some('|') => self.single(TokenKind::Pipe),
                '.' if self.peek_at(1) != Some('.') => self.single(TokenKind::Dot),
                ':' if self.peek_at(1) == Some(':') => {
                    self.pos += 2;
                    TokenKind::Scope
                }
                ':' if self.peek_at(1) == Some('"') => {
                    self.pos += 1;
                    TokenKind::Symbol(self.read_string('"')?)
                }
                ':' if self.peek_at(1).is_some_and(|c| c.is_alphabetic() || c == '_') => {
                    self.pos += 1;
                    TokenKind::Symbol(self.read_name())
                }
                '=' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    TokenKind::Rocket
                }
                '-' if self.peek_at(1) == Some('>') => {
                    self.pos += 2;
                    TokenKind::Lambda
                }
                '<' if self.heredoc_ahead() => self.open_heredoc()?,
                '"' | '\'' => TokenKind::Str(self.read_string(c)?),
                '%' if matches!(self.peek_at(1), Some('w' | 'i')) && self.peek_at(2) == Some('[') => {
                    self.read_word_array()?
                }
                c if c.is_ascii_digit() => TokenKind::Number(self.read_number()),
                c if c.is_uppercase() => TokenKind::Const(self.read_name()),
                c if c.is_alphabetic() || c == '_' || c == '@' => self.read_identifier(),
                c if "+-*/<>=!&|%^~?".contains(c) => TokenKind::Op(self.read_operator()),
                '.' | ':' => {
                    let op = if self.rest().starts_with("...") {
                        "..."
                    } else if self.rest().starts_with("..") {
                        ".."
                    } else {
                        &self.source[start..start + 1]
                    };
                    self.pos += op.len();
                    TokenKind::Op(op.to_string())
                }
                other => return Err(self.error(start, &format!("unexpected character `{other}`"))),
            };
            self.push(kind, start);
        }

        if let Some(heredoc) = self.heredocs.first() {
            return Err(self.error(heredoc.start, "unterminated heredoc"));
        }
        Ok(self.tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_line(&mut self) {
        match self.rest().find('\n') {
            Some(nl) => self.pos += nl,
            None => self.pos = self.source.len(),
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut offset = self.pos;
        for line in self.source[start..].split_inclusive('\n') {
            offset += line.len();
            if line.starts_with("=end") {
                self.pos = offset;
                return Ok(());
            }
        }
        Err(self.error(start, "unterminated =begin comment"))
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.source[start..self.pos].to_string()
    }

    /// An identifier, or a `label:` when a single colon follows.
    fn read_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek() == Some('@') {
            self.pos += 1;
        }
        let mut name = self.read_name();
        if matches!(self.peek(), Some('?' | '!')) && self.peek_at(1) != Some('=') {
            self.pos += 1;
            name = self.source[start..self.pos].to_string();
        }
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            self.pos += 1;
            return TokenKind::Label(name);
        }
        TokenKind::Ident(name)
    }

    fn read_number(&mut self) -> String {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => self.pos += 1,
                '.' if !seen_dot && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    seen_dot = true;
                    self.pos += 1;
                }
                'e' | 'E' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit() || d == '-') => {
                    self.pos += 2;
                }
                _ => break,
            }
        }
        self.source[start..self.pos].replace('_', "")
    }

    fn read_operator(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !"+-*/<>=!&|%^~?".contains(c) || (c == '-' && self.peek_at(1) == Some('>')) {
                break;
            }
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += c.len_utf8();
            match c {
                c if c == quote => return Ok(out),
                '\\' => {
                    let Some(escaped) = self.peek() else { break };
                    self.pos += escaped.len_utf8();
                    match (quote, escaped) {
                        ('"', 'n') => out.push('\n'),
                        ('"', 't') => out.push('\t'),
                        ('"', 'r') => out.push('\r'),
                        ('"', '0') => out.push('\0'),
                        ('"', 'e') => out.push('\u{1b}'),
                        ('"', other) => out.push(other),
                        ('\'', '\'' | '\\') => out.push(escaped),
                        (_, other) => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                c => out.push(c),
            }
        }
        Err(self.error(start, "unterminated string literal"))
    }

    /// `%w[a b c]` / `%i[a b c]`
    fn read_word_array(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let symbols = self.peek_at(1) == Some('i');
        self.pos += 3;
        let Some(close) = self.rest().find(']') else {
            return Err(self.error(start, "unterminated word array"));
        };
        let body = &self.source[self.pos..self.pos + close];
        let words: Vec<String> = body.split_whitespace().map(str::to_string).collect();
        self.pos += close + 1;

        // expand into ordinary tokens: [ "a" , "b" ]
        let mut expanded = Vec::new();
        for (i, word) in words.into_iter().enumerate() {
            if i > 0 {
                expanded.push(TokenKind::Comma);
            }
            expanded.push(if symbols {
                TokenKind::Symbol(word)
            } else {
                TokenKind::Str(word)
            });
        }
        self.tokens.push(Token {
            kind: TokenKind::LBracket,
            span: start..start + 3,
        });
        for kind in expanded {
            self.tokens.push(Token {
                kind,
                span: start..self.pos,
            });
        }
        Ok(TokenKind::RBracket)
    }

    fn heredoc_ahead(&self) -> bool {
        let rest = self.rest();
        let Some(after) = rest.strip_prefix("<<") else {
            return false;
        };
        let after = after.trim_start_matches(['~', '-']);
        let after = after.trim_start_matches(['\'', '"']);
        after.starts_with(|c: char| c.is_ascii_uppercase() || c == '_')
    }

    /// `<<~SQL`: the body is read once the current line ends.
    fn open_heredoc(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        self.pos += 2;
        let squiggly = match self.peek() {
            Some('~') => {
                self.pos += 1;
                true
            }
            Some('-') => {
                self.pos += 1;
                false
            }
            _ => false,
        };
        let quoted = matches!(self.peek(), Some('\'' | '"'));
        if quoted {
            self.pos += 1;
        }
        let terminator = self.read_name();
        if quoted {
            self.pos += 1;
        }
        self.heredocs.push(PendingHeredoc {
            token: self.tokens.len(),
            terminator,
            squiggly,
            start,
        });
        // filled in by read_heredoc_bodies
        Ok(TokenKind::Str(String::new()))
    }

    fn read_heredoc_bodies(&mut self) -> Result<(), ParseError> {
        for heredoc in std::mem::take(&mut self.heredocs) {
            let mut lines = Vec::new();
            let mut offset = self.pos;
            let mut found = false;
            for line in self.source[self.pos..].split_inclusive('\n') {
                offset += line.len();
                if line.trim() == heredoc.terminator {
                    found = true;
                    break;
                }
                lines.push(line);
            }
            if !found {
                return Err(self.error(heredoc.start, "unterminated heredoc"));
            }
            self.pos = offset;

            let body = if heredoc.squiggly {
                dedent(&lines)
            } else {
                lines.concat()
            };
            if let Some(token) = self.tokens.get_mut(heredoc.token) {
                token.kind = TokenKind::Str(body);
            }
        }
        Ok(())
    }
}

/// Strip the common leading whitespace of non-blank lines.
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.trim_start() })
        .collect()
}
