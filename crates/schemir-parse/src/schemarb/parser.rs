//! Recursive-descent parser for the Ruby subset used by `schema.rb`.
//!
//! Every statement is parsed on its own. One that fails is recorded as a
//! [`ProcessError`] and skipped up to the next line (or past its `do ... end`
//! block), so a single odd line never costs the rest of the file.

use tracing::debug;

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::{DepthGuard, Position, ProcessError};

type PResult<T> = Result<T, ProcessError>;

/// Keywords that open a construct closed by `end` when they start a line.
const BLOCK_KEYWORDS: &[&str] = &[
    "if", "unless", "while", "until", "case", "def", "class", "module", "begin",
];

/// Words that can't begin a command-call argument.
const NON_ARGUMENT_WORDS: &[&str] = &[
    "do", "end", "if", "unless", "while", "until", "and", "or", "then", "else", "elsif", "rescue",
    "ensure",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Close {
    Eof,
    End,
    Brace,
}

pub(crate) fn parse_program(
    source: &str,
    tokens: &[Token],
    max_depth: usize,
) -> (Vec<Expr>, Vec<ProcessError>) {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: DepthGuard::new(max_depth),
        no_do: false,
        errors: Vec::new(),
    };
    // only an unclosed top level can fail here, and Eof always closes it
    let program = parser.statements(Close::Eof).unwrap_or_default();
    (program, parser.errors)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: DepthGuard,
    /// Set while reading a command call's arguments, so a trailing `do`
    /// binds to the outer call.
    no_do: bool,
    errors: Vec<ProcessError>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'a TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Whether the current token directly follows the previous one.
    fn adjacent(&self) -> bool {
        match (self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)), self.peek()) {
            (Some(prev), Some(next)) => prev.span.end == next.span.start,
            _ => false,
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(&TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek_kind(),
            Some(TokenKind::Newline | TokenKind::Semicolon)
        ) {
            self.pos += 1;
        }
    }

    fn offset(&self) -> usize {
        match self.peek() {
            Some(token) => token.span.start,
            None => self.source.len(),
        }
    }

    fn unexpected(&self, expected: &str) -> ProcessError {
        let found = match self.peek() {
            Some(token) if token.kind == TokenKind::Newline => "end of line".to_string(),
            Some(token) => format!("`{}`", &self.source[token.span.clone()]),
            None => "end of input".to_string(),
        };
        ProcessError::unexpected(self.source, self.offset(), format!("expected {expected}, found {found}"))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if !self.depth.enter() {
            self.depth.exit();
            return Err(ProcessError::NestingTooDeep {
                limit: self.depth.limit(),
                position: Position::locate(self.source, self.offset()),
            });
        }
        let no_do = std::mem::replace(&mut self.no_do, false);
        let result = f(self);
        self.no_do = no_do;
        self.depth.exit();
        result
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn at_close(&self, close: Close) -> bool {
        match close {
            Close::Eof => false,
            Close::End => self.at_ident("end"),
            Close::Brace => self.at(&TokenKind::RBrace),
        }
    }

    fn statements(&mut self, close: Close) -> PResult<Vec<Expr>> {
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if self.peek().is_none() {
                return match close {
                    Close::Eof => Ok(body),
                    Close::End => Err(self.unexpected("`end`")),
                    Close::Brace => Err(self.unexpected("`}`")),
                };
            }
            if self.at_close(close) {
                return Ok(body);
            }

            let start = self.pos;
            match self.statement(close) {
                Ok(expr) => body.push(expr),
                Err(err) => {
                    debug!(%err, "skipping Ruby statement");
                    self.errors.push(err);
                    self.skip_statement(start);
                }
            }
        }
    }

    fn statement(&mut self, close: Close) -> PResult<Expr> {
        let expr = self.expr()?;
        match self.peek_kind() {
            None | Some(TokenKind::Newline | TokenKind::Semicolon) => Ok(expr),
            _ if self.at_close(close) => Ok(expr),
            _ => Err(self.unexpected("end of statement")),
        }
    }

    fn skip_statement(&mut self, start: usize) {
        self.pos = start;
        let mut depth = 0usize;
        let mut line_start = true;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Newline | TokenKind::Semicolon if depth == 0 => break,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth = depth.saturating_sub(1),
                TokenKind::RBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                TokenKind::Ident(word) if word == "do" => depth += 1,
                TokenKind::Ident(word) if word == "end" => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                TokenKind::Ident(word) if line_start && BLOCK_KEYWORDS.contains(&word.as_str()) => {
                    depth += 1
                }
                _ => {}
            }
            line_start = matches!(token.kind, TokenKind::Newline | TokenKind::Semicolon);
            self.pos += 1;
        }
        if self.pos == start {
            // a stray closer; step over it
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some(TokenKind::Op(_)) = self.peek_kind() {
            // binary operators and assignments: parsed, not modeled
            self.pos += 1;
            self.skip_newlines();
            self.unary()?;
            lhs = Expr::Other;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if let Some(TokenKind::Op(op)) = self.peek_kind() {
            if op == "-" {
                if let Some(Token {
                    kind: TokenKind::Number(n),
                    ..
                }) = self.tokens.get(self.pos + 1)
                {
                    self.pos += 2;
                    return Ok(Expr::Number(format!("-{n}")));
                }
            }
            if matches!(op.as_str(), "-" | "!" | "+" | "~") {
                self.pos += 1;
                self.unary()?;
                return Ok(Expr::Other);
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                self.skip_newlines();
                let Some(token) = self.peek() else {
                    return Err(self.unexpected("method name"));
                };
                let name = match &token.kind {
                    TokenKind::Ident(name) | TokenKind::Const(name) => name.clone(),
                    _ => return Err(self.unexpected("method name")),
                };
                self.pos += 1;
                expr = Expr::Call(self.call_rest(Some(Box::new(expr)), name, token.span.start)?);
            } else if self.eat(&TokenKind::Scope) {
                let name = match self.peek_kind() {
                    Some(TokenKind::Const(name) | TokenKind::Ident(name)) => name.clone(),
                    _ => return Err(self.unexpected("constant")),
                };
                self.pos += 1;
                expr = match expr {
                    Expr::Const(outer) => Expr::Const(format!("{outer}::{name}")),
                    _ => Expr::Other,
                };
            } else if self.at(&TokenKind::LBracket) && self.adjacent() {
                // indexing: `Schema[7.1]`
                self.pos += 1;
                self.nested(|p| {
                    let mut call = Call::default_for("[]", 0);
                    p.arg_list(&mut call, Some(&TokenKind::RBracket))?;
                    p.expect(&TokenKind::RBracket, "`]`")
                })?;
                expr = Expr::Other;
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("expression"));
        };
        match &token.kind {
            TokenKind::Str(s) => {
                self.pos += 1;
                let mut s = s.clone();
                // "adjacent" "literals" concatenate
                while let Some(TokenKind::Str(next)) = self.peek_kind() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Str(s))
            }
            TokenKind::Symbol(s) => {
                self.pos += 1;
                Ok(Expr::Symbol(s.clone()))
            }
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n.clone()))
            }
            TokenKind::Const(name) => {
                self.pos += 1;
                if self.at(&TokenKind::LParen) && self.adjacent() {
                    return Ok(Expr::Call(self.call_rest(None, name.clone(), token.span.start)?));
                }
                Ok(Expr::Const(name.clone()))
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" => self.keyword(Expr::Bool(true)),
                "false" => self.keyword(Expr::Bool(false)),
                "nil" => self.keyword(Expr::Nil),
                "self" => self.keyword(Expr::Other),
                w if NON_ARGUMENT_WORDS.contains(&w) || BLOCK_KEYWORDS.contains(&w) => {
                    Err(ProcessError::unsupported(
                        format!("Ruby `{w}`"),
                        format!("at {}", Position::locate(self.source, token.span.start)),
                    ))
                }
                _ => {
                    self.pos += 1;
                    Ok(Expr::Call(self.call_rest(None, word.clone(), token.span.start)?))
                }
            },
            TokenKind::LBracket => {
                self.pos += 1;
                self.nested(|p| p.array())
            }
            TokenKind::LBrace => {
                self.pos += 1;
                self.nested(|p| p.hash())
            }
            TokenKind::Lambda => {
                self.pos += 1;
                self.nested(|p| p.lambda())
            }
            TokenKind::LParen => {
                self.pos += 1;
                self.nested(|p| {
                    p.skip_newlines();
                    let inner = p.expr()?;
                    p.skip_newlines();
                    p.expect(&TokenKind::RParen, "`)`")?;
                    Ok(inner)
                })
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn keyword(&mut self, expr: Expr) -> PResult<Expr> {
        self.pos += 1;
        Ok(expr)
    }

    fn array(&mut self) -> PResult<Expr> {
        let mut items = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&TokenKind::RBracket) {
                return Ok(Expr::Array(items));
            }
            items.push(self.expr()?);
            self.skip_newlines();
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RBracket, "`,` or `]`")?;
                return Ok(Expr::Array(items));
            }
        }
    }

    fn hash(&mut self) -> PResult<Expr> {
        let mut call = Call::default_for("{}", 0);
        self.arg_list(&mut call, Some(&TokenKind::RBrace))?;
        self.skip_newlines();
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(Expr::Hash(call.kwargs))
    }

    /// `-> { ... }`, `->(x) { ... }`, `-> do ... end`
    fn lambda(&mut self) -> PResult<Expr> {
        if self.at(&TokenKind::LParen) {
            while !self.at(&TokenKind::RParen) {
                if self.peek().is_none() {
                    return Err(self.unexpected("`)`"));
                }
                self.pos += 1;
            }
            self.pos += 1;
        }
        match self.block()? {
            Some(block) => Ok(Expr::Lambda(block.body)),
            None => Err(self.unexpected("lambda body")),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call_rest(
        &mut self,
        receiver: Option<Box<Expr>>,
        method: String,
        offset: usize,
    ) -> PResult<Call> {
        let mut call = Call {
            receiver,
            method,
            args: Vec::new(),
            kwargs: Vec::new(),
            block: None,
            offset,
        };

        let mut parenthesized = false;
        if self.at(&TokenKind::LParen) {
            parenthesized = true;
            self.pos += 1;
            self.nested(|p| {
                p.skip_newlines();
                p.arg_list(&mut call, Some(&TokenKind::RParen))?;
                p.skip_newlines();
                p.expect(&TokenKind::RParen, "`)`")
            })?;
        } else if self.at_command_argument() {
            let no_do = std::mem::replace(&mut self.no_do, true);
            let result = self.arg_list(&mut call, None);
            self.no_do = no_do;
            result?;
        }

        let brace_block = self.at(&TokenKind::LBrace)
            && (parenthesized || (call.args.is_empty() && call.kwargs.is_empty()));
        if brace_block || (self.at_ident("do") && !self.no_do) {
            call.block = self.block()?;
        }
        Ok(call)
    }

    fn at_command_argument(&self) -> bool {
        let Some(token) = self.peek() else {
            return false;
        };
        match &token.kind {
            TokenKind::Str(_)
            | TokenKind::Symbol(_)
            | TokenKind::Number(_)
            | TokenKind::Const(_)
            | TokenKind::Label(_)
            | TokenKind::LBracket
            | TokenKind::Lambda => true,
            TokenKind::Ident(word) => !NON_ARGUMENT_WORDS.contains(&word.as_str()),
            // `foo -1` but not `foo - 1`
            TokenKind::Op(op) => {
                op == "-"
                    && !self.adjacent()
                    && self
                        .tokens
                        .get(self.pos + 1)
                        .is_some_and(|next| next.span.start == token.span.end)
            }
            _ => false,
        }
    }

    /// Comma-separated arguments, up to `close` (not consumed) or the end of
    /// a command call.
    fn arg_list(&mut self, call: &mut Call, close: Option<&TokenKind>) -> PResult<()> {
        loop {
            if close.is_some_and(|c| self.at(c)) {
                return Ok(());
            }
            match self.peek_kind() {
                Some(TokenKind::Label(key)) => {
                    let key = key.clone();
                    self.pos += 1;
                    self.skip_newlines();
                    let value = self.expr()?;
                    call.kwargs.push((key, value));
                }
                Some(TokenKind::Op(op)) if matches!(op.as_str(), "*" | "**" | "&") => {
                    // splats and block-pass: parsed, not modeled
                    self.pos += 1;
                    self.expr()?;
                }
                _ => {
                    let value = self.expr()?;
                    if self.eat(&TokenKind::Rocket) {
                        self.skip_newlines();
                        let key = value.as_name().unwrap_or_default().to_string();
                        let value = self.expr()?;
                        call.kwargs.push((key, value));
                    } else {
                        call.args.push(value);
                    }
                }
            }

            if close.is_some() {
                self.skip_newlines();
            }
            if !self.eat(&TokenKind::Comma) {
                return Ok(());
            }
            self.skip_newlines();
        }
    }

    /// `do |params| ... end` or `{ |params| ... }`, if one follows.
    fn block(&mut self) -> PResult<Option<Block>> {
        let close = if self.at_ident("do") {
            Close::End
        } else if self.at(&TokenKind::LBrace) {
            Close::Brace
        } else {
            return Ok(None);
        };
        self.pos += 1;

        self.nested(|p| {
            let mut params = Vec::new();
            if p.eat(&TokenKind::Pipe) {
                while let Some(TokenKind::Ident(name)) = p.peek_kind() {
                    params.push(name.clone());
                    p.pos += 1;
                    if !p.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                p.expect(&TokenKind::Pipe, "`|`")?;
            }

            let body = p.statements(close)?;
            match close {
                Close::Brace => p.expect(&TokenKind::RBrace, "`}`")?,
                _ => {
                    if !p.at_ident("end") {
                        return Err(p.unexpected("`end`"));
                    }
                    p.pos += 1;
                }
            }
            Ok(Some(Block { params, body }))
        })
    }
}

impl Call {
    fn default_for(method: &str, offset: usize) -> Self {
        Call {
            receiver: None,
            method: method.to_string(),
            args: Vec::new(),
            kwargs: Vec::new(),
            block: None,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(source: &str) -> (Vec<Expr>, Vec<ProcessError>) {
        let tokens = tokenize(source).unwrap();
        parse_program(source, &tokens, 32)
    }

    fn only_call(source: &str) -> Call {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        match program.as_slice() {
            [Expr::Call(call)] => call.clone(),
            other => panic!("expected one call, got {other:?}"),
        }
    }

    #[test]
    fn test_command_call_with_block() {
        let call = only_call(
            r#"create_table "users", id: :uuid, force: :cascade do |t|
  t.string "email", null: false
  t.index ["email"], name: "index_users_on_email", unique: true
end"#,
        );
        assert_eq!(call.method, "create_table");
        assert_eq!(call.args, [Expr::Str("users".into())]);
        assert_eq!(call.kwarg("id"), Some(&Expr::Symbol("uuid".into())));

        let block = call.block.unwrap();
        assert_eq!(block.params, ["t"]);
        assert_eq!(block.body.len(), 2);

        let string = block.body[0].as_call().unwrap();
        assert!(string.has_receiver("t"));
        assert_eq!(string.method, "string");
        assert_eq!(string.kwarg("null"), Some(&Expr::Bool(false)));

        let index = block.body[1].as_call().unwrap();
        assert_eq!(index.args, [Expr::Array(vec![Expr::Str("email".into())])]);
        assert_eq!(index.kwarg("unique"), Some(&Expr::Bool(true)));
    }

    #[test]
    fn test_schema_define_wrapper() {
        let call = only_call(
            "ActiveRecord::Schema[7.1].define(version: 2024_01_01_000000) do\n  enable_extension \"plpgsql\"\nend\n",
        );
        assert_eq!(call.method, "define");
        assert_eq!(call.kwarg("version"), Some(&Expr::Number("20240101000000".into())));
        assert_eq!(call.block.unwrap().body.len(), 1);
    }

    #[test]
    fn test_hashes_lambdas_and_rockets() {
        let call = only_call(
            r#"t.uuid "id", default: -> { "gen_random_uuid()" }, index: { unique: true, using: :btree }, :limit => -1"#,
        );
        assert_eq!(
            call.kwarg("default"),
            Some(&Expr::Lambda(vec![Expr::Str("gen_random_uuid()".into())]))
        );
        assert_eq!(
            call.kwarg("index"),
            Some(&Expr::Hash(vec![
                ("unique".into(), Expr::Bool(true)),
                ("using".into(), Expr::Symbol("btree".into())),
            ]))
        );
        assert_eq!(call.kwarg("limit"), Some(&Expr::Number("-1".into())));
    }

    #[test]
    fn test_multiline_arguments() {
        let call = only_call("add_foreign_key(\n  \"posts\",\n  \"users\",\n  on_delete: :cascade\n)\n");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.kwarg("on_delete"), Some(&Expr::Symbol("cascade".into())));
    }

    #[test]
    fn test_bad_line_is_skipped() {
        let (program, errors) = parse(
            "create_table \"a\" do |t|\n  t.string \"x\" ]\n  t.integer \"y\"\nend\nadd_index \"a\", \"y\"\n",
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(program.len(), 2);
        let block = program[0].as_call().unwrap().block.as_ref().unwrap();
        assert_eq!(block.body.len(), 1);
        assert_eq!(block.body[0].as_call().unwrap().method, "integer");
    }

    #[test]
    fn test_unsupported_construct_skips_whole_block() {
        let (program, errors) = parse("if foo\n  bar 1\nend\nbaz 2\n");
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ProcessError::Unsupported { .. }));
        assert_eq!(program.len(), 1);
        assert_eq!(program[0].as_call().unwrap().method, "baz");
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("foo {}1{}\nbar 2\n", "[".repeat(40), "]".repeat(40));
        let (program, errors) = parse(&source);
        assert!(matches!(&errors[..], [ProcessError::NestingTooDeep { limit: 32, .. }]));
        assert_eq!(program.len(), 1);
    }
}
