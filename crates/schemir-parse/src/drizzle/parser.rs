//! Recursive-descent parser for the TypeScript subset used by Drizzle schema
//! files.
//!
//! Only expressions are modeled. Imports, type declarations, functions and
//! classes are skipped; type annotations are read past wherever they may
//! appear. A statement that fails to parse is recorded and skipped, and so
//! is a single object-literal property, so one odd column never costs the
//! rest of its table.

use tracing::debug;

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::{DepthGuard, Position, ProcessError};

type PResult<T> = Result<T, ProcessError>;

const BINARY_OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "+", "-", "*", "/", "%", "<", ">", "&",
    "|", "^", "**", "=", "+=", "-=", "*=", "/=", "??=", "**=",
];

/// Keywords that continue a type rather than start a new expression.
const TYPE_KEYWORDS: &[&str] = &["extends", "keyof", "typeof", "infer", "is", "readonly", "unique"];

/// Declarations with a braced body that carry nothing we model.
const SKIPPED_BLOCK_DECLARATIONS: &[&str] = &[
    "interface", "function", "class", "enum", "namespace", "module", "abstract", "async",
];

pub(crate) fn parse_program(
    source: &str,
    tokens: &[Token],
    max_depth: usize,
) -> (Vec<Stmt>, Vec<ProcessError>) {
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: DepthGuard::new(max_depth),
        errors: Vec::new(),
    };
    let program = parser.program();
    (program, parser.errors)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    depth: DepthGuard,
    errors: Vec<ProcessError>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, index: usize) -> Option<&'a Token> {
        self.tokens.get(index)
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn at_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.at_ident(name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str, what: &str) -> PResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// The current token is on the same line as the previous one.
    fn same_line(&self) -> bool {
        self.peek().is_some_and(|t| !t.newline_before)
    }

    fn offset(&self) -> usize {
        match self.peek() {
            Some(token) => token.span.start,
            None => self.source.len(),
        }
    }

    fn unexpected(&self, expected: &str) -> ProcessError {
        let found = match self.peek() {
            Some(token) => format!("`{}`", &self.source[token.span.clone()]),
            None => "end of input".to_string(),
        };
        ProcessError::unexpected(
            self.source,
            self.offset(),
            format!("expected {expected}, found {found}"),
        )
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if !self.depth.enter() {
            self.depth.exit();
            return Err(ProcessError::NestingTooDeep {
                limit: self.depth.limit(),
                position: Position::locate(self.source, self.offset()),
            });
        }
        let result = f(self);
        self.depth.exit();
        result
    }

    /// Index of the token closing the bracket at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn program(&mut self) -> Vec<Stmt> {
        let mut program = Vec::new();
        while self.peek().is_some() {
            if self.eat_punct(";") {
                continue;
            }
            let start = self.pos;
            match self.statement() {
                Ok(mut stmts) => program.append(&mut stmts),
                Err(err) => {
                    debug!(%err, "skipping TypeScript statement");
                    self.errors.push(err);
                    self.skip_statement(start);
                }
            }
        }
        program
    }

    fn statement(&mut self) -> PResult<Vec<Stmt>> {
        if self.eat_ident("import") {
            self.skip_module_clause();
            return Ok(Vec::new());
        }
        if self.eat_ident("export") {
            if self.eat_ident("default") {
                let expr = self.expr()?;
                self.end_statement()?;
                return Ok(vec![Stmt::Expr(expr)]);
            }
            if self.at_punct("{") || self.at_punct("*") {
                self.skip_module_clause();
                return Ok(Vec::new());
            }
        }

        let Some(token) = self.peek() else {
            return Ok(Vec::new());
        };
        match &token.kind {
            TokenKind::Ident(word) if matches!(word.as_str(), "const" | "let" | "var") => {
                self.pos += 1;
                self.declaration()
            }
            TokenKind::Ident(word)
                if matches!(word.as_str(), "type" | "declare")
                    && self
                        .peek_at(self.pos + 1)
                        .is_some_and(|t| matches!(t.kind, TokenKind::Ident(_))) =>
            {
                let start = self.pos;
                self.skip_statement(start);
                Ok(Vec::new())
            }
            TokenKind::Ident(word) if SKIPPED_BLOCK_DECLARATIONS.contains(&word.as_str()) => {
                if word == "async" && !self.peek_at(self.pos + 1).is_some_and(|t| t.is_ident("function")) {
                    let expr = self.expr()?;
                    self.end_statement()?;
                    return Ok(vec![Stmt::Expr(expr)]);
                }
                debug!(keyword = %word, "skipping declaration");
                self.skip_block_declaration()?;
                Ok(Vec::new())
            }
            _ => {
                let expr = self.expr()?;
                self.end_statement()?;
                Ok(vec![Stmt::Expr(expr)])
            }
        }
    }

    /// `const a = 1, b: T = 2`
    fn declaration(&mut self) -> PResult<Vec<Stmt>> {
        let mut decls = Vec::new();
        loop {
            let name = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Ident(name)) => {
                    self.pos += 1;
                    Some(name.clone())
                }
                Some(TokenKind::Punct("{" | "[")) => {
                    // destructuring binds nothing we track
                    let close = self.matching(self.pos).ok_or_else(|| self.unexpected("binding"))?;
                    self.pos = close + 1;
                    None
                }
                _ => return Err(self.unexpected("variable name")),
            };
            self.eat_punct("!");
            if self.eat_punct(":") {
                self.skip_type()?;
            }
            let init = if self.eat_punct("=") {
                self.expr()?
            } else {
                Expr::Other
            };
            if let Some(name) = name {
                decls.push(Stmt::Decl { name, init });
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.end_statement()?;
        Ok(decls)
    }

    fn end_statement(&mut self) -> PResult<()> {
        if self.eat_punct(";") || self.at_punct("}") {
            return Ok(());
        }
        match self.peek() {
            None => Ok(()),
            Some(token) if token.newline_before => Ok(()),
            Some(_) => Err(self.unexpected("`;` or end of line")),
        }
    }

    /// The rest of `import ... from "x";`, `export { a } from "x";` or
    /// `export * from "x";`
    fn skip_module_clause(&mut self) {
        let start = self.pos;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Str(_) => {
                    self.pos += 1;
                    break;
                }
                TokenKind::Punct(";") => break,
                TokenKind::Punct("{") => match self.matching(self.pos) {
                    Some(close) => self.pos = close + 1,
                    None => self.pos = self.tokens.len(),
                },
                _ if token.newline_before && self.pos > start => return,
                _ => self.pos += 1,
            }
        }
        self.eat_punct(";");
    }

    /// Skip `interface X { ... }`, `function f(...) { ... }` and friends.
    fn skip_block_declaration(&mut self) -> PResult<()> {
        let start = self.pos;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct("(" | "[") => {
                    let close = self.matching(self.pos).ok_or_else(|| self.unexpected("`)`"))?;
                    self.pos = close + 1;
                }
                TokenKind::Punct("{") => {
                    let close = self.matching(self.pos).ok_or_else(|| self.unexpected("`}`"))?;
                    self.pos = close + 1;
                    return Ok(());
                }
                TokenKind::Punct(";") => {
                    self.pos += 1;
                    return Ok(());
                }
                _ if token.newline_before && self.pos > start + 1 => return Ok(()),
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// Skip from `start` to the end of its statement: a `;` or a new line
    /// outside any brackets.
    fn skip_statement(&mut self, start: usize) {
        self.pos = start;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            if depth == 0 && self.pos > start && token.newline_before {
                break;
            }
            match token.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                TokenKind::Punct(")" | "]" | "}") => depth = depth.saturating_sub(1),
                TokenKind::Punct(";") if depth == 0 => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    /// Read past a type annotation.
    fn skip_type(&mut self) -> PResult<()> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut prev_ends_type = false;
        while let Some(token) = self.peek() {
            if depth == 0 && self.pos > start {
                let stop = match &token.kind {
                    TokenKind::Punct(p) => matches!(
                        *p,
                        "," | ")" | "]" | "}" | ";" | "=" | "=>" | "{" | ">" | "&&" | "||" | "??"
                            | "?" | ":"
                    ),
                    TokenKind::Ident(word) => prev_ends_type && !TYPE_KEYWORDS.contains(&word.as_str()),
                    _ => prev_ends_type,
                };
                if stop || (token.newline_before && prev_ends_type) {
                    break;
                }
            }
            prev_ends_type = match &token.kind {
                TokenKind::Punct(p) => matches!(*p, ")" | "]" | "}" | ">"),
                TokenKind::Ident(word) => !TYPE_KEYWORDS.contains(&word.as_str()),
                _ => true,
            };
            match token.kind {
                TokenKind::Punct("(" | "[" | "{" | "<") => depth += 1,
                TokenKind::Punct(")" | "]" | "}" | ">") => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected("type"));
        }
        Ok(())
    }

    /// At `<`: skip generic arguments when a call follows (`$type<T>()`).
    fn skip_type_arguments(&mut self) -> bool {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(self.pos) {
            match &token.kind {
                TokenKind::Punct("<") => depth += 1,
                TokenKind::Punct(">") => {
                    depth -= 1;
                    if depth == 0 {
                        if self.peek_at(i + 1).is_some_and(|t| t.is_punct("(")) {
                            self.pos = i + 1;
                            return true;
                        }
                        return false;
                    }
                }
                TokenKind::Punct(
                    "," | "." | "[" | "]" | "{" | "}" | "(" | ")" | "|" | "&" | ":" | "?" | "=>"
                    | ";",
                )
                | TokenKind::Ident(_)
                | TokenKind::Str(_)
                | TokenKind::Number(_) => {}
                _ => return false,
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expr(&mut self) -> PResult<Expr> {
        if self.at_arrow() {
            return self.nested(|p| p.arrow());
        }
        let mut expr = self.binary()?;
        if self.eat_punct("?") {
            self.expr()?;
            self.expect_punct(":", "`:`")?;
            self.expr()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn binary(&mut self) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let Some(token) = self.peek() else {
                return Ok(lhs);
            };
            match &token.kind {
                TokenKind::Punct(op) if BINARY_OPERATORS.contains(op) => {
                    self.pos += 1;
                    if self.at_arrow() {
                        self.nested(|p| p.arrow())?;
                    } else {
                        self.unary()?;
                    }
                    lhs = Expr::Other;
                }
                TokenKind::Ident(word) if matches!(word.as_str(), "as" | "satisfies") && !token.newline_before => {
                    self.pos += 1;
                    self.skip_type()?;
                }
                TokenKind::Ident(word) if matches!(word.as_str(), "instanceof" | "in") => {
                    self.pos += 1;
                    self.unary()?;
                    lhs = Expr::Other;
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> PResult<Expr> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("expression"));
        };
        match &token.kind {
            TokenKind::Punct("-") => {
                if let Some(TokenKind::Number(n)) = self.peek_at(self.pos + 1).map(|t| &t.kind) {
                    self.pos += 2;
                    return Ok(Expr::Number(format!("-{n}")));
                }
                self.pos += 1;
                self.unary()?;
                Ok(Expr::Other)
            }
            TokenKind::Punct("!" | "+" | "~" | "++" | "--") => {
                self.pos += 1;
                self.unary()?;
                Ok(Expr::Other)
            }
            TokenKind::Ident(word) if matches!(word.as_str(), "typeof" | "void" | "await" | "delete" | "new") => {
                self.pos += 1;
                self.unary()?;
                Ok(Expr::Other)
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut name_offset = self.offset();
        let mut expr = self.primary()?;
        loop {
            if self.at_punct(".") || self.at_punct("?.") {
                self.pos += 1;
                if self.at_punct("(") || self.at_punct("[") {
                    // `f?.()`, `a?.[0]`
                    continue;
                }
                name_offset = self.offset();
                let name = match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::Ident(name)) => name.clone(),
                    _ => return Err(self.unexpected("property name")),
                };
                self.pos += 1;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.at_punct("(") && self.same_line() {
                self.pos += 1;
                let args = self.nested(|p| p.arguments())?;
                expr = Expr::Call(Call {
                    callee: Box::new(expr),
                    args,
                    offset: name_offset,
                });
            } else if self.at_punct("[") && self.same_line() {
                self.pos += 1;
                self.nested(|p| {
                    p.expr()?;
                    p.expect_punct("]", "`]`")
                })?;
                expr = Expr::Other;
            } else if let Some(TokenKind::Template(text)) = self.peek().map(|t| &t.kind) {
                self.pos += 1;
                expr = Expr::Template {
                    tag: Some(Box::new(expr)),
                    text: text.clone(),
                };
            } else if self.at_punct("!")
                && self.same_line()
                && !self.peek_at(self.pos + 1).is_some_and(|t| t.is_punct("="))
            {
                // non-null assertion
                self.pos += 1;
            } else if self.at_punct("<") && self.skip_type_arguments() {
                continue;
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("expression"));
        };
        let expr = match &token.kind {
            TokenKind::Str(s) => Expr::Str(s.clone()),
            TokenKind::Number(n) => Expr::Number(n.clone()),
            TokenKind::Template(text) => Expr::Template {
                tag: None,
                text: text.clone(),
            },
            TokenKind::Ident(word) => match word.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" | "undefined" => Expr::Null,
                "this" => Expr::Other,
                "function" => {
                    self.skip_block_declaration()?;
                    return Ok(Expr::Other);
                }
                _ => Expr::Ident(word.clone()),
            },
            TokenKind::Punct("(") => {
                self.pos += 1;
                return self.nested(|p| {
                    let inner = p.expr()?;
                    p.expect_punct(")", "`)`")?;
                    Ok(inner)
                });
            }
            TokenKind::Punct("[") => {
                self.pos += 1;
                return self.nested(|p| p.array());
            }
            TokenKind::Punct("{") => {
                self.pos += 1;
                return self.nested(|p| p.object());
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.pos += 1;
        Ok(expr)
    }

    /// Call arguments after `(`, through `)`.
    fn arguments(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        loop {
            if self.eat_punct(")") {
                return Ok(args);
            }
            if self.eat_punct("...") {
                self.expr()?;
                args.push(Expr::Other);
            } else {
                args.push(self.expr()?);
            }
            if !self.eat_punct(",") {
                self.expect_punct(")", "`,` or `)`")?;
                return Ok(args);
            }
        }
    }

    /// Array literal after `[`, through `]`.
    fn array(&mut self) -> PResult<Expr> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct("]") {
                return Ok(Expr::Array(items));
            }
            if self.at_punct(",") {
                // hole
                self.pos += 1;
                continue;
            }
            if self.eat_punct("...") {
                self.expr()?;
                items.push(Expr::Other);
            } else {
                items.push(self.expr()?);
            }
            if !self.eat_punct(",") {
                self.expect_punct("]", "`,` or `]`")?;
                return Ok(Expr::Array(items));
            }
        }
    }

    /// Object literal after `{`, through `}`. A property that fails to parse
    /// is recorded and skipped.
    fn object(&mut self) -> PResult<Expr> {
        let mut props = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(Expr::Object(props));
            }
            let start = self.pos;
            match self.property() {
                Ok(prop) => props.push(prop),
                Err(err) => {
                    debug!(%err, "skipping object property");
                    self.errors.push(err);
                    self.skip_property(start);
                }
            }
            if !self.eat_punct(",") {
                self.expect_punct("}", "`,` or `}`")?;
                return Ok(Expr::Object(props));
            }
        }
    }

    fn property(&mut self) -> PResult<Property> {
        if self.eat_punct("...") {
            return Ok(Property::Spread(self.expr()?));
        }
        let key = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Ident(name) | TokenKind::Str(name) | TokenKind::Number(name)) => {
                self.pos += 1;
                name.clone()
            }
            Some(TokenKind::Punct("[")) => {
                self.pos += 1;
                self.expr()?;
                self.expect_punct("]", "`]`")?;
                "[computed]".to_string()
            }
            _ => return Err(self.unexpected("property name")),
        };
        if self.eat_punct(":") {
            return Ok(Property::Pair(key, self.expr()?));
        }
        if self.at_punct("(") {
            // method shorthand
            let close = self.matching(self.pos).ok_or_else(|| self.unexpected("`)`"))?;
            self.pos = close + 1;
            if self.eat_punct(":") {
                self.skip_type()?;
            }
            if !self.at_punct("{") {
                return Err(self.unexpected("method body"));
            }
            let close = self.matching(self.pos).ok_or_else(|| self.unexpected("`}`"))?;
            self.pos = close + 1;
            return Ok(Property::Pair(key, Expr::Other));
        }
        // shorthand `{ users }`
        Ok(Property::Pair(key.clone(), Expr::Ident(key)))
    }

    fn skip_property(&mut self, start: usize) {
        self.pos = start;
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Punct("(" | "[" | "{") => depth += 1,
                // a stray `)` or `]` belongs to the broken property
                TokenKind::Punct(")" | "]") => depth = depth.saturating_sub(1),
                TokenKind::Punct("}") => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(",") if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Arrow functions
    // ------------------------------------------------------------------

    fn at_arrow(&self) -> bool {
        let mut i = self.pos;
        if self.peek_at(i).is_some_and(|t| t.is_ident("async"))
            && self
                .peek_at(i + 1)
                .is_some_and(|t| t.is_punct("(") || matches!(t.kind, TokenKind::Ident(_)))
        {
            i += 1;
        }
        let Some(token) = self.peek_at(i) else {
            return false;
        };
        match &token.kind {
            TokenKind::Ident(_) => self.peek_at(i + 1).is_some_and(|t| t.is_punct("=>")),
            TokenKind::Punct("(") => {
                let Some(close) = self.matching(i) else {
                    return false;
                };
                match self.peek_at(close + 1) {
                    Some(t) if t.is_punct("=>") => true,
                    Some(t) if t.is_punct(":") => {
                        // return type annotation, then `=>`
                        let mut depth = 0usize;
                        for token in &self.tokens[close + 2..] {
                            match token.kind {
                                TokenKind::Punct("=>") if depth == 0 => return true,
                                TokenKind::Punct("(" | "[" | "{" | "<") => depth += 1,
                                TokenKind::Punct(")" | "]" | "}" | ">") => {
                                    if depth == 0 {
                                        return false;
                                    }
                                    depth -= 1;
                                }
                                TokenKind::Punct(";" | "," | "=") if depth == 0 => return false,
                                _ => {}
                            }
                        }
                        false
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn arrow(&mut self) -> PResult<Expr> {
        self.eat_ident("async");
        let params = if self.eat_punct("(") {
            self.parameters()?
        } else {
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Ident(name)) => {
                    self.pos += 1;
                    vec![name.clone()]
                }
                _ => return Err(self.unexpected("parameter")),
            }
        };
        if self.eat_punct(":") {
            self.skip_type()?;
        }
        self.expect_punct("=>", "`=>`")?;

        let body = if self.eat_punct("{") {
            self.function_body()?
        } else {
            self.expr()?
        };
        Ok(Expr::Arrow(Arrow {
            params,
            body: Box::new(body),
        }))
    }

    /// Parameter names after `(`, through `)`.
    fn parameters(&mut self) -> PResult<Vec<String>> {
        let mut params = Vec::new();
        loop {
            if self.eat_punct(")") {
                return Ok(params);
            }
            self.eat_punct("...");
            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Ident(name)) => {
                    params.push(name.clone());
                    self.pos += 1;
                }
                Some(TokenKind::Punct("{" | "[")) => {
                    let close = self.matching(self.pos).ok_or_else(|| self.unexpected("binding"))?;
                    params.extend(self.bindings(self.pos + 1, close));
                    self.pos = close + 1;
                }
                _ => return Err(self.unexpected("parameter")),
            }
            self.eat_punct("?");
            if self.eat_punct(":") {
                self.skip_type()?;
            }
            if self.eat_punct("=") {
                self.expr()?;
            }
            if !self.eat_punct(",") {
                self.expect_punct(")", "`,` or `)`")?;
                return Ok(params);
            }
        }
    }

    /// Names bound by a destructuring pattern between `from` and `to`.
    fn bindings(&self, from: usize, to: usize) -> Vec<String> {
        self.tokens[from..to]
            .iter()
            .zip(&self.tokens[from + 1..=to])
            .filter_map(|(token, next)| match &token.kind {
                TokenKind::Ident(name)
                    if matches!(next.kind, TokenKind::Punct("," | "}" | "]" | "=")) =>
                {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Statements of a function body after `{`, through `}`. The value is
    /// that of the first `return`.
    fn function_body(&mut self) -> PResult<Expr> {
        let mut value = None;
        loop {
            if self.eat_punct("}") {
                return Ok(value.unwrap_or(Expr::Other));
            }
            if self.peek().is_none() {
                return Err(self.unexpected("`}`"));
            }
            if self.eat_punct(";") {
                continue;
            }
            if self.eat_ident("return") {
                let returned = if self.at_punct(";") || self.at_punct("}") {
                    Expr::Other
                } else {
                    self.expr()?
                };
                value.get_or_insert(returned);
                self.end_statement()?;
                continue;
            }
            if self.at_punct("{") || self.at_ident("if") || self.at_ident("for") {
                self.skip_block_declaration()?;
                continue;
            }
            self.statement()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ProcessError>) {
        let tokens = tokenize(source).unwrap();
        parse_program(source, &tokens, 32)
    }

    fn only_decl(source: &str) -> (String, Expr) {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        match program.as_slice() {
            [Stmt::Decl { name, init }] => (name.clone(), init.clone()),
            other => panic!("expected one declaration, got {other:?}"),
        }
    }

    #[test]
    fn test_imports_and_types_are_skipped() {
        let (program, errors) = parse(
            r#"
import { pgTable, serial } from "drizzle-orm/pg-core";
import * as core from 'drizzle-orm/pg-core'
export type User = typeof users.$inferSelect;
export interface Meta { a: string; b: number }
function helper(x: number): number { return x + 1 }
export { users } from "./users";
export const answer = 42;
"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(
            program,
            [Stmt::Decl {
                name: "answer".into(),
                init: Expr::Number("42".into())
            }]
        );
    }

    #[test]
    fn test_table_declaration() {
        let (name, init) = only_decl(
            r#"export const users = pgTable("users", {
  id: serial("id").primaryKey(),
  email: varchar({ length: 255 }).notNull(),
}, (table) => [index("users_email_idx").on(table.email)]);"#,
        );
        assert_eq!(name, "users");
        let (receiver, links) = init.chain().unwrap();
        assert!(receiver.is_none());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].method, "pgTable");
        assert_eq!(links[0].args.len(), 3);

        let columns = &links[0].args[1];
        let (_, id_links) = columns.get("id").unwrap().chain().unwrap();
        let methods: Vec<&str> = id_links.iter().map(|l| l.method).collect();
        assert_eq!(methods, ["serial", "primaryKey"]);

        let Expr::Arrow(extender) = &links[0].args[2] else {
            panic!("expected an arrow");
        };
        assert_eq!(extender.params, ["table"]);
        assert!(matches!(extender.body.as_ref(), Expr::Array(items) if items.len() == 1));
    }

    #[test]
    fn test_arrow_forms() {
        let (_, init) = only_decl(
            "const f = fn(() => users.id, (t): AnyPgColumn => t.id, async ({ one, many }) => { const x = 1; return { a: one(b) } }, x => x)",
        );
        let call = init.as_call().unwrap();
        let params: Vec<Vec<String>> = call
            .args
            .iter()
            .map(|arg| match arg {
                Expr::Arrow(arrow) => arrow.params.clone(),
                other => panic!("expected an arrow, got {other:?}"),
            })
            .collect();
        assert_eq!(
            params,
            [vec![], vec!["t".to_string()], vec!["one".into(), "many".into()], vec!["x".into()]]
        );
        let Expr::Arrow(block) = &call.args[2] else {
            unreachable!()
        };
        assert!(block.body.get("a").is_some());
    }

    #[test]
    fn test_generics_casts_and_templates() {
        let (_, init) = only_decl(
            "const c = jsonb('meta').$type<{ tags: string[] }>().default(sql`'{}'::jsonb`) as unknown as PgColumn",
        );
        let (_, links) = init.chain().unwrap();
        let methods: Vec<&str> = links.iter().map(|l| l.method).collect();
        assert_eq!(methods, ["jsonb", "$type", "default"]);
        assert!(matches!(
            &links[2].args[0],
            Expr::Template { tag: Some(tag), text } if tag.as_ident() == Some("sql") && text == "'{}'::jsonb"
        ));
    }

    #[test]
    fn test_spread_and_shorthand() {
        let (_, init) = only_decl("const o = { ...timestamps, users, 'quoted-key': -1 }");
        assert_eq!(
            init,
            Expr::Object(vec![
                Property::Spread(Expr::Ident("timestamps".into())),
                Property::Pair("users".into(), Expr::Ident("users".into())),
                Property::Pair("quoted-key".into(), Expr::Number("-1".into())),
            ])
        );
    }

    #[test]
    fn test_bad_property_is_skipped() {
        let (program, errors) = parse("const t = pgTable('t', {\n  a: text(),\n  b: ) ,\n  c: integer(),\n});\n");
        assert_eq!(errors.len(), 1);
        let [Stmt::Decl { init, .. }] = program.as_slice() else {
            panic!("expected a declaration, got {program:?}");
        };
        let (_, links) = init.chain().unwrap();
        let Expr::Object(props) = &links[0].args[1] else {
            panic!("expected an object");
        };
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_bad_statement_is_skipped() {
        let (program, errors) = parse("const a = 1 2\nconst b = 3;\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            program,
            [Stmt::Decl {
                name: "b".into(),
                init: Expr::Number("3".into())
            }]
        );
    }

    #[test]
    fn test_nesting_limit() {
        let source = format!("const a = {}1{};\nconst b = 2;\n", "[".repeat(40), "]".repeat(40));
        let (program, errors) = parse(&source);
        assert!(matches!(&errors[..], [ProcessError::NestingTooDeep { limit: 32, .. }]));
        assert_eq!(program.len(), 1);
    }
}
