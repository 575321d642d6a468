//! Recursive-descent parser for DDL statements.
//!
//! Statements the schema builder has no use for (SET, GRANT, CREATE
//! FUNCTION, ...) parse to `None` and are dropped without a warning. A
//! statement that starts like something we understand but then goes wrong
//! produces a [`ProcessError`] and is skipped as a whole.

use std::ops::Range;

use schemir_schema::{DefaultValue, ForeignKeyAction};
use tracing::{debug, trace};

use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::{Position, ProcessError};

type PResult<T> = Result<T, ProcessError>;

/// Keywords that end a column's type and start its constraints.
const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "UNIQUE",
    "REFERENCES",
    "CHECK",
    "COLLATE",
    "GENERATED",
    "DEFAULT",
    "DEFERRABLE",
    "INITIALLY",
];

const TABLE_CONSTRAINT_KEYWORDS: &[&str] =
    &["CONSTRAINT", "PRIMARY", "UNIQUE", "FOREIGN", "CHECK", "EXCLUDE"];

/// Parse every `;`-separated statement in `tokens`.
pub(crate) fn parse_statements(
    source: &str,
    tokens: &[Token],
    max_depth: usize,
) -> (Vec<Statement>, Vec<ProcessError>) {
    let mut statements = Vec::new();
    let mut errors = Vec::new();

    for chunk in tokens.split(|t| t.kind == TokenKind::Semicolon) {
        if chunk.is_empty() {
            continue;
        }
        let mut parser = Parser {
            source,
            tokens: chunk,
            pos: 0,
            max_depth,
            warnings: Vec::new(),
        };
        match parser.statement() {
            Ok(Some(statement)) => {
                trace!(?statement, "parsed statement");
                statements.push(statement);
            }
            Ok(None) => {}
            Err(err) => {
                debug!(%err, "skipping statement");
                errors.push(err);
            }
        }
        errors.append(&mut parser.warnings);
    }

    (statements, errors)
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    max_depth: usize,
    warnings: Vec<ProcessError>,
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
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

    fn at_keyword(&self, kw: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(kw))
    }

    fn at_any_keyword(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.at_keyword(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.at_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Eat a keyword sequence, all or nothing.
    fn eat_keywords(&mut self, kws: &[&str]) -> bool {
        let all = kws
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_nth(i).is_some_and(|t| t.is_keyword(kw)));
        if all {
            self.pos += kws.len();
        }
        all
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.unexpected(kw))
        }
    }

    fn offset(&self) -> usize {
        match self.peek() {
            Some(token) => token.span.start,
            None => self.tokens.last().map(|t| t.span.end).unwrap_or_default(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ProcessError {
        ProcessError::unexpected(self.source, self.offset(), message)
    }

    fn unexpected(&self, expected: &str) -> ProcessError {
        match self.peek() {
            Some(token) => self.error(format!(
                "expected {expected}, found `{}`",
                &self.source[token.span.clone()]
            )),
            None => self.error(format!("expected {expected}, found end of statement")),
        }
    }

    /// Source text covered by a token range.
    fn text(&self, range: Range<usize>) -> &'a str {
        if range.is_empty() {
            return "";
        }
        let start = self.tokens[range.start].span.start;
        let end = self.tokens[range.end - 1].span.end;
        &self.source[start..end]
    }

    // ------------------------------------------------------------------
    // Names and groups
    // ------------------------------------------------------------------

    /// An identifier. Unquoted names fold to lower case.
    fn identifier(&mut self) -> PResult<String> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Word(word)) => {
                self.pos += 1;
                Ok(word.to_lowercase())
            }
            Some(TokenKind::QuotedIdent(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `schema.name` resolves to `name`.
    fn qualified_name(&mut self) -> PResult<String> {
        let mut name = self.identifier()?;
        while self.eat(&TokenKind::Dot) {
            name = self.identifier()?;
        }
        Ok(name)
    }

    fn qualified_name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.qualified_name()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.qualified_name()?);
        }
        Ok(names)
    }

    /// `(a, b, c)`
    fn paren_ident_list(&mut self) -> PResult<Vec<String>> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut names = vec![self.identifier()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.identifier()?);
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok(names)
    }

    fn string(&mut self) -> PResult<String> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => {
                self.pos += 1;
                Ok(s.clone())
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    /// Consume a balanced `( ... )` group and return the token range inside.
    fn paren_group(&mut self) -> PResult<Range<usize>> {
        let open = self.pos;
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut depth = 1usize;
        while let Some(token) = self.advance() {
            match token.kind {
                TokenKind::LParen => {
                    depth += 1;
                    if depth > self.max_depth {
                        return Err(ProcessError::NestingTooDeep {
                            limit: self.max_depth,
                            position: Position::locate(self.source, token.span.start),
                        });
                    }
                }
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(open + 1..self.pos - 1);
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unbalanced parentheses"))
    }

    /// Skip to the `,` or `)` that ends the current list element.
    fn skip_until_element_end(&mut self) -> PResult<()> {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Comma | TokenKind::RParen => break,
                TokenKind::LParen => {
                    self.paren_group()?;
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// Split a token range at its top-level commas.
    fn split_commas(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut start = range.start;
        for i in range.clone() {
            match self.tokens[i].kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                TokenKind::Comma if depth == 0 => {
                    parts.push(start..i);
                    start = i + 1;
                }
                _ => {}
            }
        }
        parts.push(start..range.end);
        parts
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) -> PResult<Option<Statement>> {
        if self.eat_keyword("CREATE") {
            self.eat_keywords(&["OR", "REPLACE"]);
            if self.eat_keyword("UNIQUE") {
                self.expect_keyword("INDEX")?;
                return self.create_index(true);
            }
            if self.eat_keyword("INDEX") {
                return self.create_index(false);
            }
            let _ = self.eat_keyword("GLOBAL") || self.eat_keyword("LOCAL");
            let _ = self.eat_keyword("TEMPORARY")
                || self.eat_keyword("TEMP")
                || self.eat_keyword("UNLOGGED");
            if self.eat_keyword("TABLE") {
                return self.create_table();
            }
            if self.eat_keyword("TYPE") {
                return self.create_type();
            }
        } else if self.eat_keyword("ALTER") {
            if self.eat_keyword("TABLE") {
                return self.alter_table();
            }
            if self.eat_keyword("INDEX") {
                return self.alter_index();
            }
            if self.eat_keyword("TYPE") {
                return self.alter_type();
            }
        } else if self.eat_keyword("DROP") {
            return self.drop_statement();
        } else if self.eat_keywords(&["COMMENT", "ON"]) {
            return self.comment();
        }

        debug!(
            statement = self.text(0..self.tokens.len()),
            "skipping unsupported statement"
        );
        Ok(None)
    }

    fn create_table(&mut self) -> PResult<Option<Statement>> {
        self.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = self.qualified_name()?;
        if !self.at(&TokenKind::LParen) {
            // CREATE TABLE ... AS / PARTITION OF / OF type
            debug!(table = %name, "skipping CREATE TABLE without a column list");
            return Ok(None);
        }
        self.pos += 1;

        let mut table = CreateTable {
            name,
            columns: Vec::new(),
            constraints: Vec::new(),
        };

        if !self.eat(&TokenKind::RParen) {
            loop {
                if self.at_any_keyword(TABLE_CONSTRAINT_KEYWORDS) {
                    if let Some(constraint) = self.table_constraint()? {
                        table.constraints.push(constraint);
                    }
                } else if self.at_keyword("LIKE") {
                    self.warnings.push(ProcessError::unsupported(
                        "LIKE clause",
                        format!("in CREATE TABLE {}", table.name),
                    ));
                    self.skip_until_element_end()?;
                } else {
                    table.columns.push(self.column_def()?);
                }

                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RParen, "`,` or `)`")?;
                break;
            }
        }

        // storage parameters, INHERITS, PARTITION BY and friends don't matter
        Ok(Some(Statement::CreateTable(table)))
    }

    fn column_def(&mut self) -> PResult<ColumnDef> {
        let name = self.identifier()?;
        let ty = self.type_name()?;
        let mut column = ColumnDef {
            name,
            ty,
            not_null: false,
            default: None,
            check: None,
            constraints: Vec::new(),
        };

        let mut constraint_name = None;
        while !self.at_end() && !self.at(&TokenKind::Comma) && !self.at(&TokenKind::RParen) {
            if self.eat_keyword("CONSTRAINT") {
                constraint_name = Some(self.identifier()?);
                continue;
            }

            let kind = if self.eat_keywords(&["NOT", "NULL"]) {
                column.not_null = true;
                None
            } else if self.eat_keyword("NULL") {
                None
            } else if self.eat_keyword("DEFAULT") {
                let range = self.expression()?;
                column.default = literal_default(&self.tokens[range]);
                None
            } else if self.eat_keywords(&["PRIMARY", "KEY"]) {
                Some(ConstraintKind::PrimaryKey(vec![column.name.clone()]))
            } else if self.eat_keyword("UNIQUE") {
                self.skip_nulls_distinct();
                Some(ConstraintKind::Unique(vec![column.name.clone()]))
            } else if self.eat_keyword("REFERENCES") {
                Some(self.references(vec![column.name.clone()])?)
            } else if self.eat_keyword("CHECK") {
                let (expr, _) = self.check_body()?;
                self.eat_keywords(&["NO", "INHERIT"]);
                column.check = Some(expr);
                None
            } else if self.eat_keyword("COLLATE") {
                self.qualified_name()?;
                None
            } else if self.eat_keyword("GENERATED") {
                self.skip_generated()?;
                None
            } else if self.eat_keywords(&["NOT", "DEFERRABLE"]) || self.eat_keyword("DEFERRABLE") {
                None
            } else if self.eat_keyword("INITIALLY") {
                self.advance();
                None
            } else {
                return Err(self.unexpected("column constraint"));
            };

            match kind {
                Some(kind) => column.constraints.push(TableConstraint {
                    name: constraint_name.take(),
                    kind,
                }),
                None => constraint_name = None,
            }
        }

        Ok(column)
    }

    /// The type text of a column, up to its first constraint keyword.
    ///
    /// Words are lower-cased, quoted names unquoted, and whitespace kept
    /// only where the source had it, so `varchar(255)` and
    /// `timestamp with time zone` read back as written.
    fn type_name(&mut self) -> PResult<String> {
        const STOP: &[&str] = &[
            "NOT",
            "NULL",
            "DEFAULT",
            "CONSTRAINT",
            "PRIMARY",
            "UNIQUE",
            "REFERENCES",
            "CHECK",
            "COLLATE",
            "GENERATED",
            "DEFERRABLE",
            "INITIALLY",
            "USING",
        ];

        let start = self.pos;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Comma | TokenKind::RParen => break,
                TokenKind::LParen => {
                    self.paren_group()?;
                }
                _ if self.at_any_keyword(STOP) => break,
                _ => self.pos += 1,
            }
        }
        if self.pos == start {
            return Err(self.unexpected("type name"));
        }

        let mut out = String::new();
        let mut prev_end = None;
        for token in &self.tokens[start..self.pos] {
            if prev_end.is_some_and(|end| token.span.start > end) {
                out.push(' ');
            }
            match &token.kind {
                TokenKind::Word(word) => out.push_str(&word.to_lowercase()),
                TokenKind::QuotedIdent(name) => out.push_str(name),
                _ => out.push_str(&self.source[token.span.clone()]),
            }
            prev_end = Some(token.span.end);
        }
        Ok(out)
    }

    /// A default or USING expression, up to the next column constraint.
    fn expression(&mut self) -> PResult<Range<usize>> {
        let start = self.pos;
        while let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Comma | TokenKind::RParen => break,
                TokenKind::LParen => {
                    self.paren_group()?;
                    continue;
                }
                TokenKind::Word(_) if self.pos > start && self.at_constraint_boundary() => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected("expression"));
        }
        Ok(start..self.pos)
    }

    fn at_constraint_boundary(&self) -> bool {
        if self.at_any_keyword(COLUMN_CONSTRAINT_KEYWORDS) {
            return true;
        }
        if self.at_keyword("NOT") {
            return self
                .peek_nth(1)
                .is_some_and(|t| t.is_keyword("NULL") || t.is_keyword("DEFERRABLE"));
        }
        self.at_keyword("NULL")
            && !self.tokens[self.pos - 1].is_keyword("IS")
            && !self.tokens[self.pos - 1].is_keyword("NOT")
    }

    fn skip_nulls_distinct(&mut self) {
        let _ = self.eat_keywords(&["NULLS", "NOT", "DISTINCT"])
            || self.eat_keywords(&["NULLS", "DISTINCT"]);
    }

    /// `GENERATED { ALWAYS | BY DEFAULT } AS IDENTITY [ ( ... ) ]` or
    /// `GENERATED ALWAYS AS ( expr ) STORED`
    fn skip_generated(&mut self) -> PResult<()> {
        if !self.eat_keyword("ALWAYS") && !self.eat_keywords(&["BY", "DEFAULT"]) {
            return Err(self.unexpected("ALWAYS or BY DEFAULT"));
        }
        self.expect_keyword("AS")?;
        if self.eat_keyword("IDENTITY") {
            if self.at(&TokenKind::LParen) {
                self.paren_group()?;
            }
        } else {
            self.paren_group()?;
            self.eat_keyword("STORED");
        }
        Ok(())
    }

    /// `CHECK ( expr )`, positioned after CHECK. The expression text is cut
    /// from the source between the balanced parentheses.
    fn check_body(&mut self) -> PResult<(String, Vec<String>)> {
        let inner = self.paren_group()?;
        let expr = self.text(inner.clone()).trim().to_string();
        let idents = self.tokens[inner]
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Word(w) => Some(w.to_lowercase()),
                TokenKind::QuotedIdent(name) => Some(name.clone()),
                _ => None,
            })
            .collect();
        Ok((expr, idents))
    }

    /// `REFERENCES target [(cols)] [MATCH ...] [ON DELETE ...] [ON UPDATE ...]`,
    /// positioned after REFERENCES.
    fn references(&mut self, columns: Vec<String>) -> PResult<ConstraintKind> {
        let target_table = self.qualified_name()?;
        let target_columns = if self.at(&TokenKind::LParen) {
            self.paren_ident_list()?
        } else {
            Vec::new()
        };

        let mut on_update = ForeignKeyAction::NoAction;
        let mut on_delete = ForeignKeyAction::NoAction;
        loop {
            if self.eat_keyword("MATCH") {
                self.advance();
            } else if self.eat_keywords(&["ON", "DELETE"]) {
                on_delete = self.referential_action()?;
            } else if self.eat_keywords(&["ON", "UPDATE"]) {
                on_update = self.referential_action()?;
            } else {
                break;
            }
        }

        Ok(ConstraintKind::ForeignKey {
            columns,
            target_table,
            target_columns,
            on_update,
            on_delete,
        })
    }

    fn referential_action(&mut self) -> PResult<ForeignKeyAction> {
        let action = if self.eat_keyword("CASCADE") {
            ForeignKeyAction::Cascade
        } else if self.eat_keyword("RESTRICT") {
            ForeignKeyAction::Restrict
        } else if self.eat_keywords(&["SET", "NULL"]) {
            ForeignKeyAction::SetNull
        } else if self.eat_keywords(&["SET", "DEFAULT"]) {
            ForeignKeyAction::SetDefault
        } else if self.eat_keywords(&["NO", "ACTION"]) {
            ForeignKeyAction::NoAction
        } else {
            return Err(self.unexpected("referential action"));
        };
        // SET NULL (col, ...) limits the action to some columns
        if matches!(action, ForeignKeyAction::SetNull | ForeignKeyAction::SetDefault)
            && self.at(&TokenKind::LParen)
        {
            self.paren_group()?;
        }
        Ok(action)
    }

    /// A table constraint. `None` when it has no IR equivalent (EXCLUDE).
    fn table_constraint(&mut self) -> PResult<Option<TableConstraint>> {
        let name = if self.eat_keyword("CONSTRAINT") {
            Some(self.identifier()?)
        } else {
            None
        };

        let kind = if self.eat_keywords(&["PRIMARY", "KEY"]) {
            ConstraintKind::PrimaryKey(self.paren_ident_list()?)
        } else if self.eat_keyword("UNIQUE") {
            self.skip_nulls_distinct();
            ConstraintKind::Unique(self.paren_ident_list()?)
        } else if self.eat_keywords(&["FOREIGN", "KEY"]) {
            let columns = self.paren_ident_list()?;
            self.expect_keyword("REFERENCES")?;
            self.references(columns)?
        } else if self.eat_keyword("CHECK") {
            let (expr, idents) = self.check_body()?;
            ConstraintKind::Check { expr, idents }
        } else if self.at_keyword("EXCLUDE") {
            self.warnings.push(ProcessError::unsupported(
                "EXCLUDE constraint",
                name.unwrap_or_default(),
            ));
            self.skip_until_element_end()?;
            return Ok(None);
        } else {
            return Err(self.unexpected("constraint"));
        };

        // DEFERRABLE, NOT VALID, INCLUDE (...), WITH (...), ...
        self.skip_until_element_end()?;
        Ok(Some(TableConstraint { name, kind }))
    }

    fn create_index(&mut self, unique: bool) -> PResult<Option<Statement>> {
        self.eat_keyword("CONCURRENTLY");
        let name = if self.at_keyword("ON") {
            None
        } else {
            self.eat_keywords(&["IF", "NOT", "EXISTS"]);
            Some(self.qualified_name()?)
        };
        self.expect_keyword("ON")?;
        self.eat_keyword("ONLY");
        let table = self.qualified_name()?;
        let method = if self.eat_keyword("USING") {
            self.identifier()?
        } else {
            String::new()
        };

        let inner = self.paren_group()?;
        let mut columns = Vec::new();
        for element in self.split_commas(inner) {
            columns.push(self.index_key(element)?);
        }
        // INCLUDE, WHERE, WITH and TABLESPACE clauses are not modeled

        Ok(Some(Statement::CreateIndex(CreateIndex {
            name,
            table,
            unique,
            method,
            columns,
        })))
    }

    /// A plain column name (ignoring opclass / ordering), or the expression
    /// text for expression keys.
    fn index_key(&self, element: Range<usize>) -> PResult<String> {
        let tokens = &self.tokens[element.clone()];
        let Some(first) = tokens.first() else {
            return Err(self.error("empty index key"));
        };
        let plain = !matches!(
            tokens.get(1).map(|t| &t.kind),
            Some(TokenKind::LParen | TokenKind::Dot | TokenKind::Op(_) | TokenKind::Cast)
        );
        match &first.kind {
            TokenKind::Word(word) if plain => Ok(word.to_lowercase()),
            TokenKind::QuotedIdent(name) if plain => Ok(name.clone()),
            _ => Ok(self.text(element).trim().to_string()),
        }
    }

    fn create_type(&mut self) -> PResult<Option<Statement>> {
        let name = self.qualified_name()?;
        if !self.eat_keywords(&["AS", "ENUM"]) {
            debug!(type_name = %name, "skipping non-enum CREATE TYPE");
            return Ok(None);
        }
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut values = Vec::new();
        if !self.eat(&TokenKind::RParen) {
            values.push(self.string()?);
            while self.eat(&TokenKind::Comma) {
                values.push(self.string()?);
            }
            self.expect(&TokenKind::RParen, "`)`")?;
        }
        Ok(Some(Statement::CreateEnum { name, values }))
    }

    fn alter_table(&mut self) -> PResult<Option<Statement>> {
        self.eat_keywords(&["IF", "EXISTS"]);
        self.eat_keyword("ONLY");
        let table = self.qualified_name()?;
        if self.at(&TokenKind::Op("*".into())) {
            self.pos += 1;
        }

        let mut actions = Vec::new();
        loop {
            if let Some(action) = self.alter_action()? {
                actions.push(action);
            }
            // CASCADE, USING expr, ...
            self.skip_until_element_end()?;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if !self.at_end() {
            return Err(self.unexpected("`,` or end of statement"));
        }

        Ok(Some(Statement::AlterTable { table, actions }))
    }

    fn alter_action(&mut self) -> PResult<Option<AlterAction>> {
        if self.eat_keyword("ADD") {
            if self.at_any_keyword(TABLE_CONSTRAINT_KEYWORDS) {
                return Ok(self.table_constraint()?.map(AlterAction::AddConstraint));
            }
            self.eat_keyword("COLUMN");
            self.eat_keywords(&["IF", "NOT", "EXISTS"]);
            return Ok(Some(AlterAction::AddColumn(self.column_def()?)));
        }

        if self.eat_keyword("DROP") {
            if self.eat_keyword("CONSTRAINT") {
                self.eat_keywords(&["IF", "EXISTS"]);
                return Ok(Some(AlterAction::DropConstraint(self.identifier()?)));
            }
            self.eat_keyword("COLUMN");
            self.eat_keywords(&["IF", "EXISTS"]);
            return Ok(Some(AlterAction::DropColumn(self.identifier()?)));
        }

        if self.eat_keyword("RENAME") {
            if self.eat_keyword("TO") {
                return Ok(Some(AlterAction::RenameTable(self.identifier()?)));
            }
            let constraint = self.eat_keyword("CONSTRAINT");
            if !constraint {
                self.eat_keyword("COLUMN");
            }
            let from = self.identifier()?;
            self.expect_keyword("TO")?;
            let to = self.identifier()?;
            return Ok(Some(if constraint {
                AlterAction::RenameConstraint { from, to }
            } else {
                AlterAction::RenameColumn { from, to }
            }));
        }

        if self.eat_keyword("ALTER") {
            self.eat_keyword("COLUMN");
            let column = self.identifier()?;
            let change = if self.eat_keywords(&["SET", "DATA", "TYPE"]) || self.eat_keyword("TYPE") {
                ColumnChange::Type(self.type_name()?)
            } else if self.eat_keywords(&["SET", "NOT", "NULL"]) {
                ColumnChange::SetNotNull
            } else if self.eat_keywords(&["DROP", "NOT", "NULL"]) {
                ColumnChange::DropNotNull
            } else if self.eat_keywords(&["SET", "DEFAULT"]) {
                let range = self.expression()?;
                ColumnChange::SetDefault(literal_default(&self.tokens[range]))
            } else if self.eat_keywords(&["DROP", "DEFAULT"]) {
                ColumnChange::DropDefault
            } else {
                debug!(%column, "skipping unsupported ALTER COLUMN action");
                return Ok(None);
            };
            return Ok(Some(AlterAction::AlterColumn { column, change }));
        }

        debug!("skipping unsupported ALTER TABLE action");
        Ok(None)
    }

    fn alter_index(&mut self) -> PResult<Option<Statement>> {
        self.eat_keywords(&["IF", "EXISTS"]);
        let from = self.qualified_name()?;
        if !self.eat_keywords(&["RENAME", "TO"]) {
            return Ok(None);
        }
        let to = self.identifier()?;
        Ok(Some(Statement::RenameIndex { from, to }))
    }

    fn alter_type(&mut self) -> PResult<Option<Statement>> {
        let name = self.qualified_name()?;
        let action = if self.eat_keywords(&["RENAME", "TO"]) {
            AlterTypeAction::RenameTo(self.identifier()?)
        } else if self.eat_keywords(&["ADD", "VALUE"]) {
            self.eat_keywords(&["IF", "NOT", "EXISTS"]);
            let value = self.string()?;
            let anchor = if self.eat_keyword("BEFORE") {
                Some((true, self.string()?))
            } else if self.eat_keyword("AFTER") {
                Some((false, self.string()?))
            } else {
                None
            };
            AlterTypeAction::AddValue { value, anchor }
        } else if self.eat_keywords(&["RENAME", "VALUE"]) {
            let from = self.string()?;
            self.expect_keyword("TO")?;
            let to = self.string()?;
            AlterTypeAction::RenameValue { from, to }
        } else {
            return Ok(None);
        };
        Ok(Some(Statement::AlterType { name, action }))
    }

    fn drop_statement(&mut self) -> PResult<Option<Statement>> {
        enum Target {
            Table,
            Index,
            Type,
        }
        let target = if self.eat_keyword("TABLE") {
            Target::Table
        } else if self.eat_keyword("INDEX") {
            self.eat_keyword("CONCURRENTLY");
            Target::Index
        } else if self.eat_keyword("TYPE") {
            Target::Type
        } else {
            return Ok(None);
        };
        self.eat_keywords(&["IF", "EXISTS"]);
        let names = self.qualified_name_list()?;
        // CASCADE / RESTRICT
        Ok(Some(match target {
            Target::Table => Statement::DropTables(names),
            Target::Index => Statement::DropIndexes(names),
            Target::Type => Statement::DropTypes(names),
        }))
    }

    fn comment(&mut self) -> PResult<Option<Statement>> {
        let target = if self.eat_keyword("TABLE") {
            CommentTarget::Table(self.qualified_name()?)
        } else if self.eat_keyword("COLUMN") {
            // [schema.]table.column
            let mut parts = vec![self.identifier()?];
            while self.eat(&TokenKind::Dot) {
                parts.push(self.identifier()?);
            }
            let (Some(column), Some(table)) = (parts.pop(), parts.pop()) else {
                return Err(self.error("COMMENT ON COLUMN needs table.column"));
            };
            CommentTarget::Column { table, column }
        } else if self.eat_keyword("TYPE") {
            CommentTarget::Type(self.qualified_name()?)
        } else {
            return Ok(None);
        };

        self.expect_keyword("IS")?;
        let comment = if self.eat_keyword("NULL") {
            None
        } else {
            Some(self.string()?)
        };
        Ok(Some(Statement::Comment { target, comment }))
    }
}

/// Literal defaults only: `'text'`, `'text'::type`, numbers, booleans.
fn literal_default(tokens: &[Token]) -> Option<DefaultValue> {
    match tokens {
        [token] => literal(token),
        [token, cast, _, ..] if matches!(token.kind, TokenKind::Str(_)) && cast.kind == TokenKind::Cast => {
            literal(token)
        }
        [sign, number] if sign.kind == TokenKind::Op("-".into()) => match &number.kind {
            TokenKind::Number(n) => DefaultValue::parse_number(&format!("-{n}")),
            _ => None,
        },
        _ => None,
    }
}

fn literal(token: &Token) -> Option<DefaultValue> {
    match &token.kind {
        TokenKind::Str(s) => Some(DefaultValue::String(s.clone())),
        TokenKind::Number(n) => DefaultValue::parse_number(&n.replace('_', "")),
        TokenKind::Word(w) if w.eq_ignore_ascii_case("true") => Some(DefaultValue::Boolean(true)),
        TokenKind::Word(w) if w.eq_ignore_ascii_case("false") => Some(DefaultValue::Boolean(false)),
        _ => None,
    }
}
