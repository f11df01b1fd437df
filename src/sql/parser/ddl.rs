/// DDL parsing: CREATE / ALTER / DROP / TRUNCATE
use super::Parser;
use crate::error::Result;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};

/// Type names that may follow a column called `key` or `index`
const TYPE_NAMES: &[&str] = &[
    "INT", "INTEGER", "TINYINT", "SMALLINT", "MEDIUMINT", "BIGINT", "DECIMAL", "NUMERIC", "FLOAT",
    "DOUBLE", "REAL", "BIT", "CHAR", "VARCHAR", "BINARY", "VARBINARY", "TEXT", "TINYTEXT",
    "MEDIUMTEXT", "LONGTEXT", "BLOB", "JSON",
];

impl Parser {
    pub(super) fn parse_create(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Create)?;

        let or_replace = if self.match_keyword(Keyword::Or) {
            self.expect_keyword(Keyword::Replace)?;
            true
        } else {
            false
        };

        // DEFINER = user
        if self.match_word("DEFINER") {
            self.expect(&TokenType::Eq, "'='")?;
            self.parse_user_name()?;
        }

        match self.current().token_type {
            TokenType::Keyword(Keyword::Temporary) => {
                self.advance();
                self.expect_keyword(Keyword::Table)?;
                Ok(Statement::CreateTable(self.parse_create_table(true)?))
            }
            TokenType::Keyword(Keyword::Table) => {
                self.advance();
                Ok(Statement::CreateTable(self.parse_create_table(false)?))
            }
            TokenType::Keyword(Keyword::Database) | TokenType::Keyword(Keyword::Schema) => {
                self.advance();
                Ok(Statement::CreateDatabase(self.parse_create_database()?))
            }
            TokenType::Keyword(Keyword::Index) => {
                self.advance();
                Ok(Statement::CreateIndex(self.parse_create_index(IndexKind::Plain)?))
            }
            TokenType::Keyword(Keyword::Unique) | TokenType::Keyword(Keyword::Fulltext) | TokenType::Keyword(Keyword::Spatial) => {
                let kind = match self.current().token_type {
                    TokenType::Keyword(Keyword::Unique) => IndexKind::Unique,
                    TokenType::Keyword(Keyword::Fulltext) => IndexKind::Fulltext,
                    _ => IndexKind::Spatial,
                };
                self.advance();
                self.expect_keyword(Keyword::Index)?;
                Ok(Statement::CreateIndex(self.parse_create_index(kind)?))
            }
            TokenType::Keyword(Keyword::View) => {
                self.advance();
                Ok(Statement::CreateView(self.parse_create_view(or_replace)?))
            }
            TokenType::Keyword(Keyword::Trigger) => {
                self.advance();
                Ok(Statement::CreateTrigger(self.parse_create_trigger()?))
            }
            TokenType::Keyword(Keyword::Procedure) => {
                self.advance();
                Ok(Statement::CreateProcedure(self.parse_create_routine(false)?))
            }
            TokenType::Keyword(Keyword::Function) => {
                self.advance();
                Ok(Statement::CreateFunction(self.parse_create_routine(true)?))
            }
            TokenType::Keyword(Keyword::User) => {
                self.advance();
                self.parse_create_user()
            }
            TokenType::Keyword(Keyword::Role) => {
                self.advance();
                self.parse_create_role()
            }
            _ => Err(self.error("TABLE, DATABASE, INDEX, VIEW, TRIGGER, PROCEDURE, FUNCTION, USER or ROLE")),
        }
    }

    pub(super) fn parse_if_not_exists(&mut self) -> Result<bool> {
        if self.match_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_if_exists(&mut self) -> Result<bool> {
        if self.match_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_create_table(&mut self, temporary: bool) -> Result<CreateTableStmt> {
        let if_not_exists = self.parse_if_not_exists()?;
        let table = self.parse_object_name()?;
        let mut stmt = CreateTableStmt {
            table,
            if_not_exists,
            temporary,
            columns: Vec::new(),
            constraints: Vec::new(),
            options: Vec::new(),
            like: None,
            as_select: None,
        };

        // CREATE TABLE t LIKE other / CREATE TABLE t (LIKE other)
        if self.match_keyword(Keyword::Like) {
            stmt.like = Some(self.parse_object_name()?);
            return Ok(stmt);
        }
        if self.check(&TokenType::LParen) && self.peek(1).is_keyword(Keyword::Like) {
            self.advance();
            self.advance();
            stmt.like = Some(self.parse_object_name()?);
            self.expect(&TokenType::RParen, "')'")?;
            return Ok(stmt);
        }

        if !self.check(&TokenType::LParen) {
            self.match_keyword(Keyword::As);
            stmt.as_select = Some(Box::new(self.parse_query()?));
            return Ok(stmt);
        }

        self.expect(&TokenType::LParen, "'('")?;
        loop {
            if self.at_table_constraint() {
                stmt.constraints.push(self.parse_table_constraint()?);
            } else {
                stmt.columns.push(self.parse_column_def()?);
            }

            if self.match_token(&TokenType::Comma) {
                continue;
            }
            // A bare KEY after a column definition opens an inline index
            if self.at_table_constraint() {
                continue;
            }
            break;
        }
        self.expect(&TokenType::RParen, "',' or ')'")?;

        stmt.options = self.parse_table_options()?;

        if self.match_keyword(Keyword::As) || self.check_keyword(Keyword::Select) {
            stmt.as_select = Some(Box::new(self.parse_query()?));
        }

        Ok(stmt)
    }

    /// Whether the cursor starts a table-level constraint rather than a column
    fn at_table_constraint(&self) -> bool {
        match self.current().token_type {
            TokenType::Keyword(Keyword::Constraint)
            | TokenType::Keyword(Keyword::Primary)
            | TokenType::Keyword(Keyword::Unique)
            | TokenType::Keyword(Keyword::Foreign)
            | TokenType::Keyword(Keyword::Check)
            | TokenType::Keyword(Keyword::Fulltext)
            | TokenType::Keyword(Keyword::Spatial) => true,
            TokenType::Keyword(Keyword::Index) | TokenType::Keyword(Keyword::Key) => {
                match &self.peek(1).token_type {
                    TokenType::LParen => true,
                    TokenType::Identifier(name) => {
                        !TYPE_NAMES.contains(&name.to_ascii_uppercase().as_str())
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    pub(super) fn parse_table_constraint(&mut self) -> Result<TableConstraint> {
        let mut name = if self.match_keyword(Keyword::Constraint) {
            match self.current().token_type {
                TokenType::Keyword(Keyword::Primary)
                | TokenType::Keyword(Keyword::Unique)
                | TokenType::Keyword(Keyword::Foreign)
                | TokenType::Keyword(Keyword::Check) => None,
                _ => Some(self.parse_identifier()?),
            }
        } else {
            None
        };

        match self.current().token_type {
            TokenType::Keyword(Keyword::Primary) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                let columns = self.parse_index_columns()?;
                Ok(TableConstraint::PrimaryKey { name, columns })
            }
            TokenType::Keyword(Keyword::Unique) => {
                self.advance();
                if !self.match_keyword(Keyword::Key) {
                    self.match_keyword(Keyword::Index);
                }
                if !self.check(&TokenType::LParen) {
                    name = Some(self.parse_identifier()?);
                }
                let columns = self.parse_index_columns()?;
                Ok(TableConstraint::Unique { name, columns })
            }
            TokenType::Keyword(Keyword::Foreign) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                if !self.check(&TokenType::LParen) {
                    name = Some(self.parse_identifier()?);
                }
                let columns = self.parse_paren_identifier_list()?;
                let references = self.parse_references()?;
                Ok(TableConstraint::ForeignKey {
                    name,
                    columns,
                    references,
                })
            }
            TokenType::Keyword(Keyword::Check) => {
                self.advance();
                self.expect(&TokenType::LParen, "'('")?;
                let expr = self.parse_expr()?;
                self.expect(&TokenType::RParen, "')'")?;
                Ok(TableConstraint::Check { name, expr })
            }
            TokenType::Keyword(Keyword::Index) | TokenType::Keyword(Keyword::Key) => {
                self.advance();
                let (name, columns) = self.parse_named_index_columns()?;
                Ok(TableConstraint::Index {
                    name,
                    columns,
                    kind: IndexKind::Plain,
                })
            }
            TokenType::Keyword(Keyword::Fulltext) | TokenType::Keyword(Keyword::Spatial) => {
                let kind = if self.check_keyword(Keyword::Fulltext) {
                    IndexKind::Fulltext
                } else {
                    IndexKind::Spatial
                };
                self.advance();
                if !self.match_keyword(Keyword::Index) {
                    self.match_keyword(Keyword::Key);
                }
                let (name, columns) = self.parse_named_index_columns()?;
                Ok(TableConstraint::Index { name, columns, kind })
            }
            _ => Err(self.error("PRIMARY KEY, UNIQUE, FOREIGN KEY, CHECK or INDEX")),
        }
    }

    fn parse_named_index_columns(&mut self) -> Result<(Option<String>, Vec<String>)> {
        let name = if self.check(&TokenType::LParen) {
            None
        } else {
            Some(self.parse_identifier()?)
        };
        Ok((name, self.parse_index_columns()?))
    }

    /// `(col [(prefix)] [ASC|DESC], ...)`
    fn parse_index_columns(&mut self) -> Result<Vec<String>> {
        self.expect(&TokenType::LParen, "'('")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_identifier()?);
            if self.match_token(&TokenType::LParen) {
                self.parse_u64()?;
                self.expect(&TokenType::RParen, "')'")?;
            }
            if !self.match_keyword(Keyword::Asc) {
                self.match_keyword(Keyword::Desc);
            }
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        self.expect(&TokenType::RParen, "')'")?;
        Ok(columns)
    }

    /// `REFERENCES t (cols) [ON DELETE action] [ON UPDATE action]`
    fn parse_references(&mut self) -> Result<ForeignKeyRef> {
        self.expect_keyword(Keyword::References)?;
        let table = self.parse_object_name()?;
        let columns = if self.check(&TokenType::LParen) {
            self.parse_paren_identifier_list()?
        } else {
            Vec::new()
        };

        let mut reference = ForeignKeyRef {
            table,
            columns,
            on_delete: None,
            on_update: None,
        };

        while self.check_keyword(Keyword::On) {
            match self.peek(1).token_type {
                TokenType::Keyword(Keyword::Delete) => {
                    self.advance();
                    self.advance();
                    reference.on_delete = Some(self.parse_referential_action()?);
                }
                TokenType::Keyword(Keyword::Update) => {
                    self.advance();
                    self.advance();
                    reference.on_update = Some(self.parse_referential_action()?);
                }
                _ => break,
            }
        }

        Ok(reference)
    }

    fn parse_referential_action(&mut self) -> Result<ReferentialAction> {
        if self.match_keyword(Keyword::Cascade) {
            Ok(ReferentialAction::Cascade)
        } else if self.match_keyword(Keyword::Restrict) {
            Ok(ReferentialAction::Restrict)
        } else if self.match_keyword(Keyword::Set) {
            if self.match_keyword(Keyword::Null) {
                Ok(ReferentialAction::SetNull)
            } else {
                self.expect_keyword(Keyword::Default)?;
                Ok(ReferentialAction::SetDefault)
            }
        } else if self.match_keyword(Keyword::No) {
            self.expect_keyword(Keyword::Action)?;
            Ok(ReferentialAction::NoAction)
        } else {
            Err(self.error("CASCADE, RESTRICT, SET NULL, SET DEFAULT or NO ACTION"))
        }
    }

    /// Column name, type, then modifiers in any order until `,` or `)`
    pub(super) fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.parse_identifier()?;
        let data_type = self.parse_data_type()?;
        let mut column = ColumnDef::new(name, data_type);

        loop {
            match self.current().token_type {
                TokenType::Keyword(Keyword::Not) => {
                    self.advance();
                    self.expect_keyword(Keyword::Null)?;
                    column.nullable = Some(false);
                }
                TokenType::Keyword(Keyword::Null) => {
                    self.advance();
                    column.nullable = Some(true);
                }
                TokenType::Keyword(Keyword::Primary) => {
                    self.advance();
                    self.expect_keyword(Keyword::Key)?;
                    column.primary_key = true;
                }
                TokenType::Keyword(Keyword::AutoIncrement) => {
                    self.advance();
                    column.auto_increment = true;
                }
                TokenType::Keyword(Keyword::Unique) => {
                    self.advance();
                    self.match_keyword(Keyword::Key);
                    column.unique = true;
                }
                TokenType::Keyword(Keyword::Default) => {
                    self.advance();
                    column.default = Some(self.parse_unary()?);
                }
                TokenType::Keyword(Keyword::On) => {
                    self.advance();
                    self.expect_keyword(Keyword::Update)?;
                    column.on_update = Some(self.parse_unary()?);
                }
                TokenType::Keyword(Keyword::References) => {
                    column.references = Some(self.parse_references()?);
                }
                TokenType::Keyword(Keyword::Check) => {
                    self.advance();
                    self.expect(&TokenType::LParen, "'('")?;
                    column.check = Some(self.parse_expr()?);
                    self.expect(&TokenType::RParen, "')'")?;
                }
                TokenType::Keyword(Keyword::Comment) => {
                    self.advance();
                    column.comment = Some(self.parse_string()?);
                }
                TokenType::Keyword(Keyword::Collate) => {
                    self.advance();
                    column.collate = Some(self.parse_option_word()?);
                }
                TokenType::Keyword(Keyword::Character) => {
                    self.advance();
                    self.expect_keyword(Keyword::Set)?;
                    column.charset = Some(self.parse_option_word()?);
                }
                TokenType::Keyword(Keyword::Charset) => {
                    self.advance();
                    column.charset = Some(self.parse_option_word()?);
                }
                _ => break,
            }
        }

        Ok(column)
    }

    /// `NAME [(len[,scale]) | ('a','b')] [UNSIGNED] [ZEROFILL]`
    pub(super) fn parse_data_type(&mut self) -> Result<DataType> {
        let mut name = match &self.current().token_type {
            TokenType::Identifier(word) => word.to_ascii_uppercase(),
            TokenType::Keyword(_) => self.current().text.to_ascii_uppercase(),
            _ => return Err(self.error("data type")),
        };
        self.advance();

        // Two-word type names
        let two_word = (name == "DOUBLE" && self.check_word("PRECISION"))
            || (name == "CHARACTER" && self.check_word("VARYING"))
            || ((name == "SIGNED" || name == "UNSIGNED") && (self.check_word("INT") || self.check_word("INTEGER")));
        if two_word {
            name = format!("{} {}", name, self.current().text.to_ascii_uppercase());
            self.advance();
        }

        let mut data_type = DataType::named(name);

        if self.match_token(&TokenType::LParen) {
            if data_type.name == "ENUM" || data_type.name == "SET" {
                loop {
                    data_type.values.push(self.parse_string()?);
                    if !self.match_token(&TokenType::Comma) {
                        break;
                    }
                }
            } else {
                data_type.length = Some(self.parse_type_size()?);
                if self.match_token(&TokenType::Comma) {
                    data_type.scale = Some(self.parse_type_size()?);
                }
            }
            self.expect(&TokenType::RParen, "')'")?;
        }

        loop {
            if self.match_keyword(Keyword::Unsigned) {
                data_type.unsigned = true;
            } else if self.match_keyword(Keyword::Zerofill) {
                data_type.zerofill = true;
            } else if !self.match_word("SIGNED") {
                break;
            }
        }

        Ok(data_type)
    }

    fn parse_type_size(&mut self) -> Result<u32> {
        let value = self.parse_u64()?;
        u32::try_from(value).map_err(|_| self.error("type size"))
    }

    /// Option values: identifiers, keywords, numbers or strings taken as written
    fn parse_option_word(&mut self) -> Result<String> {
        let value = match &self.current().token_type {
            TokenType::Identifier(s) | TokenType::String(s) | TokenType::Number(s) => s.clone(),
            TokenType::Keyword(_) => self.current().text.clone(),
            _ => return Err(self.error("option value")),
        };
        self.advance();
        Ok(value)
    }

    /// `name [=] value` pairs following a table body
    fn parse_table_options(&mut self) -> Result<Vec<(String, String)>> {
        let mut options = Vec::new();

        loop {
            self.match_keyword(Keyword::Default);
            let name = match &self.current().token_type {
                TokenType::Keyword(Keyword::Character) => {
                    self.advance();
                    self.expect_keyword(Keyword::Set)?;
                    "CHARSET".to_string()
                }
                TokenType::Keyword(Keyword::Engine)
                | TokenType::Keyword(Keyword::AutoIncrement)
                | TokenType::Keyword(Keyword::Charset)
                | TokenType::Keyword(Keyword::Collate)
                | TokenType::Keyword(Keyword::Comment) => {
                    let name = self.current().text.to_ascii_uppercase();
                    self.advance();
                    name
                }
                TokenType::Identifier(word) if self.peek(1).token_type == TokenType::Eq => {
                    let name = word.to_ascii_uppercase();
                    self.advance();
                    name
                }
                _ => break,
            };
            self.match_token(&TokenType::Eq);
            let value = self.parse_option_word()?;
            options.push((name, value));
            self.match_token(&TokenType::Comma);
        }

        Ok(options)
    }

    fn parse_create_database(&mut self) -> Result<CreateDatabaseStmt> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_identifier()?;
        let options = self.parse_table_options()?;
        Ok(CreateDatabaseStmt {
            name,
            if_not_exists,
            options,
        })
    }

    fn parse_create_index(&mut self, kind: IndexKind) -> Result<CreateIndexStmt> {
        let name = self.parse_identifier()?;
        if self.match_keyword(Keyword::Using) {
            self.parse_identifier()?;
        }
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;
        let columns = self.parse_index_columns()?;
        if self.match_keyword(Keyword::Using) {
            self.parse_identifier()?;
        }
        Ok(CreateIndexStmt {
            name,
            table,
            columns,
            kind,
        })
    }

    fn parse_create_view(&mut self, or_replace: bool) -> Result<CreateViewStmt> {
        let name = self.parse_object_name()?;
        let columns = if self.check(&TokenType::LParen) {
            self.parse_paren_identifier_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::As)?;
        let query = self.parse_query()?;

        // WITH [CASCADED | LOCAL] CHECK OPTION
        if self.match_keyword(Keyword::With) {
            if !self.match_word("CASCADED") {
                self.match_word("LOCAL");
            }
            self.expect_keyword(Keyword::Check)?;
            self.expect_keyword(Keyword::Option)?;
        }

        Ok(CreateViewStmt {
            name,
            or_replace,
            columns,
            query: Box::new(query),
        })
    }

    fn parse_create_trigger(&mut self) -> Result<CreateTriggerStmt> {
        let name = self.parse_object_name()?;

        let timing = if self.match_keyword(Keyword::Before) {
            TriggerTiming::Before
        } else if self.match_keyword(Keyword::After) {
            TriggerTiming::After
        } else if self.match_keyword(Keyword::Instead) {
            self.expect_keyword(Keyword::Of)?;
            TriggerTiming::InsteadOf
        } else {
            return Err(self.error("BEFORE, AFTER or INSTEAD OF"));
        };

        let event = if self.match_keyword(Keyword::Insert) {
            TriggerEvent::Insert
        } else if self.match_keyword(Keyword::Update) {
            TriggerEvent::Update
        } else if self.match_keyword(Keyword::Delete) {
            TriggerEvent::Delete
        } else {
            return Err(self.error("INSERT, UPDATE or DELETE"));
        };

        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;

        let for_each_row = if self.match_keyword(Keyword::For) {
            self.expect_keyword(Keyword::Each)?;
            self.expect_keyword(Keyword::Row)?;
            true
        } else {
            false
        };

        let body = self.capture_body()?;

        Ok(CreateTriggerStmt {
            name,
            timing,
            event,
            table,
            for_each_row,
            body,
        })
    }

    fn parse_create_routine(&mut self, is_function: bool) -> Result<CreateRoutineStmt> {
        let name = self.parse_object_name()?;

        self.expect(&TokenType::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&TokenType::RParen) {
            loop {
                let mode = if self.match_keyword(Keyword::Inout) {
                    ParamMode::InOut
                } else if self.match_keyword(Keyword::Out) {
                    ParamMode::Out
                } else {
                    self.match_keyword(Keyword::In);
                    ParamMode::In
                };
                let name = self.parse_identifier()?;
                let data_type = self.parse_data_type()?;
                params.push(RoutineParam { mode, name, data_type });
                if !self.match_token(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenType::RParen, "')'")?;

        let returns = if is_function {
            self.expect_keyword(Keyword::Returns)?;
            Some(self.parse_data_type()?)
        } else {
            None
        };

        let characteristics = self.parse_routine_characteristics()?;
        let body = self.capture_body()?;

        Ok(CreateRoutineStmt {
            name,
            params,
            returns,
            characteristics,
            body,
        })
    }

    fn parse_routine_characteristics(&mut self) -> Result<Vec<String>> {
        let mut characteristics = Vec::new();

        loop {
            let characteristic = if self.match_keyword(Keyword::Deterministic) {
                "DETERMINISTIC".to_string()
            } else if self.check_keyword(Keyword::Not) && self.peek(1).is_keyword(Keyword::Deterministic) {
                self.advance();
                self.advance();
                "NOT DETERMINISTIC".to_string()
            } else if self.match_keyword(Keyword::Language) {
                format!("LANGUAGE {}", self.parse_option_word()?.to_ascii_uppercase())
            } else if self.match_keyword(Keyword::Comment) {
                format!("COMMENT '{}'", self.parse_string()?)
            } else if self.check_word("CONTAINS") || self.check_word("READS") || self.check_word("MODIFIES") {
                // CONTAINS SQL / READS SQL DATA / MODIFIES SQL DATA
                let mut words = vec![self.current().text.to_ascii_uppercase()];
                self.advance();
                if self.check_word("SQL") {
                    words.push("SQL".to_string());
                    self.advance();
                }
                if self.match_keyword(Keyword::Data) {
                    words.push("DATA".to_string());
                }
                words.join(" ")
            } else if self.check_keyword(Keyword::No)
                && matches!(&self.peek(1).token_type, TokenType::Identifier(w) if w.eq_ignore_ascii_case("SQL")) {
                self.advance();
                self.advance();
                "NO SQL".to_string()
            } else if self.match_word("SQL") {
                // SQL SECURITY { DEFINER | INVOKER }
                if !self.match_word("SECURITY") {
                    return Err(self.error("SECURITY"));
                }
                format!("SQL SECURITY {}", self.parse_option_word()?.to_ascii_uppercase())
            } else {
                break;
            };
            characteristics.push(characteristic);
        }

        Ok(characteristics)
    }

    /// Capture a routine / trigger body as verbatim source text: a balanced
    /// BEGIN ... END block, or a single statement up to the next `;`.
    fn capture_body(&mut self) -> Result<String> {
        let start = self.position;

        // Optional `label:` before BEGIN
        if matches!(self.current().token_type, TokenType::Identifier(_)) && self.peek(1).token_type == TokenType::Colon {
            self.advance();
            self.advance();
        }

        if self.check_keyword(Keyword::Begin) {
            let mut depth = 0usize;
            loop {
                match self.current().token_type {
                    TokenType::Eof => return Err(self.error("END")),
                    TokenType::Keyword(Keyword::Begin) | TokenType::Keyword(Keyword::Case) => depth += 1,
                    TokenType::Keyword(Keyword::End) => {
                        let closes_block = !(self.peek(1).is_keyword(Keyword::If)
                            || matches!(&self.peek(1).token_type, TokenType::Identifier(word)
                                if ["LOOP", "WHILE", "REPEAT"].iter().any(|w| word.eq_ignore_ascii_case(w))));
                        if closes_block {
                            depth = depth.saturating_sub(1);
                            if depth == 0 {
                                self.advance();
                                // Trailing label after END
                                if matches!(self.current().token_type, TokenType::Identifier(_)) {
                                    self.advance();
                                }
                                break;
                            }
                        }
                    }
                    _ => {}
                }
                self.advance();
            }
        } else {
            while !self.is_eof() && !self.check(&TokenType::Semicolon) {
                self.advance();
            }
        }

        if self.position == start {
            return Err(self.error("routine body"));
        }
        Ok(self.source_text(start, self.position))
    }

    /// Verbatim text of tokens `start..end`: sliced from the source when
    /// available, otherwise rebuilt from token texts and their offsets
    fn source_text(&self, start: usize, end: usize) -> String {
        let first = &self.tokens[start];
        let last = &self.tokens[end - 1];
        if let Some(text) = self
            .source
            .as_deref()
            .and_then(|source| source.get(first.offset..last.end_offset()))
        {
            return text.to_string();
        }

        let mut text = String::new();
        let mut previous_end: Option<usize> = None;
        for token in &self.tokens[start..end] {
            if let Some(prev) = previous_end {
                if token.offset > prev {
                    text.push(' ');
                }
            }
            text.push_str(&token.text);
            previous_end = Some(token.end_offset());
        }
        text
    }

    pub(super) fn parse_drop(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Drop)?;
        self.match_keyword(Keyword::Temporary);

        let object_type = match self.current().token_type {
            TokenType::Keyword(Keyword::Table) | TokenType::Keyword(Keyword::Tables) => ObjectType::Table,
            TokenType::Keyword(Keyword::Database) | TokenType::Keyword(Keyword::Schema) => ObjectType::Database,
            TokenType::Keyword(Keyword::Index) => ObjectType::Index,
            TokenType::Keyword(Keyword::View) => ObjectType::View,
            TokenType::Keyword(Keyword::Trigger) => ObjectType::Trigger,
            TokenType::Keyword(Keyword::Procedure) => ObjectType::Procedure,
            TokenType::Keyword(Keyword::Function) => ObjectType::Function,
            TokenType::Keyword(Keyword::User) => ObjectType::User,
            TokenType::Keyword(Keyword::Role) => ObjectType::Role,
            _ => return Err(self.error("TABLE, DATABASE, INDEX, VIEW, TRIGGER, PROCEDURE, FUNCTION, USER or ROLE")),
        };
        self.advance();

        let if_exists = self.parse_if_exists()?;

        let mut names = Vec::new();
        loop {
            let name = match object_type {
                ObjectType::User | ObjectType::Role => ObjectName::new(self.parse_user_name()?),
                _ => self.parse_object_name()?,
            };
            names.push(name);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        let on_table = if object_type == ObjectType::Index && self.match_keyword(Keyword::On) {
            Some(self.parse_object_name()?)
        } else {
            None
        };

        let cascade = if self.match_keyword(Keyword::Cascade) {
            true
        } else {
            self.match_keyword(Keyword::Restrict);
            false
        };

        Ok(Statement::Drop(DropStmt {
            object_type,
            if_exists,
            names,
            on_table,
            cascade,
        }))
    }

    pub(super) fn parse_alter_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.parse_object_name()?;

        let mut actions = Vec::new();
        loop {
            actions.push(self.parse_alter_action()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        Ok(Statement::AlterTable(AlterTableStmt { table, actions }))
    }

    fn parse_alter_action(&mut self) -> Result<AlterAction> {
        match self.current().token_type {
            TokenType::Keyword(Keyword::Add) => {
                self.advance();
                self.parse_alter_add()
            }
            TokenType::Keyword(Keyword::Drop) => {
                self.advance();
                self.parse_alter_drop()
            }
            TokenType::Keyword(Keyword::Modify) => {
                self.advance();
                self.match_keyword(Keyword::Column);
                let column = self.parse_column_def()?;
                let position = self.parse_column_position()?;
                Ok(AlterAction::ModifyColumn { column, position })
            }
            TokenType::Keyword(Keyword::Change) => {
                self.advance();
                self.match_keyword(Keyword::Column);
                let old_name = self.parse_identifier()?;
                let column = self.parse_column_def()?;
                let position = self.parse_column_position()?;
                Ok(AlterAction::ChangeColumn {
                    old_name,
                    column,
                    position,
                })
            }
            TokenType::Keyword(Keyword::Rename) => {
                self.advance();
                if self.match_keyword(Keyword::Column) {
                    let old_name = self.parse_identifier()?;
                    self.expect_keyword(Keyword::To)?;
                    let new_name = self.parse_identifier()?;
                    return Ok(AlterAction::RenameColumn { old_name, new_name });
                }
                if !self.match_keyword(Keyword::To) {
                    self.match_keyword(Keyword::As);
                }
                Ok(AlterAction::RenameTable {
                    new_name: self.parse_object_name()?,
                })
            }
            _ => Err(self.error("ADD, DROP, MODIFY, CHANGE or RENAME")),
        }
    }

    fn parse_alter_add(&mut self) -> Result<AlterAction> {
        match self.current().token_type {
            TokenType::Keyword(Keyword::Column) => {
                self.advance();
                let column = self.parse_column_def()?;
                let position = self.parse_column_position()?;
                Ok(AlterAction::AddColumn { column, position })
            }
            TokenType::Keyword(Keyword::Index)
            | TokenType::Keyword(Keyword::Key)
            | TokenType::Keyword(Keyword::Fulltext)
            | TokenType::Keyword(Keyword::Spatial) => match self.parse_table_constraint()? {
                TableConstraint::Index { name, columns, kind } => Ok(AlterAction::AddIndex { name, columns, kind }),
                other => Ok(AlterAction::AddConstraint(other)),
            },
            TokenType::Keyword(Keyword::Constraint)
            | TokenType::Keyword(Keyword::Primary)
            | TokenType::Keyword(Keyword::Unique)
            | TokenType::Keyword(Keyword::Foreign)
            | TokenType::Keyword(Keyword::Check) => Ok(AlterAction::AddConstraint(self.parse_table_constraint()?)),
            TokenType::Keyword(Keyword::Partition) => {
                self.advance();
                self.expect(&TokenType::LParen, "'('")?;
                self.expect_keyword(Keyword::Partition)?;
                let name = self.parse_identifier()?;
                let values = if self.match_keyword(Keyword::Values) {
                    self.expect_keyword(Keyword::Less)?;
                    self.expect_keyword(Keyword::Than)?;
                    if self.match_keyword(Keyword::Maxvalue) {
                        Some(Expr::Identifier("MAXVALUE".to_string()))
                    } else {
                        self.expect(&TokenType::LParen, "'('")?;
                        let bound = if self.match_keyword(Keyword::Maxvalue) {
                            Expr::Identifier("MAXVALUE".to_string())
                        } else {
                            self.parse_expr()?
                        };
                        self.expect(&TokenType::RParen, "')'")?;
                        Some(bound)
                    }
                } else {
                    None
                };
                self.expect(&TokenType::RParen, "')'")?;
                Ok(AlterAction::AddPartition { name, values })
            }
            _ => {
                let column = self.parse_column_def()?;
                let position = self.parse_column_position()?;
                Ok(AlterAction::AddColumn { column, position })
            }
        }
    }

    fn parse_alter_drop(&mut self) -> Result<AlterAction> {
        match self.current().token_type {
            TokenType::Keyword(Keyword::Column) => {
                self.advance();
                Ok(AlterAction::DropColumn {
                    name: self.parse_identifier()?,
                })
            }
            TokenType::Keyword(Keyword::Index) | TokenType::Keyword(Keyword::Key) => {
                self.advance();
                Ok(AlterAction::DropIndex {
                    name: self.parse_identifier()?,
                })
            }
            TokenType::Keyword(Keyword::Primary) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                Ok(AlterAction::DropConstraint {
                    name: None,
                    kind: ConstraintKind::PrimaryKey,
                })
            }
            TokenType::Keyword(Keyword::Foreign) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                Ok(AlterAction::DropConstraint {
                    name: Some(self.parse_identifier()?),
                    kind: ConstraintKind::ForeignKey,
                })
            }
            TokenType::Keyword(Keyword::Check) => {
                self.advance();
                Ok(AlterAction::DropConstraint {
                    name: Some(self.parse_identifier()?),
                    kind: ConstraintKind::Check,
                })
            }
            TokenType::Keyword(Keyword::Constraint) => {
                self.advance();
                Ok(AlterAction::DropConstraint {
                    name: Some(self.parse_identifier()?),
                    kind: ConstraintKind::Named,
                })
            }
            TokenType::Keyword(Keyword::Partition) => {
                self.advance();
                // `p1, p2` ends where the next action keyword starts
                let mut names = vec![self.parse_identifier()?];
                while self.check(&TokenType::Comma) && matches!(self.peek(1).token_type, TokenType::Identifier(_)) {
                    self.advance();
                    names.push(self.parse_identifier()?);
                }
                Ok(AlterAction::DropPartition { names })
            }
            _ => Ok(AlterAction::DropColumn {
                name: self.parse_identifier()?,
            }),
        }
    }

    fn parse_column_position(&mut self) -> Result<Option<ColumnPosition>> {
        if self.match_keyword(Keyword::First) {
            Ok(Some(ColumnPosition::First))
        } else if self.match_keyword(Keyword::After) {
            Ok(Some(ColumnPosition::After(self.parse_identifier()?)))
        } else {
            Ok(None)
        }
    }

    pub(super) fn parse_truncate(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Truncate)?;
        self.match_keyword(Keyword::Table);
        Ok(Statement::Truncate(self.parse_object_name()?))
    }
}

#[cfg(test)]
mod tests {
    use crate::sql::ast::*;
    use crate::sql::parse;

    fn parse_sql(sql: &str) -> Statement {
        parse(sql).unwrap().statements.remove(0)
    }

    #[test]
    fn test_parse_create_table() {
        match parse_sql("CREATE TABLE users (id INTEGER, name TEXT)") {
            Statement::CreateTable(c) => {
                assert_eq!(c.table.name, "users");
                assert_eq!(c.columns.len(), 2);
            }
            _ => panic!("Expected CREATE TABLE statement"),
        }
    }

    #[test]
    fn test_column_modifiers_in_any_order() {
        let sql = "CREATE TABLE IF NOT EXISTS shop.orders (
            id BIGINT UNSIGNED AUTO_INCREMENT NOT NULL PRIMARY KEY COMMENT 'pk',
            total DECIMAL(10, 2) DEFAULT 0 NOT NULL,
            status ENUM('new', 'paid') NULL DEFAULT 'new' COLLATE utf8mb4_bin,
            updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
            price DOUBLE PRECISION CHECK (price >= 0),
            user_id INT REFERENCES users(id) ON DELETE SET NULL ON UPDATE CASCADE,
            code CHAR(3) CHARACTER SET ascii UNIQUE KEY
        ) ENGINE = InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='orders' AUTO_INCREMENT=100";
        let Statement::CreateTable(c) = parse_sql(sql) else {
            panic!("Expected CREATE TABLE statement");
        };
        assert!(c.if_not_exists);
        assert_eq!(c.table.database.as_deref(), Some("shop"));
        assert_eq!(c.columns.len(), 7);

        let id = &c.columns[0];
        assert!(id.primary_key && id.auto_increment && id.data_type.unsigned);
        assert_eq!(id.nullable, Some(false));
        assert_eq!(id.comment.as_deref(), Some("pk"));

        let total = &c.columns[1];
        assert_eq!((total.data_type.length, total.data_type.scale), (Some(10), Some(2)));
        assert_eq!(total.nullable, Some(false));

        let status = &c.columns[2];
        assert_eq!(status.data_type.values, vec!["new".to_string(), "paid".to_string()]);
        assert_eq!(status.collate.as_deref(), Some("utf8mb4_bin"));

        assert!(matches!(&c.columns[3].on_update, Some(Expr::Function(f)) if f.name == "CURRENT_TIMESTAMP"));
        assert_eq!(c.columns[4].data_type.name, "DOUBLE PRECISION");
        assert!(c.columns[4].check.is_some());

        let fk = c.columns[5].references.as_ref().unwrap();
        assert_eq!(fk.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(fk.on_update, Some(ReferentialAction::Cascade));

        assert!(c.columns[6].unique);
        assert_eq!(c.columns[6].charset.as_deref(), Some("ascii"));

        assert_eq!(
            c.options,
            vec![
                ("ENGINE".to_string(), "InnoDB".to_string()),
                ("CHARSET".to_string(), "utf8mb4".to_string()),
                ("COMMENT".to_string(), "orders".to_string()),
                ("AUTO_INCREMENT".to_string(), "100".to_string()),
            ]
        );
    }

    #[test]
    fn test_table_constraints() {
        let sql = "CREATE TABLE t (
            a INT, b INT, `key` VARCHAR(10),
            CONSTRAINT pk PRIMARY KEY (a, b),
            UNIQUE KEY uq_b (b DESC),
            CONSTRAINT fk_b FOREIGN KEY (b) REFERENCES other (id) ON DELETE NO ACTION,
            CHECK (a > 0),
            INDEX idx_key (`key`(5)),
            FULLTEXT KEY ft (`key`)
        )";
        let Statement::CreateTable(c) = parse_sql(sql) else {
            panic!("Expected CREATE TABLE statement");
        };
        assert_eq!(c.columns.len(), 3);
        assert_eq!(c.constraints.len(), 6);
        assert!(matches!(&c.constraints[0], TableConstraint::PrimaryKey { columns, .. } if columns.len() == 2));
        assert!(matches!(&c.constraints[1], TableConstraint::Unique { name: Some(n), .. } if n == "uq_b"));
        assert!(matches!(&c.constraints[2], TableConstraint::ForeignKey { name: Some(n), references, .. }
            if n == "fk_b" && references.on_delete == Some(ReferentialAction::NoAction)));
        assert!(matches!(&c.constraints[3], TableConstraint::Check { .. }));
        assert!(matches!(&c.constraints[4], TableConstraint::Index { kind: IndexKind::Plain, .. }));
        assert!(matches!(&c.constraints[5], TableConstraint::Index { kind: IndexKind::Fulltext, .. }));
    }

    #[test]
    fn test_bare_key_ends_column_definition() {
        let Statement::CreateTable(c) = parse_sql("CREATE TABLE t (a INT KEY idx_a (a), b INT)") else {
            panic!("Expected CREATE TABLE statement");
        };
        assert_eq!(c.columns.len(), 2);
        assert!(!c.columns[0].primary_key);
        assert!(matches!(&c.constraints[0], TableConstraint::Index { name: Some(n), .. } if n == "idx_a"));
    }

    #[test]
    fn test_create_table_like_and_as_select() {
        assert!(matches!(parse_sql("CREATE TABLE t2 LIKE t1"), Statement::CreateTable(c) if c.like.is_some()));
        assert!(matches!(parse_sql("CREATE TABLE t2 (LIKE t1)"), Statement::CreateTable(c) if c.like.is_some()));
        assert!(matches!(
            parse_sql("CREATE TABLE t2 AS SELECT * FROM t1"),
            Statement::CreateTable(c) if c.as_select.is_some() && c.columns.is_empty()
        ));
    }

    #[test]
    fn test_create_misc_objects() {
        assert!(matches!(
            parse_sql("CREATE DATABASE IF NOT EXISTS shop CHARACTER SET utf8mb4"),
            Statement::CreateDatabase(d) if d.if_not_exists && d.name == "shop" && d.options.len() == 1
        ));
        assert!(matches!(parse_sql("CREATE SCHEMA s"), Statement::CreateDatabase(_)));
        assert!(matches!(
            parse_sql("CREATE UNIQUE INDEX idx ON t (a, b)"),
            Statement::CreateIndex(i) if i.kind == IndexKind::Unique && i.columns.len() == 2
        ));
        assert!(matches!(
            parse_sql("CREATE OR REPLACE VIEW v (x) AS SELECT a FROM t WITH CHECK OPTION"),
            Statement::CreateView(v) if v.or_replace && v.columns == vec!["x".to_string()]
        ));
    }

    #[test]
    fn test_trigger_body_is_verbatim() {
        let sql = "CREATE TRIGGER trg BEFORE INSERT ON t FOR EACH ROW BEGIN\n  IF NEW.a < 0 THEN SET NEW.a = 0; END IF;\n  SET @n = CASE WHEN NEW.a > 1 THEN 1 ELSE 0 END;\nEND; SELECT 1";
        let program = parse(sql).unwrap();
        assert_eq!(program.statements.len(), 2);
        match &program.statements[0] {
            Statement::CreateTrigger(t) => {
                assert_eq!(t.timing, TriggerTiming::Before);
                assert_eq!(t.event, TriggerEvent::Insert);
                assert!(t.for_each_row);
                assert!(t.body.starts_with("BEGIN\n  IF NEW.a < 0"));
                assert!(t.body.ends_with("ELSE 0 END;\nEND"));
            }
            other => panic!("Expected trigger, got {:?}", other),
        }
    }

    #[test]
    fn test_single_statement_trigger_body() {
        match parse_sql("CREATE TRIGGER t AFTER DELETE ON x FOR EACH ROW DELETE FROM y WHERE y.id = OLD.id") {
            Statement::CreateTrigger(t) => assert_eq!(t.body, "DELETE FROM y WHERE y.id = OLD.id"),
            other => panic!("Expected trigger, got {:?}", other),
        }
    }

    #[test]
    fn test_routines() {
        let sql = "CREATE PROCEDURE add_item(IN p_name VARCHAR(50), OUT p_id INT)
            MODIFIES SQL DATA
            BEGIN
              loop1: LOOP
                LEAVE loop1;
              END LOOP loop1;
              INSERT INTO items (name) VALUES (p_name);
            END";
        match parse_sql(sql) {
            Statement::CreateProcedure(p) => {
                assert_eq!(p.params.len(), 2);
                assert_eq!(p.params[1].mode, ParamMode::Out);
                assert_eq!(p.characteristics, vec!["MODIFIES SQL DATA".to_string()]);
                assert!(p.body.starts_with("BEGIN"));
                assert!(p.body.trim_end().ends_with("END"));
                assert!(p.body.contains("END LOOP loop1;"));
            }
            other => panic!("Expected procedure, got {:?}", other),
        }

        match parse_sql("CREATE FUNCTION twice(x INT) RETURNS INT DETERMINISTIC RETURN x * 2") {
            Statement::CreateFunction(f) => {
                assert_eq!(f.returns.as_ref().map(|t| t.name.as_str()), Some("INT"));
                assert_eq!(f.characteristics, vec!["DETERMINISTIC".to_string()]);
                assert_eq!(f.body, "RETURN x * 2");
            }
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_body_fails() {
        assert!(parse("CREATE PROCEDURE p() BEGIN SELECT 1;").is_err());
    }

    #[test]
    fn test_body_rebuilt_from_tokens_without_source() {
        let tokens = crate::sql::tokenize("CREATE FUNCTION f() RETURNS INT RETURN (1+2)").unwrap();
        match crate::sql::parse_statement(tokens).unwrap() {
            Statement::CreateFunction(f) => assert_eq!(f.body, "RETURN (1+2)"),
            other => panic!("Expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_statements() {
        match parse_sql("DROP TABLE IF EXISTS a, db.b CASCADE") {
            Statement::Drop(d) => {
                assert_eq!(d.object_type, ObjectType::Table);
                assert!(d.if_exists && d.cascade);
                assert_eq!(d.names.len(), 2);
            }
            other => panic!("Expected DROP, got {:?}", other),
        }
        assert!(matches!(parse_sql("DROP INDEX idx ON t"), Statement::Drop(d) if d.on_table.is_some()));
        assert!(matches!(parse_sql("DROP USER 'bob'@'localhost'"), Statement::Drop(d) if d.names[0].name == "bob@localhost"));
    }

    #[test]
    fn test_alter_table_actions() {
        let sql = "ALTER TABLE t ADD COLUMN c INT NOT NULL AFTER b, DROP COLUMN d, MODIFY e TEXT FIRST,
            CHANGE f g BIGINT, RENAME COLUMN h TO i, ADD INDEX idx (c), DROP INDEX old_idx,
            ADD CONSTRAINT fk FOREIGN KEY (c) REFERENCES o (id), DROP PRIMARY KEY, DROP FOREIGN KEY fk2,
            ADD PARTITION (PARTITION p3 VALUES LESS THAN (2030)), DROP PARTITION p1, p2, RENAME TO t2";
        let Statement::AlterTable(a) = parse_sql(sql) else {
            panic!("Expected ALTER TABLE");
        };
        assert_eq!(a.actions.len(), 13);
        assert!(matches!(&a.actions[0], AlterAction::AddColumn { position: Some(ColumnPosition::After(b)), .. } if b == "b"));
        assert!(matches!(&a.actions[1], AlterAction::DropColumn { name } if name == "d"));
        assert!(matches!(&a.actions[2], AlterAction::ModifyColumn { position: Some(ColumnPosition::First), .. }));
        assert!(matches!(&a.actions[3], AlterAction::ChangeColumn { old_name, column, .. } if old_name == "f" && column.name == "g"));
        assert!(matches!(&a.actions[4], AlterAction::RenameColumn { .. }));
        assert!(matches!(&a.actions[5], AlterAction::AddIndex { .. }));
        assert!(matches!(&a.actions[6], AlterAction::DropIndex { .. }));
        assert!(matches!(&a.actions[7], AlterAction::AddConstraint(TableConstraint::ForeignKey { .. })));
        assert!(matches!(&a.actions[8], AlterAction::DropConstraint { kind: ConstraintKind::PrimaryKey, .. }));
        assert!(matches!(&a.actions[9], AlterAction::DropConstraint { kind: ConstraintKind::ForeignKey, .. }));
        assert!(matches!(&a.actions[10], AlterAction::AddPartition { values: Some(_), .. }));
        assert!(matches!(&a.actions[11], AlterAction::DropPartition { names } if names.len() == 2));
        assert!(matches!(&a.actions[12], AlterAction::RenameTable { new_name } if new_name.name == "t2"));
    }

    #[test]
    fn test_truncate() {
        assert!(matches!(parse_sql("TRUNCATE TABLE logs"), Statement::Truncate(n) if n.name == "logs"));
        assert!(matches!(parse_sql("TRUNCATE logs"), Statement::Truncate(_)));
    }
}
