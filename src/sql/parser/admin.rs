/// Session, introspection, transaction and privilege statements
use super::Parser;
use crate::error::Result;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};

impl Parser {
    pub(super) fn parse_use(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Use)?;
        Ok(Statement::Use(self.parse_identifier()?))
    }

    pub(super) fn parse_show(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Show)?;

        let full = self.match_keyword(Keyword::Full);
        // Scope modifiers make no difference for an embedded engine
        if !self.match_word("GLOBAL") {
            self.match_word("SESSION");
        }

        let kind = match self.current().token_type {
            TokenType::Keyword(Keyword::Databases) | TokenType::Keyword(Keyword::Schema) => {
                self.advance();
                ShowKind::Databases
            }
            TokenType::Identifier(ref word) if word.eq_ignore_ascii_case("SCHEMAS") => {
                self.advance();
                ShowKind::Databases
            }
            TokenType::Keyword(Keyword::Tables) => {
                self.advance();
                ShowKind::Tables
            }
            TokenType::Keyword(Keyword::Columns) | TokenType::Keyword(Keyword::Fields) => {
                self.advance();
                ShowKind::Columns(self.parse_show_target()?)
            }
            TokenType::Keyword(Keyword::Index) | TokenType::Keyword(Keyword::Indexes) | TokenType::Keyword(Keyword::Keys) => {
                self.advance();
                ShowKind::Indexes(self.parse_show_target()?)
            }
            TokenType::Keyword(Keyword::Create) => {
                self.advance();
                if self.match_keyword(Keyword::Table) {
                    ShowKind::CreateTable(self.parse_object_name()?)
                } else if self.match_keyword(Keyword::View) {
                    ShowKind::CreateView(self.parse_object_name()?)
                } else {
                    return Err(self.error("TABLE or VIEW"));
                }
            }
            TokenType::Keyword(Keyword::Table) => {
                self.advance();
                self.expect_keyword(Keyword::Status)?;
                ShowKind::TableStatus
            }
            TokenType::Keyword(Keyword::Status) => {
                self.advance();
                ShowKind::Status
            }
            TokenType::Keyword(Keyword::Variables) => {
                self.advance();
                ShowKind::Variables
            }
            TokenType::Keyword(Keyword::Processlist) => {
                self.advance();
                ShowKind::Processlist
            }
            TokenType::Keyword(Keyword::Warnings) => {
                self.advance();
                ShowKind::Warnings
            }
            TokenType::Keyword(Keyword::Errors) => {
                self.advance();
                ShowKind::Errors
            }
            TokenType::Keyword(Keyword::Triggers) => {
                self.advance();
                ShowKind::Triggers
            }
            TokenType::Keyword(Keyword::Grants) => {
                self.advance();
                let user = if self.match_keyword(Keyword::For) {
                    Some(self.parse_user_name()?)
                } else {
                    None
                };
                ShowKind::Grants(user)
            }
            TokenType::Identifier(_) | TokenType::Keyword(_) => {
                // ENGINES, CHARSET, COLLATION, PLUGINS ...
                let mut words = Vec::new();
                while !self.is_eof()
                    && !self.check(&TokenType::Semicolon)
                    && !self.check_keyword(Keyword::Like)
                    && !self.check_keyword(Keyword::Where)
                {
                    words.push(self.current().text.to_ascii_uppercase());
                    self.advance();
                }
                ShowKind::Other(words.join(" "))
            }
            _ => return Err(self.error("SHOW target")),
        };

        let database = if self.match_keyword(Keyword::From) || self.match_keyword(Keyword::In) {
            Some(self.parse_identifier()?)
        } else {
            None
        };

        let mut like = None;
        let mut where_clause = None;
        if self.match_keyword(Keyword::Like) {
            like = Some(self.parse_string()?);
        } else if self.match_keyword(Keyword::Where) {
            where_clause = Some(self.parse_expr()?);
        }

        Ok(Statement::Show(ShowStmt {
            kind,
            database,
            like,
            where_clause,
            full,
        }))
    }

    /// `FROM tbl [FROM db]` after SHOW COLUMNS / SHOW INDEX
    fn parse_show_target(&mut self) -> Result<ObjectName> {
        if !self.match_keyword(Keyword::From) {
            self.expect_keyword(Keyword::In)?;
        }
        let mut name = self.parse_object_name()?;
        if self.check_keyword(Keyword::From) || self.check_keyword(Keyword::In) {
            self.advance();
            name.database = Some(self.parse_identifier()?);
        }
        Ok(name)
    }

    pub(super) fn parse_describe(&mut self) -> Result<Statement> {
        self.advance();
        let name = self.parse_object_name()?;
        // DESCRIBE t col
        if matches!(self.current().token_type, TokenType::Identifier(_)) {
            self.advance();
        }
        Ok(Statement::Describe(name))
    }

    /// `EXPLAIN tbl` is DESCRIBE; otherwise the wrapped statement is parsed
    pub(super) fn parse_explain(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Explain)?;

        if matches!(self.current().token_type, TokenType::Identifier(_)) {
            return Ok(Statement::Describe(self.parse_object_name()?));
        }

        if self.match_keyword(Keyword::Format) {
            self.expect(&TokenType::Eq, "'='")?;
            self.parse_identifier()?;
        } else if !self.match_keyword(Keyword::Extended) {
            self.match_keyword(Keyword::Analyze);
        }

        let inner = self.parse_statement()?;
        Ok(Statement::Explain(Box::new(inner)))
    }

    pub(super) fn parse_transaction(&mut self) -> Result<Statement> {
        let stmt = match self.current().token_type {
            TokenType::Keyword(Keyword::Begin) => {
                self.advance();
                self.match_keyword(Keyword::Work);
                TransactionStmt::Begin
            }
            TokenType::Keyword(Keyword::Start) => {
                self.advance();
                self.expect_keyword(Keyword::Transaction)?;
                TransactionStmt::Begin
            }
            TokenType::Keyword(Keyword::Commit) => {
                self.advance();
                self.match_keyword(Keyword::Work);
                TransactionStmt::Commit
            }
            TokenType::Keyword(Keyword::Rollback) => {
                self.advance();
                self.match_keyword(Keyword::Work);
                if self.match_keyword(Keyword::To) {
                    self.match_keyword(Keyword::Savepoint);
                    TransactionStmt::RollbackTo(self.parse_identifier()?)
                } else {
                    TransactionStmt::Rollback
                }
            }
            TokenType::Keyword(Keyword::Savepoint) => {
                self.advance();
                TransactionStmt::Savepoint(self.parse_identifier()?)
            }
            TokenType::Keyword(Keyword::Release) => {
                self.advance();
                self.expect_keyword(Keyword::Savepoint)?;
                TransactionStmt::Release(self.parse_identifier()?)
            }
            _ => return Err(self.error("transaction statement")),
        };
        Ok(Statement::Transaction(stmt))
    }

    pub(super) fn parse_grant(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Grant)?;
        let (privileges, on) = self.parse_privileges_on()?;
        self.expect_keyword(Keyword::To)?;
        let users = self.parse_user_list()?;

        let with_grant_option = if self.match_keyword(Keyword::With) {
            self.expect_keyword(Keyword::Grant)?;
            self.expect_keyword(Keyword::Option)?;
            true
        } else {
            false
        };

        Ok(Statement::Grant(GrantStmt {
            privileges,
            on,
            users,
            with_grant_option,
        }))
    }

    pub(super) fn parse_revoke(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Revoke)?;
        let (privileges, on) = self.parse_privileges_on()?;
        self.expect_keyword(Keyword::From)?;
        let users = self.parse_user_list()?;

        Ok(Statement::Revoke(GrantStmt {
            privileges,
            on,
            users,
            with_grant_option: false,
        }))
    }

    /// `priv [(cols)], ... ON [TABLE] target`
    fn parse_privileges_on(&mut self) -> Result<(Vec<String>, String)> {
        let mut privileges = Vec::new();
        loop {
            let mut words = Vec::new();
            while matches!(self.current().token_type, TokenType::Keyword(_) | TokenType::Identifier(_))
                && !self.check_keyword(Keyword::On)
            {
                words.push(self.current().text.to_ascii_uppercase());
                self.advance();
            }
            if words.is_empty() {
                return Err(self.error("privilege"));
            }
            // Column-level privileges: the column list is accepted and not kept
            if self.check(&TokenType::LParen) {
                self.parse_paren_identifier_list()?;
            }
            privileges.push(words.join(" "));
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.expect_keyword(Keyword::On)?;
        self.match_keyword(Keyword::Table);

        let mut on = String::new();
        loop {
            if self.match_token(&TokenType::Star) {
                on.push('*');
            } else {
                on.push_str(&self.parse_qualified_part()?);
            }
            if !self.match_token(&TokenType::Dot) {
                break;
            }
            on.push('.');
        }

        Ok((privileges, on))
    }

    fn parse_user_list(&mut self) -> Result<Vec<String>> {
        let mut users = Vec::new();
        loop {
            users.push(self.parse_user_name()?);
            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }
        Ok(users)
    }

    /// `name`, `'name'` or `'name'@'host'`, flattened to `name@host`
    pub(super) fn parse_user_name(&mut self) -> Result<String> {
        let mut user = self.parse_user_part()?;
        if self.match_token(&TokenType::At) {
            user.push('@');
            user.push_str(&self.parse_user_part()?);
        }
        Ok(user)
    }

    fn parse_user_part(&mut self) -> Result<String> {
        if let TokenType::String(s) = &self.current().token_type {
            let s = s.clone();
            self.advance();
            return Ok(s);
        }
        self.parse_identifier()
    }

    pub(super) fn parse_create_user(&mut self) -> Result<Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let user = self.parse_user_name()?;
        let password = if self.match_keyword(Keyword::Identified) {
            self.expect_keyword(Keyword::By)?;
            Some(self.parse_string()?)
        } else {
            None
        };
        Ok(Statement::CreateUser(CreateUserStmt {
            user,
            if_not_exists,
            password,
        }))
    }

    pub(super) fn parse_create_role(&mut self) -> Result<Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let names = self.parse_user_list()?;
        Ok(Statement::CreateRole(CreateRoleStmt { names, if_not_exists }))
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
    fn test_use_and_describe() {
        assert_eq!(parse_sql("USE shop"), Statement::Use("shop".to_string()));
        assert_eq!(parse_sql("DESCRIBE shop.users"), Statement::Describe(ObjectName {
            database: Some("shop".to_string()),
            name: "users".to_string(),
        }));
        assert!(matches!(parse_sql("DESC users"), Statement::Describe(_)));
        assert!(matches!(parse_sql("EXPLAIN users"), Statement::Describe(_)));
    }

    #[test]
    fn test_explain_wraps_statement() {
        match parse_sql("EXPLAIN SELECT * FROM t WHERE a = 1") {
            Statement::Explain(inner) => assert!(matches!(*inner, Statement::Select(_))),
            other => panic!("Expected EXPLAIN, got {:?}", other),
        }
        assert!(matches!(parse_sql("EXPLAIN FORMAT=JSON DELETE FROM t"), Statement::Explain(_)));
    }

    #[test]
    fn test_show_variants() {
        let cases = [
            ("SHOW DATABASES", ShowKind::Databases),
            ("SHOW SCHEMAS", ShowKind::Databases),
            ("SHOW TABLES", ShowKind::Tables),
            ("SHOW COLUMNS FROM users", ShowKind::Columns(ObjectName::new("users"))),
            ("SHOW INDEX FROM users", ShowKind::Indexes(ObjectName::new("users"))),
            ("SHOW CREATE TABLE users", ShowKind::CreateTable(ObjectName::new("users"))),
            ("SHOW TABLE STATUS", ShowKind::TableStatus),
            ("SHOW GLOBAL VARIABLES", ShowKind::Variables),
            ("SHOW FULL PROCESSLIST", ShowKind::Processlist),
            ("SHOW WARNINGS", ShowKind::Warnings),
            ("SHOW GRANTS FOR 'app'@'%'", ShowKind::Grants(Some("app@%".to_string()))),
            ("SHOW ENGINES", ShowKind::Other("ENGINES".to_string())),
        ];
        for (sql, expected) in cases {
            match parse_sql(sql) {
                Statement::Show(s) => assert_eq!(s.kind, expected, "{}", sql),
                other => panic!("Expected SHOW for {}, got {:?}", sql, other),
            }
        }
    }

    #[test]
    fn test_show_filters() {
        match parse_sql("SHOW FULL TABLES FROM shop LIKE 'user%'") {
            Statement::Show(s) => {
                assert!(s.full);
                assert_eq!(s.database.as_deref(), Some("shop"));
                assert_eq!(s.like.as_deref(), Some("user%"));
            }
            other => panic!("Expected SHOW, got {:?}", other),
        }
        match parse_sql("SHOW COLUMNS FROM users FROM shop WHERE Field = 'id'") {
            Statement::Show(s) => {
                assert_eq!(
                    s.kind,
                    ShowKind::Columns(ObjectName {
                        database: Some("shop".to_string()),
                        name: "users".to_string()
                    })
                );
                assert!(s.where_clause.is_some());
            }
            other => panic!("Expected SHOW, got {:?}", other),
        }
    }

    #[test]
    fn test_transactions() {
        let program = parse(
            "BEGIN; START TRANSACTION; SAVEPOINT sp1; ROLLBACK TO SAVEPOINT sp1; RELEASE SAVEPOINT sp1; COMMIT; ROLLBACK",
        )
        .unwrap();
        let expected = vec![
            TransactionStmt::Begin,
            TransactionStmt::Begin,
            TransactionStmt::Savepoint("sp1".to_string()),
            TransactionStmt::RollbackTo("sp1".to_string()),
            TransactionStmt::Release("sp1".to_string()),
            TransactionStmt::Commit,
            TransactionStmt::Rollback,
        ];
        let actual: Vec<_> = program
            .statements
            .into_iter()
            .map(|s| match s {
                Statement::Transaction(t) => t,
                other => panic!("Expected transaction, got {:?}", other),
            })
            .collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_grant_and_revoke() {
        match parse_sql("GRANT SELECT, INSERT (name), ALL PRIVILEGES ON shop.* TO 'app'@'localhost', ops WITH GRANT OPTION") {
            Statement::Grant(g) => {
                assert_eq!(g.privileges, vec!["SELECT", "INSERT", "ALL PRIVILEGES"]);
                assert_eq!(g.on, "shop.*");
                assert_eq!(g.users, vec!["app@localhost".to_string(), "ops".to_string()]);
                assert!(g.with_grant_option);
            }
            other => panic!("Expected GRANT, got {:?}", other),
        }
        match parse_sql("REVOKE UPDATE ON *.* FROM app") {
            Statement::Revoke(g) => {
                assert_eq!(g.on, "*.*");
                assert!(!g.with_grant_option);
            }
            other => panic!("Expected REVOKE, got {:?}", other),
        }
    }

    #[test]
    fn test_create_user_and_role() {
        match parse_sql("CREATE USER IF NOT EXISTS 'app'@'%' IDENTIFIED BY 's3cret'") {
            Statement::CreateUser(u) => {
                assert_eq!(u.user, "app@%");
                assert!(u.if_not_exists);
                assert_eq!(u.password.as_deref(), Some("s3cret"));
            }
            other => panic!("Expected CREATE USER, got {:?}", other),
        }
        assert!(matches!(
            parse_sql("CREATE ROLE reader, writer"),
            Statement::CreateRole(r) if r.names.len() == 2
        ));
    }
}
