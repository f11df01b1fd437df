/// Token types for the SQL tokenizer

macro_rules! keywords {
    ($($variant:ident => $text:tt),* $(,)?) => {
        /// One variant per reserved or contextual SQL keyword
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            /// Canonical upper-case spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text),*
                }
            }
        }

        // Perfect hash map for O(1) keyword lookup
        static KEYWORDS: phf::Map<&'static str, Keyword> = phf::phf_map! {
            $($text => Keyword::$variant),*
        };
    };
}

keywords! {
    Action => "ACTION",
    Add => "ADD",
    After => "AFTER",
    Against => "AGAINST",
    All => "ALL",
    Alter => "ALTER",
    Analyze => "ANALYZE",
    And => "AND",
    As => "AS",
    Asc => "ASC",
    AutoIncrement => "AUTO_INCREMENT",
    Avg => "AVG",
    Before => "BEFORE",
    Begin => "BEGIN",
    Between => "BETWEEN",
    Boolean => "BOOLEAN",
    By => "BY",
    Cascade => "CASCADE",
    Case => "CASE",
    Cast => "CAST",
    Change => "CHANGE",
    Character => "CHARACTER",
    Charset => "CHARSET",
    Check => "CHECK",
    Collate => "COLLATE",
    Column => "COLUMN",
    Columns => "COLUMNS",
    Comment => "COMMENT",
    Commit => "COMMIT",
    Concat => "CONCAT",
    Constraint => "CONSTRAINT",
    Convert => "CONVERT",
    Count => "COUNT",
    Create => "CREATE",
    Cross => "CROSS",
    Current => "CURRENT",
    Data => "DATA",
    Database => "DATABASE",
    Databases => "DATABASES",
    Date => "DATE",
    Datetime => "DATETIME",
    Day => "DAY",
    Default => "DEFAULT",
    Delete => "DELETE",
    Desc => "DESC",
    Describe => "DESCRIBE",
    Deterministic => "DETERMINISTIC",
    Distinct => "DISTINCT",
    Div => "DIV",
    Drop => "DROP",
    Duplicate => "DUPLICATE",
    Each => "EACH",
    Else => "ELSE",
    End => "END",
    Engine => "ENGINE",
    Enum => "ENUM",
    Errors => "ERRORS",
    Escape => "ESCAPE",
    Except => "EXCEPT",
    Exists => "EXISTS",
    Expansion => "EXPANSION",
    Explain => "EXPLAIN",
    Extended => "EXTENDED",
    False => "FALSE",
    Fields => "FIELDS",
    First => "FIRST",
    Following => "FOLLOWING",
    For => "FOR",
    Foreign => "FOREIGN",
    Format => "FORMAT",
    From => "FROM",
    Full => "FULL",
    Fulltext => "FULLTEXT",
    Function => "FUNCTION",
    Grant => "GRANT",
    Grants => "GRANTS",
    Group => "GROUP",
    Groups => "GROUPS",
    Having => "HAVING",
    Hour => "HOUR",
    Identified => "IDENTIFIED",
    If => "IF",
    Ignore => "IGNORE",
    In => "IN",
    Index => "INDEX",
    Indexes => "INDEXES",
    Inner => "INNER",
    Inout => "INOUT",
    Insert => "INSERT",
    Instead => "INSTEAD",
    Intersect => "INTERSECT",
    Interval => "INTERVAL",
    Into => "INTO",
    Is => "IS",
    Join => "JOIN",
    Key => "KEY",
    Keys => "KEYS",
    Language => "LANGUAGE",
    Left => "LEFT",
    Less => "LESS",
    Like => "LIKE",
    Limit => "LIMIT",
    Lock => "LOCK",
    Match => "MATCH",
    Max => "MAX",
    Maxvalue => "MAXVALUE",
    Min => "MIN",
    Minute => "MINUTE",
    Mod => "MOD",
    Mode => "MODE",
    Modify => "MODIFY",
    Month => "MONTH",
    Natural => "NATURAL",
    No => "NO",
    Not => "NOT",
    Null => "NULL",
    Of => "OF",
    Offset => "OFFSET",
    On => "ON",
    Option => "OPTION",
    Or => "OR",
    Order => "ORDER",
    Out => "OUT",
    Outer => "OUTER",
    Over => "OVER",
    Partition => "PARTITION",
    Preceding => "PRECEDING",
    Primary => "PRIMARY",
    Privileges => "PRIVILEGES",
    Procedure => "PROCEDURE",
    Processlist => "PROCESSLIST",
    Query => "QUERY",
    Range => "RANGE",
    References => "REFERENCES",
    Regexp => "REGEXP",
    Release => "RELEASE",
    Rename => "RENAME",
    Replace => "REPLACE",
    Restrict => "RESTRICT",
    Returns => "RETURNS",
    Revoke => "REVOKE",
    Right => "RIGHT",
    Rlike => "RLIKE",
    Role => "ROLE",
    Rollback => "ROLLBACK",
    Rollup => "ROLLUP",
    Row => "ROW",
    Rows => "ROWS",
    Savepoint => "SAVEPOINT",
    Schema => "SCHEMA",
    Second => "SECOND",
    Select => "SELECT",
    Separator => "SEPARATOR",
    Set => "SET",
    Show => "SHOW",
    Spatial => "SPATIAL",
    Start => "START",
    Status => "STATUS",
    Sum => "SUM",
    Table => "TABLE",
    Tables => "TABLES",
    Temporary => "TEMPORARY",
    Than => "THAN",
    Then => "THEN",
    Time => "TIME",
    Timestamp => "TIMESTAMP",
    To => "TO",
    Transaction => "TRANSACTION",
    Trigger => "TRIGGER",
    Triggers => "TRIGGERS",
    True => "TRUE",
    Truncate => "TRUNCATE",
    Unbounded => "UNBOUNDED",
    Union => "UNION",
    Unique => "UNIQUE",
    Unknown => "UNKNOWN",
    Unsigned => "UNSIGNED",
    Update => "UPDATE",
    Use => "USE",
    User => "USER",
    Using => "USING",
    Values => "VALUES",
    Variables => "VARIABLES",
    View => "VIEW",
    Warnings => "WARNINGS",
    Week => "WEEK",
    When => "WHEN",
    Where => "WHERE",
    Window => "WINDOW",
    With => "WITH",
    Work => "WORK",
    Xor => "XOR",
    Year => "YEAR",
    Zerofill => "ZEROFILL",
}

impl Keyword {
    /// Case-insensitive keyword lookup
    pub fn lookup(word: &str) -> Option<Keyword> {
        KEYWORDS.get(word.to_ascii_uppercase().as_str()).copied()
    }

    /// Keywords that may stand in for a plain identifier (column, table or alias names).
    pub fn is_identifier_like(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Action | After | Against | Avg | Before | Boolean | Charset | Columns | Comment
                | Commit | Count | Current | Data | Databases | Date | Datetime | Day
                | Deterministic | Each | Engine | Enum | Errors | Expansion | Extended | Fields
                | First | Following | Format | Grants | Groups | Hour | Identified | Indexes
                | Instead | Key | Keys | Language | Less | Max | Maxvalue | Min | Minute | Mode
                | Month | No | Of | Option | Over | Partition | Preceding | Privileges
                | Processlist | Query | Range | Release | Returns | Role | Rollup | Row | Rows
                | Savepoint | Second | Separator | Spatial | Start | Status | Sum | Tables
                | Temporary | Than | Time | Timestamp | Transaction | Triggers | Unbounded
                | Unknown | User | Variables | View | Warnings | Week | Window | Work | Year
        )
    }

    /// Keywords that may lead a function call, e.g. `DATE(x)` or `COUNT(*)`.
    pub fn is_function_lead(&self) -> bool {
        use Keyword::*;
        matches!(
            self,
            Avg | Charset | Concat | Count | Database | Date | Datetime | Day | Hour | If
                | Insert | Left | Max | Min | Minute | Mod | Month | Replace | Right | Schema
                | Second | Sum | Time | Timestamp | Truncate | User | Values | Week | Year
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Keyword(Keyword),

    // Literals
    /// Raw numeric text; integer vs float is decided when the literal is built
    Number(String),
    /// Unescaped string contents
    String(String),
    /// Plain or backtick-quoted identifier
    Identifier(String),

    // Operators
    Eq,            // =
    NullSafeEq,    // <=>
    Ne,            // != or <>
    Lt,            // <
    Gt,            // >
    Le,            // <=
    Ge,            // >=
    Plus,          // +
    Minus,         // -
    Star,          // *
    Slash,         // /
    Percent,       // %
    Caret,         // ^
    Ampersand,     // &
    Pipe,          // |
    Tilde,         // ~
    Bang,          // !
    DoubleAmpersand, // &&
    DoublePipe,    // ||
    ShiftLeft,     // <<
    ShiftRight,    // >>

    // Punctuation
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Colon,         // labels and := inside routine bodies
    Question,      // ? placeholder
    At,            // @

    Eof,
}

impl TokenType {
    /// Human readable description for error messages
    pub fn describe(&self) -> String {
        match self {
            TokenType::Keyword(k) => k.as_str().to_string(),
            TokenType::Number(_) => "number".to_string(),
            TokenType::String(_) => "string".to_string(),
            TokenType::Identifier(_) => "identifier".to_string(),
            TokenType::Eq => "'='".to_string(),
            TokenType::NullSafeEq => "'<=>'".to_string(),
            TokenType::Ne => "'<>'".to_string(),
            TokenType::Lt => "'<'".to_string(),
            TokenType::Gt => "'>'".to_string(),
            TokenType::Le => "'<='".to_string(),
            TokenType::Ge => "'>='".to_string(),
            TokenType::Plus => "'+'".to_string(),
            TokenType::Minus => "'-'".to_string(),
            TokenType::Star => "'*'".to_string(),
            TokenType::Slash => "'/'".to_string(),
            TokenType::Percent => "'%'".to_string(),
            TokenType::Caret => "'^'".to_string(),
            TokenType::Ampersand => "'&'".to_string(),
            TokenType::Pipe => "'|'".to_string(),
            TokenType::Tilde => "'~'".to_string(),
            TokenType::Bang => "'!'".to_string(),
            TokenType::DoubleAmpersand => "'&&'".to_string(),
            TokenType::DoublePipe => "'||'".to_string(),
            TokenType::ShiftLeft => "'<<'".to_string(),
            TokenType::ShiftRight => "'>>'".to_string(),
            TokenType::LParen => "'('".to_string(),
            TokenType::RParen => "')'".to_string(),
            TokenType::Comma => "','".to_string(),
            TokenType::Semicolon => "';'".to_string(),
            TokenType::Dot => "'.'".to_string(),
            TokenType::Colon => "':'".to_string(),
            TokenType::Question => "'?'".to_string(),
            TokenType::At => "'@'".to_string(),
            TokenType::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Verbatim source text of the token
    pub text: String,
    /// Byte offset of the first character
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, text: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        Self {
            token_type,
            text: text.into(),
            offset,
            line,
            column,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.token_type == TokenType::Keyword(keyword)
    }

    /// Byte offset one past the last character
    pub fn end_offset(&self) -> usize {
        self.offset + self.text.len()
    }
}
