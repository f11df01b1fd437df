/// Abstract Syntax Tree for SQL statements
use crate::types::Value;

/// A `;`-separated sequence of statements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStmt>),
    Union(Box<UnionStmt>),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    CreateDatabase(CreateDatabaseStmt),
    CreateIndex(CreateIndexStmt),
    CreateView(CreateViewStmt),
    CreateTrigger(CreateTriggerStmt),
    CreateProcedure(CreateRoutineStmt),
    CreateFunction(CreateRoutineStmt),
    Drop(DropStmt),
    AlterTable(AlterTableStmt),
    Truncate(ObjectName),
    Use(String),
    Show(ShowStmt),
    Describe(ObjectName),
    Explain(Box<Statement>),
    Transaction(TransactionStmt),
    Grant(GrantStmt),
    Revoke(GrantStmt),
    CreateUser(CreateUserStmt),
    CreateRole(CreateRoleStmt),
}

/// Possibly database-qualified object name: `[db.]name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub database: Option<String>,
    pub name: String,
}

impl ObjectName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            database: None,
            name: name.into(),
        }
    }
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub with_rollup: bool,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub for_update: bool,
}

/// One projected expression; `*` and `t.*` are star column references
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpr {
    pub expr: Expr,
    pub asc: bool, // true = ASC, false = DESC
}

/// Set operation joining two SELECT branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Except,
    Intersect,
}

/// `first (op branch)*` with the trailing ORDER BY / LIMIT of the whole chain
#[derive(Debug, Clone, PartialEq)]
pub struct UnionStmt {
    pub first: SelectStmt,
    pub rest: Vec<(SetOperator, SelectStmt)>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Table reference in FROM clause (supports JOINs and derived tables)
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table {
        name: ObjectName,
        alias: Option<String>,
    },
    /// Derived table: (SELECT ...) [AS] alias
    Subquery {
        query: Box<Statement>,
        alias: Option<String>,
    },
    Join {
        left: Box<TableRef>,
        right: Box<TableRef>,
        join_type: JoinType,
        constraint: JoinConstraint,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Cross,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<String>),
    Natural,
    None,
}

/// INSERT / REPLACE statement
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: ObjectName,
    pub columns: Vec<String>, // empty means all columns
    pub source: InsertSource,
    pub ignore: bool,
    pub replace: bool,
    pub on_duplicate: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<Statement>),
    Set(Vec<Assignment>),
}

/// `column = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

/// UPDATE statement
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: ObjectName,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

/// DELETE statement
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: ObjectName,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit: Option<u64>,
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub table: ObjectName,
    pub if_not_exists: bool,
    pub temporary: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    /// `name [=] value` pairs after the closing paren, names upper-cased
    pub options: Vec<(String, String)>,
    /// CREATE TABLE t LIKE other
    pub like: Option<ObjectName>,
    /// CREATE TABLE t AS SELECT ...
    pub as_select: Option<Box<Statement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    /// None when neither NULL nor NOT NULL was written
    pub nullable: Option<bool>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    pub default: Option<Expr>,
    pub on_update: Option<Expr>,
    pub references: Option<ForeignKeyRef>,
    pub check: Option<Expr>,
    pub comment: Option<String>,
    pub collate: Option<String>,
    pub charset: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            on_update: None,
            references: None,
            check: None,
            comment: None,
            collate: None,
            charset: None,
        }
    }
}

/// Column data type as written: `DECIMAL(10,2) UNSIGNED`, `ENUM('a','b')`, ...
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataType {
    /// Upper-cased, two-word types joined by a space (`DOUBLE PRECISION`)
    pub name: String,
    pub length: Option<u32>,
    pub scale: Option<u32>,
    /// ENUM / SET members
    pub values: Vec<String>,
    pub unsigned: bool,
    pub zerofill: bool,
}

impl DataType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.values.is_empty() {
            let quoted: Vec<String> = self.values.iter().map(|v| format!("'{}'", v.replace('\'', "''"))).collect();
            write!(f, "({})", quoted.join(","))?;
        } else if let Some(len) = self.length {
            match self.scale {
                Some(scale) => write!(f, "({},{})", len, scale)?,
                None => write!(f, "({})", len)?,
            }
        }
        if self.unsigned {
            write!(f, " UNSIGNED")?;
        }
        if self.zerofill {
            write!(f, " ZEROFILL")?;
        }
        Ok(())
    }
}

/// `REFERENCES t (cols) [ON DELETE action] [ON UPDATE action]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRef {
    pub table: ObjectName,
    pub columns: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey {
        name: Option<String>,
        columns: Vec<String>,
    },
    Unique {
        name: Option<String>,
        columns: Vec<String>,
    },
    ForeignKey {
        name: Option<String>,
        columns: Vec<String>,
        references: ForeignKeyRef,
    },
    Check {
        name: Option<String>,
        expr: Expr,
    },
    Index {
        name: Option<String>,
        columns: Vec<String>,
        kind: IndexKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Plain,
    Unique,
    Fulltext,
    Spatial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDatabaseStmt {
    pub name: String,
    pub if_not_exists: bool,
    pub options: Vec<(String, String)>,
}

/// CREATE [UNIQUE|FULLTEXT|SPATIAL] INDEX name ON t (cols)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexStmt {
    pub name: String,
    pub table: ObjectName,
    pub columns: Vec<String>,
    pub kind: IndexKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateViewStmt {
    pub name: ObjectName,
    pub or_replace: bool,
    pub columns: Vec<String>,
    pub query: Box<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

/// Trigger with its body kept as verbatim source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTriggerStmt {
    pub name: ObjectName,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: ObjectName,
    pub for_each_row: bool,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineParam {
    pub mode: ParamMode,
    pub name: String,
    pub data_type: DataType,
}

/// CREATE PROCEDURE / CREATE FUNCTION; the body is never parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoutineStmt {
    pub name: ObjectName,
    pub params: Vec<RoutineParam>,
    /// Only set for functions
    pub returns: Option<DataType>,
    /// DETERMINISTIC, LANGUAGE SQL, COMMENT '...' and similar, as written
    pub characteristics: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    Table,
    Database,
    Index,
    View,
    Trigger,
    Procedure,
    Function,
    User,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropStmt {
    pub object_type: ObjectType,
    pub if_exists: bool,
    pub names: Vec<ObjectName>,
    /// DROP INDEX name ON table
    pub on_table: Option<ObjectName>,
    pub cascade: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStmt {
    pub table: ObjectName,
    pub actions: Vec<AlterAction>,
}

/// Where an added or modified column goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    First,
    After(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterAction {
    AddColumn {
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    DropColumn {
        name: String,
    },
    ModifyColumn {
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    ChangeColumn {
        old_name: String,
        column: ColumnDef,
        position: Option<ColumnPosition>,
    },
    RenameColumn {
        old_name: String,
        new_name: String,
    },
    AddIndex {
        name: Option<String>,
        columns: Vec<String>,
        kind: IndexKind,
    },
    DropIndex {
        name: String,
    },
    AddConstraint(TableConstraint),
    DropConstraint {
        /// PRIMARY KEY has no name
        name: Option<String>,
        kind: ConstraintKind,
    },
    AddPartition {
        name: String,
        values: Option<Expr>,
    },
    DropPartition {
        names: Vec<String>,
    },
    RenameTable {
        new_name: ObjectName,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    ForeignKey,
    Check,
    Unique,
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowStmt {
    pub kind: ShowKind,
    /// FROM / IN database
    pub database: Option<String>,
    pub like: Option<String>,
    pub where_clause: Option<Expr>,
    pub full: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowKind {
    Databases,
    Tables,
    Columns(ObjectName),
    Indexes(ObjectName),
    CreateTable(ObjectName),
    CreateView(ObjectName),
    Status,
    TableStatus,
    Variables,
    Processlist,
    Warnings,
    Errors,
    Triggers,
    Grants(Option<String>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStmt {
    Begin,
    Commit,
    Rollback,
    Savepoint(String),
    Release(String),
    RollbackTo(String),
}

/// GRANT privileges ON object TO users / REVOKE privileges ON object FROM users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantStmt {
    /// Upper-cased privilege names, `ALL PRIVILEGES` kept as one entry
    pub privileges: Vec<String>,
    /// `db.table`, `db.*` or `*.*` as written
    pub on: String,
    pub users: Vec<String>,
    pub with_grant_option: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserStmt {
    /// `name` or `name@host`
    pub user: String,
    pub if_not_exists: bool,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleStmt {
    pub names: Vec<String>,
    pub if_not_exists: bool,
}

/// Literal carrying both the parsed value and its source text
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
    pub raw: String,
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    /// Bare name that is not a column of a particular table, e.g. `@var` or an INTERVAL unit
    Identifier(String),

    /// Column reference; `column == "*"` for `*` and `t.*`.
    /// `alias` mirrors the select-item alias when the item is a plain column.
    ColumnRef {
        database: Option<String>,
        table: Option<String>,
        column: String,
        alias: Option<String>,
    },

    /// Bound parameter `?`, numbered from 0 in source order
    Placeholder(usize),

    Binary {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },

    Function(FunctionCall),

    /// CASE [operand] WHEN ... THEN ... [ELSE ...] END
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },

    /// Scalar subquery `(SELECT ...)`
    Subquery(Box<Statement>),

    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    In {
        expr: Box<Expr>,
        list: InList,
        negated: bool,
    },

    /// LIKE, or REGEXP / RLIKE when `regexp` is set
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape: Option<char>,
        regexp: bool,
        negated: bool,
    },

    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    Exists {
        query: Box<Statement>,
        negated: bool,
    },

    /// MATCH (cols) AGAINST (query [modifier])
    Match {
        columns: Vec<Expr>,
        query: Box<Expr>,
        modifier: MatchModifier,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Expr>),
    Subquery(Box<Statement>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchModifier {
    NaturalLanguage,
    NaturalLanguageWithExpansion,
    Boolean,
    WithQueryExpansion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Upper-cased function name
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
    pub over: Option<WindowSpec>,
    /// GROUP_CONCAT(... SEPARATOR 'x')
    pub separator: Option<String>,
    /// ORDER BY inside GROUP_CONCAT
    pub order_by: Vec<OrderByExpr>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
            distinct: false,
            over: None,
            separator: None,
            order_by: Vec::new(),
        }
    }
}

/// OVER (...) clause, or OVER name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    /// `OVER w` references a named window
    pub name: Option<String>,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: Option<WindowFrame>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub units: FrameUnits,
    pub start: FrameBound,
    pub end: FrameBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Range,
    Groups,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(Box<Expr>),
    CurrentRow,
    Following(Box<Expr>),
    UnboundedFollowing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,         // =
    NullSafeEq, // <=>
    Ne,         // != or <>
    Lt,         // <
    Gt,         // >
    Le,         // <=
    Ge,         // >=

    // Logical
    And,
    Or,
    Xor,

    // Arithmetic
    Add,    // +
    Sub,    // -
    Mul,    // *
    Div,    // /
    IntDiv, // DIV
    Mod,    // % or MOD

    // Bitwise
    BitOr,      // |
    BitAnd,     // &
    BitXor,     // ^
    ShiftLeft,  // <<
    ShiftRight, // >>
}

impl BinaryOperator {
    /// Get operator precedence (higher = tighter binding)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::Xor => 2,
            BinaryOperator::And => 3,
            BinaryOperator::Eq
            | BinaryOperator::NullSafeEq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Gt
            | BinaryOperator::Le
            | BinaryOperator::Ge => 5,
            BinaryOperator::BitOr => 6,
            BinaryOperator::BitAnd => 7,
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => 8,
            BinaryOperator::Add | BinaryOperator::Sub => 9,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::IntDiv | BinaryOperator::Mod => 10,
            BinaryOperator::BitXor => 11,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
    BitNot,
}

impl Expr {
    /// Unqualified column reference
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::ColumnRef {
            database: None,
            table: None,
            column: name.into(),
            alias: None,
        }
    }

    pub fn literal(value: Value, raw: impl Into<String>) -> Expr {
        Expr::Literal(Literal {
            value,
            raw: raw.into(),
        })
    }

    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Function(FunctionCall::new(name, args))
    }

    /// Whether this is `*` or `t.*`
    pub fn is_star(&self) -> bool {
        matches!(self, Expr::ColumnRef { column, .. } if column == "*")
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NullSafeEq => "<=>",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Xor => "XOR",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::IntDiv => "DIV",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitXor => "^",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
        };
        f.write_str(s)
    }
}

fn write_list(f: &mut std::fmt::Formatter<'_>, items: &[Expr]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_order_by(f: &mut std::fmt::Formatter<'_>, items: &[OrderByExpr]) -> std::fmt::Result {
    f.write_str("ORDER BY ")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}{}", item.expr, if item.asc { "" } else { " DESC" })?;
    }
    Ok(())
}

impl std::fmt::Display for FrameBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameBound::UnboundedPreceding => f.write_str("UNBOUNDED PRECEDING"),
            FrameBound::Preceding(e) => write!(f, "{} PRECEDING", e),
            FrameBound::CurrentRow => f.write_str("CURRENT ROW"),
            FrameBound::Following(e) => write!(f, "{} FOLLOWING", e),
            FrameBound::UnboundedFollowing => f.write_str("UNBOUNDED FOLLOWING"),
        }
    }
}

impl std::fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.name {
            return f.write_str(name);
        }
        let mut parts = Vec::new();
        if !self.partition_by.is_empty() {
            let cols: Vec<String> = self.partition_by.iter().map(|e| e.to_string()).collect();
            parts.push(format!("PARTITION BY {}", cols.join(", ")));
        }
        if !self.order_by.is_empty() {
            let cols: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{}{}", o.expr, if o.asc { "" } else { " DESC" }))
                .collect();
            parts.push(format!("ORDER BY {}", cols.join(", ")));
        }
        if let Some(frame) = &self.frame {
            let units = match frame.units {
                FrameUnits::Rows => "ROWS",
                FrameUnits::Range => "RANGE",
                FrameUnits::Groups => "GROUPS",
            };
            parts.push(format!("{} BETWEEN {} AND {}", units, frame.start, frame.end));
        }
        write!(f, "({})", parts.join(" "))
    }
}

/// Compact SQL rendering, used for column defaults and console output
impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal(lit) => f.write_str(&lit.raw),
            Expr::Identifier(name) => f.write_str(name),
            Expr::ColumnRef {
                database,
                table,
                column,
                ..
            } => {
                if let Some(db) = database {
                    write!(f, "{}.", db)?;
                }
                if let Some(t) = table {
                    write!(f, "{}.", t)?;
                }
                f.write_str(column)
            }
            Expr::Placeholder(_) => f.write_str("?"),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Unary { op, expr } => match op {
                UnaryOperator::Not => write!(f, "NOT {}", expr),
                UnaryOperator::Minus => write!(f, "-{}", expr),
                UnaryOperator::Plus => write!(f, "+{}", expr),
                UnaryOperator::BitNot => write!(f, "~{}", expr),
            },
            Expr::Function(call) => {
                if call.name == "INTERVAL" && call.args.len() == 2 {
                    return write!(f, "INTERVAL {} {}", call.args[0], call.args[1]);
                }
                write!(f, "{}(", call.name)?;
                if call.distinct {
                    f.write_str("DISTINCT ")?;
                }
                write_list(f, &call.args)?;
                if !call.order_by.is_empty() {
                    f.write_str(" ")?;
                    write_order_by(f, &call.order_by)?;
                }
                if let Some(sep) = &call.separator {
                    write!(f, " SEPARATOR '{}'", sep.replace('\'', "''"))?;
                }
                f.write_str(")")?;
                if let Some(over) = &call.over {
                    write!(f, " OVER {}", over)?;
                }
                Ok(())
            }
            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                f.write_str("CASE")?;
                if let Some(op) = operand {
                    write!(f, " {}", op)?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {}", e)?;
                }
                f.write_str(" END")
            }
            Expr::Subquery(_) => f.write_str("(<subquery>)"),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "({} {}BETWEEN {} AND {})",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::In { expr, list, negated } => {
                write!(f, "({} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                match list {
                    InList::Values(values) => write_list(f, values)?,
                    InList::Subquery(_) => f.write_str("<subquery>")?,
                }
                f.write_str("))")
            }
            Expr::Like {
                expr,
                pattern,
                escape,
                regexp,
                negated,
            } => {
                write!(
                    f,
                    "({} {}{} {}",
                    expr,
                    if *negated { "NOT " } else { "" },
                    if *regexp { "REGEXP" } else { "LIKE" },
                    pattern
                )?;
                if let Some(c) = escape {
                    write!(f, " ESCAPE '{}'", c)?;
                }
                f.write_str(")")
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "({} IS {}NULL)", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Exists { negated, .. } => {
                write!(f, "{}EXISTS (<subquery>)", if *negated { "NOT " } else { "" })
            }
            Expr::Match { columns, query, .. } => {
                f.write_str("MATCH (")?;
                write_list(f, columns)?;
                write!(f, ") AGAINST ({})", query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_table_ordering() {
        assert!(BinaryOperator::Or.precedence() < BinaryOperator::Xor.precedence());
        assert!(BinaryOperator::Xor.precedence() < BinaryOperator::And.precedence());
        assert!(BinaryOperator::Eq.is_comparison());
        assert!(BinaryOperator::Mul.precedence() < BinaryOperator::BitXor.precedence());
    }

    #[test]
    fn test_expr_display() {
        let expr = Expr::binary(
            Expr::column("a"),
            BinaryOperator::Add,
            Expr::function("ABS", vec![Expr::literal(Value::Integer(-1), "-1")]),
        );
        assert_eq!(expr.to_string(), "(a + ABS(-1))");
    }

    #[test]
    fn test_data_type_display() {
        let mut dt = DataType::named("DECIMAL");
        dt.length = Some(10);
        dt.scale = Some(2);
        dt.unsigned = true;
        assert_eq!(dt.to_string(), "DECIMAL(10,2) UNSIGNED");

        let mut en = DataType::named("ENUM");
        en.values = vec!["a".into(), "b'c".into()];
        assert_eq!(en.to_string(), "ENUM('a','b''c')");
    }
}
