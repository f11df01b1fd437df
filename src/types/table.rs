/// Table schema definitions persisted alongside table metadata
use serde::{Deserialize, Serialize};

use crate::sql::ast::{ColumnDef, CreateTableStmt, Expr, ForeignKeyRef, IndexKind, TableConstraint};

/// Column definition as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Rendered type, e.g. `VARCHAR(255)` or `INT UNSIGNED`
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: bool,
    /// Default expression rendered as SQL text
    pub default: Option<String>,
    pub comment: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

impl From<&ColumnDef> for ColumnSchema {
    fn from(def: &ColumnDef) -> Self {
        Self {
            name: def.name.clone(),
            data_type: def.data_type.to_string(),
            nullable: !def.primary_key && def.nullable.unwrap_or(true),
            primary_key: def.primary_key,
            auto_increment: def.auto_increment,
            unique: def.unique,
            default: def.default.as_ref().map(default_text),
            comment: def.comment.clone(),
        }
    }
}

/// String defaults are stored unquoted, everything else as rendered SQL.
fn default_text(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => match &lit.value {
            crate::types::Value::Text(s) => s.clone(),
            _ => lit.raw.clone(),
        },
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// PLAIN, UNIQUE, FULLTEXT or SPATIAL
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKeySchema {
    fn from_ref(name: Option<String>, columns: Vec<String>, r: &ForeignKeyRef) -> Self {
        Self {
            name,
            columns,
            ref_table: r.table.name.clone(),
            ref_columns: r.columns.clone(),
            on_delete: r.on_delete.map(|a| a.as_str().to_string()),
            on_update: r.on_update.map(|a| a.as_str().to_string()),
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Column definitions (ordered)
    pub columns: Vec<ColumnSchema>,
    /// Primary key columns, in key order
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexSchema>,
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Table options such as ENGINE or CHARSET
    pub options: Vec<(String, String)>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnSchema>) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            columns,
            primary_key,
            ..Self::default()
        }
    }

    /// Build the storable schema from a parsed CREATE TABLE
    pub fn from_create_table(stmt: &CreateTableStmt) -> Self {
        let mut schema = TableSchema::new(stmt.columns.iter().map(ColumnSchema::from).collect());

        for def in &stmt.columns {
            if let Some(r) = &def.references {
                schema
                    .foreign_keys
                    .push(ForeignKeySchema::from_ref(None, vec![def.name.clone()], r));
            }
        }

        for constraint in &stmt.constraints {
            match constraint {
                TableConstraint::PrimaryKey { columns, .. } => {
                    schema.primary_key = columns.clone();
                    for col in schema.columns.iter_mut() {
                        if columns.iter().any(|c| c.eq_ignore_ascii_case(&col.name)) {
                            col.primary_key = true;
                            col.nullable = false;
                        }
                    }
                }
                TableConstraint::Unique { name, columns } => {
                    schema.indexes.push(IndexSchema {
                        name: name.clone().unwrap_or_else(|| columns.join("_")),
                        columns: columns.clone(),
                        unique: true,
                        kind: "UNIQUE".to_string(),
                    });
                    if let [single] = columns.as_slice() {
                        if let Some(col) = schema.column_mut(single) {
                            col.unique = true;
                        }
                    }
                }
                TableConstraint::Index { name, columns, kind } => {
                    schema.indexes.push(IndexSchema {
                        name: name.clone().unwrap_or_else(|| columns.join("_")),
                        columns: columns.clone(),
                        unique: *kind == IndexKind::Unique,
                        kind: index_kind_name(*kind).to_string(),
                    });
                }
                TableConstraint::ForeignKey {
                    name,
                    columns,
                    references,
                } => {
                    schema
                        .foreign_keys
                        .push(ForeignKeySchema::from_ref(name.clone(), columns.clone(), references));
                }
                TableConstraint::Check { .. } => {}
            }
        }

        schema.options = stmt.options.clone();
        schema
    }

    /// Case-insensitive column lookup
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

pub(crate) fn index_kind_name(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Plain => "PLAIN",
        IndexKind::Unique => "UNIQUE",
        IndexKind::Fulltext => "FULLTEXT",
        IndexKind::Spatial => "SPATIAL",
    }
}
