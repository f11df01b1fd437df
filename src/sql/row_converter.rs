/// Row conversion utilities - converts between stored JSON rows and evaluator rows
use crate::error::{DbError, Result};
use crate::types::{Row, SqlRow, TableSchema, Value};

/// Convert a stored row to an evaluator row.
///
/// With `table` set every column is also reachable as `table.column`, which is
/// what qualified references and joins resolve against.
pub fn row_to_sql_row(row: &Row, table: Option<&str>) -> SqlRow {
    let mut sql_row = SqlRow::with_capacity(row.len() * if table.is_some() { 2 } else { 1 });
    for (column, json) in row {
        let value = Value::from_json(json);
        if let Some(table) = table {
            sql_row.insert(format!("{}.{}", table, column), value.clone());
        }
        sql_row.insert(column.clone(), value);
    }
    sql_row
}

/// Convert a batch of stored rows
pub fn rows_to_sql_rows(rows: &[Row], table: Option<&str>) -> Vec<SqlRow> {
    rows.iter().map(|row| row_to_sql_row(row, table)).collect()
}

/// Convert an evaluator row back to the stored shape, in schema column order.
///
/// Keys may be bare or qualified and are matched case-insensitively. Values
/// are coerced to the column type; a missing value takes the column default.
pub fn sql_row_to_row(sql_row: &SqlRow, schema: &TableSchema) -> Result<Row> {
    let mut row = Row::new();

    for column in &schema.columns {
        let value = find_value(sql_row, &column.name)
            .cloned()
            .or_else(|| column.default.as_ref().map(|d| Value::Text(d.clone())))
            .unwrap_or(Value::Null);

        let coerced = coerce_to_column(value, &column.data_type);
        if coerced.is_null() && !column.nullable && !column.auto_increment {
            return Err(DbError::InvalidArgument(format!(
                "column '{}' cannot be null",
                column.name
            )));
        }
        row.insert(column.name.clone(), coerced.to_json());
    }

    Ok(row)
}

fn find_value<'r>(sql_row: &'r SqlRow, column: &str) -> Option<&'r Value> {
    if let Some(v) = sql_row.get(column) {
        return Some(v);
    }
    sql_row
        .iter()
        .find(|(key, _)| {
            let bare = key.rsplit('.').next().unwrap_or(key);
            bare.eq_ignore_ascii_case(column)
        })
        .map(|(_, v)| v)
}

/// Type coercion for values headed into a column of `data_type`
pub fn coerce_to_column(value: Value, data_type: &str) -> Value {
    if value.is_null() {
        return value;
    }
    let upper = data_type.to_ascii_uppercase();
    let base = upper.split(|c: char| c == '(' || c == ' ').next().unwrap_or("");

    match base {
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" | "SERIAL" => match value {
            Value::Text(ref s) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => s.trim().parse::<f64>().map(|f| Value::Integer(f.round() as i64)).unwrap_or(value),
            },
            Value::Float(f) => Value::Integer(f.round() as i64),
            Value::Bool(b) => Value::Integer(b as i64),
            other => other,
        },
        "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" | "DEC" => match value {
            Value::Text(ref s) => s.trim().parse::<f64>().map(Value::Float).unwrap_or(value),
            Value::Integer(i) => Value::Float(i as f64),
            Value::Bool(b) => Value::Float(b as i64 as f64),
            other => other,
        },
        "BOOL" | "BOOLEAN" => match value.truthy() {
            Some(b) => Value::Bool(b),
            None => Value::Null,
        },
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" | "DATE"
        | "DATETIME" | "TIMESTAMP" | "TIME" => match value {
            Value::Text(_) => value,
            other => other.to_text().map_or(Value::Null, Value::Text),
        },
        _ => value,
    }
}
