//! End-to-end checks of the SQL front end through the public API

use chunkdb::sql::ast::{BinaryOperator, Expr, SelectStmt, Statement, TableRef};
use chunkdb::sql::{rows_to_sql_rows, sql_row_to_row};
use chunkdb::{parse, parse_expression, DbError, EvalContext, ExprEvaluator, Row, TableSchema, Value};
use serde_json::json;

fn select(sql: &str) -> SelectStmt {
    let mut program = parse(sql).unwrap();
    assert_eq!(program.statements.len(), 1);
    match program.statements.remove(0) {
        Statement::Select(s) => *s,
        other => panic!("expected SELECT, got {:?}", other),
    }
}

fn eval(sql: &str) -> Value {
    let expr = parse_expression(sql).unwrap();
    ExprEvaluator::new().eval(&expr, &EvalContext::empty()).unwrap()
}

#[test]
fn precedence() {
    assert_eq!(
        parse_expression("a OR b AND c").unwrap(),
        Expr::binary(
            Expr::column("a"),
            BinaryOperator::Or,
            Expr::binary(Expr::column("b"), BinaryOperator::And, Expr::column("c"))
        )
    );

    match parse_expression("1 + 2 * 3").unwrap() {
        Expr::Binary { op: BinaryOperator::Add, right, .. } => {
            assert!(matches!(*right, Expr::Binary { op: BinaryOperator::Mul, .. }))
        }
        other => panic!("unexpected tree {:?}", other),
    }
    assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));

    assert!(matches!(
        parse_expression("NOT a BETWEEN 1 AND 2").unwrap(),
        Expr::Between { negated: true, .. }
    ));
}

#[test]
fn limit_forms() {
    let a = select("SELECT * FROM t LIMIT 5 OFFSET 10");
    let b = select("SELECT * FROM t LIMIT 10,5");
    assert_eq!((a.limit, a.offset), (Some(5), Some(10)));
    assert_eq!(a, b);
}

#[test]
fn null_safe_equality() {
    assert_eq!(eval("NULL <=> NULL"), Value::Bool(true));
    assert_ne!(eval("NULL = NULL"), Value::Bool(true));
    assert_eq!(eval("NULL = NULL"), Value::Null);
    assert_eq!(eval("1 <=> NULL"), Value::Bool(false));
}

#[test]
fn select_scenario() {
    let s = select("SELECT a, b FROM t WHERE a > 1 AND b IS NOT NULL ORDER BY a DESC LIMIT 2;");
    assert_eq!(s.columns.len(), 2);
    assert_eq!(s.from.len(), 1);
    assert!(matches!(&s.from[0], TableRef::Table { name, .. } if name.name == "t"));
    match s.where_clause {
        Some(Expr::Binary { op: BinaryOperator::And, right, .. }) => {
            assert!(matches!(*right, Expr::IsNull { negated: true, .. }))
        }
        other => panic!("unexpected WHERE {:?}", other),
    }
    assert_eq!(s.order_by.len(), 1);
    assert!(!s.order_by[0].asc);
    assert_eq!(s.limit, Some(2));
}

#[test]
fn syntax_errors_carry_position() {
    let err = parse("SELECT a,\nFROM t").unwrap_err();
    match &err {
        DbError::Syntax(e) => {
            assert_eq!(e.line, 2);
            assert_eq!(e.column, 1);
            assert_eq!(e.offset, 10);
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
    assert!(err.to_string().starts_with("line 2, column 1: "));
}

#[test]
fn where_clause_over_stored_rows() {
    let stored: Vec<Row> = [
        json!({"id": 1, "name": "ann", "score": 12.5}),
        json!({"id": 2, "name": null, "score": 40}),
        json!({"id": 3, "name": "cy", "score": 7}),
    ]
    .iter()
    .map(|v| v.as_object().cloned().unwrap())
    .collect();
    let rows = rows_to_sql_rows(&stored, Some("t"));

    let s = select("SELECT id FROM t WHERE t.score > 10 AND name IS NOT NULL");
    let predicate = s.where_clause.unwrap();
    let evaluator = ExprEvaluator::new();
    let matched: Vec<&Value> = rows
        .iter()
        .filter(|row| evaluator.eval_predicate(&predicate, &EvalContext::new(row)).unwrap())
        .map(|row| &row["id"])
        .collect();
    assert_eq!(matched, vec![&Value::Integer(1)]);
    assert!(evaluator.warnings().is_empty());
}

#[test]
fn aggregates_and_windows_over_a_group() {
    let stored: Vec<Row> = (1..=4)
        .map(|i| json!({"dept": if i % 2 == 0 { "even" } else { "odd" }, "n": i}))
        .map(|v| v.as_object().cloned().unwrap())
        .collect();
    let rows = rows_to_sql_rows(&stored, None);
    let evaluator = ExprEvaluator::new();

    let total = parse_expression("SUM(n) * 10 + COUNT(*)").unwrap();
    let ctx = EvalContext::new(&rows[0]).with_group(&rows);
    assert_eq!(evaluator.eval(&total, &ctx).unwrap(), Value::Integer(104));

    let rank = parse_expression("ROW_NUMBER() OVER (PARTITION BY dept ORDER BY n DESC)").unwrap();
    let ranks: Vec<Value> = (0..rows.len())
        .map(|i| evaluator.eval(&rank, &EvalContext::new(&rows[i]).with_window(&rows, i)).unwrap())
        .collect();
    assert_eq!(
        ranks,
        vec![Value::Integer(2), Value::Integer(2), Value::Integer(1), Value::Integer(1)]
    );
}

#[test]
fn unknown_function_is_null_with_warning() {
    let evaluator = ExprEvaluator::new();
    let expr = parse_expression("NO_SUCH_FN(1) IS NULL").unwrap();
    assert_eq!(evaluator.eval(&expr, &EvalContext::empty()).unwrap(), Value::Bool(true));
    let warnings = evaluator.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].to_string().to_uppercase().contains("NO_SUCH_FN"));
}

#[test]
fn create_table_to_stored_row() {
    let mut program = parse(
        "CREATE TABLE users (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(20) NOT NULL, active BOOLEAN DEFAULT 1)",
    )
    .unwrap();
    let schema = match program.statements.remove(0) {
        Statement::CreateTable(stmt) => TableSchema::from_create_table(&stmt),
        other => panic!("expected CREATE TABLE, got {:?}", other),
    };

    let mut row = chunkdb::SqlRow::new();
    row.insert("id".to_string(), Value::Integer(1));
    row.insert("name".to_string(), Value::from("ann"));
    let stored = sql_row_to_row(&row, &schema).unwrap();
    assert_eq!(serde_json::Value::Object(stored), json!({"id": 1, "name": "ann", "active": true}));
}
