/// Expression evaluator - evaluates expressions against rows
///
/// Evaluation is lenient: unresolved columns, unknown functions and
/// constructs that need a query executor produce NULL and an [`EvalWarning`]
/// instead of an error. Errors are reserved for things like invalid regular
/// expressions.
pub mod aggregate;
pub mod datetime;
mod functions;
pub mod pattern;
pub mod window;

pub use aggregate::is_aggregate;
pub use pattern::{LikePattern, PatternCache};
pub use window::is_window_only;

use ahash::AHashMap;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;
use crate::sql::ast::{BinaryOperator, Expr, FunctionCall, InList, UnaryOperator, WindowSpec};
use crate::types::{SqlRow, Value};

use self::datetime::{IntervalUnit, Temporal};

/// Reported by `VERSION()`
pub const SERVER_VERSION: &str = concat!("8.0.0-chunkdb-", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    UnknownColumn,
    UnknownFunction,
    UnboundParameter,
    /// Needs an executor or context the evaluator does not have
    Unsupported,
    InvalidArgument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for EvalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Rows visible to a window function plus the position of the current row
#[derive(Debug, Clone, Copy)]
pub struct WindowRows<'a> {
    pub rows: &'a [SqlRow],
    pub index: usize,
    /// Named window definitions that `OVER w` refers to
    pub spec: Option<&'a WindowSpec>,
}

/// Everything an expression can see while it is evaluated
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    pub row: Option<&'a SqlRow>,
    pub group: Option<&'a [SqlRow]>,
    pub window: Option<WindowRows<'a>>,
    /// alias -> table name
    pub aliases: Option<&'a AHashMap<String, String>>,
    pub params: &'a [Value],
    /// User variables, keyed without the leading `@`
    pub variables: Option<&'a AHashMap<String, Value>>,
}

impl<'a> EvalContext<'a> {
    pub fn new(row: &'a SqlRow) -> Self {
        Self {
            row: Some(row),
            ..Self::default()
        }
    }

    /// Context with no row at all, e.g. `SELECT 1 + 1`
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, group: &'a [SqlRow]) -> Self {
        self.group = Some(group);
        self
    }

    pub fn with_window(mut self, rows: &'a [SqlRow], index: usize) -> Self {
        self.window = Some(WindowRows { rows, index, spec: None });
        self
    }

    pub fn with_window_spec(mut self, spec: &'a WindowSpec) -> Self {
        if let Some(window) = self.window.as_mut() {
            window.spec = Some(spec);
        }
        self
    }

    pub fn with_aliases(mut self, aliases: &'a AHashMap<String, String>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn with_params(mut self, params: &'a [Value]) -> Self {
        self.params = params;
        self
    }

    pub fn with_variables(mut self, variables: &'a AHashMap<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Same bindings, positioned on another row; group and window are dropped
    pub fn for_row<'b>(&'b self, row: &'b SqlRow) -> EvalContext<'b> {
        EvalContext {
            row: Some(row),
            group: None,
            window: None,
            aliases: self.aliases,
            params: self.params,
            variables: self.variables,
        }
    }
}

/// Expression evaluator
///
/// Holds the compiled-pattern cache and the warnings raised so far, so one
/// evaluator is meant to be reused across the rows of a query.
pub struct ExprEvaluator {
    patterns: PatternCache,
    warnings: Mutex<Vec<EvalWarning>>,
    database: Option<String>,
    user: String,
}

impl ExprEvaluator {
    pub fn new() -> Self {
        Self {
            patterns: PatternCache::new(),
            warnings: Mutex::new(Vec::new()),
            database: None,
            user: "root@localhost".to_string(),
        }
    }

    /// Session values reported by `DATABASE()` and `USER()`
    pub fn with_session(mut self, database: Option<String>, user: impl Into<String>) -> Self {
        self.database = database;
        self.user = user.into();
        self
    }

    pub fn patterns(&self) -> &PatternCache {
        &self.patterns
    }

    pub fn warnings(&self) -> Vec<EvalWarning> {
        self.warnings.lock().clone()
    }

    pub fn take_warnings(&self) -> Vec<EvalWarning> {
        std::mem::take(&mut *self.warnings.lock())
    }

    pub fn clear_warnings(&self) {
        self.warnings.lock().clear();
    }

    fn warn(&self, kind: WarningKind, message: String) {
        tracing::warn!(?kind, "{}", message);
        self.warnings.lock().push(EvalWarning { kind, message });
    }

    pub(crate) fn warn_unknown_function(&self, name: &str) {
        self.warn(WarningKind::UnknownFunction, format!("unknown function {}()", name));
    }

    pub(crate) fn warn_unsupported(&self, message: String) {
        self.warn(WarningKind::Unsupported, message);
    }

    pub(crate) fn warn_invalid(&self, message: String) {
        self.warn(WarningKind::InvalidArgument, message);
    }

    /// Evaluate a WHERE / HAVING / ON condition; NULL counts as false
    pub fn eval_predicate(&self, expr: &Expr, ctx: &EvalContext) -> Result<bool> {
        Ok(self.eval(expr, ctx)?.truthy() == Some(true))
    }

    pub(crate) fn eval_all(&self, exprs: &[Expr], ctx: &EvalContext) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, ctx)).collect()
    }

    pub fn eval(&self, expr: &Expr, ctx: &EvalContext) -> Result<Value> {
        match expr {
            Expr::Literal(lit) => Ok(lit.value.clone()),

            Expr::Identifier(name) => Ok(match name.strip_prefix('@') {
                Some(var) => self.lookup_variable(var, ctx),
                None => self.resolve_column(None, name, ctx),
            }),

            Expr::ColumnRef { table, column, .. } => {
                if column == "*" {
                    self.warn_unsupported("'*' is only valid in a select list or COUNT(*)".to_string());
                    return Ok(Value::Null);
                }
                Ok(self.resolve_column(table.as_deref(), column, ctx))
            }

            Expr::Placeholder(index) => Ok(match ctx.params.get(*index) {
                Some(value) => value.clone(),
                None => {
                    self.warn(
                        WarningKind::UnboundParameter,
                        format!("no value bound for parameter {}", index + 1),
                    );
                    Value::Null
                }
            }),

            Expr::Binary { left, op, right } => self.eval_binary(left, *op, right, ctx),

            Expr::Unary { op, expr } => {
                let value = self.eval(expr, ctx)?;
                Ok(eval_unary(*op, value))
            }

            Expr::Function(call) => self.eval_function(call, ctx),

            Expr::Case {
                operand,
                branches,
                else_result,
            } => {
                let operand = match operand {
                    Some(op) => Some(self.eval(op, ctx)?),
                    None => None,
                };
                for (when, then) in branches {
                    let when_value = self.eval(when, ctx)?;
                    let hit = match &operand {
                        Some(op) => apply_binary(BinaryOperator::Eq, op, &when_value).truthy() == Some(true),
                        None => when_value.truthy() == Some(true),
                    };
                    if hit {
                        return self.eval(then, ctx);
                    }
                }
                match else_result {
                    Some(e) => self.eval(e, ctx),
                    None => Ok(Value::Null),
                }
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let value = self.eval(expr, ctx)?;
                let low = self.eval(low, ctx)?;
                let high = self.eval(high, ctx)?;
                let above = apply_binary(BinaryOperator::Ge, &value, &low);
                let below = apply_binary(BinaryOperator::Le, &value, &high);
                let inside = and3(above.truthy(), below.truthy());
                Ok(bool3(inside.map(|b| b != *negated)))
            }

            Expr::In { expr, list, negated } => match list {
                InList::Values(items) => {
                    let value = self.eval(expr, ctx)?;
                    let result = self.eval_in(&value, items, ctx)?;
                    Ok(bool3(result.map(|b| b != *negated)))
                }
                InList::Subquery(_) => {
                    self.warn_unsupported("IN (SELECT ...) needs a query executor".to_string());
                    Ok(Value::Null)
                }
            },

            Expr::Like {
                expr,
                pattern,
                escape,
                regexp,
                negated,
            } => {
                let (Some(text), Some(pattern)) = (self.eval(expr, ctx)?.to_text(), self.eval(pattern, ctx)?.to_text())
                else {
                    return Ok(Value::Null);
                };
                let matched = if *regexp {
                    self.patterns.regex(&pattern)?.is_match(&text)
                } else {
                    self.patterns.like(&pattern, escape.unwrap_or('\\')).matches(&text)
                };
                Ok(Value::Bool(matched != *negated))
            }

            Expr::IsNull { expr, negated } => {
                let value = self.eval(expr, ctx)?;
                Ok(Value::Bool(value.is_null() != *negated))
            }

            Expr::Subquery(_) => {
                self.warn_unsupported("scalar subquery needs a query executor".to_string());
                Ok(Value::Null)
            }
            Expr::Exists { .. } => {
                self.warn_unsupported("EXISTS needs a query executor".to_string());
                Ok(Value::Null)
            }
            Expr::Match { .. } => {
                self.warn_unsupported("MATCH ... AGAINST needs a full-text index".to_string());
                Ok(Value::Null)
            }
        }
    }

    fn eval_function(&self, call: &FunctionCall, ctx: &EvalContext) -> Result<Value> {
        if let Some(spec) = &call.over {
            return self.eval_window(call, spec, ctx);
        }
        if is_aggregate(&call.name) {
            let rows: Vec<&SqlRow> = match (ctx.group, ctx.row) {
                (Some(group), _) => group.iter().collect(),
                (None, Some(row)) => vec![row],
                (None, None) => Vec::new(),
            };
            return self.eval_aggregate(call, &rows, ctx);
        }
        if is_window_only(&call.name) {
            self.warn_unsupported(format!("{}() requires an OVER clause", call.name));
            return Ok(Value::Null);
        }
        self.eval_scalar(call, ctx)
    }

    /// `@name` user variables and `@@name` system variables
    fn lookup_variable(&self, name: &str, ctx: &EvalContext) -> Value {
        if let Some(value) = ctx.variables.and_then(|vars| {
            vars.get(name)
                .or_else(|| vars.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v))
        }) {
            return value.clone();
        }
        match name.strip_prefix('@') {
            Some(system) if system.eq_ignore_ascii_case("version") => Value::from(SERVER_VERSION),
            Some(system) => {
                self.warn_unsupported(format!("system variable @@{} is not available", system));
                Value::Null
            }
            // Unset user variables are NULL
            None => Value::Null,
        }
    }

    /// Column lookup, from most to least specific:
    /// exact key, case-insensitive key, alias translation, `table.column` suffix
    fn resolve_column(&self, table: Option<&str>, column: &str, ctx: &EvalContext) -> Value {
        let found = ctx.row.and_then(|row| lookup_column(row, table, column, ctx.aliases));
        match found {
            Some(value) => value.clone(),
            None => {
                let name = match table {
                    Some(t) => format!("{}.{}", t, column),
                    None => column.to_string(),
                };
                self.warn(WarningKind::UnknownColumn, format!("unknown column '{}'", name));
                Value::Null
            }
        }
    }

    fn eval_binary(&self, left: &Expr, op: BinaryOperator, right: &Expr, ctx: &EvalContext) -> Result<Value> {
        match op {
            BinaryOperator::And => {
                let l = self.eval(left, ctx)?.truthy();
                if l == Some(false) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(right, ctx)?.truthy();
                return Ok(bool3(and3(l, r)));
            }
            BinaryOperator::Or => {
                let l = self.eval(left, ctx)?.truthy();
                if l == Some(true) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(right, ctx)?.truthy();
                return Ok(bool3(match (l, r) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                }));
            }
            BinaryOperator::Add | BinaryOperator::Sub => {
                if let Some(result) = self.eval_interval_arithmetic(left, op, right, ctx)? {
                    return Ok(result);
                }
            }
            _ => {}
        }

        let l = self.eval(left, ctx)?;
        let r = self.eval(right, ctx)?;
        Ok(apply_binary(op, &l, &r))
    }

    /// `date + INTERVAL n unit`, `INTERVAL n unit + date`, `date - INTERVAL n unit`
    fn eval_interval_arithmetic(
        &self,
        left: &Expr,
        op: BinaryOperator,
        right: &Expr,
        ctx: &EvalContext,
    ) -> Result<Option<Value>> {
        let (date_expr, interval, sign) = match (as_interval(left), as_interval(right)) {
            (None, Some(interval)) => (left, interval, if op == BinaryOperator::Sub { -1 } else { 1 }),
            (Some(interval), None) if op == BinaryOperator::Add => (right, interval, 1),
            _ => return Ok(None),
        };
        let date = self.eval(date_expr, ctx)?;
        let Some((amount, unit)) = self.eval_interval(interval, ctx)? else {
            return Ok(Some(Value::Null));
        };
        Ok(Some(
            amount
                .checked_mul(sign)
                .map_or(Value::Null, |amount| shift_date(&date, amount, unit)),
        ))
    }

    /// Amount and unit of an INTERVAL expression; None when the amount is NULL
    /// or the unit is unknown
    pub(crate) fn eval_interval(&self, call: &FunctionCall, ctx: &EvalContext) -> Result<Option<(i64, IntervalUnit)>> {
        let Some(unit) = call.args.get(1).and_then(unit_name).and_then(IntervalUnit::parse) else {
            self.warn_invalid("INTERVAL with an unknown unit".to_string());
            return Ok(None);
        };
        let amount = match call.args.first() {
            Some(e) => self.eval(e, ctx)?,
            None => Value::Null,
        };
        Ok(amount.as_f64().map(|a| (a.round() as i64, unit)))
    }

    fn eval_in(&self, value: &Value, items: &[Expr], ctx: &EvalContext) -> Result<Option<bool>> {
        if value.is_null() {
            return Ok(None);
        }
        let mut saw_null = false;
        for item in items {
            let candidate = self.eval(item, ctx)?;
            if candidate.is_null() {
                saw_null = true;
                continue;
            }
            if sql_compare(value, &candidate) == Ordering::Equal {
                return Ok(Some(true));
            }
        }
        Ok(if saw_null { None } else { Some(false) })
    }
}

impl Default for ExprEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup_column<'r>(
    row: &'r SqlRow,
    table: Option<&str>,
    column: &str,
    aliases: Option<&AHashMap<String, String>>,
) -> Option<&'r Value> {
    let exact_or_ci = |key: &str| {
        row.get(key)
            .or_else(|| row.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
    };

    match table {
        Some(table) => {
            if let Some(v) = exact_or_ci(&format!("{}.{}", table, column)) {
                return Some(v);
            }
            let real_table = aliases.and_then(|a| {
                a.get(table)
                    .or_else(|| a.iter().find(|(k, _)| k.eq_ignore_ascii_case(table)).map(|(_, v)| v))
            });
            if let Some(v) = real_table.and_then(|t| exact_or_ci(&format!("{}.{}", t, column))) {
                return Some(v);
            }
            exact_or_ci(column)
        }
        None => {
            if let Some(v) = exact_or_ci(column) {
                return Some(v);
            }
            // `table.column` keys; the smallest key wins so ambiguity resolves the same way every time
            let suffix = format!(".{}", column.to_ascii_lowercase());
            row.iter()
                .filter(|(k, _)| k.to_ascii_lowercase().ends_with(&suffix))
                .min_by(|a, b| a.0.cmp(b.0))
                .map(|(_, v)| v)
        }
    }
}

fn as_interval(expr: &Expr) -> Option<&FunctionCall> {
    match expr {
        Expr::Function(call) if call.name == "INTERVAL" && call.over.is_none() => Some(call),
        _ => None,
    }
}

/// Unit words arrive as identifiers, bare column names or strings
pub(crate) fn unit_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(name) => Some(name),
        Expr::ColumnRef { table: None, column, .. } => Some(column),
        Expr::Literal(lit) => match &lit.value {
            Value::Text(s) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn shift_date(date: &Value, amount: i64, unit: IntervalUnit) -> Value {
    datetime::parse_temporal(date)
        .and_then(|t: Temporal| datetime::add_interval(t, amount, unit))
        .map(|t| Value::Text(t.render()))
        .unwrap_or(Value::Null)
}

fn and3(l: Option<bool>, r: Option<bool>) -> Option<bool> {
    match (l, r) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn bool3(b: Option<bool>) -> Value {
    b.map_or(Value::Null, Value::Bool)
}

/// Ordering used by comparison operators: text against a number compares
/// numerically, as MySQL does
pub fn sql_compare(l: &Value, r: &Value) -> Ordering {
    match (l, r) {
        (Value::Text(_), Value::Integer(_) | Value::Float(_) | Value::Bool(_))
        | (Value::Integer(_) | Value::Float(_) | Value::Bool(_), Value::Text(_)) => {
            let (a, b) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => l.compare(r),
    }
}

fn eval_unary(op: UnaryOperator, value: Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match op {
        UnaryOperator::Not => bool3(value.truthy().map(|b| !b)),
        UnaryOperator::Plus => value,
        UnaryOperator::Minus => match value.to_number() {
            Some(Value::Integer(i)) => i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Integer),
            Some(Value::Float(f)) => Value::Float(-f),
            _ => Value::Null,
        },
        UnaryOperator::BitNot => value.as_i64().map_or(Value::Null, |i| Value::Integer(!i)),
    }
}

/// Apply a non-short-circuiting binary operator to two evaluated operands
pub fn apply_binary(op: BinaryOperator, l: &Value, r: &Value) -> Value {
    use BinaryOperator::*;

    if op == NullSafeEq {
        return Value::Bool(match (l.is_null(), r.is_null()) {
            (true, true) => true,
            (false, false) => sql_compare(l, r) == Ordering::Equal,
            _ => false,
        });
    }
    if l.is_null() || r.is_null() {
        return Value::Null;
    }

    match op {
        Eq | Ne | Lt | Gt | Le | Ge => {
            let ord = sql_compare(l, r);
            Value::Bool(match op {
                Eq => ord == Ordering::Equal,
                Ne => ord != Ordering::Equal,
                Lt => ord == Ordering::Less,
                Gt => ord == Ordering::Greater,
                Le => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            })
        }
        And => bool3(and3(l.truthy(), r.truthy())),
        Or => Value::Bool(l.truthy() == Some(true) || r.truthy() == Some(true)),
        Xor => match (l.truthy(), r.truthy()) {
            (Some(a), Some(b)) => Value::Bool(a != b),
            _ => Value::Null,
        },
        Add | Sub | Mul | Div | IntDiv | Mod => arithmetic(op, l, r),
        BitOr | BitAnd | BitXor | ShiftLeft | ShiftRight => {
            let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) else {
                return Value::Null;
            };
            Value::Integer(match op {
                BitOr => a | b,
                BitAnd => a & b,
                BitXor => a ^ b,
                ShiftLeft => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).unwrap_or(0),
                _ => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)).unwrap_or(0),
            })
        }
        NullSafeEq => Value::Null,
    }
}

fn arithmetic(op: BinaryOperator, l: &Value, r: &Value) -> Value {
    use BinaryOperator::*;

    let (Some(a), Some(b)) = (l.to_number(), r.to_number()) else {
        return Value::Null;
    };

    if let (Value::Integer(x), Value::Integer(y)) = (&a, &b) {
        let (x, y) = (*x, *y);
        let exact = match op {
            Add => x.checked_add(y),
            Sub => x.checked_sub(y),
            Mul => x.checked_mul(y),
            IntDiv if y == 0 => return Value::Null,
            IntDiv => x.checked_div(y),
            Mod if y == 0 => return Value::Null,
            Mod => x.checked_rem(y),
            _ => None,
        };
        if let Some(v) = exact {
            return Value::Integer(v);
        }
    }

    let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
    match op {
        Add => Value::Float(x + y),
        Sub => Value::Float(x - y),
        Mul => Value::Float(x * y),
        Div | IntDiv | Mod if y == 0.0 => Value::Null,
        Div => Value::Float(x / y),
        IntDiv => Value::Integer((x / y).trunc() as i64),
        Mod => Value::Float(x % y),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::parser::Parser;
    use crate::sql::tokenize;

    fn parse(sql: &str) -> Expr {
        Parser::new(tokenize(sql).unwrap()).parse_expression().unwrap()
    }

    fn eval_in(sql: &str, row: &SqlRow) -> Value {
        ExprEvaluator::new().eval(&parse(sql), &EvalContext::new(row)).unwrap()
    }

    fn eval(sql: &str) -> Value {
        ExprEvaluator::new().eval(&parse(sql), &EvalContext::empty()).unwrap()
    }

    fn user_row() -> SqlRow {
        let mut row = SqlRow::new();
        row.insert("users.id".into(), Value::Integer(7));
        row.insert("users.name".into(), Value::from("Alice"));
        row.insert("Age".into(), Value::Integer(30));
        row.insert("email".into(), Value::Null);
        row
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Integer(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Integer(9));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("7 DIV 2"), Value::Integer(3));
        assert_eq!(eval("7 % 3"), Value::Integer(1));
        assert_eq!(eval("-7 MOD 3"), Value::Integer(-1));
        assert_eq!(eval("'3abc' + 1"), Value::Float(4.0));
        assert_eq!(eval("'3' + 1"), Value::Integer(4));
        assert_eq!(eval("'1.5' * 2"), Value::Float(3.0));
        assert_eq!(eval("9223372036854775807 + 1"), Value::Float(9223372036854775808.0));
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(eval("1 / 0"), Value::Null);
        assert_eq!(eval("1 DIV 0"), Value::Null);
        assert_eq!(eval("1 % 0"), Value::Null);
        assert_eq!(eval("MOD(5, 0)"), Value::Null);
        assert_eq!(eval("1.5 / 0.0"), Value::Null);
    }

    #[test]
    fn test_null_propagation_and_null_safe_equality() {
        assert_eq!(eval("NULL = NULL"), Value::Null);
        assert_eq!(eval("NULL <=> NULL"), Value::Bool(true));
        assert_eq!(eval("1 <=> NULL"), Value::Bool(false));
        assert_eq!(eval("2 <=> 2"), Value::Bool(true));
        assert_eq!(eval("NULL + 1"), Value::Null);
        assert_eq!(eval("NULL < 1"), Value::Null);
    }

    #[test]
    fn test_three_valued_logic() {
        assert_eq!(eval("NULL AND FALSE"), Value::Bool(false));
        assert_eq!(eval("NULL AND TRUE"), Value::Null);
        assert_eq!(eval("NULL OR TRUE"), Value::Bool(true));
        assert_eq!(eval("NULL OR FALSE"), Value::Null);
        assert_eq!(eval("NOT NULL"), Value::Null);
        assert_eq!(eval("TRUE XOR FALSE"), Value::Bool(true));
        assert_eq!(eval("TRUE XOR NULL"), Value::Null);
    }

    #[test]
    fn test_comparisons_coerce_text_against_numbers() {
        assert_eq!(eval("'10' > 9"), Value::Bool(true));
        assert_eq!(eval("'abc' < 'abd'"), Value::Bool(true));
        assert_eq!(eval("3 BETWEEN 1 AND 5"), Value::Bool(true));
        assert_eq!(eval("3 NOT BETWEEN 1 AND 5"), Value::Bool(false));
        assert_eq!(eval("NULL BETWEEN 1 AND 5"), Value::Null);
    }

    #[test]
    fn test_in_list_semantics() {
        assert_eq!(eval("2 IN (1, 2, 3)"), Value::Bool(true));
        assert_eq!(eval("4 IN (1, 2, 3)"), Value::Bool(false));
        assert_eq!(eval("4 IN (1, NULL)"), Value::Null);
        assert_eq!(eval("1 IN (1, NULL)"), Value::Bool(true));
        assert_eq!(eval("NULL IN (1)"), Value::Null);
        assert_eq!(eval("4 NOT IN (1, 2)"), Value::Bool(true));
        assert_eq!(eval("'2' IN (1, 2)"), Value::Bool(true));
    }

    #[test]
    fn test_like_and_regexp() {
        let row = user_row();
        assert_eq!(eval_in("users.name LIKE 'al%'", &row), Value::Bool(true));
        assert_eq!(eval_in("name NOT LIKE '%ce'", &row), Value::Bool(false));
        assert_eq!(eval("'50%' LIKE '50!%' ESCAPE '!'"), Value::Bool(true));
        assert_eq!(eval("'abc' REGEXP '^A'"), Value::Bool(true));
        assert_eq!(eval("NULL LIKE 'a'"), Value::Null);
        assert!(ExprEvaluator::new().eval(&parse("'a' REGEXP '('"), &EvalContext::empty()).is_err());
    }

    #[test]
    fn test_column_resolution_order() {
        let row = user_row();
        assert_eq!(eval_in("users.id", &row), Value::Integer(7));
        assert_eq!(eval_in("USERS.ID", &row), Value::Integer(7));
        assert_eq!(eval_in("age", &row), Value::Integer(30));
        assert_eq!(eval_in("name", &row), Value::from("Alice"));

        let mut aliases = AHashMap::new();
        aliases.insert("u".to_string(), "users".to_string());
        let evaluator = ExprEvaluator::new();
        let ctx = EvalContext::new(&row).with_aliases(&aliases);
        assert_eq!(evaluator.eval(&parse("u.name"), &ctx).unwrap(), Value::from("Alice"));
        assert!(evaluator.warnings().is_empty());
    }

    #[test]
    fn test_unresolved_column_is_null_with_warning() {
        let row = user_row();
        let evaluator = ExprEvaluator::new();
        let value = evaluator.eval(&parse("missing + 1"), &EvalContext::new(&row)).unwrap();
        assert_eq!(value, Value::Null);
        let warnings = evaluator.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnknownColumn);
        assert!(evaluator.warnings().is_empty());
    }

    #[test]
    fn test_case_and_is_null() {
        let row = user_row();
        assert_eq!(
            eval_in("CASE WHEN age > 18 THEN 'adult' ELSE 'minor' END", &row),
            Value::from("adult")
        );
        assert_eq!(eval_in("CASE age WHEN 30 THEN 'x' END", &row), Value::from("x"));
        assert_eq!(eval_in("CASE age WHEN 31 THEN 'x' END", &row), Value::Null);
        assert_eq!(eval_in("email IS NULL", &row), Value::Bool(true));
        assert_eq!(eval_in("name IS NOT NULL", &row), Value::Bool(true));
    }

    #[test]
    fn test_placeholders_and_variables() {
        let evaluator = ExprEvaluator::new();
        let params = [Value::Integer(5), Value::from("x")];
        let mut vars = AHashMap::new();
        vars.insert("total".to_string(), Value::Integer(10));
        let ctx = EvalContext::empty().with_params(&params).with_variables(&vars);
        assert_eq!(evaluator.eval(&parse("? * 2"), &ctx).unwrap(), Value::Integer(10));
        assert_eq!(evaluator.eval(&parse("@total + ?"), &ctx).unwrap(), Value::Integer(15));
        assert_eq!(evaluator.eval(&parse("@unset"), &ctx).unwrap(), Value::Null);

        let missing = evaluator.eval(&parse("? + ? + ?"), &ctx).unwrap();
        assert_eq!(missing, Value::Null);
        assert_eq!(evaluator.take_warnings()[0].kind, WarningKind::UnboundParameter);
    }

    #[test]
    fn test_bitwise_and_unary() {
        assert_eq!(eval("6 & 3"), Value::Integer(2));
        assert_eq!(eval("6 | 3"), Value::Integer(7));
        assert_eq!(eval("1 << 4"), Value::Integer(16));
        assert_eq!(eval("-(3)"), Value::Integer(-3));
        assert_eq!(eval("NOT 0"), Value::Bool(true));
    }

    #[test]
    fn test_interval_arithmetic() {
        assert_eq!(eval("'2024-01-31' + INTERVAL 1 MONTH"), Value::from("2024-02-29"));
        assert_eq!(eval("INTERVAL 2 DAY + '2024-03-01'"), Value::from("2024-03-03"));
        assert_eq!(eval("'2024-03-01 10:00:00' - INTERVAL 90 MINUTE"), Value::from("2024-03-01 08:30:00"));
        assert_eq!(eval("'not a date' + INTERVAL 1 DAY"), Value::Null);
        assert_eq!(eval("'2020-01-01' - INTERVAL -9223372036854775808 DAY"), Value::Null);
        assert_eq!(eval("'2020-01-01' + INTERVAL 9223372036854775807 SECOND"), Value::Null);
    }

    #[test]
    fn test_executor_only_constructs_warn() {
        let evaluator = ExprEvaluator::new();
        let expr = parse("EXISTS (SELECT 1)");
        assert_eq!(evaluator.eval(&expr, &EvalContext::empty()).unwrap(), Value::Null);
        assert_eq!(evaluator.take_warnings()[0].kind, WarningKind::Unsupported);
    }
}
