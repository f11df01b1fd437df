/// Aggregate functions evaluated over a group of rows
use ahash::AHashSet;
use std::cmp::Ordering;

use super::{EvalContext, ExprEvaluator};
use crate::error::Result;
use crate::sql::ast::FunctionCall;
use crate::types::{SqlRow, Value};

pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "GROUP_CONCAT", "STDDEV", "STD", "STDDEV_POP", "STDDEV_SAMP",
    "VARIANCE", "VAR_POP", "VAR_SAMP", "BIT_AND", "BIT_OR", "BIT_XOR",
];

pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_FUNCTIONS.contains(&name)
}

/// Key used for DISTINCT: numerically equal values collapse
fn distinct_key(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::Null => "\0".to_string(),
            Value::Text(s) => format!("s:{}", s),
            other => format!("n:{}", other.as_f64().unwrap_or(0.0)),
        })
        .collect::<Vec<_>>()
        .join("\u{1}")
}

impl ExprEvaluator {
    /// Evaluate `call` as an aggregate over `rows`
    pub(super) fn eval_aggregate(&self, call: &FunctionCall, rows: &[&SqlRow], ctx: &EvalContext) -> Result<Value> {
        if call.name == "COUNT" && (call.args.is_empty() || call.args.iter().all(|a| a.is_star())) {
            return Ok(Value::Integer(rows.len() as i64));
        }

        // Per-row argument tuples; rows with a NULL argument are dropped
        let mut tuples: Vec<(Vec<Value>, &SqlRow)> = Vec::with_capacity(rows.len());
        for row in rows {
            let row_ctx = ctx.for_row(row);
            let values = call
                .args
                .iter()
                .map(|arg| self.eval(arg, &row_ctx))
                .collect::<Result<Vec<_>>>()?;
            if values.iter().any(Value::is_null) {
                continue;
            }
            tuples.push((values, *row));
        }

        if call.distinct {
            let mut seen = AHashSet::new();
            tuples.retain(|(values, _)| seen.insert(distinct_key(values)));
        }

        let result = match call.name.as_str() {
            "COUNT" => Value::Integer(tuples.len() as i64),
            "SUM" => sum(&first_args(&tuples)),
            "AVG" => {
                let values = first_args(&tuples);
                if values.is_empty() {
                    Value::Null
                } else {
                    let total: f64 = values.iter().filter_map(Value::as_f64).sum();
                    Value::Float(total / values.len() as f64)
                }
            }
            "MIN" => first_args(&tuples)
                .into_iter()
                .min_by(|a, b| a.compare(b))
                .unwrap_or(Value::Null),
            "MAX" => first_args(&tuples)
                .into_iter()
                .max_by(|a, b| a.compare(b))
                .unwrap_or(Value::Null),
            "GROUP_CONCAT" => self.group_concat(call, tuples, ctx)?,
            "STDDEV" | "STD" | "STDDEV_POP" => variance(&first_args(&tuples), false).map(f64::sqrt).map_or(Value::Null, Value::Float),
            "STDDEV_SAMP" => variance(&first_args(&tuples), true).map(f64::sqrt).map_or(Value::Null, Value::Float),
            "VARIANCE" | "VAR_POP" => variance(&first_args(&tuples), false).map_or(Value::Null, Value::Float),
            "VAR_SAMP" => variance(&first_args(&tuples), true).map_or(Value::Null, Value::Float),
            "BIT_AND" => Value::Integer(first_args(&tuples).iter().filter_map(Value::as_i64).fold(-1, |acc, v| acc & v)),
            "BIT_OR" => Value::Integer(first_args(&tuples).iter().filter_map(Value::as_i64).fold(0, |acc, v| acc | v)),
            "BIT_XOR" => Value::Integer(first_args(&tuples).iter().filter_map(Value::as_i64).fold(0, |acc, v| acc ^ v)),
            other => {
                self.warn_unknown_function(other);
                Value::Null
            }
        };
        Ok(result)
    }

    fn group_concat(&self, call: &FunctionCall, mut tuples: Vec<(Vec<Value>, &SqlRow)>, ctx: &EvalContext) -> Result<Value> {
        if tuples.is_empty() {
            return Ok(Value::Null);
        }

        if !call.order_by.is_empty() {
            let mut keyed = Vec::with_capacity(tuples.len());
            for (values, row) in tuples {
                let row_ctx = ctx.for_row(row);
                let keys = call
                    .order_by
                    .iter()
                    .map(|o| self.eval(&o.expr, &row_ctx))
                    .collect::<Result<Vec<_>>>()?;
                keyed.push((keys, values, row));
            }
            keyed.sort_by(|a, b| {
                for (i, order) in call.order_by.iter().enumerate() {
                    let ord = a.0[i].compare(&b.0[i]);
                    let ord = if order.asc { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            tuples = keyed.into_iter().map(|(_, values, row)| (values, row)).collect();
        }

        let separator = call.separator.as_deref().unwrap_or(",");
        let parts: Vec<String> = tuples
            .iter()
            .map(|(values, _)| values.iter().filter_map(Value::to_text).collect::<String>())
            .collect();
        Ok(Value::Text(parts.join(separator)))
    }
}

fn first_args(tuples: &[(Vec<Value>, &SqlRow)]) -> Vec<Value> {
    tuples.iter().filter_map(|(v, _)| v.first().cloned()).collect()
}

/// Integer sum while every input is integral and nothing overflows
fn sum(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    let mut int_total: Option<i64> = Some(0);
    let mut float_total = 0.0;
    for v in values {
        let n = v.to_number().unwrap_or(Value::Integer(0));
        float_total += n.as_f64().unwrap_or(0.0);
        int_total = match (int_total, &n) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            _ => None,
        };
    }
    match int_total {
        Some(total) => Value::Integer(total),
        None => Value::Float(float_total),
    }
}

fn variance(values: &[Value], sample: bool) -> Option<f64> {
    let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    let n = nums.len();
    if n == 0 || (sample && n < 2) {
        return None;
    }
    let mean = nums.iter().sum::<f64>() / n as f64;
    let squares: f64 = nums.iter().map(|x| (x - mean).powi(2)).sum();
    Some(squares / if sample { (n - 1) as f64 } else { n as f64 })
}

#[cfg(test)]
mod tests {
    use crate::sql::evaluator::{EvalContext, ExprEvaluator};
    use crate::sql::parser::Parser;
    use crate::sql::tokenize;
    use crate::types::{SqlRow, Value};

    fn rows() -> Vec<SqlRow> {
        [(1, Some("a"), 10.0), (2, Some("b"), 20.0), (3, None, 20.0), (4, Some("a"), 50.0)]
            .into_iter()
            .map(|(id, name, score)| {
                let mut row = SqlRow::new();
                row.insert("id".into(), Value::Integer(id));
                row.insert("name".into(), name.map(Value::from).unwrap_or(Value::Null));
                row.insert("score".into(), Value::Float(score));
                row
            })
            .collect()
    }

    fn agg(sql: &str) -> Value {
        let expr = Parser::new(tokenize(sql).unwrap()).parse_expression().unwrap();
        let group = rows();
        let evaluator = ExprEvaluator::new();
        evaluator.eval(&expr, &EvalContext::new(&group[0]).with_group(&group)).unwrap()
    }

    #[test]
    fn test_count_variants() {
        assert_eq!(agg("COUNT(*)"), Value::Integer(4));
        assert_eq!(agg("COUNT(name)"), Value::Integer(3));
        assert_eq!(agg("COUNT(DISTINCT name)"), Value::Integer(2));
    }

    #[test]
    fn test_numeric_aggregates() {
        assert_eq!(agg("SUM(id)"), Value::Integer(10));
        assert_eq!(agg("SUM(score)"), Value::Float(100.0));
        assert_eq!(agg("AVG(score)"), Value::Float(25.0));
        assert_eq!(agg("MIN(score)"), Value::Float(10.0));
        assert_eq!(agg("MAX(name)"), Value::from("b"));
        assert_eq!(agg("SUM(DISTINCT score)"), Value::Float(80.0));
        assert_eq!(agg("VAR_POP(id)"), Value::Float(1.25));
        assert_eq!(agg("STDDEV_SAMP(score)").as_f64().map(|v| (v * 100.0).round()), Some(1732.0));
        assert_eq!(agg("BIT_OR(id)"), Value::Integer(7));
    }

    #[test]
    fn test_group_concat() {
        assert_eq!(agg("GROUP_CONCAT(name)"), Value::from("a,b,a"));
        assert_eq!(
            agg("GROUP_CONCAT(DISTINCT name ORDER BY name DESC SEPARATOR '|')"),
            Value::from("b|a")
        );
    }

    #[test]
    fn test_empty_input_is_null() {
        let evaluator = ExprEvaluator::new();
        let expr = Parser::new(tokenize("SUM(x)").unwrap()).parse_expression().unwrap();
        let empty: Vec<SqlRow> = Vec::new();
        let row = SqlRow::new();
        let ctx = EvalContext::new(&row).with_group(&empty);
        assert_eq!(evaluator.eval(&expr, &ctx).unwrap(), Value::Null);

        let count = Parser::new(tokenize("COUNT(*)").unwrap()).parse_expression().unwrap();
        assert_eq!(evaluator.eval(&count, &ctx).unwrap(), Value::Integer(0));
    }

    #[test]
    fn test_aggregate_without_group_uses_current_row() {
        let evaluator = ExprEvaluator::new();
        let group = rows();
        let expr = Parser::new(tokenize("SUM(id)").unwrap()).parse_expression().unwrap();
        assert_eq!(evaluator.eval(&expr, &EvalContext::new(&group[1])).unwrap(), Value::Integer(2));
    }
}
