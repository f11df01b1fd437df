//! Window functions: ranking, navigation, and aggregates over a frame.
//!
//! The caller hands over every row the window may see plus the index of the
//! current row. Rows are narrowed to the current partition and ordered by the
//! window's ORDER BY here, so the input order only matters for ties.

use std::cmp::Ordering;

use super::{EvalContext, ExprEvaluator};
use crate::error::Result;
use crate::sql::ast::{Expr, FrameBound, FrameUnits, FunctionCall, WindowSpec};
use crate::types::{SqlRow, Value};

pub const WINDOW_FUNCTIONS: &[&str] = &[
    "ROW_NUMBER", "RANK", "DENSE_RANK", "PERCENT_RANK", "CUME_DIST", "NTILE", "LEAD", "LAG", "FIRST_VALUE",
    "LAST_VALUE", "NTH_VALUE",
];

pub fn is_window_only(name: &str) -> bool {
    WINDOW_FUNCTIONS.contains(&name)
}

/// The current partition in window order
struct Partition<'r> {
    rows: Vec<&'r SqlRow>,
    /// ORDER BY key of each row
    keys: Vec<Vec<Value>>,
    /// Position of the current row
    current: usize,
    ordered: bool,
}

impl<'r> Partition<'r> {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn peers(&self, a: usize, b: usize) -> bool {
        !self.ordered || self.keys[a].iter().zip(&self.keys[b]).all(|(x, y)| x.compare(y) == Ordering::Equal)
    }

    /// First and last position of the peer group containing `pos`
    fn peer_bounds(&self, pos: usize) -> (usize, usize) {
        let mut first = pos;
        while first > 0 && self.peers(first - 1, pos) {
            first -= 1;
        }
        let mut last = pos;
        while last + 1 < self.len() && self.peers(last + 1, pos) {
            last += 1;
        }
        (first, last)
    }

    /// Peer group number of every position
    fn group_ids(&self) -> Vec<usize> {
        let mut ids = Vec::with_capacity(self.len());
        let mut id = 0;
        for i in 0..self.len() {
            if i > 0 && !self.peers(i - 1, i) {
                id += 1;
            }
            ids.push(id);
        }
        ids
    }
}

impl ExprEvaluator {
    pub(super) fn eval_window(&self, call: &FunctionCall, spec: &WindowSpec, ctx: &EvalContext) -> Result<Value> {
        let Some(window) = ctx.window else {
            self.warn_unsupported(format!("{}() OVER requires window rows", call.name));
            return Ok(Value::Null);
        };
        let spec = resolve_spec(spec, window.spec);
        let partition = self.build_partition(&spec, window.rows, window.index, ctx)?;
        let pos = partition.current;
        let n = partition.len();

        let value = match call.name.as_str() {
            "ROW_NUMBER" => Value::Integer(pos as i64 + 1),
            "RANK" => Value::Integer(partition.peer_bounds(pos).0 as i64 + 1),
            "DENSE_RANK" => Value::Integer(partition.group_ids()[pos] as i64 + 1),
            "PERCENT_RANK" => {
                let rank = partition.peer_bounds(pos).0;
                if n <= 1 {
                    Value::Float(0.0)
                } else {
                    Value::Float(rank as f64 / (n - 1) as f64)
                }
            }
            "CUME_DIST" => Value::Float((partition.peer_bounds(pos).1 + 1) as f64 / n as f64),
            "NTILE" => {
                let buckets = match call.args.first() {
                    Some(arg) => self.eval(arg, ctx)?.as_i64().unwrap_or(0),
                    None => 0,
                };
                if buckets <= 0 {
                    self.warn_unsupported("NTILE() needs a positive bucket count".to_string());
                    Value::Null
                } else {
                    Value::Integer(ntile(pos, n, buckets as usize) as i64)
                }
            }
            "LEAD" | "LAG" => {
                let offset = match call.args.get(1) {
                    Some(arg) => self.eval(arg, ctx)?.as_i64().unwrap_or(1),
                    None => 1,
                };
                let target = if call.name == "LEAD" {
                    (pos as i64).saturating_add(offset)
                } else {
                    (pos as i64).saturating_sub(offset)
                };
                if target >= 0 && (target as usize) < n {
                    self.eval_at(call.args.first(), &partition, target as usize, ctx)?
                } else {
                    match call.args.get(2) {
                        Some(default) => self.eval(default, ctx)?,
                        None => Value::Null,
                    }
                }
            }
            "FIRST_VALUE" | "LAST_VALUE" | "NTH_VALUE" => {
                let (start, end) = self.frame_bounds(&spec, &partition, ctx)?;
                if start > end {
                    Value::Null
                } else {
                    let target = match call.name.as_str() {
                        "FIRST_VALUE" => Some(start),
                        "LAST_VALUE" => Some(end),
                        _ => {
                            let nth = match call.args.get(1) {
                                Some(arg) => self.eval(arg, ctx)?.as_i64().unwrap_or(0),
                                None => 0,
                            };
                            (nth >= 1 && start + (nth as usize - 1) <= end).then(|| start + nth as usize - 1)
                        }
                    };
                    match target {
                        Some(t) => self.eval_at(call.args.first(), &partition, t, ctx)?,
                        None => Value::Null,
                    }
                }
            }
            _ => {
                // Aggregate over the frame
                let (start, end) = self.frame_bounds(&spec, &partition, ctx)?;
                let frame: Vec<&SqlRow> = if start > end {
                    Vec::new()
                } else {
                    partition.rows[start..=end].to_vec()
                };
                let mut plain = call.clone();
                plain.over = None;
                self.eval_aggregate(&plain, &frame, ctx)?
            }
        };
        Ok(value)
    }

    fn eval_at(&self, expr: Option<&Expr>, partition: &Partition, pos: usize, ctx: &EvalContext) -> Result<Value> {
        match expr {
            Some(expr) => self.eval(expr, &ctx.for_row(partition.rows[pos])),
            None => Ok(Value::Null),
        }
    }

    fn build_partition<'r>(
        &self,
        spec: &WindowSpec,
        rows: &'r [SqlRow],
        index: usize,
        ctx: &EvalContext,
    ) -> Result<Partition<'r>> {
        let current_row = rows.get(index);

        let current_key = match current_row {
            Some(row) => self.eval_all(&spec.partition_by, &ctx.for_row(row))?,
            None => Vec::new(),
        };

        // (original index, row, order key)
        let mut members: Vec<(usize, &'r SqlRow, Vec<Value>)> = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let row_ctx = ctx.for_row(row);
            if !spec.partition_by.is_empty() {
                let key = self.eval_all(&spec.partition_by, &row_ctx)?;
                let same = key.iter().zip(&current_key).all(|(a, b)| a.compare(b) == Ordering::Equal);
                if !same {
                    continue;
                }
            }
            let order_key = spec
                .order_by
                .iter()
                .map(|o| self.eval(&o.expr, &row_ctx))
                .collect::<Result<Vec<_>>>()?;
            members.push((i, row, order_key));
        }

        // Stable, so ties keep input order
        members.sort_by(|a, b| {
            for (i, order) in spec.order_by.iter().enumerate() {
                let ord = a.2[i].compare(&b.2[i]);
                let ord = if order.asc { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let current = members.iter().position(|(i, _, _)| *i == index).unwrap_or(0);
        let (rows, keys) = members.into_iter().map(|(_, row, key)| (row, key)).unzip();
        Ok(Partition {
            rows,
            keys,
            current,
            ordered: !spec.order_by.is_empty(),
        })
    }

    /// Inclusive frame positions; `start > end` means an empty frame
    fn frame_bounds(&self, spec: &WindowSpec, partition: &Partition, ctx: &EvalContext) -> Result<(usize, usize)> {
        let n = partition.len();
        let pos = partition.current;
        if n == 0 {
            return Ok((1, 0));
        }

        let Some(frame) = &spec.frame else {
            return Ok(if partition.ordered {
                (0, partition.peer_bounds(pos).1)
            } else {
                (0, n - 1)
            });
        };

        let start = self.resolve_bound(&frame.start, frame.units, partition, true, ctx)?;
        let end = self.resolve_bound(&frame.end, frame.units, partition, false, ctx)?;
        let start = start.max(0);
        let end = end.min(n as i64 - 1);
        if start > end {
            return Ok((1, 0));
        }
        Ok((start as usize, end as usize))
    }

    fn resolve_bound(
        &self,
        bound: &FrameBound,
        units: FrameUnits,
        partition: &Partition,
        is_start: bool,
        ctx: &EvalContext,
    ) -> Result<i64> {
        let n = partition.len() as i64;
        let pos = partition.current;

        let offset = |expr: &Expr| -> Result<f64> { Ok(self.eval(expr, ctx)?.as_f64().unwrap_or(0.0).max(0.0)) };

        let resolved = match (bound, units) {
            (FrameBound::UnboundedPreceding, _) => 0,
            (FrameBound::UnboundedFollowing, _) => n - 1,
            (FrameBound::CurrentRow, FrameUnits::Rows) => pos as i64,
            (FrameBound::CurrentRow, _) => {
                let (first, last) = partition.peer_bounds(pos);
                if is_start {
                    first as i64
                } else {
                    last as i64
                }
            }
            (FrameBound::Preceding(e), FrameUnits::Rows) => (pos as i64).saturating_sub(offset(&**e)? as i64),
            (FrameBound::Following(e), FrameUnits::Rows) => (pos as i64).saturating_add(offset(&**e)? as i64),
            (FrameBound::Preceding(e), FrameUnits::Groups) | (FrameBound::Following(e), FrameUnits::Groups) => {
                let ids = partition.group_ids();
                let delta = offset(&**e)? as i64;
                let target = if matches!(bound, FrameBound::Preceding(_)) {
                    (ids[pos] as i64).saturating_sub(delta)
                } else {
                    (ids[pos] as i64).saturating_add(delta)
                };
                let positions: Vec<usize> = (0..ids.len()).filter(|&i| ids[i] as i64 == target).collect();
                match (positions.first(), positions.last()) {
                    (Some(&first), Some(&last)) => {
                        if is_start {
                            first as i64
                        } else {
                            last as i64
                        }
                    }
                    // Past either end of the partition
                    _ if target < 0 => {
                        if is_start {
                            0
                        } else {
                            -1
                        }
                    }
                    _ => {
                        if is_start {
                            n
                        } else {
                            n - 1
                        }
                    }
                }
            }
            (FrameBound::Preceding(e), FrameUnits::Range) | (FrameBound::Following(e), FrameUnits::Range) => {
                let delta = offset(&**e)?;
                let preceding = matches!(bound, FrameBound::Preceding(_));
                self.range_bound(partition, delta, preceding, is_start)
            }
        };
        Ok(resolved)
    }

    /// RANGE offsets over the first ORDER BY key, which must be numeric
    fn range_bound(&self, partition: &Partition, delta: f64, preceding: bool, is_start: bool) -> i64 {
        let n = partition.len();
        let pos = partition.current;
        let key = |i: usize| partition.keys[i].first().and_then(Value::as_f64);

        let Some(current) = key(pos) else {
            // NULL keys only frame their peers
            let (first, last) = partition.peer_bounds(pos);
            return if is_start { first as i64 } else { last as i64 };
        };

        // Keys run in window order; flip descending keys so they ascend
        let descending = partition.len() > 1
            && (0..n - 1).any(|i| match (key(i), key(i + 1)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            });
        let sign = if descending { -1.0 } else { 1.0 };
        let target = sign * current + if preceding { -delta } else { delta };

        let in_frame = |i: usize| match key(i) {
            Some(k) => {
                let k = sign * k;
                if is_start {
                    k >= target
                } else {
                    k <= target
                }
            }
            None => false,
        };

        if is_start {
            (0..n).find(|&i| in_frame(i)).map(|i| i as i64).unwrap_or(n as i64)
        } else {
            (0..n).rev().find(|&i| in_frame(i)).map(|i| i as i64).unwrap_or(-1)
        }
    }
}

/// Named window resolution: the call's own clauses win over the named definition
fn resolve_spec(spec: &WindowSpec, named: Option<&WindowSpec>) -> WindowSpec {
    match named {
        Some(named) if spec.name.is_some() => WindowSpec {
            name: spec.name.clone(),
            partition_by: if spec.partition_by.is_empty() {
                named.partition_by.clone()
            } else {
                spec.partition_by.clone()
            },
            order_by: if spec.order_by.is_empty() {
                named.order_by.clone()
            } else {
                spec.order_by.clone()
            },
            frame: spec.frame.clone().or_else(|| named.frame.clone()),
        },
        _ => spec.clone(),
    }
}

/// 1-based bucket of `pos` when `n` rows are split into `buckets` groups,
/// larger groups first
fn ntile(pos: usize, n: usize, buckets: usize) -> usize {
    let size = n / buckets;
    let extra = n % buckets;
    if size == 0 {
        return pos + 1;
    }
    let big = extra * (size + 1);
    if pos < big {
        pos / (size + 1) + 1
    } else {
        (pos - big) / size + extra + 1
    }
}

#[cfg(test)]
mod tests {
    use super::ntile;
    use crate::sql::evaluator::{EvalContext, ExprEvaluator};
    use crate::sql::parser::Parser;
    use crate::sql::tokenize;
    use crate::types::{SqlRow, Value};

    /// (dept, salary) in deliberately unsorted order
    fn rows() -> Vec<SqlRow> {
        [("a", 300), ("b", 100), ("a", 100), ("a", 200), ("b", 100), ("a", 200)]
            .into_iter()
            .map(|(dept, salary)| {
                let mut row = SqlRow::new();
                row.insert("dept".into(), Value::from(dept));
                row.insert("salary".into(), Value::Integer(salary));
                row
            })
            .collect()
    }

    /// Evaluate `sql` for every row, returning results in input order
    fn window(sql: &str) -> Vec<Value> {
        let expr = Parser::new(tokenize(sql).unwrap()).parse_expression().unwrap();
        let data = rows();
        let evaluator = ExprEvaluator::new();
        (0..data.len())
            .map(|i| {
                let ctx = EvalContext::new(&data[i]).with_window(&data, i);
                evaluator.eval(&expr, &ctx).unwrap()
            })
            .collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn test_ranking_functions() {
        let over = "OVER (PARTITION BY dept ORDER BY salary)";
        assert_eq!(window(&format!("ROW_NUMBER() {}", over)), ints(&[4, 1, 1, 2, 2, 3]));
        assert_eq!(window(&format!("RANK() {}", over)), ints(&[4, 1, 1, 2, 1, 2]));
        assert_eq!(window(&format!("DENSE_RANK() {}", over)), ints(&[3, 1, 1, 2, 1, 2]));
        assert_eq!(window(&format!("CUME_DIST() {}", over))[0], Value::Float(1.0));
        assert_eq!(window(&format!("PERCENT_RANK() {}", over))[3], Value::Float(1.0 / 3.0));
    }

    #[test]
    fn test_navigation_functions() {
        let lag = window("LAG(salary) OVER (PARTITION BY dept ORDER BY salary)");
        assert_eq!(lag[2], Value::Null);
        assert_eq!(lag[0], Value::Integer(200));
        let lead = window("LEAD(salary, 2, -1) OVER (PARTITION BY dept ORDER BY salary)");
        assert_eq!(lead[2], Value::Integer(200));
        assert_eq!(lead[0], Value::Integer(-1));
        let first = window("FIRST_VALUE(salary) OVER (PARTITION BY dept ORDER BY salary DESC)");
        assert_eq!(first[2], Value::Integer(300));
    }

    #[test]
    fn test_extreme_offsets_fall_outside_the_partition() {
        let lead = window("LEAD(salary, 9223372036854775807, 0) OVER (PARTITION BY dept ORDER BY salary)");
        assert_eq!(lead, ints(&[0, 0, 0, 0, 0, 0]));
        let lag = window("LAG(salary, -9223372036854775808, 0) OVER (PARTITION BY dept ORDER BY salary)");
        assert_eq!(lag, ints(&[0, 0, 0, 0, 0, 0]));
        let lead_min = window("LEAD(salary, -9223372036854775808, 0) OVER (ORDER BY salary)");
        assert_eq!(lead_min, ints(&[0, 0, 0, 0, 0, 0]));

        let everything = window(
            "COUNT(*) OVER (PARTITION BY dept ORDER BY salary \
             ROWS BETWEEN 9223372036854775807 PRECEDING AND 9223372036854775807 FOLLOWING)",
        );
        assert_eq!(everything, ints(&[4, 2, 4, 4, 2, 4]));
        let groups = window(
            "COUNT(*) OVER (ORDER BY salary GROUPS BETWEEN CURRENT ROW AND 9223372036854775807 FOLLOWING)",
        );
        assert_eq!(groups[0], Value::Integer(1));
    }

    #[test]
    fn test_default_frames() {
        // Without ORDER BY the frame is the whole partition
        assert_eq!(window("SUM(salary) OVER (PARTITION BY dept)")[0], Value::Integer(800));
        // With ORDER BY it runs up to the last peer of the current row
        let running = window("SUM(salary) OVER (PARTITION BY dept ORDER BY salary)");
        assert_eq!(running, ints(&[800, 200, 100, 500, 200, 500]));
        assert_eq!(window("COUNT(*) OVER ()")[0], Value::Integer(6));
    }

    #[test]
    fn test_explicit_frames() {
        let rows_frame =
            window("SUM(salary) OVER (PARTITION BY dept ORDER BY salary ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)");
        assert_eq!(rows_frame[2], Value::Integer(100));
        assert_eq!(rows_frame[3], Value::Integer(300));
        assert_eq!(rows_frame[0], Value::Integer(500));

        let range_frame = window(
            "COUNT(*) OVER (PARTITION BY dept ORDER BY salary RANGE BETWEEN 100 PRECEDING AND 100 FOLLOWING)",
        );
        assert_eq!(range_frame[3], Value::Integer(4));
        assert_eq!(range_frame[2], Value::Integer(3));

        let groups_frame = window(
            "COUNT(*) OVER (PARTITION BY dept ORDER BY salary GROUPS BETWEEN CURRENT ROW AND 1 FOLLOWING)",
        );
        assert_eq!(groups_frame[2], Value::Integer(3));
        assert_eq!(groups_frame[0], Value::Integer(1));

        let last = window(
            "LAST_VALUE(salary) OVER (ORDER BY salary ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING)",
        );
        assert!(last.iter().all(|v| *v == Value::Integer(300)));
    }

    #[test]
    fn test_ntile_distribution() {
        let buckets: Vec<usize> = (0..7).map(|p| ntile(p, 7, 3)).collect();
        assert_eq!(buckets, vec![1, 1, 1, 2, 2, 3, 3]);
        assert_eq!(ntile(1, 2, 5), 2);
        assert_eq!(window("NTILE(2) OVER (PARTITION BY dept ORDER BY salary)")[0], Value::Integer(2));
    }

    #[test]
    fn test_window_without_rows_is_null_with_warning() {
        let evaluator = ExprEvaluator::new();
        let expr = Parser::new(tokenize("ROW_NUMBER() OVER ()").unwrap()).parse_expression().unwrap();
        let row = SqlRow::new();
        assert_eq!(evaluator.eval(&expr, &EvalContext::new(&row)).unwrap(), Value::Null);
        assert_eq!(evaluator.take_warnings().len(), 1);
    }
}
