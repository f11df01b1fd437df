//! Scalar function library.
//!
//! Functions take evaluated arguments and return `Option<Value>`; `None`
//! becomes SQL NULL, so a NULL or missing argument can simply be `?`-ed.

use chrono::{Datelike, TimeZone, Timelike, Utc};
use rand::{Rng, SeedableRng};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

use super::datetime::{self, IntervalUnit, DATE_FORMAT, TIME_FORMAT};
use super::{apply_binary, shift_date, sql_compare, unit_name, EvalContext, ExprEvaluator, SERVER_VERSION};
use crate::error::Result;
use crate::sql::ast::{BinaryOperator, Expr, FunctionCall};
use crate::types::Value;

/// Upper bound for strings built by REPEAT, SPACE and the pad functions
const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;

impl ExprEvaluator {
    pub(super) fn eval_scalar(&self, call: &FunctionCall, ctx: &EvalContext) -> Result<Value> {
        let name = call.name.as_str();
        let raw = call.args.as_slice();

        // Forms with lazy or non-value arguments
        match name {
            "IF" => {
                let cond = self.eval_arg(raw, 0, ctx)?;
                let branch = if cond.truthy() == Some(true) { 1 } else { 2 };
                return self.eval_arg(raw, branch, ctx);
            }
            "IFNULL" | "COALESCE" => {
                for arg in raw {
                    let value = self.eval(arg, ctx)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                return Ok(Value::Null);
            }
            "INTERVAL" => {
                self.warn_invalid("INTERVAL is only valid in date arithmetic".to_string());
                return Ok(Value::Null);
            }
            "CAST" | "CONVERT" => return self.eval_cast(raw, ctx),
            "TRIM" if raw.len() == 3 => {
                let (Some(s), Some(remove)) = (self.eval_arg(raw, 0, ctx)?.to_text(), self.eval_arg(raw, 1, ctx)?.to_text())
                else {
                    return Ok(Value::Null);
                };
                let mode = unit_name(&raw[2]).unwrap_or("BOTH");
                return Ok(Value::Text(trim_affix(&s, &remove, mode)));
            }
            "EXTRACT" => {
                let unit = raw.first().and_then(unit_name).and_then(IntervalUnit::parse);
                let value = self.eval_arg(raw, 1, ctx)?;
                return Ok(match unit {
                    Some(unit) => datetime::parse_temporal(&value)
                        .map(|t| t.datetime)
                        .or_else(|| datetime::parse_time(&value).map(|t| datetime::now().date().and_time(t)))
                        .map_or(Value::Null, |dt| Value::Integer(datetime::extract(unit, &dt))),
                    None => {
                        self.warn_invalid("EXTRACT with an unknown unit".to_string());
                        Value::Null
                    }
                });
            }
            "TIMESTAMPDIFF" | "TIMESTAMPADD" => {
                let Some(unit) = raw.first().and_then(unit_name).and_then(IntervalUnit::parse) else {
                    self.warn_invalid(format!("{} with an unknown unit", name));
                    return Ok(Value::Null);
                };
                let a = self.eval_arg(raw, 1, ctx)?;
                let b = self.eval_arg(raw, 2, ctx)?;
                if name == "TIMESTAMPADD" {
                    return Ok(match a.as_i64() {
                        Some(amount) => shift_date(&b, amount, unit),
                        None => Value::Null,
                    });
                }
                return Ok(match (datetime::parse_temporal(&a), datetime::parse_temporal(&b)) {
                    (Some(start), Some(end)) => Value::Integer(datetime::diff(unit, start.datetime, end.datetime)),
                    _ => Value::Null,
                });
            }
            "DATE_ADD" | "ADDDATE" | "DATE_SUB" | "SUBDATE" => {
                let date = self.eval_arg(raw, 0, ctx)?;
                let interval = match raw.get(1) {
                    Some(Expr::Function(inner)) if inner.name == "INTERVAL" => self.eval_interval(inner, ctx)?,
                    // Plain number of days
                    Some(other) => self.eval(other, ctx)?.as_i64().map(|days| (days, IntervalUnit::Day)),
                    None => None,
                };
                let Some((amount, unit)) = interval else {
                    return Ok(Value::Null);
                };
                let sign = if name.ends_with("SUB") || name == "SUBDATE" { -1 } else { 1 };
                return Ok(amount
                    .checked_mul(sign)
                    .map_or(Value::Null, |amount| shift_date(&date, amount, unit)));
            }
            _ => {}
        }

        let args = self.eval_all(raw, ctx)?;
        Ok(self.call_scalar(name, &args).unwrap_or(Value::Null))
    }

    /// Plain scalar functions over evaluated arguments; `None` is NULL
    fn call_scalar(&self, name: &str, args: &[Value]) -> Option<Value> {
        match name {
            // Strings
            "CONCAT" => concat(args),
            "CONCAT_WS" => concat_ws(args),
            "SUBSTRING" | "SUBSTR" | "MID" => text(args, 0).and_then(|s| {
                let len = match args.get(2) {
                    Some(v) => Some(v.as_i64()?),
                    None => None,
                };
                Some(Value::Text(substring(&s, int(args, 1)?, len)))
            }),
            "LEFT" => text2(args, |s, n| s.chars().take(n.max(0) as usize).collect()),
            "RIGHT" => text2(args, |s, n| {
                let count = s.chars().count();
                s.chars().skip(count.saturating_sub(n.max(0) as usize)).collect()
            }),
            "TRIM" => text(args, 0).map(|s| Value::Text(s.trim_matches(' ').to_string())),
            "LTRIM" => text(args, 0).map(|s| Value::Text(s.trim_start_matches(' ').to_string())),
            "RTRIM" => text(args, 0).map(|s| Value::Text(s.trim_end_matches(' ').to_string())),
            "LPAD" | "RPAD" => pad(args, name == "LPAD"),
            "LOCATE" => Some(Value::Integer(locate(
                &text(args, 0)?,
                &text(args, 1)?,
                match args.get(2) {
                    Some(v) => v.as_i64()?,
                    None => 1,
                },
            ))),
            "POSITION" => Some(Value::Integer(locate(&text(args, 0)?, &text(args, 1)?, 1))),
            "INSTR" => Some(Value::Integer(locate(&text(args, 1)?, &text(args, 0)?, 1))),
            "REPLACE" => {
                let (s, from, to) = (text(args, 0)?, text(args, 1)?, text(args, 2)?);
                Some(Value::Text(if from.is_empty() { s } else { s.replace(&from, &to) }))
            }
            "REVERSE" => text(args, 0).map(|s| Value::Text(s.chars().rev().collect())),
            "REPEAT" => {
                let (s, n) = (text(args, 0)?, int(args, 1)?);
                let n = n.max(0) as usize;
                (s.len().saturating_mul(n) <= MAX_STRING_BYTES).then(|| Value::Text(s.repeat(n)))
            }
            "UPPER" | "UCASE" => text(args, 0).map(|s| Value::Text(s.to_uppercase())),
            "LOWER" | "LCASE" => text(args, 0).map(|s| Value::Text(s.to_lowercase())),
            "LENGTH" | "OCTET_LENGTH" => text(args, 0).map(|s| Value::Integer(s.len() as i64)),
            "CHAR_LENGTH" | "CHARACTER_LENGTH" => text(args, 0).map(|s| Value::Integer(s.chars().count() as i64)),
            "ASCII" => text(args, 0).map(|s| Value::Integer(s.bytes().next().map_or(0, i64::from))),
            "CHAR" => Some(Value::Text(
                args.iter()
                    .filter_map(Value::as_i64)
                    .filter_map(|code| u32::try_from(code).ok().and_then(char::from_u32))
                    .collect(),
            )),
            "SPACE" => {
                let n = int(args, 0)?.max(0) as usize;
                (n <= MAX_STRING_BYTES).then(|| Value::Text(" ".repeat(n)))
            }
            "STRCMP" => Some(Value::Integer(match text(args, 0)?.cmp(&text(args, 1)?) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            })),
            "FIELD" => Some(Value::Integer(field(args))),
            "FIND_IN_SET" => {
                let (needle, list) = (text(args, 0)?, text(args, 1)?);
                let pos = if needle.contains(',') || list.is_empty() {
                    0
                } else {
                    list.split(',').position(|item| item == needle).map_or(0, |p| p as i64 + 1)
                };
                Some(Value::Integer(pos))
            }
            "SUBSTRING_INDEX" => Some(Value::Text(substring_index(
                &text(args, 0)?,
                &text(args, 1)?,
                int(args, 2)?,
            ))),
            "INSERT" => Some(Value::Text(insert_at(
                &text(args, 0)?,
                int(args, 1)?,
                int(args, 2)?,
                &text(args, 3)?,
            ))),
            "FORMAT" => Some(Value::Text(format_number(num(args, 0)?, int(args, 1)?))),
            "HEX" => hex(args.first()?),

            // Numbers
            "ABS" => match number(args, 0)? {
                Value::Integer(i) => Some(i.checked_abs().map_or(Value::Float((i as f64).abs()), Value::Integer)),
                other => other.as_f64().map(|f| Value::Float(f.abs())),
            },
            "CEIL" | "CEILING" => number(args, 0).map(|n| integral(n, f64::ceil)),
            "FLOOR" => number(args, 0).map(|n| integral(n, f64::floor)),
            "ROUND" => round(args, f64::round),
            "TRUNCATE" => round(args, f64::trunc),
            "SIGN" => num(args, 0).map(|f| {
                Value::Integer(if f > 0.0 {
                    1
                } else if f < 0.0 {
                    -1
                } else {
                    0
                })
            }),
            "SQRT" => float_fn(args, |x| (x >= 0.0).then(|| x.sqrt())),
            "POW" | "POWER" => finite(num(args, 0)?.powf(num(args, 1)?)),
            "EXP" => float_fn(args, |x| Some(x.exp())),
            "LN" => float_fn(args, |x| (x > 0.0).then(|| x.ln())),
            "LOG" => {
                if args.len() >= 2 {
                    let (base, x) = (num(args, 0)?, num(args, 1)?);
                    (base > 0.0 && base != 1.0 && x > 0.0).then(|| Value::Float(x.ln() / base.ln()))
                } else {
                    float_fn(args, |x| (x > 0.0).then(|| x.ln()))
                }
            }
            "LOG2" => float_fn(args, |x| (x > 0.0).then(|| x.log2())),
            "LOG10" => float_fn(args, |x| (x > 0.0).then(|| x.log10())),
            "MOD" => Some(apply_binary(BinaryOperator::Mod, args.first()?, args.get(1)?)),
            "PI" => Some(Value::Float(std::f64::consts::PI)),
            "SIN" => float_fn(args, |x| Some(x.sin())),
            "COS" => float_fn(args, |x| Some(x.cos())),
            "TAN" => float_fn(args, |x| Some(x.tan())),
            "ASIN" => float_fn(args, |x| Some(x.asin())),
            "ACOS" => float_fn(args, |x| Some(x.acos())),
            "ATAN" if args.len() >= 2 => finite(num(args, 0)?.atan2(num(args, 1)?)),
            "ATAN" => float_fn(args, |x| Some(x.atan())),
            "ATAN2" => finite(num(args, 0)?.atan2(num(args, 1)?)),
            "COT" => float_fn(args, |x| {
                let t = x.tan();
                (t != 0.0).then(|| 1.0 / t)
            }),
            "DEGREES" => float_fn(args, |x| Some(x.to_degrees())),
            "RADIANS" => float_fn(args, |x| Some(x.to_radians())),
            "RAND" => Some(Value::Float(match args.first() {
                Some(seed) if !seed.is_null() => {
                    let seed = seed.as_i64().unwrap_or(0) as u64;
                    rand::rngs::StdRng::seed_from_u64(seed).gen::<f64>()
                }
                _ => rand::thread_rng().gen::<f64>(),
            })),
            "GREATEST" => extreme(args, Ordering::Greater),
            "LEAST" => extreme(args, Ordering::Less),

            // Date and time
            "NOW" | "CURRENT_TIMESTAMP" | "SYSDATE" | "LOCALTIME" | "LOCALTIMESTAMP" => {
                Some(Value::Text(datetime::format_datetime(&datetime::now())))
            }
            "CURDATE" | "CURRENT_DATE" => Some(Value::Text(datetime::now().format(DATE_FORMAT).to_string())),
            "CURTIME" | "CURRENT_TIME" => Some(Value::Text(datetime::now().format(TIME_FORMAT).to_string())),
            "UTC_TIMESTAMP" => Some(Value::Text(datetime::format_datetime(&Utc::now().naive_utc()))),
            "DATE" => temporal(args, 0).map(|t| Value::Text(t.date().format(DATE_FORMAT).to_string())),
            "TIME" => datetime::parse_time(args.first()?).map(|t| Value::Text(t.format(TIME_FORMAT).to_string())),
            "YEAR" => temporal(args, 0).map(|t| Value::Integer(t.datetime.year() as i64)),
            "MONTH" => temporal(args, 0).map(|t| Value::Integer(t.datetime.month() as i64)),
            "QUARTER" => temporal(args, 0).map(|t| Value::Integer(((t.datetime.month() - 1) / 3 + 1) as i64)),
            "DAY" | "DAYOFMONTH" => temporal(args, 0).map(|t| Value::Integer(t.datetime.day() as i64)),
            "HOUR" => datetime::parse_time(args.first()?).map(|t| Value::Integer(t.hour() as i64)),
            "MINUTE" => datetime::parse_time(args.first()?).map(|t| Value::Integer(t.minute() as i64)),
            "SECOND" => datetime::parse_time(args.first()?).map(|t| Value::Integer(t.second() as i64)),
            "DAYOFWEEK" => {
                temporal(args, 0).map(|t| Value::Integer(t.date().weekday().num_days_from_sunday() as i64 + 1))
            }
            "WEEKDAY" => temporal(args, 0).map(|t| Value::Integer(t.date().weekday().num_days_from_monday() as i64)),
            "DAYOFYEAR" => temporal(args, 0).map(|t| Value::Integer(t.date().ordinal() as i64)),
            "WEEKOFYEAR" => temporal(args, 0).map(|t| Value::Integer(t.date().iso_week().week() as i64)),
            "WEEK" => temporal(args, 0).map(|t| {
                // Weeks start on Sunday; days before the first Sunday are week 0
                let date = t.date();
                let week = (date.ordinal0() as i64 + 7 - date.weekday().num_days_from_sunday() as i64) / 7;
                Value::Integer(week)
            }),
            "DAYNAME" => temporal(args, 0).map(|t| Value::from(datetime::day_name(t.date()))),
            "MONTHNAME" => temporal(args, 0).map(|t| Value::from(datetime::month_name(t.date()))),
            "LAST_DAY" => temporal(args, 0)
                .and_then(|t| datetime::last_day(t.date()))
                .map(|d| Value::Text(d.format(DATE_FORMAT).to_string())),
            "DATE_FORMAT" => {
                let t = temporal(args, 0)?;
                Some(Value::Text(datetime::date_format(&t.datetime, &text(args, 1)?)))
            }
            "DATEDIFF" => {
                let (a, b) = (temporal(args, 0)?, temporal(args, 1)?);
                Some(Value::Integer((a.date() - b.date()).num_days()))
            }
            "UNIX_TIMESTAMP" => match args.first() {
                None => Some(Value::Integer(Utc::now().timestamp())),
                Some(v) => datetime::parse_temporal(v)
                    .map(|t| Value::Integer(Utc.from_utc_datetime(&t.datetime).timestamp())),
            },
            "FROM_UNIXTIME" => {
                let dt = Utc.timestamp_opt(int(args, 0)?, 0).single()?.naive_utc();
                Some(Value::Text(match text(args, 1) {
                    Some(format) => datetime::date_format(&dt, &format),
                    None => datetime::format_datetime(&dt),
                }))
            }

            // Conditionals
            "NULLIF" => {
                let (a, b) = (args.first()?, args.get(1)?);
                if apply_binary(BinaryOperator::Eq, a, b).truthy() == Some(true) {
                    None
                } else {
                    Some(a.clone())
                }
            }
            "ISNULL" => Some(Value::Integer(args.first().map_or(true, Value::is_null) as i64)),

            // JSON
            "JSON_EXTRACT" => self.json_extract(args),
            "JSON_UNQUOTE" => text(args, 0).map(|s| Value::Text(json_unquote(&s))),
            "JSON_OBJECT" => self.json_object(args),
            "JSON_ARRAY" => Some(Value::Text(
                JsonValue::Array(args.iter().map(Value::to_json).collect()).to_string(),
            )),
            "JSON_LENGTH" => {
                let node = self.json_target(args)?;
                Some(Value::Integer(match &node {
                    JsonValue::Array(a) => a.len() as i64,
                    JsonValue::Object(o) => o.len() as i64,
                    _ => 1,
                }))
            }
            "JSON_KEYS" => match self.json_target(args)? {
                JsonValue::Object(o) => Some(Value::Text(
                    JsonValue::Array(o.keys().cloned().map(JsonValue::String).collect()).to_string(),
                )),
                _ => None,
            },
            "JSON_VALID" => match args.first()? {
                Value::Null => None,
                Value::Text(s) => Some(Value::Integer(serde_json::from_str::<JsonValue>(s).is_ok() as i64)),
                _ => Some(Value::Integer(1)),
            },

            // Session and misc
            "UUID" => Some(Value::Text(uuid_v4())),
            "VERSION" => Some(Value::from(SERVER_VERSION)),
            "DATABASE" | "SCHEMA" => self.database.clone().map(Value::Text),
            "USER" | "CURRENT_USER" | "SESSION_USER" | "SYSTEM_USER" => Some(Value::Text(self.user.clone())),

            other => {
                self.warn_unknown_function(other);
                None
            }
        }
    }

    fn eval_arg(&self, args: &[Expr], index: usize, ctx: &EvalContext) -> Result<Value> {
        match args.get(index) {
            Some(arg) => self.eval(arg, ctx),
            None => Ok(Value::Null),
        }
    }

    /// CAST(x AS type), CONVERT(x, type), CONVERT(x USING charset)
    fn eval_cast(&self, args: &[Expr], ctx: &EvalContext) -> Result<Value> {
        let value = self.eval_arg(args, 0, ctx)?;
        let target = match args.get(1) {
            // USING charset: strings are already UTF-8
            Some(Expr::Identifier(_)) => return Ok(value.to_text().map_or(Value::Null, Value::Text)),
            Some(Expr::Literal(lit)) => lit.value.to_text().unwrap_or_default(),
            _ => String::new(),
        };
        if value.is_null() {
            return Ok(Value::Null);
        }

        let upper = target.to_ascii_uppercase();
        let base = upper.split(|c: char| c == '(' || c == ' ').next().unwrap_or("");
        let (length, scale) = type_args(&upper);

        let cast = match base {
            "SIGNED" | "UNSIGNED" | "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "MEDIUMINT" => {
                match &value {
                    Value::Float(f) => Some(Value::Integer(f.round() as i64)),
                    Value::Text(s) => Some(Value::Integer(
                        s.trim().parse::<i64>().unwrap_or_else(|_| leading_int(s)),
                    )),
                    other => other.as_i64().map(Value::Integer),
                }
            }
            "DECIMAL" | "NUMERIC" | "DEC" | "FIXED" => value.as_f64().map(|f| {
                let scale = scale.unwrap_or(0);
                if scale == 0 {
                    Value::Integer(f.round() as i64)
                } else {
                    let factor = 10f64.powi(scale.min(30) as i32);
                    Value::Float((f * factor).round() / factor)
                }
            }),
            "FLOAT" | "DOUBLE" | "REAL" => value.as_f64().map(Value::Float),
            "CHAR" | "VARCHAR" | "NCHAR" | "TEXT" | "BINARY" | "VARBINARY" => value.to_text().map(|s| {
                Value::Text(match length {
                    Some(n) => s.chars().take(n as usize).collect(),
                    None => s,
                })
            }),
            "DATE" => datetime::parse_temporal(&value).map(|t| Value::Text(t.date().format(DATE_FORMAT).to_string())),
            "DATETIME" | "TIMESTAMP" => {
                datetime::parse_temporal(&value).map(|t| Value::Text(datetime::format_datetime(&t.datetime)))
            }
            "TIME" => datetime::parse_time(&value).map(|t| Value::Text(t.format(TIME_FORMAT).to_string())),
            "JSON" => match &value {
                Value::Text(s) => match serde_json::from_str::<JsonValue>(s) {
                    Ok(json) => Some(Value::Text(json.to_string())),
                    Err(e) => {
                        self.warn_invalid(format!("invalid JSON in CAST: {}", e));
                        None
                    }
                },
                other => Some(Value::Text(other.to_json().to_string())),
            },
            "BOOL" | "BOOLEAN" => value.truthy().map(|b| Value::Integer(b as i64)),
            _ => {
                self.warn_invalid(format!("unsupported CAST target {}", target));
                Some(value)
            }
        };
        Ok(cast.unwrap_or(Value::Null))
    }

    fn parse_json(&self, value: &Value) -> Option<JsonValue> {
        match value {
            Value::Null => None,
            Value::Text(s) => match serde_json::from_str(s) {
                Ok(json) => Some(json),
                Err(e) => {
                    self.warn_invalid(format!("invalid JSON document: {}", e));
                    None
                }
            },
            other => Some(other.to_json()),
        }
    }

    fn json_path(&self, path: &str) -> Option<Vec<PathStep>> {
        let steps = parse_json_path(path);
        if steps.is_none() {
            self.warn_invalid(format!("invalid JSON path '{}'", path));
        }
        steps
    }

    /// Document named by the first argument, narrowed by an optional path
    fn json_target(&self, args: &[Value]) -> Option<JsonValue> {
        let doc = self.parse_json(args.first()?)?;
        match args.get(1) {
            Some(path) => {
                let steps = self.json_path(&path.to_text()?)?;
                json_lookup(&doc, &steps).cloned()
            }
            None => Some(doc),
        }
    }

    fn json_extract(&self, args: &[Value]) -> Option<Value> {
        let doc = self.parse_json(args.first()?)?;
        let paths = &args[1..];
        if paths.len() == 1 {
            let steps = self.json_path(&paths[0].to_text()?)?;
            return json_lookup(&doc, &steps).map(json_to_value);
        }
        let mut found = Vec::new();
        for path in paths {
            let steps = self.json_path(&path.to_text()?)?;
            if let Some(node) = json_lookup(&doc, &steps) {
                found.push(node.clone());
            }
        }
        (!found.is_empty()).then(|| Value::Text(JsonValue::Array(found).to_string()))
    }

    fn json_object(&self, args: &[Value]) -> Option<Value> {
        if args.len() % 2 != 0 {
            self.warn_invalid("JSON_OBJECT needs key/value pairs".to_string());
            return None;
        }
        let mut object = serde_json::Map::new();
        for pair in args.chunks(2) {
            let Some(key) = pair[0].to_text() else {
                self.warn_invalid("JSON_OBJECT key is NULL".to_string());
                return None;
            };
            object.insert(key, pair[1].to_json());
        }
        Some(Value::Text(JsonValue::Object(object).to_string()))
    }
}

fn text(args: &[Value], index: usize) -> Option<String> {
    args.get(index)?.to_text()
}

fn int(args: &[Value], index: usize) -> Option<i64> {
    args.get(index)?.as_i64()
}

fn num(args: &[Value], index: usize) -> Option<f64> {
    args.get(index)?.as_f64()
}

fn number(args: &[Value], index: usize) -> Option<Value> {
    args.get(index)?.to_number()
}

fn temporal(args: &[Value], index: usize) -> Option<datetime::Temporal> {
    datetime::parse_temporal(args.get(index)?)
}

fn text2(args: &[Value], f: impl Fn(&str, i64) -> String) -> Option<Value> {
    Some(Value::Text(f(&text(args, 0)?, int(args, 1)?)))
}

fn finite(x: f64) -> Option<Value> {
    x.is_finite().then_some(Value::Float(x))
}

fn float_fn(args: &[Value], f: impl Fn(f64) -> Option<f64>) -> Option<Value> {
    f(num(args, 0)?).and_then(finite)
}

fn concat(args: &[Value]) -> Option<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_text()?);
    }
    Some(Value::Text(out))
}

fn concat_ws(args: &[Value]) -> Option<Value> {
    let separator = text(args, 0)?;
    let parts: Vec<String> = args[1..].iter().filter_map(Value::to_text).collect();
    Some(Value::Text(parts.join(&separator)))
}

/// 1-based, negative positions count from the end, position 0 is empty
fn substring(s: &str, pos: i64, len: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    let start = match pos {
        0 => return String::new(),
        p if p > 0 => p - 1,
        p => n + p,
    };
    if start < 0 || start >= n {
        return String::new();
    }
    let end = match len {
        Some(l) if l <= 0 => return String::new(),
        Some(l) => start.saturating_add(l).min(n),
        None => n,
    };
    chars[start as usize..end as usize].iter().collect()
}

/// TRIM(LEADING|TRAILING|BOTH remove FROM s): strips repeated occurrences of `remove`
fn trim_affix(s: &str, remove: &str, mode: &str) -> String {
    if remove.is_empty() {
        return s.to_string();
    }
    let mut out = s;
    let mode = mode.to_ascii_uppercase();
    if mode != "TRAILING" {
        while let Some(rest) = out.strip_prefix(remove) {
            out = rest;
        }
    }
    if mode != "LEADING" {
        while let Some(rest) = out.strip_suffix(remove) {
            out = rest;
        }
    }
    out.to_string()
}

fn pad(args: &[Value], left: bool) -> Option<Value> {
    let (s, len, padding) = (text(args, 0)?, int(args, 1)?, text(args, 2)?);
    if len < 0 || len as usize > MAX_STRING_BYTES {
        return None;
    }
    let len = len as usize;
    let count = s.chars().count();
    if len <= count {
        return Some(Value::Text(s.chars().take(len).collect()));
    }
    if padding.is_empty() {
        return None;
    }
    let fill: String = padding.chars().cycle().take(len - count).collect();
    Some(Value::Text(if left { fill + &s } else { s + &fill }))
}

/// LOCATE(needle, haystack, pos): 1-based char position, 0 when absent; case-insensitive
fn locate(needle: &str, haystack: &str, pos: i64) -> i64 {
    let hay: Vec<char> = haystack.to_lowercase().chars().collect();
    let needle: Vec<char> = needle.to_lowercase().chars().collect();
    if pos < 1 || pos as usize > hay.len() + 1 {
        return 0;
    }
    let start = pos as usize - 1;
    if needle.is_empty() {
        return pos;
    }
    if needle.len() > hay.len() {
        return 0;
    }
    (start..=hay.len() - needle.len())
        .find(|&i| hay[i..i + needle.len()] == needle[..])
        .map_or(0, |i| i as i64 + 1)
}

fn field(args: &[Value]) -> i64 {
    let Some(needle) = args.first().filter(|v| !v.is_null()) else {
        return 0;
    };
    args[1..]
        .iter()
        .position(|v| !v.is_null() && sql_compare(needle, v) == Ordering::Equal)
        .map_or(0, |p| p as i64 + 1)
}

fn substring_index(s: &str, delim: &str, count: i64) -> String {
    if delim.is_empty() || count == 0 {
        return String::new();
    }
    if count > 0 {
        match s.match_indices(delim).nth(count as usize - 1) {
            Some((pos, _)) => s[..pos].to_string(),
            None => s.to_string(),
        }
    } else {
        match s.rmatch_indices(delim).nth(count.unsigned_abs() as usize - 1) {
            Some((pos, _)) => s[pos + delim.len()..].to_string(),
            None => s.to_string(),
        }
    }
}

/// INSERT(s, pos, len, new)
fn insert_at(s: &str, pos: i64, len: i64, new: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len() as i64;
    if pos < 1 || pos > n {
        return s.to_string();
    }
    let start = (pos - 1) as usize;
    let end = if len < 0 { n } else { (pos - 1).saturating_add(len).min(n) } as usize;
    let mut out: String = chars[..start].iter().collect();
    out.push_str(new);
    out.extend(&chars[end..]);
    out
}

/// FORMAT(x, d): rounded to `d` places with thousands separators
fn format_number(x: f64, decimals: i64) -> String {
    let decimals = decimals.clamp(0, 30) as usize;
    let factor = 10f64.powi(decimals as i32);
    let rounded = (x * factor).round() / factor;
    let formatted = format!("{:.*}", decimals, rounded.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        grouped.insert(0, '-');
    }
    match frac_part {
        Some(frac) => format!("{}.{}", grouped, frac),
        None => grouped,
    }
}

fn hex(value: &Value) -> Option<Value> {
    let out = match value {
        Value::Null => return None,
        Value::Text(s) => s.bytes().map(|b| format!("{:02X}", b)).collect(),
        Value::Float(f) => format!("{:X}", f.round() as i64 as u64),
        other => format!("{:X}", other.as_i64()? as u64),
    };
    Some(Value::Text(out))
}

fn integral(n: Value, f: fn(f64) -> f64) -> Value {
    match n {
        Value::Integer(i) => Value::Integer(i),
        other => {
            let x = f(other.as_f64().unwrap_or(0.0));
            if x.abs() < 9.0e18 {
                Value::Integer(x as i64)
            } else {
                Value::Float(x)
            }
        }
    }
}

/// ROUND / TRUNCATE to `d` decimal places; integers stay integers
fn round(args: &[Value], f: fn(f64) -> f64) -> Option<Value> {
    let n = number(args, 0)?;
    let places = match args.get(1) {
        Some(v) => v.as_i64()?.clamp(-30, 30),
        None => 0,
    };
    let x = n.as_f64()?;
    let shifted = if places >= 0 {
        let factor = 10f64.powi(places as i32);
        f(x * factor) / factor
    } else {
        let factor = 10f64.powi(-places as i32);
        f(x / factor) * factor
    };
    Some(match n {
        Value::Integer(i) if places >= 0 => Value::Integer(i),
        Value::Integer(_) => Value::Integer(shifted as i64),
        _ => Value::Float(shifted),
    })
}

fn extreme(args: &[Value], want: Ordering) -> Option<Value> {
    if args.is_empty() || args.iter().any(Value::is_null) {
        return None;
    }
    args.iter()
        .cloned()
        .reduce(|best, v| if sql_compare(&v, &best) == want { v } else { best })
}

/// Integer prefix of a string such as "12abc"
fn leading_int(s: &str) -> i64 {
    crate::types::parse_numeric_prefix(s).trunc() as i64
}

/// `(length, scale)` of a type such as `DECIMAL(10,2)`
fn type_args(target: &str) -> (Option<u32>, Option<u32>) {
    let Some(open) = target.find('(') else {
        return (None, None);
    };
    let inner = target[open + 1..].split(')').next().unwrap_or("");
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u32>().ok());
    (parts.next().flatten(), parts.next().flatten())
}

fn uuid_v4() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

#[derive(Debug, Clone, PartialEq)]
enum PathStep {
    Key(String),
    Index(usize),
}

/// `$`, `$.a.b`, `$."a b"`, `$.items[0].name`
fn parse_json_path(path: &str) -> Option<Vec<PathStep>> {
    let chars: Vec<char> = path.trim().strip_prefix('$')?.chars().collect();
    let mut steps = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                let key: String = if chars.get(i) == Some(&'"') {
                    let close = chars[i + 1..].iter().position(|&c| c == '"')? + i + 1;
                    let key = chars[i + 1..close].iter().collect();
                    i = close + 1;
                    key
                } else {
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    chars[start..i].iter().collect()
                };
                if key.is_empty() {
                    return None;
                }
                steps.push(PathStep::Key(key));
            }
            '[' => {
                let close = chars[i..].iter().position(|&c| c == ']')? + i;
                let index: String = chars[i + 1..close].iter().collect();
                steps.push(PathStep::Index(index.trim().parse().ok()?));
                i = close + 1;
            }
            c if c.is_whitespace() => i += 1,
            _ => return None,
        }
    }
    Some(steps)
}

fn json_lookup<'j>(doc: &'j JsonValue, steps: &[PathStep]) -> Option<&'j JsonValue> {
    steps.iter().try_fold(doc, |node, step| match step {
        PathStep::Key(key) => node.as_object()?.get(key),
        PathStep::Index(i) => match node {
            JsonValue::Array(items) => items.get(*i),
            // A scalar behaves as a one-element array
            scalar if *i == 0 => Some(scalar),
            _ => None,
        },
    })
}

/// JSON_EXTRACT results: numbers come back as numbers, everything else as JSON text
fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Number(_) => Value::from_json(json),
        other => Value::Text(other.to_string()),
    }
}

fn json_unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        if let Ok(JsonValue::String(inner)) = serde_json::from_str::<JsonValue>(s) {
            return inner;
        }
    }
    s.to_string()
}
