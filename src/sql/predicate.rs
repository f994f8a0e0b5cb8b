//! WHERE-clause evaluation against one materialized row.
//!
//! The executor re-checks the complete predicate tree on every candidate
//! row, whatever access path produced it, so index probes only narrow the
//! candidate set and can never change results.
//!
//! Comparison follows the engine-wide total order with one SQL adjustment:
//! a comparison against NULL is unknown and fails the predicate, except
//! NULL = NULL which holds (the order treats two nulls as equal).

use eyre::Result;
use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, Literal};
use super::{HIDDEN_DATA, HIDDEN_OFFSET, HIDDEN_ROWID, HIDDEN_SOURCE};
use crate::error::EngineError;
use crate::table::TableStore;
use crate::types::{compare_values, Value};

/// One candidate row: the raw payload plus its identity.
pub struct RowContext<'a> {
    pub table: &'a TableStore,
    pub payload: &'a [u8],
    pub sequence: u64,
    pub offset: u64,
}

impl<'a> RowContext<'a> {
    /// Materializes one column of this row: hidden columns from the record
    /// identity, everything else through the table's extractor.
    pub fn column_value(&self, name: &str) -> Result<Value<'a>> {
        match name {
            HIDDEN_ROWID => Ok(Value::UInt64(self.sequence)),
            HIDDEN_OFFSET => Ok(Value::UInt64(self.offset)),
            HIDDEN_SOURCE => Ok(Value::Str(self.table.name().into())),
            HIDDEN_DATA => Ok(Value::Bytes(self.payload.into())),
            _ => self.table.column_value(self.payload, name),
        }
    }
}

/// Resolves a literal or placeholder to a concrete value. Returns `None`
/// for column references and composite expressions.
pub fn resolve_scalar(
    expr: &Expr<'_>,
    bindings: &[Value<'static>],
) -> Result<Option<Value<'static>>> {
    match expr {
        Expr::Literal(lit) => Ok(Some(literal_value(lit)?)),
        Expr::Placeholder(ordinal) => match bindings.get(*ordinal) {
            Some(value) => Ok(Some(value.clone())),
            None => Err(EngineError::Query(format!(
                "no binding supplied for parameter {}",
                ordinal + 1
            ))
            .into()),
        },
        _ => Ok(None),
    }
}

fn literal_value(lit: &Literal<'_>) -> Result<Value<'static>> {
    Ok(match lit {
        Literal::Integer(text) => {
            let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16)
            } else {
                text.parse::<i64>()
            };
            Value::Int64(parsed.map_err(|_| {
                EngineError::Query(format!("invalid integer literal {}", text))
            })?)
        }
        Literal::Float(text) => Value::Float64(text.parse::<f64>().map_err(|_| {
            EngineError::Query(format!("invalid float literal {}", text))
        })?),
        Literal::String(text) => {
            if text.contains("''") {
                Value::Str(text.replace("''", "'").into())
            } else {
                Value::Str(text.to_string().into())
            }
        }
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    })
}

fn eval_scalar<'a>(
    expr: &Expr<'_>,
    ctx: &RowContext<'a>,
    bindings: &[Value<'static>],
) -> Result<Value<'static>> {
    if let Expr::Column(name) = expr {
        return Ok(ctx.column_value(name)?.to_owned_static());
    }
    match resolve_scalar(expr, bindings)? {
        Some(value) => Ok(value),
        None => Err(EngineError::Query(
            "unsupported expression in scalar position".to_string(),
        )
        .into()),
    }
}

/// NULL-aware ordering: unknown against NULL except NULL = NULL.
fn sql_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) | (false, true) => None,
        (false, false) => Some(compare_values(a, b)),
    }
}

fn compare_with_op(a: &Value, b: &Value, op: BinaryOp) -> bool {
    match (sql_compare(a, b), op) {
        (Some(Ordering::Equal), BinaryOp::Eq) => true,
        (Some(ordering), BinaryOp::NotEq) => ordering != Ordering::Equal,
        (Some(Ordering::Less), BinaryOp::Lt) => true,
        (Some(Ordering::Less) | Some(Ordering::Equal), BinaryOp::LtEq) => true,
        (Some(Ordering::Greater), BinaryOp::Gt) => true,
        (Some(Ordering::Greater) | Some(Ordering::Equal), BinaryOp::GtEq) => true,
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => crate::types::try_int64(other).is_some_and(|i| i != 0),
    }
}

/// Evaluates the predicate tree against one row.
pub fn eval_predicate(
    expr: &Expr<'_>,
    ctx: &RowContext<'_>,
    bindings: &[Value<'static>],
) -> Result<bool> {
    match expr {
        Expr::Binary { left, op, right } => match op {
            BinaryOp::And => {
                Ok(eval_predicate(left, ctx, bindings)? && eval_predicate(right, ctx, bindings)?)
            }
            BinaryOp::Or => {
                Ok(eval_predicate(left, ctx, bindings)? || eval_predicate(right, ctx, bindings)?)
            }
            _ => {
                let l = eval_scalar(left, ctx, bindings)?;
                let r = eval_scalar(right, ctx, bindings)?;
                Ok(compare_with_op(&l, &r, *op))
            }
        },
        Expr::Not(inner) => Ok(!eval_predicate(inner, ctx, bindings)?),
        Expr::Between {
            expr: probe,
            low,
            high,
            negated,
        } => {
            let v = eval_scalar(probe, ctx, bindings)?;
            let lo = eval_scalar(low, ctx, bindings)?;
            let hi = eval_scalar(high, ctx, bindings)?;
            let within = compare_with_op(&v, &lo, BinaryOp::GtEq)
                && compare_with_op(&v, &hi, BinaryOp::LtEq);
            Ok(within != *negated)
        }
        Expr::IsNull {
            expr: probe,
            negated,
        } => {
            let v = eval_scalar(probe, ctx, bindings)?;
            Ok(v.is_null() != *negated)
        }
        other => {
            let v = eval_scalar(other, ctx, bindings)?;
            Ok(truthy(&v))
        }
    }
}

/// Collects every column name referenced by the expression, for up-front
/// validation.
pub fn collect_columns<'a>(expr: &'a Expr<'a>, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Column(name) => out.push(name),
        Expr::Binary { left, right, .. } => {
            collect_columns(left, out);
            collect_columns(right, out);
        }
        Expr::Not(inner) => collect_columns(inner, out),
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_columns(expr, out);
            collect_columns(low, out);
            collect_columns(high, out);
        }
        Expr::IsNull { expr, .. } => collect_columns(expr, out),
        Expr::Literal(_) | Expr::Placeholder(_) => {}
    }
}
