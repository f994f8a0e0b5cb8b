//! Access-path selection.
//!
//! Splits the WHERE clause into top-level AND conjuncts, extracts the
//! simple `column op constant` constraints, and picks at most one index to
//! drive the query:
//!
//! 1. an equality constraint on an indexed column (point probe),
//! 2. else a `(≥, ≤)` pair on one indexed column (bounded range),
//! 3. else a single bound on an indexed column (half-open range),
//! 4. else a full scan of the table's file-id bucket.
//!
//! Strict bounds (`<`, `>`) plan as their inclusive counterparts; the
//! executor re-applies the full predicate, so boundary rows fall out there.
//! The plan also advertises the ordering the path will yield — `(key,
//! sequence)` for index paths, insertion order for scans — so the executor
//! can skip redundant sorts.

use eyre::Result;
use smallvec::SmallVec;

use super::ast::{BinaryOp, Expr};
use super::predicate::resolve_scalar;
use crate::table::TableStore;
use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum AccessPath<'a> {
    IndexEq {
        column: &'a str,
        key: Value<'static>,
    },
    IndexRange {
        column: &'a str,
        low: Option<Value<'static>>,
        high: Option<Value<'static>>,
    },
    FullScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan<'a> {
    pub access: AccessPath<'a>,
    /// Column whose ascending `(key, sequence)` order the path yields.
    pub key_ordered_by: Option<&'a str>,
}

#[derive(Debug)]
struct Constraint<'a> {
    column: &'a str,
    op: BinaryOp,
    value: Value<'static>,
}

pub fn plan_access<'a>(
    where_clause: Option<&'a Expr<'a>>,
    table: &TableStore,
    bindings: &[Value<'static>],
) -> Result<Plan<'a>> {
    let Some(expr) = where_clause else {
        return Ok(Plan {
            access: AccessPath::FullScan,
            key_ordered_by: None,
        });
    };

    let mut conjuncts: SmallVec<[&Expr; 8]> = SmallVec::new();
    flatten_conjuncts(expr, &mut conjuncts);

    let mut constraints: SmallVec<[Constraint; 8]> = SmallVec::new();
    for conjunct in &conjuncts {
        extract_constraints(conjunct, bindings, &mut constraints)?;
    }

    // equality beats everything
    for constraint in &constraints {
        if constraint.op == BinaryOp::Eq && table.has_index(constraint.column) {
            return Ok(Plan {
                access: AccessPath::IndexEq {
                    column: constraint.column,
                    key: constraint.value.clone(),
                },
                key_ordered_by: Some(constraint.column),
            });
        }
    }

    // then a range: prefer a column bounded on both sides
    let mut half_open: Option<(&'a str, Option<Value<'static>>, Option<Value<'static>>)> = None;
    let mut seen: SmallVec<[&str; 4]> = SmallVec::new();
    for candidate in &constraints {
        let column = candidate.column;
        if seen.contains(&column) || !table.has_index(column) {
            continue;
        }
        seen.push(column);

        let mut low: Option<Value<'static>> = None;
        let mut high: Option<Value<'static>> = None;
        for constraint in constraints.iter().filter(|c| c.column == column) {
            match constraint.op {
                BinaryOp::Gt | BinaryOp::GtEq => {
                    if low.is_none() {
                        low = Some(constraint.value.clone());
                    }
                }
                BinaryOp::Lt | BinaryOp::LtEq => {
                    if high.is_none() {
                        high = Some(constraint.value.clone());
                    }
                }
                _ => {}
            }
        }
        match (&low, &high) {
            (Some(_), Some(_)) => {
                return Ok(Plan {
                    access: AccessPath::IndexRange { column, low, high },
                    key_ordered_by: Some(column),
                });
            }
            (Some(_), None) | (None, Some(_)) => {
                if half_open.is_none() {
                    half_open = Some((column, low, high));
                }
            }
            (None, None) => {}
        }
    }

    if let Some((column, low, high)) = half_open {
        return Ok(Plan {
            access: AccessPath::IndexRange { column, low, high },
            key_ordered_by: Some(column),
        });
    }

    Ok(Plan {
        access: AccessPath::FullScan,
        key_ordered_by: None,
    })
}

fn flatten_conjuncts<'a>(expr: &'a Expr<'a>, out: &mut SmallVec<[&'a Expr<'a>; 8]>) {
    if let Expr::Binary {
        left,
        op: BinaryOp::And,
        right,
    } = expr
    {
        flatten_conjuncts(left, out);
        flatten_conjuncts(right, out);
    } else {
        out.push(expr);
    }
}

/// Records the simple constraints one conjunct contributes: `col op const`,
/// `const op col` (operator flipped), and non-negated BETWEEN as its two
/// bounds. Anything else contributes nothing and is left to the residual
/// predicate.
fn extract_constraints<'a>(
    conjunct: &'a Expr<'a>,
    bindings: &[Value<'static>],
    out: &mut SmallVec<[Constraint<'a>; 8]>,
) -> Result<()> {
    match conjunct {
        Expr::Binary { left, op, right } if op.is_comparison() => {
            if let Expr::Column(column) = left.as_ref() {
                if let Some(value) = resolve_scalar(right, bindings)? {
                    out.push(Constraint {
                        column: *column,
                        op: *op,
                        value,
                    });
                }
            } else if let Expr::Column(column) = right.as_ref() {
                if let Some(value) = resolve_scalar(left, bindings)? {
                    out.push(Constraint {
                        column: *column,
                        op: flip(*op),
                        value,
                    });
                }
            }
        }
        Expr::Between {
            expr,
            low,
            high,
            negated: false,
        } => {
            if let Expr::Column(column) = expr.as_ref() {
                if let Some(value) = resolve_scalar(low, bindings)? {
                    out.push(Constraint {
                        column: *column,
                        op: BinaryOp::GtEq,
                        value,
                    });
                }
                if let Some(value) = resolve_scalar(high, bindings)? {
                    out.push(Constraint {
                        column: *column,
                        op: BinaryOp::LtEq,
                        value,
                    });
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn flip(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Lt => BinaryOp::Gt,
        BinaryOp::LtEq => BinaryOp::GtEq,
        BinaryOp::Gt => BinaryOp::Lt,
        BinaryOp::GtEq => BinaryOp::LtEq,
        other => other,
    }
}
