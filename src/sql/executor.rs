//! SELECT execution over one table store.
//!
//! The executor walks the planner's access path, materializes each
//! candidate through the table's extractor against the zero-copy payload
//! slice, re-applies the full WHERE predicate, then handles ORDER BY,
//! OFFSET/LIMIT, and projection. `COUNT(*)` short-circuits projection and
//! returns a single row.
//!
//! Sort avoidance: index paths yield rows in ascending `(key, sequence)`
//! order and scans in insertion order. When ORDER BY asks for exactly the
//! path's key column, the sort is skipped (descending just reverses the
//! run).

use eyre::Result;
use std::cmp::Ordering;

use super::ast::{Select, SelectItem};
use super::is_hidden_column;
use super::planner::{plan_access, AccessPath};
use super::predicate::{collect_columns, eval_predicate, RowContext};
use crate::error::EngineError;
use crate::storage::StreamLog;
use crate::table::TableStore;
use crate::types::{compare_values, Value};

/// Columns and materialized rows, in final projection order.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value<'static>>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

struct Candidate {
    offset: u64,
    sequence: u64,
}

pub fn execute_select(
    select: &Select<'_>,
    table: &TableStore,
    log: &StreamLog,
    bindings: &[Value<'static>],
) -> Result<QueryResult> {
    validate_columns(select, table)?;

    let count_star = select
        .items
        .iter()
        .any(|item| matches!(item, SelectItem::CountStar { .. }));
    if count_star && select.items.len() > 1 {
        return Err(EngineError::Query(
            "COUNT(*) cannot be combined with other select items".to_string(),
        )
        .into());
    }

    let plan = plan_access(select.where_clause.as_ref(), table, bindings)?;

    let mut candidates = gather_candidates(&plan.access, table, log)?;

    if let Some(where_clause) = &select.where_clause {
        let mut matching = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let payload = log.data_at_offset(candidate.offset)?;
            let ctx = RowContext {
                table,
                payload,
                sequence: candidate.sequence,
                offset: candidate.offset,
            };
            if eval_predicate(where_clause, &ctx, bindings)? {
                matching.push(candidate);
            }
        }
        candidates = matching;
    }

    if count_star {
        let alias = select.items.iter().find_map(|item| match item {
            SelectItem::CountStar { alias } => *alias,
            _ => None,
        });
        let mut rows = vec![vec![Value::Int64(candidates.len() as i64)]];
        if select.offset.unwrap_or(0) > 0 || select.limit == Some(0) {
            rows.clear();
        }
        return Ok(QueryResult {
            columns: vec![alias.unwrap_or("COUNT(*)").to_string()],
            rows,
        });
    }

    if let Some(order) = &select.order_by {
        let presorted = plan.key_ordered_by == Some(order.column);
        if presorted {
            if order.descending {
                candidates.reverse();
            }
        } else {
            let mut keyed = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                let payload = log.data_at_offset(candidate.offset)?;
                let ctx = RowContext {
                    table,
                    payload,
                    sequence: candidate.sequence,
                    offset: candidate.offset,
                };
                let key = ctx.column_value(order.column)?.to_owned_static();
                keyed.push((key, candidate));
            }
            keyed.sort_by(|(a, ca), (b, cb)| {
                let by_key = if order.descending {
                    compare_values(b, a)
                } else {
                    compare_values(a, b)
                };
                if by_key == Ordering::Equal {
                    ca.sequence.cmp(&cb.sequence)
                } else {
                    by_key
                }
            });
            candidates = keyed.into_iter().map(|(_, c)| c).collect();
        }
    }

    if let Some(offset) = select.offset {
        let skip = (offset as usize).min(candidates.len());
        candidates.drain(..skip);
    }
    if let Some(limit) = select.limit {
        candidates.truncate(limit as usize);
    }

    let projection = projected_columns(select, table);
    let wildcard_only =
        select.items.len() == 1 && matches!(select.items[0], SelectItem::Wildcard);
    let mut rows = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        let payload = log.data_at_offset(candidate.offset)?;
        if wildcard_only {
            // whole-row projection goes through the batch extractor hook
            let mut cells = Vec::with_capacity(projection.len());
            table.all_column_values(payload, &mut cells)?;
            rows.push(cells.iter().map(Value::to_owned_static).collect());
            continue;
        }
        let ctx = RowContext {
            table,
            payload,
            sequence: candidate.sequence,
            offset: candidate.offset,
        };
        let mut row = Vec::with_capacity(projection.len());
        for (name, _) in &projection {
            row.push(ctx.column_value(name)?.to_owned_static());
        }
        rows.push(row);
    }

    Ok(QueryResult {
        columns: projection.into_iter().map(|(_, label)| label).collect(),
        rows,
    })
}

fn gather_candidates(
    access: &AccessPath<'_>,
    table: &TableStore,
    log: &StreamLog,
) -> Result<Vec<Candidate>> {
    match access {
        AccessPath::IndexEq { column, key } => {
            let entries = table.index_for(column)?.search_all(key)?;
            Ok(entries
                .into_iter()
                .map(|e| Candidate {
                    offset: e.data_offset,
                    sequence: e.sequence,
                })
                .collect())
        }
        AccessPath::IndexRange { column, low, high } => {
            let entries = table
                .index_for(column)?
                .range_search(low.as_ref(), high.as_ref())?;
            Ok(entries
                .into_iter()
                .map(|e| Candidate {
                    offset: e.data_offset,
                    sequence: e.sequence,
                })
                .collect())
        }
        AccessPath::FullScan => {
            let mut candidates = Vec::new();
            table.iterate_all(log, |record| {
                candidates.push(Candidate {
                    offset: record.offset,
                    sequence: record.sequence,
                });
                true
            });
            Ok(candidates)
        }
    }
}

/// Resolves the output column list: `(source column, output label)` pairs.
/// `*` expands declared columns only; hidden columns must be named.
fn projected_columns(select: &Select<'_>, table: &TableStore) -> Vec<(String, String)> {
    let mut projection = Vec::new();
    for item in &select.items {
        match item {
            SelectItem::Wildcard => {
                for column in table.columns() {
                    projection.push((column.name.clone(), column.name.clone()));
                }
            }
            SelectItem::Column { name, alias } => {
                projection.push((name.to_string(), alias.unwrap_or(name).to_string()));
            }
            SelectItem::CountStar { .. } => {}
        }
    }
    projection
}

fn validate_columns(select: &Select<'_>, table: &TableStore) -> Result<()> {
    let mut referenced: Vec<&str> = Vec::new();
    for item in &select.items {
        if let SelectItem::Column { name, .. } = item {
            referenced.push(name);
        }
    }
    if let Some(order) = &select.order_by {
        referenced.push(order.column);
    }
    if let Some(where_clause) = &select.where_clause {
        collect_columns(where_clause, &mut referenced);
    }

    for name in referenced {
        if !is_hidden_column(name) && !table.has_column(name) {
            return Err(EngineError::Query(format!(
                "no such column: {}.{}",
                table.name(),
                name
            ))
            .into());
        }
    }
    Ok(())
}
