//! Group records by a key field and reduce the other fields per group.
//!
//! ```text
//! KP records                         Grouped by PE
//! ┌──────────────────────────┐       ┌──────────────────────────────┐
//! │ PE: 0, total_rollbacks: 3│       │ PE: 0, total_rollbacks: 5    │
//! │ PE: 0, total_rollbacks: 2│  →    ├──────────────────────────────┤
//! │ PE: 1, total_rollbacks: 7│       │ PE: 1, total_rollbacks: 7    │
//! └──────────────────────────┘       └──────────────────────────────┘
//! ```
//!
//! Groups are emitted in order of first appearance of their key. Every
//! numeric reduction goes through the elementwise primitives in
//! [`super::vector`], so scalar and vector fields reduce alike.

use std::borrow::Cow;
use std::collections::HashMap;

use super::operations::{GroupSpec, Reducer};
use super::vector::{vector_avg, vector_max, vector_min, vector_sum};
use crate::error::{TransformError, TransformResult};
use crate::models::{Field, Record, RecordSet};

/// Hashable identity of a field value. Int and Float keys with the same
/// numeric value are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum GroupKey {
    Number(u64),
    Text(String),
    Vector(Vec<u64>),
}

fn normalized_bits(v: f64) -> u64 {
    // -0.0 and 0.0 must hash alike
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl GroupKey {
    /// `None` for missing values.
    pub(crate) fn of(field: &Field) -> Option<Self> {
        if field.is_missing() {
            return None;
        }
        match field {
            Field::Text(s) => Some(GroupKey::Text(s.clone())),
            Field::Vector(v) => Some(GroupKey::Vector(v.iter().copied().map(normalized_bits).collect())),
            other => other.as_f64().map(|v| GroupKey::Number(normalized_bits(v))),
        }
    }
}

/// Accumulates the member rows of one group.
struct GroupBuilder {
    key: Field,
    rows: Vec<usize>,
}

impl GroupBuilder {
    fn build(self, records: &[Record], spec: &GroupSpec) -> TransformResult<Record> {
        let mut out = Record::new().with(spec.by.clone(), self.key);
        for agg in &spec.aggregates {
            let value = reduce_rows(records, &self.rows, &agg.field, agg.reducer)?;
            out.set(agg.field.clone(), value);
        }
        Ok(out)
    }
}

/// Partition `records` by `spec.by` and reduce every aggregate per group.
pub fn group_records(records: &[Record], spec: &GroupSpec) -> TransformResult<RecordSet> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<GroupBuilder> = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let key_field = record
            .get(&spec.by)
            .filter(|f| !f.is_missing())
            .ok_or_else(|| TransformError::MissingField {
                field: spec.by.clone(),
                row,
            })?;
        let key = GroupKey::of(key_field).ok_or_else(|| TransformError::MissingField {
            field: spec.by.clone(),
            row,
        })?;

        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(GroupBuilder {
                key: key_field.clone(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(row);
    }

    groups.into_iter().map(|g| g.build(records, spec)).collect()
}

/// Reduce one field over the given rows. Rows where the field is absent or
/// missing are skipped; a group with no present value yields `Missing`.
fn reduce_rows(records: &[Record], rows: &[usize], field: &str, reducer: Reducer) -> TransformResult<Field> {
    if reducer == Reducer::Count {
        return Ok(Field::Int(rows.len() as i64));
    }

    let mut vectors: Vec<Cow<'_, [f64]>> = Vec::with_capacity(rows.len());
    let mut all_scalar = true;
    let mut all_int = true;

    for &row in rows {
        let Some(value) = records[row].get(field) else {
            continue;
        };
        if value.is_missing() {
            continue;
        }
        match value {
            Field::Vector(_) => all_scalar = false,
            Field::Float(_) => all_int = false,
            Field::Text(_) => {
                return Err(TransformError::NotNumeric {
                    field: field.to_string(),
                    row,
                })
            }
            _ => {}
        }
        if let Some(v) = value.as_vector() {
            vectors.push(v);
        }
    }

    if vectors.is_empty() {
        return Ok(Field::Missing);
    }

    let reduced = match reducer {
        Reducer::Sum => vector_sum(&vectors)?,
        Reducer::Avg => vector_avg(&vectors)?,
        Reducer::Min => vector_min(&vectors)?,
        Reducer::Max => vector_max(&vectors)?,
        Reducer::Count => return Ok(Field::Int(rows.len() as i64)),
    };

    if !all_scalar {
        return Ok(Field::Vector(reduced));
    }
    let scalar = reduced[0];
    let keeps_int = all_int && reducer != Reducer::Avg;
    Ok(if keeps_int {
        Field::Int(scalar as i64)
    } else {
        Field::Float(scalar)
    })
}
