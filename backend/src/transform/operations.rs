//! Pipeline stage definitions.
//!
//! Match predicates, group reducers, sort keys and named derive operations
//! are plain serde types so that a whole pipeline can be written as JSON and
//! compiled with [`PipelineSpec::compile`].

use serde::{Deserialize, Serialize};

use super::pipeline::Pipeline;
use crate::error::{TransformError, TransformResult};
use crate::models::{Field, Record};

// =============================================================================
// Match
// =============================================================================

/// Field comparison used by a match stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Field equals value (Int and Float compare numerically).
    Eq { field: String, value: Field },
    /// Field differs from value, or is absent.
    Ne { field: String, value: Field },
    /// Field is one of the values.
    In { field: String, values: Vec<Field> },
    /// Field is none of the values, or is absent.
    NotIn { field: String, values: Vec<Field> },
}

impl Predicate {
    pub fn equals(field: impl Into<String>, value: impl Into<Field>) -> Self {
        Predicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Field>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        let equals = |field: &str, value: &Field| record.get(field).is_some_and(|v| v.loosely_eq(value));
        match self {
            Predicate::Eq { field, value } => equals(field, value),
            Predicate::Ne { field, value } => !equals(field, value),
            Predicate::In { field, values } => values.iter().any(|v| equals(field, v)),
            Predicate::NotIn { field, values } => !values.iter().any(|v| equals(field, v)),
        }
    }
}

// =============================================================================
// Group
// =============================================================================

/// Reduction applied to one field within each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[serde(alias = "$sum")]
    Sum,
    #[serde(alias = "$avg")]
    Avg,
    #[serde(alias = "$min")]
    Min,
    #[serde(alias = "$max")]
    Max,
    /// Number of records in the group.
    #[serde(alias = "$count")]
    Count,
}

/// One output field of a group stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub field: String,
    pub reducer: Reducer,
}

/// Partition by `by`, one output record per distinct key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub by: String,
    #[serde(default)]
    pub aggregates: Vec<Aggregate>,
}

impl GroupSpec {
    pub fn by(field: impl Into<String>) -> Self {
        Self {
            by: field.into(),
            aggregates: Vec::new(),
        }
    }

    pub fn reduce(mut self, field: impl Into<String>, reducer: Reducer) -> Self {
        self.aggregates.push(Aggregate {
            field: field.into(),
            reducer,
        });
        self
    }

    pub fn sum(self, field: impl Into<String>) -> Self {
        self.reduce(field, Reducer::Sum)
    }

    pub fn avg(self, field: impl Into<String>) -> Self {
        self.reduce(field, Reducer::Avg)
    }
}

// =============================================================================
// Sort
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// One key of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: Order,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Desc,
        }
    }
}

// =============================================================================
// Derive
// =============================================================================

/// Named per-record computations usable from JSON specs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeriveSpec {
    /// `target = floor(index / size)`
    IndexBucket { target: String, size: usize },
    /// `target = major * stride + minor`
    CompositeId {
        target: String,
        major: String,
        minor: String,
        stride: i64,
    },
    /// `target = source * factor + offset`
    Scale {
        target: String,
        source: String,
        factor: f64,
        #[serde(default)]
        offset: f64,
    },
    /// `target = value`
    Constant { target: String, value: Field },
}

impl DeriveSpec {
    pub fn apply(&self, record: &mut Record, index: usize) -> TransformResult<()> {
        match self {
            DeriveSpec::IndexBucket { target, size } => {
                if *size == 0 {
                    return Err(TransformError::InvalidStage("index_bucket size must be positive".into()));
                }
                record.set(target.clone(), index / size);
            }
            DeriveSpec::CompositeId { target, major, minor, stride } => {
                let id = match (record.get(major).and_then(Field::as_i64), record.get(minor).and_then(Field::as_i64)) {
                    (Some(a), Some(b)) => Field::Int(a * stride + b),
                    _ => Field::Missing,
                };
                record.set(target.clone(), id);
            }
            DeriveSpec::Scale { target, source, factor, offset } => {
                let value = record
                    .number(source)
                    .map(|v| Field::Float(v * factor + offset))
                    .unwrap_or(Field::Missing);
                record.set(target.clone(), value);
            }
            DeriveSpec::Constant { target, value } => {
                record.set(target.clone(), value.clone());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Pipeline specs
// =============================================================================

/// One stage of a JSON pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageSpec {
    Derive(DeriveSpec),
    Match(Predicate),
    Group(GroupSpec),
    SortBy { keys: Vec<SortKey> },
}

/// A serializable pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default)]
    pub description: String,
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    pub fn from_json(json: &str) -> TransformResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> TransformResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the executable pipeline.
    pub fn compile(&self) -> Pipeline {
        self.stages.iter().fold(Pipeline::new(), |pipeline, stage| match stage {
            StageSpec::Derive(spec) => pipeline.derive_spec(spec.clone()),
            StageSpec::Match(predicate) => pipeline.matching(predicate.clone()),
            StageSpec::Group(spec) => pipeline.group(spec.clone()),
            StageSpec::SortBy { keys } => pipeline.sort_by(keys.iter().cloned()),
        })
    }
}

/// Reference text for the CLI.
pub fn operations_description() -> String {
    r#"Pipeline stages (JSON, "type"-tagged):

| Stage   | Fields                                   | Effect                                   |
|---------|------------------------------------------|------------------------------------------|
| derive  | op + op fields (see below)               | compute a field on every record          |
| match   | op: eq/ne/in/not_in, field, value(s)     | keep matching records, order preserved   |
| group   | by, aggregates: [{field, reducer}]       | one record per distinct key              |
| sort_by | keys: [{field, order: asc/desc}]         | stable multi-key sort                    |

Derive ops: index_bucket {target, size}, composite_id {target, major, minor, stride},
scale {target, source, factor, offset}, constant {target, value}.
Reducers: sum, avg, min, max, count (aliases $sum, $avg, ...).

Example:
{
  "stages": [
    {"type": "derive", "op": "composite_id", "target": "KP_ID", "major": "PE_ID", "minor": "KP_ID", "stride": 16},
    {"type": "match", "op": "in", "field": "PE_ID", "values": [0, 2]},
    {"type": "group", "by": "PE_ID", "aggregates": [{"field": "routers_per_kp", "reducer": "$sum"}]},
    {"type": "sort_by", "keys": [{"field": "PE_ID", "order": "desc"}]}
  ]
}"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predicates() {
        let r = Record::new().with("PE", 2).with("LP_type", "router");
        assert!(Predicate::equals("PE", 2.0).matches(&r));
        assert!(Predicate::is_in("PE", [0, 2]).matches(&r));
        assert!(!Predicate::is_in("PE", [0, 1]).matches(&r));
        assert!(Predicate::Ne { field: "LP_type".into(), value: "server".into() }.matches(&r));
        assert!(!Predicate::equals("missing", 2).matches(&r));
        assert!(Predicate::NotIn { field: "missing".into(), values: vec![Field::Int(1)] }.matches(&r));
    }

    #[test]
    fn test_composite_id_derive() {
        let mut r = Record::new().with("PE_ID", 3).with("KP_ID", 1);
        let spec = DeriveSpec::CompositeId {
            target: "KP_ID".into(),
            major: "PE_ID".into(),
            minor: "KP_ID".into(),
            stride: 2,
        };
        spec.apply(&mut r, 0).unwrap();
        assert_eq!(r.get("KP_ID"), Some(&Field::Int(7)));

        let mut broken = Record::new().with("PE_ID", Field::Missing).with("KP_ID", 1);
        spec.apply(&mut broken, 0).unwrap();
        assert!(broken.get("KP_ID").unwrap().is_missing());
    }

    #[test]
    fn test_index_bucket_rejects_zero() {
        let spec = DeriveSpec::IndexBucket { target: "PE".into(), size: 0 };
        assert!(spec.apply(&mut Record::new(), 3).is_err());

        let spec = DeriveSpec::IndexBucket { target: "PE".into(), size: 4 };
        let mut r = Record::new();
        spec.apply(&mut r, 9).unwrap();
        assert_eq!(r.get("PE"), Some(&Field::Int(2)));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: PipelineSpec = serde_json::from_value(json!({
            "stages": [
                {"type": "match", "op": "in", "field": "PE", "values": [0, 1]},
                {"type": "group", "by": "PE", "aggregates": [{"field": "x", "reducer": "$sum"}]},
                {"type": "sort_by", "keys": [{"field": "PE", "order": "desc"}]},
                {"type": "derive", "op": "scale", "target": "ms", "source": "x", "factor": 0.001}
            ]
        }))
        .unwrap();

        assert_eq!(spec.stages.len(), 4);
        match &spec.stages[1] {
            StageSpec::Group(g) => assert_eq!(g.aggregates[0].reducer, Reducer::Sum),
            other => panic!("unexpected stage {:?}", other),
        }
        assert_eq!(spec.compile().len(), 4);
    }

    #[test]
    fn test_operations_description_lists_stages() {
        let text = operations_description();
        for stage in ["derive", "match", "group", "sort_by"] {
            assert!(text.contains(stage));
        }
    }
}
