//! Chainable record pipelines.
//!
//! A [`Pipeline`] is built once from chained calls and applied to any number
//! of record sets afterwards. Applying never touches the stage list, so a
//! pipeline can be shared and re-run on every interaction.
//!
//! # Example
//!
//! ```rust,ignore
//! use rossvis::transform::{GroupSpec, Pipeline, SortKey};
//!
//! let by_pe = Pipeline::new()
//!     .derive(|kp, i| kp.set("PE", i / 16))
//!     .group(GroupSpec::by("PE").sum("total_rollbacks"))
//!     .sort_by([SortKey::desc("PE")]);
//!
//! let window_a = by_pe.apply(&kps_a)?;
//! let window_b = by_pe.apply(&kps_b)?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::grouper::group_records;
use super::operations::{DeriveSpec, GroupSpec, Order, Predicate, SortKey};
use crate::error::TransformResult;
use crate::models::{Record, RecordSet};

/// Per-record computation with access to the record's position.
pub type DeriveFn = dyn Fn(&mut Record, usize) -> TransformResult<()> + Send + Sync;

#[derive(Clone)]
enum Stage {
    Derive(Arc<DeriveFn>),
    Match(Predicate),
    Group(GroupSpec),
    SortBy(Vec<SortKey>),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Derive(_) => "derive",
            Stage::Match(_) => "match",
            Stage::Group(_) => "group",
            Stage::SortBy(_) => "sort_by",
        }
    }
}

/// An ordered list of stages, executed only when applied.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stages.iter().map(Stage::name)).finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute or overwrite fields on every record, in place.
    pub fn derive<F>(self, f: F) -> Self
    where
        F: Fn(&mut Record, usize) + Send + Sync + 'static,
    {
        self.try_derive(move |record, index| {
            f(record, index);
            Ok(())
        })
    }

    /// Like [`Pipeline::derive`] for computations that can fail.
    pub fn try_derive<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Record, usize) -> TransformResult<()> + Send + Sync + 'static,
    {
        self.stages.push(Stage::Derive(Arc::new(f)));
        self
    }

    /// Derive with a named, serializable operation.
    pub fn derive_spec(self, spec: DeriveSpec) -> Self {
        self.try_derive(move |record, index| spec.apply(record, index))
    }

    /// Keep only records satisfying `predicate`, preserving relative order.
    pub fn matching(mut self, predicate: Predicate) -> Self {
        self.stages.push(Stage::Match(predicate));
        self
    }

    /// Aggregate by key.
    pub fn group(mut self, spec: GroupSpec) -> Self {
        self.stages.push(Stage::Group(spec));
        self
    }

    /// Stable multi-key sort.
    pub fn sort_by(mut self, keys: impl IntoIterator<Item = SortKey>) -> Self {
        self.stages.push(Stage::SortBy(keys.into_iter().collect()));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run on a copy of `records`; the input is left untouched.
    pub fn apply(&self, records: &[Record]) -> TransformResult<RecordSet> {
        self.run(records.to_vec())
    }

    /// Run on an owned record set.
    pub fn run(&self, mut records: RecordSet) -> TransformResult<RecordSet> {
        for stage in &self.stages {
            records = match stage {
                Stage::Derive(f) => {
                    for (index, record) in records.iter_mut().enumerate() {
                        f(record, index)?;
                    }
                    records
                }
                Stage::Match(predicate) => {
                    records.retain(|r| predicate.matches(r));
                    records
                }
                Stage::Group(spec) => group_records(&records, spec)?,
                Stage::SortBy(keys) => {
                    sort_records(&mut records, keys);
                    records
                }
            };
        }
        Ok(records)
    }
}

/// Stable sort by several keys; ties keep their input order.
///
/// Missing and absent values go last whatever the direction.
pub fn sort_records(records: &mut [Record], keys: &[SortKey]) {
    records.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                fn present<'r>(r: &'r Record, field: &str) -> Option<&'r crate::models::Field> {
                    r.get(field).filter(|f| !f.is_missing())
                }
                let present = |r| present(r, &key.field);
                match (present(a), present(b)) {
                    (Some(x), Some(y)) => match key.order {
                        Order::Asc => x.sort_cmp(y),
                        Order::Desc => y.sort_cmp(x),
                    },
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}
