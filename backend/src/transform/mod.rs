//! Transformation module.
//!
//! This module reshapes loaded record sets into per-hierarchy views:
//! - Vector: elementwise sum/avg/min/max primitives
//! - Range: time-window filtering and domain statistics
//! - Operations: serializable stage definitions and pipeline specs
//! - Grouper: group-by with per-field reducers
//! - Pipeline: build-once, apply-many stage chains
//! - Join: checked cross-attachment between record sets

pub mod grouper;
pub mod join;
pub mod operations;
pub mod pipeline;
pub mod range;
pub mod vector;

pub use grouper::group_records;
pub use join::{attach_by_key, attach_by_position};
pub use operations::*;
pub use pipeline::{sort_records, DeriveFn, Pipeline};
pub use range::{domains, filter_by_range, filter_window, within_window, Domain, Sampled};
pub use vector::{vector_avg, vector_max, vector_min, vector_sum};
