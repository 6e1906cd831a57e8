//! # RossVis - trace analytics for ROSS optimistic simulations
//!
//! RossVis loads the statistics a ROSS run writes (per-PE, per-KP and per-LP
//! counters sampled over real and virtual time, plus communication
//! snapshots) and reduces them into the views of an interactive dashboard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ ROSS stats  │────▶│   Loader    │────▶│  Transform  │────▶│   Matrix    │
//! │ (JSON/CSV)  │     │  (typed)    │     │ (pipeline)  │     │ (PE / LP)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │  Dashboard  │
//!                                         │ (renderer)  │
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rossvis::{detail, load_dataset, AnalysisConfig, TimeAxis, TimeWindow};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AnalysisConfig::load(None).unwrap();
//!     let data = load_dataset(&config).await.unwrap();
//!     let window = TimeWindow::closed(TimeAxis::Gvt, 0.0, 5000.0);
//!     if let Some(view) = detail(&data, &config, window).unwrap() {
//!         println!("{} PEs in window", view.pes.len());
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Records, fields, hierarchy keys, time windows
//! - [`parser`] - Typed table loading with encoding detection
//! - [`transform`] - Vector reductions, range filters, pipelines, joins
//! - [`matrix`] - Communication matrices and subsetting
//! - [`analysis`] - Dataset loading, window collapse, detail views
//! - [`config`] - Configuration and visual mappings
//! - [`dashboard`] - Interaction controller over a renderer
//! - [`logs`] - Log broadcasting

// Core modules
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Transformation
pub mod transform;

// Communication
pub mod matrix;

// Orchestration
pub mod analysis;
pub mod config;
pub mod dashboard;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AnalysisError, AnalysisResult, ConfigError, ConfigResult, LoadError, LoadResult, MatrixError, MatrixResult,
    TransformError, TransformResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{global_kp_id, pe_of_kp, Bounds, Field, LpType, Record, RecordSet, TimeAxis, TimeWindow};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use parser::{
    decode_auto, decode_content, detect_delimiter, detect_encoding, load_delimited, load_json_rows, read_text_file,
    records_from_json, ColumnType, TableSchema,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    attach_by_key, attach_by_position, domains, filter_by_range, filter_window, group_records,
    operations_description, sort_records, vector_avg, vector_max, vector_min, vector_sum, within_window, Aggregate,
    DeriveSpec, Domain, GroupSpec, Order, Pipeline, PipelineSpec, Predicate, Reducer, Sampled, SortKey, StageSpec,
};

// =============================================================================
// Re-exports - Matrix
// =============================================================================

pub use matrix::{
    build_lp_type_matrix, build_pe_matrix, subset_matrix, CommMatrix, GraphData, Link, LpNode, LpTypeMatrix,
    LpTypeSnapshot, PeSnapshot,
};

// =============================================================================
// Re-exports - Analysis
// =============================================================================

pub use analysis::{
    brush_rt, collapse_window, dataset_descriptors, detail, load_all, load_dataset, ChordData, Descriptor, DetailView,
    Format, Payload, Selection, TraceData,
};

// =============================================================================
// Re-exports - Config & Dashboard
// =============================================================================

pub use config::{AnalysisConfig, ChartSize, ChartSizes, DatasetFiles, FieldMapping, Role, ViewMappings, VisualMapping};

pub use dashboard::{
    ChartData, ChartKind, ChartSpec, Dashboard, Interaction, Panel, RecordingRenderer, RenderEvent, Renderer,
    ViewHandle,
};

// =============================================================================
// Re-exports - Logs
// =============================================================================

pub use logs::{log_error, log_info, log_success, log_warning, LogEntry, LogLevel, LOG_BROADCASTER};
