//! Error types for the trace analytics pipeline.
//!
//! One error type per layer:
//!
//! - [`LoadError`] - typed table loading and bulk input reading
//! - [`TransformError`] - vector reductions, pipeline stages, cross-attachment
//! - [`MatrixError`] - communication matrix building and subsetting
//! - [`ConfigError`] - configuration files and visual mappings
//! - [`AnalysisError`] - top-level orchestration (windows, views, dashboard)
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across layer boundaries.
//!
//! Note that malformed *values* are never errors: a cell that fails type
//! coercion becomes [`crate::models::Field::Missing`]. Only structural
//! problems (unreadable input, misaligned record sets, ragged matrices)
//! surface here.

use thiserror::Error;

// =============================================================================
// Loading Errors
// =============================================================================

/// Errors while reading and typing raw inputs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read a file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Delimited text could not be tokenized.
    #[error("Invalid delimited text: {0}")]
    Csv(#[from] csv::Error),

    /// JSON payload could not be decoded.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Text could not be decoded with the detected encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Header and type tags disagree in length.
    #[error("Schema has {header} header fields but {types} type tags")]
    SchemaMismatch { header: usize, types: usize },

    /// Unknown column type tag.
    #[error("Unknown column type '{0}' (expected int, float or string)")]
    UnknownType(String),

    /// A JSON value that cannot be represented as a record field.
    #[error("Unsupported value for field '{field}': {message}")]
    UnsupportedValue { field: String, message: String },

    /// A JSON row that is neither an object nor an array.
    #[error("Row {0} is not a JSON object or array")]
    NotARow(usize),

    /// A payload arrived in a different format than its descriptor declared.
    #[error("Expected {expected} payload for '{source_name}'")]
    FormatMismatch {
        source_name: String,
        expected: &'static str,
    },

    /// A dataset batch with the wrong number of payloads.
    #[error("Expected {expected} payloads, got {found}")]
    PayloadCount { expected: usize, found: usize },
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors from reductions, pipeline stages and cross-attachment.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A record lacks a field a stage needs.
    #[error("Record {row} has no value for field '{field}'")]
    MissingField { field: String, row: usize },

    /// A field that must be numeric holds text.
    #[error("Field '{field}' of record {row} is not numeric")]
    NotNumeric { field: String, row: usize },

    /// A reduction over zero sequences.
    #[error("Cannot reduce an empty set of vectors")]
    EmptyVectorSet,

    /// Sequences of different lengths passed to a reduction.
    #[error("Vector length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    /// Positional cross-attachment between record sets of different sizes.
    #[error("Cannot align {target} records with {source_len} source records")]
    Misaligned { target: usize, source_len: usize },

    /// Key-based cross-attachment found no source record for a key.
    #[error("No source record with {field} = {key}")]
    UnmatchedKey { field: String, key: String },

    /// Key-based cross-attachment found the same key twice in the source.
    #[error("Duplicate source key {field} = {key}")]
    DuplicateKey { field: String, key: String },

    /// A stage whose parameters cannot be applied.
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// JSON pipeline spec could not be decoded.
    #[error("Invalid pipeline spec: {0}")]
    InvalidSpec(#[from] serde_json::Error),
}

// =============================================================================
// Matrix Errors
// =============================================================================

/// Errors while building or re-indexing communication matrices.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// A snapshot's shape disagrees with the first snapshot of the window.
    #[error("Snapshot {snapshot}: expected {expected} entries in row {row}, found {found}")]
    RaggedSnapshot {
        snapshot: usize,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// An LP-type snapshot lacks a source/destination type pair.
    #[error("Snapshot {snapshot}: PE {pe} has no {source_type} -> {dest_type} flow")]
    MissingFlow {
        snapshot: usize,
        pe: usize,
        source_type: String,
        dest_type: String,
    },

    /// A subset position beyond the matrix size.
    #[error("Index {index} out of range for matrix of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// A selected entity that the matrix does not contain.
    #[error("Entity {0} is not part of this matrix")]
    UnknownEntity(usize),

    /// Reduction failure.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON is malformed.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A visual mapping is structurally wrong or names an unknown field.
    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    /// A configuration value is out of range.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

// =============================================================================
// Analysis Errors (top-level)
// =============================================================================

/// Top-level errors returned by dataset loading, views and the dashboard.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Loading error.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Transformation error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Matrix error.
    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// KP rows do not form whole PEs.
    #[error("{kps} KP records cannot be split into PEs of {num_kp} KPs")]
    HierarchyMismatch { kps: usize, num_kp: usize },

    /// An interaction that requires a detail view arrived before one existed.
    #[error("No detail view to select from; brush a GVT range first")]
    NoDetailView,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for transformation operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for matrix operations.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // TransformError -> MatrixError -> AnalysisError
        let err: MatrixError = TransformError::EmptyVectorSet.into();
        let top: AnalysisError = err.into();
        assert!(top.to_string().contains("empty set of vectors"));

        // LoadError -> AnalysisError
        let err = LoadError::SchemaMismatch { header: 4, types: 3 };
        let top: AnalysisError = err.into();
        assert!(top.to_string().contains("4 header fields"));
    }

    #[test]
    fn test_misaligned_format() {
        let err = TransformError::Misaligned { target: 8, source_len: 7 };
        let msg = err.to_string();
        assert!(msg.contains('8'));
        assert!(msg.contains('7'));
    }
}
