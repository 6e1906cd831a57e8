//! Bulk loading of raw inputs.
//!
//! Every descriptor is read concurrently; the batch settles as a whole and
//! fails on the first unreadable or undecodable input. Payloads come back in
//! descriptor order.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::error::{LoadError, LoadResult};
use crate::logs::log_info_indent;
use crate::parser::decode_auto;

/// How a source should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Text,
}

impl Format {
    fn as_str(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Text => "text",
        }
    }
}

/// One input to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub source: PathBuf,
    pub format: Format,
}

impl Descriptor {
    pub fn json(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            format: Format::Json,
        }
    }

    pub fn text(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            format: Format::Text,
        }
    }

    fn name(&self) -> String {
        self.source.display().to_string()
    }
}

/// A decoded input.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// The payload as a JSON array of rows.
    pub fn into_rows(self, source_name: &str) -> LoadResult<Vec<Value>> {
        match self {
            Payload::Json(Value::Array(rows)) => Ok(rows),
            _ => Err(LoadError::FormatMismatch {
                source_name: source_name.to_string(),
                expected: "JSON array",
            }),
        }
    }

    pub fn into_text(self, source_name: &str) -> LoadResult<String> {
        match self {
            Payload::Text(text) => Ok(text),
            _ => Err(LoadError::FormatMismatch {
                source_name: source_name.to_string(),
                expected: Format::Text.as_str(),
            }),
        }
    }
}

/// Read and decode one descriptor.
pub async fn load_one(descriptor: &Descriptor) -> LoadResult<Payload> {
    let bytes = tokio::fs::read(&descriptor.source)
        .await
        .map_err(|source| LoadError::Io {
            path: descriptor.name(),
            source,
        })?;

    let payload = match descriptor.format {
        Format::Json => Payload::Json(serde_json::from_slice(&bytes)?),
        Format::Text => Payload::Text(decode_auto(&bytes)?),
    };
    log_info_indent(format!("{} ({} bytes)", descriptor.name(), bytes.len()), 1);
    Ok(payload)
}

/// Load every descriptor; payloads are returned in descriptor order.
pub async fn load_all(descriptors: &[Descriptor]) -> LoadResult<Vec<Payload>> {
    try_join_all(descriptors.iter().map(load_one)).await
}

/// The eight dataset inputs, in the order [`super::TraceData::from_payloads`]
/// expects them.
pub fn dataset_descriptors(config: &AnalysisConfig) -> Vec<Descriptor> {
    let dir: &Path = &config.data_dir;
    let files = &config.files;
    vec![
        Descriptor::json(dir.join(&files.rt_lps)),
        Descriptor::json(dir.join(&files.gvt_lps)),
        Descriptor::json(dir.join(&files.gvt_kps)),
        Descriptor::json(dir.join(&files.gvt_pes)),
        Descriptor::text(dir.join(&files.routers)),
        Descriptor::text(dir.join(&files.lp_mapping)),
        Descriptor::json(dir.join(&files.pe_comm)),
        Descriptor::json(dir.join(&files.lp_type_comm)),
    ]
}
