//! Analysis configuration.
//!
//! Read from an optional JSON file, then overridden from the environment
//! (`.env` is honored through dotenvy):
//!
//! | Variable           | Field      |
//! |--------------------|------------|
//! | `ROSSVIS_DATA_DIR` | `data_dir` |
//! | `ROSSVIS_NUM_KP`   | `num_kp`   |
//!
//! Visual mappings are validated here, once, instead of being resolved per
//! record at render time.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{LpType, Record};

pub const DEFAULT_NUM_KP: usize = 16;

pub const ENV_DATA_DIR: &str = "ROSSVIS_DATA_DIR";
pub const ENV_NUM_KP: &str = "ROSSVIS_NUM_KP";

/// KP scatter categories and their colors.
pub const KP_COLOR_DOMAIN: [&str; 2] = ["KP with router", "KP without router"];
pub const KP_COLORS: [&str; 2] = ["#E00", "#00E"];

/// LP scatter colors, in [`LpType::ALL`] order.
pub const LP_COLORS: [&str; 3] = ["green", "#AA0", "purple"];

// =============================================================================
// Visual mappings
// =============================================================================

/// Semantic channel a field is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    X,
    Y,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub role: Role,
    pub field: String,
}

/// Ordered role → field assignments for one chart.
///
/// Exactly one `x`, at least one `y`, at most one `color`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisualMapping {
    mappings: Vec<FieldMapping>,
}

impl VisualMapping {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self::default().with(Role::X, x).with(Role::Y, y)
    }

    pub fn with(mut self, role: Role, field: impl Into<String>) -> Self {
        self.mappings.push(FieldMapping {
            role,
            field: field.into(),
        });
        self
    }

    pub fn color(self, field: impl Into<String>) -> Self {
        self.with(Role::Color, field)
    }

    pub fn mappings(&self) -> &[FieldMapping] {
        &self.mappings
    }

    /// First field assigned to `role`.
    pub fn field(&self, role: Role) -> Option<&str> {
        self.fields(role).next()
    }

    pub fn fields(&self, role: Role) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(move |m| m.role == role)
            .map(|m| m.field.as_str())
    }

    /// Fields drawn on position channels (`x` and every `y`).
    pub fn positional_fields(&self) -> Vec<&str> {
        self.fields(Role::X).chain(self.fields(Role::Y)).collect()
    }

    /// Check the role counts and field names.
    pub fn validate(&self) -> ConfigResult<()> {
        let count = |role| self.mappings.iter().filter(|m| m.role == role).count();
        if count(Role::X) != 1 {
            return Err(ConfigError::InvalidMapping(format!(
                "expected exactly one x field, found {}",
                count(Role::X)
            )));
        }
        if count(Role::Y) == 0 {
            return Err(ConfigError::InvalidMapping("at least one y field is required".into()));
        }
        if count(Role::Color) > 1 {
            return Err(ConfigError::InvalidMapping("at most one color field is allowed".into()));
        }
        if self.mappings.iter().any(|m| m.field.trim().is_empty()) {
            return Err(ConfigError::InvalidMapping("field names must not be empty".into()));
        }
        Ok(())
    }

    /// [`VisualMapping::validate`], plus every field must exist on the
    /// records the chart will draw. Record sets are homogeneous, so the first
    /// record stands for all of them.
    pub fn validate_against(&self, records: &[Record]) -> ConfigResult<()> {
        self.validate()?;
        let Some(sample) = records.first() else {
            return Ok(());
        };
        match self.mappings.iter().find(|m| !sample.contains(&m.field)) {
            Some(m) => Err(ConfigError::InvalidMapping(format!("no field '{}' in records", m.field))),
            None => Ok(()),
        }
    }
}

/// Mappings of every chart the dashboard draws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewMappings {
    pub rt_timeline: VisualMapping,
    pub gvt_timeline: VisualMapping,
    pub pe: VisualMapping,
    pub kp: VisualMapping,
    pub lp: VisualMapping,
}

impl Default for ViewMappings {
    fn default() -> Self {
        Self {
            rt_timeline: VisualMapping::new("RT", "events_processed").with(Role::Y, "events_rolled_back"),
            gvt_timeline: VisualMapping::new("GVT", "events_processed").with(Role::Y, "events_rolled_back"),
            pe: VisualMapping::new("net_events", "efficiency"),
            kp: VisualMapping::new("total_rollbacks", "secondary_rollbacks").color("routers_per_kp"),
            lp: VisualMapping::new("events_rolled_back", "remote_events").color("LP_type"),
        }
    }
}

impl ViewMappings {
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, mapping) in [
            ("rt_timeline", &self.rt_timeline),
            ("gvt_timeline", &self.gvt_timeline),
            ("pe", &self.pe),
            ("kp", &self.kp),
            ("lp", &self.lp),
        ] {
            mapping
                .validate()
                .map_err(|e| ConfigError::InvalidMapping(format!("{}: {}", name, e)))?;
        }
        Ok(())
    }
}

// =============================================================================
// Files and charts
// =============================================================================

/// Names of the eight dataset inputs, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetFiles {
    pub rt_lps: String,
    pub gvt_lps: String,
    pub gvt_kps: String,
    pub gvt_pes: String,
    pub routers: String,
    pub lp_mapping: String,
    pub pe_comm: String,
    pub lp_type_comm: String,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            rt_lps: "ross-stats-rt-lps.json".into(),
            gvt_lps: "ross-stats-gvt-lps.json".into(),
            gvt_kps: "ross-stats-gvt-kps.json".into(),
            gvt_pes: "ross-stats-gvt-pes.json".into(),
            routers: "routers-kps.txt".into(),
            lp_mapping: "lp-mapping.txt".into(),
            pe_comm: "ross-stats-evrb-pes.json".into(),
            lp_type_comm: "ross-stats-evrb-lp-type.json".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl ChartSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSizes {
    pub rt_timeline: ChartSize,
    pub gvt_timeline: ChartSize,
    pub parallel_coordinates: ChartSize,
    pub scatter: ChartSize,
    pub chord: ChartSize,
    pub node_link: ChartSize,
}

impl Default for ChartSizes {
    fn default() -> Self {
        Self {
            rt_timeline: ChartSize::new(980, 150),
            gvt_timeline: ChartSize::new(980, 260),
            parallel_coordinates: ChartSize::new(1020, 320),
            scatter: ChartSize::new(330, 320),
            chord: ChartSize::new(350, 350),
            node_link: ChartSize::new(350, 350),
        }
    }
}

// =============================================================================
// Top level
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// KPs per PE.
    pub num_kp: usize,
    pub data_dir: PathBuf,
    pub files: DatasetFiles,
    pub views: ViewMappings,
    /// Fields averaged instead of summed when a time window is collapsed.
    pub averaged_fields: Vec<String>,
    pub charts: ChartSizes,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            num_kp: DEFAULT_NUM_KP,
            data_dir: PathBuf::from("data"),
            files: DatasetFiles::default(),
            views: ViewMappings::default(),
            averaged_fields: vec!["efficiency".to_string()],
            charts: ChartSizes::default(),
        }
    }
}

impl AnalysisConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// File (if any) → `.env` → process environment → validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `ROSSVIS_*` overrides read through `lookup`.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_NUM_KP) {
            self.num_kp = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_NUM_KP.to_string(),
                message: format!("'{}' is not a positive integer", raw),
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.num_kp == 0 {
            return Err(ConfigError::InvalidValue {
                key: "num_kp".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        self.views.validate()
    }

    pub fn is_averaged(&self, field: &str) -> bool {
        self.averaged_fields.iter().any(|f| f == field)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_num_kp(mut self, num_kp: usize) -> Self {
        self.num_kp = num_kp;
        self
    }
}

/// Color of an LP type on the LP scatter.
pub fn lp_color(lp_type: LpType) -> &'static str {
    LP_COLORS[lp_type.index()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let config = AnalysisConfig::default();
        assert_eq!(config.num_kp, 16);
        assert!(config.is_averaged("efficiency"));
        config.validate().unwrap();
        assert_eq!(config.views.kp.field(Role::Color), Some("routers_per_kp"));
        assert_eq!(config.views.gvt_timeline.positional_fields(), vec!["GVT", "events_processed", "events_rolled_back"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalysisConfig = serde_json::from_value(json!({
            "num_kp": 4,
            "views": {"pe": [{"role": "x", "field": "a"}, {"role": "y", "field": "b"}]}
        }))
        .unwrap();
        assert_eq!(config.num_kp, 4);
        assert_eq!(config.views.pe.field(Role::X), Some("a"));
        assert_eq!(config.views.lp, ViewMappings::default().lp);
        assert_eq!(config.files.routers, "routers-kps.txt");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_NUM_KP, " 8 "), (ENV_DATA_DIR, "/tmp/run")].into();
        let config = AnalysisConfig::default()
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.num_kp, 8);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/run"));

        let bad = AnalysisConfig::default().apply_overrides(|k| (k == ENV_NUM_KP).then(|| "many".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_kp_rejected() {
        let config = AnalysisConfig::default().with_num_kp(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mapping_validation() {
        assert!(VisualMapping::default().with(Role::Y, "y").validate().is_err());
        assert!(VisualMapping::default().with(Role::X, "x").validate().is_err());
        assert!(VisualMapping::new("x", "y").color("a").color("b").validate().is_err());
        assert!(VisualMapping::new("x", " ").validate().is_err());

        let records = vec![Record::new().with("x", 1).with("y", 2)];
        VisualMapping::new("x", "y").validate_against(&records).unwrap();
        let err = VisualMapping::new("x", "z").validate_against(&records).unwrap_err();
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_mapping_serde_is_ordered_list() {
        let mapping = VisualMapping::new("x", "y").color("c");
        let value = serde_json::to_value(&mapping).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "x", "field": "x"},
                {"role": "y", "field": "y"},
                {"role": "color", "field": "c"}
            ])
        );
    }

    #[test]
    fn test_lp_colors() {
        assert_eq!(lp_color(LpType::Terminal), "#AA0");
    }
}
