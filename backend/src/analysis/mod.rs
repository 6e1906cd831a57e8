//! Trace analysis.
//!
//! Ties the loader, the transform pipeline and the matrix builder together:
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Inputs  │──▶│ TraceData │──▶│ brush_rt /   │──▶│ DetailView   │──▶ select(pes)
//! │ (8 files)│   │ (resident)│   │ detail(GVT)  │   │ views+matrix │
//! └──────────┘   └───────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! [`TraceData`] is built once and never modified. Every interaction is a
//! fresh computation over it; an interaction whose window matches nothing
//! returns `None` so callers leave their views as they are.

pub mod loader;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult, ConfigError, LoadError, LoadResult, MatrixError, TransformError, TransformResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::matrix::{build_lp_type_matrix, build_pe_matrix, CommMatrix, LpTypeMatrix, LpTypeSnapshot, PeSnapshot};
use crate::models::{pe_of_kp, Field, Record, RecordSet, TimeAxis, TimeWindow};
use crate::parser::{load_delimited, records_from_json, ColumnType, TableSchema};
use crate::transform::{
    attach_by_key, domains, filter_window, vector_avg, vector_sum, within_window, DeriveSpec, GroupSpec, Pipeline,
    Predicate, SortKey,
};

pub use loader::{dataset_descriptors, load_all, load_one, Descriptor, Format, Payload};

// =============================================================================
// Resident dataset
// =============================================================================

/// Every input of one simulation run, loaded and typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceData {
    /// LP totals per RT sample (`RT`, `GVT` and the `all` counters).
    pub rt_lps: RecordSet,
    /// LP totals per GVT sample (`GVT` and the `all` counters).
    pub gvt_lps: RecordSet,
    /// Per-LP vectors per GVT sample.
    pub lp_samples: RecordSet,
    /// Per-KP vectors per GVT sample.
    pub kp_samples: RecordSet,
    /// Per-PE vectors per GVT sample.
    pub pe_samples: RecordSet,
    /// `routers_per_kp` keyed by global `KP_ID`, descending.
    pub routers: RecordSet,
    /// `PE_ID, KP_ID, LP_ID, LP_type` per LP.
    pub lp_mapping: RecordSet,
    pub pe_comm: Vec<PeSnapshot>,
    pub lp_type_comm: Vec<LpTypeSnapshot>,
}

fn routers_schema() -> LoadResult<TableSchema> {
    Ok(TableSchema::new(
        ["PE_ID", "KP_ID", "LP_ID", "routers_per_kp"],
        [ColumnType::Int; 4],
    )?
    .skip(1))
}

fn lp_mapping_schema() -> LoadResult<TableSchema> {
    Ok(TableSchema::new(
        ["PE_ID", "KP_ID", "LP_ID", "LP_type"],
        [ColumnType::Int, ColumnType::Int, ColumnType::Int, ColumnType::String],
    )?
    .skip(1))
}

/// Lift the nested `all` counters to top level, keeping the time fields.
fn timeline(samples: &[Record], time_fields: &[&str]) -> RecordSet {
    samples
        .iter()
        .map(|sample| {
            let mut record = sample.project_prefix("all");
            for field in time_fields {
                record.set(*field, sample.get(field).cloned().unwrap_or(Field::Missing));
            }
            record
        })
        .collect()
}

impl TraceData {
    /// Assemble the dataset from payloads in [`dataset_descriptors`] order.
    pub fn from_payloads(payloads: Vec<Payload>, config: &AnalysisConfig) -> AnalysisResult<Self> {
        let found = payloads.len();
        let [rt, gvt, kps, pes, routers, mapping, pe_comm, lp_comm]: [Payload; 8] =
            payloads.try_into().map_err(|_| LoadError::PayloadCount { expected: 8, found })?;
        let files = &config.files;

        let rt_samples = records_from_json(&rt.into_rows(&files.rt_lps)?)?;
        let lp_samples = records_from_json(&gvt.into_rows(&files.gvt_lps)?)?;
        let kp_samples = records_from_json(&kps.into_rows(&files.gvt_kps)?)?;
        let pe_samples = records_from_json(&pes.into_rows(&files.gvt_pes)?)?;

        let routers = load_delimited(&routers.into_text(&files.routers)?, &routers_schema()?)?;
        let routers = Pipeline::new()
            .derive_spec(DeriveSpec::CompositeId {
                target: "KP_ID".into(),
                major: "PE_ID".into(),
                minor: "KP_ID".into(),
                stride: config.num_kp as i64,
            })
            .sort_by([SortKey::desc("KP_ID")])
            .run(routers)?;

        let lp_mapping = load_delimited(&mapping.into_text(&files.lp_mapping)?, &lp_mapping_schema()?)?;

        let pe_comm: Vec<PeSnapshot> = serde_json::from_value(serde_json::Value::Array(pe_comm.into_rows(&files.pe_comm)?))
            .map_err(LoadError::from)?;
        let lp_type_comm: Vec<LpTypeSnapshot> =
            serde_json::from_value(serde_json::Value::Array(lp_comm.into_rows(&files.lp_type_comm)?))
                .map_err(LoadError::from)?;

        let data = Self {
            rt_lps: timeline(&rt_samples, &["RT", "GVT"]),
            gvt_lps: timeline(&lp_samples, &["GVT"]),
            lp_samples,
            kp_samples,
            pe_samples,
            routers,
            lp_mapping,
            pe_comm,
            lp_type_comm,
        };
        data.log_summary();
        Ok(data)
    }

    fn log_summary(&self) {
        log_success(format!(
            "Loaded {} RT samples, {} GVT samples",
            self.rt_lps.len(),
            self.gvt_lps.len()
        ));
        log_info_indent(format!("routers: {} KPs", self.routers.len()), 1);
        log_info_indent(format!("lp mapping: {} LPs", self.lp_mapping.len()), 1);
        log_info_indent(
            format!(
                "communication: {} PE snapshots, {} LP-type snapshots",
                self.pe_comm.len(),
                self.lp_type_comm.len()
            ),
            1,
        );
    }
}

/// Load every input named by `config` and assemble the dataset.
pub async fn load_dataset(config: &AnalysisConfig) -> AnalysisResult<TraceData> {
    log_info(format!("Loading dataset from {}", config.data_dir.display()));
    let payloads = load_all(&dataset_descriptors(config)).await?;
    TraceData::from_payloads(payloads, config)
}

// =============================================================================
// Window collapse
// =============================================================================

/// Collapse per-entity vector fields over the samples inside `window`.
///
/// Each requested field is reduced across samples (summed, or averaged for
/// fields listed in `averaged`), giving one value per entity. The result has
/// one record per entity carrying its position in `id_field`. `None` when the
/// window holds no sample.
pub fn collapse_window(
    samples: &[Record],
    window: &TimeWindow,
    fields: &[&str],
    averaged: &[String],
    id_field: &str,
) -> TransformResult<Option<RecordSet>> {
    let inside = within_window(samples, window);
    if inside.is_empty() {
        return Ok(None);
    }

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(fields.len());
    for field in fields {
        let vectors: Vec<_> = inside
            .iter()
            .filter_map(|s| s.get(field).filter(|f| !f.is_missing()).and_then(Field::as_vector))
            .collect();
        if vectors.is_empty() {
            return Err(TransformError::MissingField {
                field: field.to_string(),
                row: 0,
            });
        }
        let column = if averaged.iter().any(|a| a == field) {
            vector_avg(&vectors)?
        } else {
            vector_sum(&vectors)?
        };
        if let Some(first) = columns.first() {
            if first.len() != column.len() {
                return Err(TransformError::LengthMismatch {
                    expected: first.len(),
                    found: column.len(),
                });
            }
        }
        columns.push(column);
    }

    let entities = columns.first().map_or(0, Vec::len);
    let records = (0..entities)
        .map(|i| {
            let mut record = Record::new().with(id_field, i);
            for (field, column) in fields.iter().zip(&columns) {
                record.set(*field, column[i]);
            }
            record
        })
        .collect();
    Ok(Some(records))
}

// =============================================================================
// Interactions
// =============================================================================

/// GVT samples matching an RT brush.
///
/// The RT window selects RT samples; their GVT domain (ignoring samples
/// without GVT) selects GVT samples in `(min, max]`. `None` when either step
/// matches nothing.
pub fn brush_rt(data: &TraceData, low: f64, high: f64) -> Option<RecordSet> {
    let rt = filter_window(&data.rt_lps, &TimeWindow::closed(TimeAxis::Rt, low, high));
    if rt.is_empty() {
        log_warning(format!("RT [{}, {}] matches no samples, keeping view", low, high));
        return None;
    }

    let gvt_domain = domains(&rt, &[TimeAxis::Gvt.field()]).remove(TimeAxis::Gvt.field());
    let Some(domain) = gvt_domain else {
        log_warning("RT window has no GVT values, keeping view");
        return None;
    };

    let window = TimeWindow::left_open(TimeAxis::Gvt, domain.min, domain.max);
    let gvt = filter_window(&data.gvt_lps, &window);
    if gvt.is_empty() {
        log_warning(format!("{} matches no samples, keeping view", window));
        return None;
    }
    log_info(format!("RT [{}, {}] -> {} ({} samples)", low, high, window, gvt.len()));
    Some(gvt)
}

/// Chord diagram input: a PE matrix and one node record per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordData {
    pub matrix: CommMatrix,
    pub nodes: RecordSet,
}

/// Everything drawn for one GVT window.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub window: TimeWindow,
    /// One record per KP: collapsed statistics, `KP_ID`, `PE`, `routers_per_kp`.
    pub kps: RecordSet,
    /// One record per LP: collapsed statistics, `LP_ID`, `PE`, `LP_type`.
    pub lps: RecordSet,
    /// One record per PE: collapsed statistics, `PE_ID` and the KP/LP sums.
    pub pes: RecordSet,
    /// KP statistics summed per PE, descending by PE.
    pub kp_by_pe: RecordSet,
    /// LP statistics summed per PE, descending by PE.
    pub lp_by_pe: RecordSet,
    pub pe_matrix: Option<CommMatrix>,
    pub lp_type_matrix: Option<LpTypeMatrix>,
}

/// The detail views narrowed to a PE selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Selected PE ids, in selection order.
    pub pes: Vec<usize>,
    pub kps: RecordSet,
    pub lps: RecordSet,
    pub chord: Option<ChordData>,
    pub lp_type_matrix: Option<LpTypeMatrix>,
}

fn sum_by_pe(fields: &[&str]) -> Pipeline {
    let spec = fields.iter().fold(GroupSpec::by("PE"), |spec, f| spec.sum(*f));
    Pipeline::new().group(spec).sort_by([SortKey::desc("PE")])
}

/// Build the KP, LP and PE views and the communication matrices for a GVT
/// window. `None` when the window holds no KP, LP or PE sample.
pub fn detail(data: &TraceData, config: &AnalysisConfig, window: TimeWindow) -> AnalysisResult<Option<DetailView>> {
    log_info(format!("Detail view for {}", window));
    if config.num_kp == 0 {
        return Err(ConfigError::InvalidValue {
            key: "num_kp".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }
    let averaged = &config.averaged_fields;
    let num_kp = config.num_kp;

    let kp_fields = config.views.kp.positional_fields();
    let lp_fields = config.views.lp.positional_fields();
    let pe_fields = config.views.pe.positional_fields();

    let Some(kps) = collapse_window(&data.kp_samples, &window, &kp_fields, averaged, "KP_ID")? else {
        log_warning("No KP samples in window, keeping view");
        return Ok(None);
    };
    let Some(lps) = collapse_window(&data.lp_samples, &window, &lp_fields, averaged, "LP_ID")? else {
        log_warning("No LP samples in window, keeping view");
        return Ok(None);
    };
    let Some(mut pes) = collapse_window(&data.pe_samples, &window, &pe_fields, averaged, "PE_ID")? else {
        log_warning("No PE samples in window, keeping view");
        return Ok(None);
    };

    // KP -> PE
    if kps.len() % num_kp != 0 {
        return Err(AnalysisError::HierarchyMismatch {
            kps: kps.len(),
            num_kp,
        });
    }
    let mut kps = Pipeline::new()
        .derive(move |kp, _| {
            let pe = kp.get("KP_ID").and_then(Field::as_i64).and_then(|id| pe_of_kp(id, num_kp as i64));
            kp.set("PE", pe.map(Field::Int).unwrap_or(Field::Missing));
        })
        .run(kps)?;
    attach_by_key(&mut kps, "KP_ID", &data.routers, "KP_ID", &["routers_per_kp"])?;

    // LP -> PE, type
    let mut lps = lps;
    attach_by_key(&mut lps, "LP_ID", &data.lp_mapping, "LP_ID", &["LP_type", "PE_ID"])?;
    let lps = Pipeline::new()
        .derive(|lp, _| {
            if let Some(pe) = lp.remove("PE_ID") {
                lp.set("PE", pe);
            }
        })
        .run(lps)?;

    let kp_by_pe = sum_by_pe(&kp_fields).apply(&kps)?;
    let lp_by_pe = sum_by_pe(&lp_fields).apply(&lps)?;

    attach_by_key(&mut pes, "PE_ID", &kp_by_pe, "PE", &kp_fields)?;
    attach_by_key(&mut pes, "PE_ID", &lp_by_pe, "PE", &lp_fields)?;

    let pe_matrix = build_pe_matrix(within_window(&data.pe_comm, &window))?;
    let lp_type_matrix = build_lp_type_matrix(within_window(&data.lp_type_comm, &window))?;
    match &pe_matrix {
        Some(m) => log_info_indent(format!("PE matrix {}x{}", m.size(), m.size()), 1),
        None => log_warning("No communication snapshots in window"),
    }

    log_success(format!("{} PEs, {} KPs, {} LPs", pes.len(), kps.len(), lps.len()));
    Ok(Some(DetailView {
        window,
        kps,
        lps,
        pes,
        kp_by_pe,
        lp_by_pe,
        pe_matrix,
        lp_type_matrix,
    }))
}

impl DetailView {
    /// Chord input over every PE.
    pub fn chord(&self) -> Option<ChordData> {
        self.pe_matrix.as_ref().map(|matrix| ChordData {
            matrix: matrix.clone(),
            nodes: self.pes.clone(),
        })
    }

    /// PE record with the given id.
    fn pe_record(&self, pe: usize) -> Option<&Record> {
        self.pes
            .iter()
            .find(|r| r.get("PE_ID").and_then(Field::as_i64) == Some(pe as i64))
    }

    /// Narrow every view to `pes`. Matrices and chord nodes follow the
    /// selection order; KP and LP records keep their own order.
    pub fn select(&self, pes: &[usize]) -> AnalysisResult<Selection> {
        let in_selection = Pipeline::new().matching(Predicate::is_in("PE", pes.iter().copied()));
        let kps = in_selection.apply(&self.kps)?;
        let lps = in_selection.apply(&self.lps)?;

        let chord = match &self.pe_matrix {
            Some(matrix) => {
                let nodes = pes
                    .iter()
                    .map(|&pe| self.pe_record(pe).cloned().ok_or(MatrixError::UnknownEntity(pe)))
                    .collect::<Result<RecordSet, _>>()?;
                Some(ChordData {
                    matrix: matrix.select(pes)?,
                    nodes,
                })
            }
            None => None,
        };
        let lp_type_matrix = self.lp_type_matrix.as_ref().map(|m| m.select(pes)).transpose()?;

        log_info(format!("Selected {} PEs: {} KPs, {} LPs", pes.len(), kps.len(), lps.len()));
        Ok(Selection {
            pes: pes.to_vec(),
            kps,
            lps,
            chord,
            lp_type_matrix,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::LpType;
    use serde_json::{json, Value};

    /// 2 PEs, 2 KPs per PE, 3 LPs per PE (one of each type), 3 GVT samples.
    pub(crate) fn fixture_payloads() -> Vec<Payload> {
        let rt = json!([
            {"RT": 0.5, "GVT": 10.0, "all": {"events_processed": 5, "events_rolled_back": 1}},
            {"RT": 1.0, "GVT": null, "all": {"events_processed": 6, "events_rolled_back": 0}},
            {"RT": 1.5, "GVT": 20.0, "all": {"events_processed": 7, "events_rolled_back": 2}},
            {"RT": 2.5, "GVT": 30.0, "all": {"events_processed": 8, "events_rolled_back": 3}}
        ]);
        let lp = |gvt: f64, k: f64| {
            json!({
                "GVT": gvt,
                "all": {"events_processed": 10.0 * k, "events_rolled_back": k},
                "events_rolled_back": [k, 0.0, 1.0, 2.0, 0.0, k],
                "remote_events": [1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
            })
        };
        let kp = |gvt: f64, k: f64| {
            json!({
                "GVT": gvt,
                "total_rollbacks": [k, 2.0, 3.0, 4.0],
                "secondary_rollbacks": [0.0, 1.0, 0.0, 1.0]
            })
        };
        let pe = |gvt: f64, eff: f64| {
            json!({"GVT": gvt, "net_events": [10.0, 20.0], "efficiency": [eff, 1.0]})
        };
        let pe_comm = |gvt: f64| json!({"GVT": gvt, "PE": [[1.0, 2.0], [3.0, 4.0]]});
        let flows = |v: f64| {
            let leaf = json!([v, 1.0]);
            let per_src = json!({"server": leaf, "terminal": leaf, "router": leaf});
            json!({"server": per_src, "terminal": per_src, "router": per_src})
        };
        let lp_comm = |gvt: f64| json!({"GVT": gvt, "PE": [flows(1.0), flows(2.0)]});

        vec![
            Payload::Json(rt),
            Payload::Json(Value::Array(vec![lp(10.0, 1.0), lp(20.0, 2.0), lp(30.0, 3.0)])),
            Payload::Json(Value::Array(vec![kp(10.0, 1.0), kp(20.0, 2.0), kp(30.0, 3.0)])),
            Payload::Json(Value::Array(vec![pe(10.0, 0.5), pe(20.0, 1.0), pe(30.0, 0.0)])),
            Payload::Text("PE_ID,KP_ID,LP_ID,routers_per_kp\n0,0,0,1\n0,1,1,0\n1,0,3,1\n1,1,4,0\n".into()),
            Payload::Text(
                "PE_ID,KP_ID,LP_ID,LP_type\n0,0,0,server\n0,0,1,terminal\n0,1,2,router\n1,0,3,server\n1,0,4,terminal\n1,1,5,router\n"
                    .into(),
            ),
            Payload::Json(Value::Array(vec![pe_comm(10.0), pe_comm(20.0), pe_comm(30.0)])),
            Payload::Json(Value::Array(vec![lp_comm(10.0), lp_comm(20.0), lp_comm(30.0)])),
        ]
    }

    pub(crate) fn fixture_config() -> AnalysisConfig {
        AnalysisConfig::default().with_num_kp(2)
    }

    pub(crate) fn fixture() -> TraceData {
        TraceData::from_payloads(fixture_payloads(), &fixture_config()).unwrap()
    }

    #[test]
    fn test_from_payloads_shapes() {
        let data = fixture();
        assert_eq!(data.rt_lps.len(), 4);
        assert_eq!(data.rt_lps[0].number("events_processed"), Some(5.0));
        assert_eq!(data.rt_lps[0].number("RT"), Some(0.5));
        assert!(data.rt_lps[1].get("GVT").unwrap().is_missing());
        assert_eq!(data.gvt_lps[2].number("events_rolled_back"), Some(3.0));

        // global KP ids, descending
        let ids: Vec<f64> = data.routers.iter().filter_map(|r| r.number("KP_ID")).collect();
        assert_eq!(ids, vec![3.0, 2.0, 1.0, 0.0]);
        assert_eq!(data.lp_mapping[5].text("LP_type"), Some("router"));
        assert_eq!(data.pe_comm.len(), 3);
    }

    #[test]
    fn test_from_payloads_wrong_count() {
        let mut payloads = fixture_payloads();
        payloads.pop();
        let err = TraceData::from_payloads(payloads, &fixture_config()).unwrap_err();
        assert!(err.to_string().contains("Expected 8 payloads"));
    }

    #[test]
    fn test_collapse_window_sum_and_avg() {
        let data = fixture();
        let window = TimeWindow::closed(TimeAxis::Gvt, 10.0, 20.0);
        let averaged = vec!["efficiency".to_string()];
        let pes = collapse_window(&data.pe_samples, &window, &["net_events", "efficiency"], &averaged, "PE_ID")
            .unwrap()
            .unwrap();
        assert_eq!(pes.len(), 2);
        assert_eq!(pes[0].number("net_events"), Some(20.0));
        assert_eq!(pes[0].number("efficiency"), Some(0.75));
        assert_eq!(pes[1].get("PE_ID"), Some(&Field::Int(1)));

        let empty = TimeWindow::closed(TimeAxis::Gvt, 100.0, 200.0);
        assert!(collapse_window(&data.pe_samples, &empty, &["net_events"], &averaged, "PE_ID")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_brush_rt_maps_to_gvt() {
        let data = fixture();
        // RT [0.5, 1.5] -> GVT domain [10, 20] -> GVT (10, 20]
        let gvt = brush_rt(&data, 0.5, 1.5).unwrap();
        let times: Vec<f64> = gvt.iter().filter_map(|r| r.number("GVT")).collect();
        assert_eq!(times, vec![20.0]);

        assert!(brush_rt(&data, 5.0, 6.0).is_none());
        // only the sample without GVT
        assert!(brush_rt(&data, 0.9, 1.1).is_none());
    }

    #[test]
    fn test_detail_view() {
        let data = fixture();
        let view = detail(&data, &fixture_config(), TimeWindow::closed(TimeAxis::Gvt, 10.0, 20.0))
            .unwrap()
            .unwrap();

        // KPs: total_rollbacks [1+2, 2+2, 3+3, 4+4]
        assert_eq!(view.kps.len(), 4);
        let kp3 = view.kps.iter().find(|r| r.number("KP_ID") == Some(3.0)).unwrap();
        assert_eq!(kp3.number("PE"), Some(1.0));
        assert_eq!(kp3.number("routers_per_kp"), Some(0.0));
        assert_eq!(kp3.number("total_rollbacks"), Some(8.0));
        let kp2 = view.kps.iter().find(|r| r.number("KP_ID") == Some(2.0)).unwrap();
        assert_eq!(kp2.number("routers_per_kp"), Some(1.0));

        // LPs carry type and PE from the mapping table
        let lp5 = &view.lps[5];
        assert_eq!(lp5.text("LP_type"), Some("router"));
        assert_eq!(lp5.number("PE"), Some(1.0));
        assert!(!lp5.contains("PE_ID"));

        // grouped, descending by PE
        assert_eq!(view.kp_by_pe[0].number("PE"), Some(1.0));
        assert_eq!(view.kp_by_pe[0].number("total_rollbacks"), Some(14.0));
        assert_eq!(view.kp_by_pe[1].number("total_rollbacks"), Some(7.0));

        // PE 0 gets PE 0's sums even though the groups are sorted descending
        let pe0 = &view.pes[0];
        assert_eq!(pe0.number("PE_ID"), Some(0.0));
        assert_eq!(pe0.number("total_rollbacks"), Some(7.0));
        // events_rolled_back for LPs 0..3: [1+2, 0, 2]
        assert_eq!(pe0.number("events_rolled_back"), Some(5.0));
        assert_eq!(pe0.number("remote_events"), Some(6.0));

        let m = view.pe_matrix.as_ref().unwrap();
        assert_eq!(m.values(), &[vec![2.0, 4.0], vec![6.0, 8.0]]);
        let lpm = view.lp_type_matrix.as_ref().unwrap();
        assert_eq!(lpm.get(1, LpType::Router, LpType::Server), Some(&[4.0, 2.0][..]));
    }

    #[test]
    fn test_detail_empty_window_is_no_update() {
        let data = fixture();
        let view = detail(&data, &fixture_config(), TimeWindow::closed(TimeAxis::Gvt, 40.0, 50.0)).unwrap();
        assert!(view.is_none());
    }

    #[test]
    fn test_detail_checks_kp_hierarchy() {
        let data = fixture();
        let config = AnalysisConfig::default().with_num_kp(3);
        let err = detail(&data, &config, TimeWindow::closed(TimeAxis::Gvt, 10.0, 30.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::HierarchyMismatch { kps: 4, num_kp: 3 }));
    }

    #[test]
    fn test_select_follows_selection_order() {
        let data = fixture();
        let view = detail(&data, &fixture_config(), TimeWindow::closed(TimeAxis::Gvt, 10.0, 30.0))
            .unwrap()
            .unwrap();

        let sel = view.select(&[1, 0]).unwrap();
        let chord = sel.chord.unwrap();
        assert_eq!(chord.matrix.values(), &[vec![12.0, 9.0], vec![6.0, 3.0]]);
        let node_ids: Vec<f64> = chord.nodes.iter().filter_map(|r| r.number("PE_ID")).collect();
        assert_eq!(node_ids, vec![1.0, 0.0]);
        assert_eq!(sel.kps.len(), 4);

        let only_one = view.select(&[1]).unwrap();
        assert!(only_one.kps.iter().all(|r| r.number("PE") == Some(1.0)));
        assert_eq!(only_one.lps.len(), 3);
        assert_eq!(only_one.lp_type_matrix.unwrap().keys(), &[1]);

        assert!(view.select(&[7]).is_err());
    }

    #[test]
    fn test_detail_rejects_zero_num_kp() {
        let data = fixture();
        let config: AnalysisConfig = serde_json::from_str(r#"{"num_kp": 0}"#).unwrap();
        let err = detail(&data, &config, TimeWindow::closed(TimeAxis::Gvt, 10.0, 30.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(ConfigError::InvalidValue { .. })));

        let err = detail(&data, &fixture_config().with_num_kp(0), TimeWindow::closed(TimeAxis::Gvt, 10.0, 30.0))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }

    #[test]
    fn test_detail_tolerates_junk_table_rows() {
        let mut payloads = fixture_payloads();
        for (i, junk) in [(4, "x\n"), (5, ",,,\n")] {
            if let Payload::Text(text) = &mut payloads[i] {
                text.push_str(junk);
            }
        }
        let data = TraceData::from_payloads(payloads, &fixture_config()).unwrap();
        assert_eq!(data.routers.len(), 5);
        assert_eq!(data.lp_mapping.len(), 7);

        let view = detail(&data, &fixture_config(), TimeWindow::closed(TimeAxis::Gvt, 10.0, 20.0))
            .unwrap()
            .unwrap();
        let kp2 = view.kps.iter().find(|r| r.number("KP_ID") == Some(2.0)).unwrap();
        assert_eq!(kp2.number("routers_per_kp"), Some(1.0));
        assert_eq!(view.lps[5].text("LP_type"), Some("router"));
        assert_eq!(view, detail(&fixture(), &fixture_config(), view.window).unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_load_dataset_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture_config().with_data_dir(dir.path());
        for (descriptor, payload) in dataset_descriptors(&config).iter().zip(fixture_payloads()) {
            let content = match payload {
                Payload::Json(v) => serde_json::to_string(&v).unwrap(),
                Payload::Text(t) => t,
            };
            std::fs::write(&descriptor.source, content).unwrap();
        }

        let data = load_dataset(&config).await.unwrap();
        assert_eq!(data, fixture());
    }
}
