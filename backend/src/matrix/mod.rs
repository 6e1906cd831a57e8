//! Communication matrices.
//!
//! Snapshots record, for one GVT sample, how many events each source PE sent
//! to every destination PE. Summing the snapshots of a time window gives a
//! square matrix at two resolutions:
//!
//! - [`CommMatrix`] - PE × PE
//! - [`LpTypeMatrix`] - (PE, LP type) × (PE, LP type)
//!
//! Both carry the ordered list of entity ids they cover, so that
//! `values[a][b]` is always the flow from `keys[a]` to `keys[b]` no matter how
//! often the matrix has been re-indexed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{MatrixError, MatrixResult};
use crate::models::{LpType, TimeAxis};
use crate::transform::{vector_sum, Sampled};

// =============================================================================
// Snapshots
// =============================================================================

/// PE-level flows at one GVT sample: `flows[src][dst]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeSnapshot {
    #[serde(rename = "GVT")]
    pub gvt: f64,
    #[serde(rename = "PE")]
    pub flows: Vec<Vec<f64>>,
}

/// Flows by LP type at one GVT sample: `flows[src_pe][src_type][dst_type][dst_pe]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpTypeSnapshot {
    #[serde(rename = "GVT")]
    pub gvt: f64,
    #[serde(rename = "PE")]
    pub flows: Vec<BTreeMap<LpType, BTreeMap<LpType, Vec<f64>>>>,
}

impl Sampled for PeSnapshot {
    fn time(&self, axis: TimeAxis) -> Option<f64> {
        match axis {
            TimeAxis::Gvt => Some(self.gvt),
            TimeAxis::Rt => None,
        }
    }
}

impl Sampled for LpTypeSnapshot {
    fn time(&self, axis: TimeAxis) -> Option<f64> {
        match axis {
            TimeAxis::Gvt => Some(self.gvt),
            TimeAxis::Rt => None,
        }
    }
}

// =============================================================================
// Re-indexing
// =============================================================================

/// `result[a][b] = matrix[keys[a]][keys[b]]`.
///
/// `keys` may be any ordered selection of row positions: unsorted,
/// non-contiguous, or shorter than the matrix.
pub fn subset_matrix(matrix: &[Vec<f64>], keys: &[usize]) -> MatrixResult<Vec<Vec<f64>>> {
    let size = matrix.len();
    if let Some(&index) = keys.iter().find(|&&k| k >= size) {
        return Err(MatrixError::IndexOutOfRange { index, size });
    }
    keys.iter()
        .map(|&a| {
            let row = &matrix[a];
            keys.iter()
                .map(|&b| {
                    row.get(b)
                        .copied()
                        .ok_or(MatrixError::IndexOutOfRange { index: b, size: row.len() })
                })
                .collect()
        })
        .collect()
}

/// Positions of `entities` within `keys`, in the order given.
fn positions_of(keys: &[usize], entities: &[usize]) -> MatrixResult<Vec<usize>> {
    let lookup: HashMap<usize, usize> = keys.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
    entities
        .iter()
        .map(|id| lookup.get(id).copied().ok_or(MatrixError::UnknownEntity(*id)))
        .collect()
}

/// One weighted edge of a graph export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

// =============================================================================
// PE × PE
// =============================================================================

/// Square PE × PE flow matrix over an ordered list of PE ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommMatrix {
    keys: Vec<usize>,
    values: Vec<Vec<f64>>,
}

impl CommMatrix {
    /// Matrix over PEs `0..n`.
    pub fn new(values: Vec<Vec<f64>>) -> MatrixResult<Self> {
        let n = values.len();
        if let Some((row, r)) = values.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(MatrixError::RaggedSnapshot {
                snapshot: 0,
                row,
                expected: n,
                found: r.len(),
            });
        }
        Ok(Self {
            keys: (0..n).collect(),
            values,
        })
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// PE ids, in row/column order.
    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Flow from the PE at position `i` to the PE at position `j`.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.values.get(i).and_then(|row| row.get(j)).copied()
    }

    /// Re-index by row positions.
    pub fn subset(&self, positions: &[usize]) -> MatrixResult<Self> {
        let values = subset_matrix(&self.values, positions)?;
        let keys = positions.iter().map(|&p| self.keys[p]).collect();
        Ok(Self { keys, values })
    }

    /// Re-index by PE ids, in the order given.
    pub fn select(&self, pes: &[usize]) -> MatrixResult<Self> {
        self.subset(&positions_of(&self.keys, pes)?)
    }

    /// Every cell as a link between row and column positions.
    pub fn links(&self) -> Vec<Link> {
        self.values
            .iter()
            .enumerate()
            .flat_map(|(source, row)| {
                row.iter().enumerate().map(move |(target, &value)| Link { source, target, value })
            })
            .collect()
    }
}

/// Sum PE-level snapshots. `None` when there are no snapshots.
pub fn build_pe_matrix<'a>(snapshots: impl IntoIterator<Item = &'a PeSnapshot>) -> MatrixResult<Option<CommMatrix>> {
    let snapshots: Vec<&PeSnapshot> = snapshots.into_iter().collect();
    let Some(first) = snapshots.first() else {
        return Ok(None);
    };
    let n = first.flows.len();

    for (s, snapshot) in snapshots.iter().enumerate() {
        if snapshot.flows.len() != n {
            return Err(MatrixError::RaggedSnapshot {
                snapshot: s,
                row: snapshot.flows.len().min(n),
                expected: n,
                found: snapshot.flows.len(),
            });
        }
        if let Some((row, r)) = snapshot.flows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(MatrixError::RaggedSnapshot {
                snapshot: s,
                row,
                expected: n,
                found: r.len(),
            });
        }
    }

    let values = (0..n)
        .map(|i| {
            let rows: Vec<&[f64]> = snapshots.iter().map(|s| s.flows[i].as_slice()).collect();
            vector_sum(&rows)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(CommMatrix::new(values)?))
}

// =============================================================================
// (PE, LP type) × (PE, LP type)
// =============================================================================

/// Destination-indexed flow vectors, `flows[src][src_type][dst_type][dst]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LpTypeMatrix {
    keys: Vec<usize>,
    flows: Vec<[[Vec<f64>; 3]; 3]>,
}

/// A `(PE, LP type)` graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LpNode {
    #[serde(rename = "PE")]
    pub pe: usize,
    #[serde(rename = "LP_type")]
    pub lp_type: LpType,
}

/// Node-link export of an [`LpTypeMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<LpNode>,
    pub links: Vec<Link>,
}

impl LpTypeMatrix {
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[usize] {
        &self.keys
    }

    /// Flows from `(position, source)` to `dest` on every PE position.
    pub fn get(&self, position: usize, source: LpType, dest: LpType) -> Option<&[f64]> {
        self.flows
            .get(position)
            .map(|f| f[source.index()][dest.index()].as_slice())
    }

    /// Re-index both PE dimensions by row positions.
    pub fn subset(&self, positions: &[usize]) -> MatrixResult<Self> {
        let size = self.size();
        if let Some(&index) = positions.iter().find(|&&p| p >= size) {
            return Err(MatrixError::IndexOutOfRange { index, size });
        }
        let flows = positions
            .iter()
            .map(|&a| {
                let mut out: [[Vec<f64>; 3]; 3] = Default::default();
                for s in LpType::ALL {
                    for d in LpType::ALL {
                        let row = &self.flows[a][s.index()][d.index()];
                        out[s.index()][d.index()] = positions.iter().map(|&b| row[b]).collect();
                    }
                }
                out
            })
            .collect();
        let keys = positions.iter().map(|&p| self.keys[p]).collect();
        Ok(Self { keys, flows })
    }

    /// Re-index by PE ids, in the order given.
    pub fn select(&self, pes: &[usize]) -> MatrixResult<Self> {
        self.subset(&positions_of(&self.keys, pes)?)
    }

    /// Nodes at `position * 3 + type`, one link per `(source, dest)` pair.
    pub fn graph(&self) -> GraphData {
        let nodes = self
            .keys
            .iter()
            .flat_map(|&pe| LpType::ALL.into_iter().map(move |lp_type| LpNode { pe, lp_type }))
            .collect();

        let mut links = Vec::with_capacity(self.size() * self.size() * 9);
        for (i, per_type) in self.flows.iter().enumerate() {
            for s in LpType::ALL {
                for d in LpType::ALL {
                    for (j, &value) in per_type[s.index()][d.index()].iter().enumerate() {
                        links.push(Link {
                            source: i * 3 + s.index(),
                            target: j * 3 + d.index(),
                            value,
                        });
                    }
                }
            }
        }
        GraphData { nodes, links }
    }
}

/// Sum LP-type snapshots. `None` when there are no snapshots.
pub fn build_lp_type_matrix<'a>(
    snapshots: impl IntoIterator<Item = &'a LpTypeSnapshot>,
) -> MatrixResult<Option<LpTypeMatrix>> {
    let snapshots: Vec<&LpTypeSnapshot> = snapshots.into_iter().collect();
    let Some(first) = snapshots.first() else {
        return Ok(None);
    };
    let n = first.flows.len();

    let mut flows = Vec::with_capacity(n);
    for pe in 0..n {
        let mut per_type: [[Vec<f64>; 3]; 3] = Default::default();
        for s in LpType::ALL {
            for d in LpType::ALL {
                let mut vectors: Vec<&[f64]> = Vec::with_capacity(snapshots.len());
                for (k, snapshot) in snapshots.iter().enumerate() {
                    let per_pe = snapshot.flows.get(pe).ok_or(MatrixError::RaggedSnapshot {
                        snapshot: k,
                        row: pe,
                        expected: n,
                        found: snapshot.flows.len(),
                    })?;
                    let v = per_pe
                        .get(&s)
                        .and_then(|m| m.get(&d))
                        .ok_or_else(|| MatrixError::MissingFlow {
                            snapshot: k,
                            pe,
                            source_type: s.to_string(),
                            dest_type: d.to_string(),
                        })?;
                    if v.len() != n {
                        return Err(MatrixError::RaggedSnapshot {
                            snapshot: k,
                            row: pe,
                            expected: n,
                            found: v.len(),
                        });
                    }
                    vectors.push(v);
                }
                per_type[s.index()][d.index()] = vector_sum(&vectors)?;
            }
        }
        flows.push(per_type);
    }

    Ok(Some(LpTypeMatrix {
        keys: (0..n).collect(),
        flows,
    }))
}
