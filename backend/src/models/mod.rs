//! Domain models for the trace analytics pipeline.
//!
//! - [`Field`] - a single record value (number, text, numeric vector or missing)
//! - [`Record`] / [`RecordSet`] - homogeneous, order-significant tables
//! - [`LpType`] - the three LP categories (server, terminal, router)
//! - [`TimeAxis`] / [`TimeWindow`] - the brushable time coordinates
//! - [`global_kp_id`] - the PE/KP hierarchy key

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Field values
// =============================================================================

/// A single value in a [`Record`].
///
/// `Missing` is the sentinel produced by failed coercions and JSON `null`.
/// A `Float` holding NaN is treated as missing as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f64>),
    Missing,
}

impl Field {
    /// True for the missing-value sentinel (including NaN floats).
    pub fn is_missing(&self) -> bool {
        match self {
            Field::Missing => true,
            Field::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Numeric value of a scalar field.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Int(i) => Some(*i as f64),
            Field::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Integer value; floats are accepted only when they are whole.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Field::Int(i) => Some(*i),
            Field::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            _ => None,
        }
    }

    /// View the field as a numeric sequence. Scalars become one-element
    /// sequences so that scalar and vector fields reduce the same way.
    pub fn as_vector(&self) -> Option<Cow<'_, [f64]>> {
        match self {
            Field::Vector(v) => Some(Cow::Borrowed(v.as_slice())),
            other => other.as_f64().map(|f| Cow::Owned(vec![f])),
        }
    }

    /// Equality that ignores the Int/Float distinction.
    pub fn loosely_eq(&self, other: &Field) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Total order used by sorting: numbers before text before vectors,
    /// missing values last.
    pub fn sort_cmp(&self, other: &Field) -> Ordering {
        fn rank(f: &Field) -> u8 {
            if f.is_missing() {
                return 3;
            }
            match f {
                Field::Int(_) | Field::Float(_) => 0,
                Field::Text(_) => 1,
                _ => 2,
            }
        }

        match (rank(self), rank(other)) {
            (0, 0) => {
                let (a, b) = (self.as_f64().unwrap_or_default(), other.as_f64().unwrap_or_default());
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (1, 1) => self.as_str().cmp(&other.as_str()),
            (2, 2) => match (self, other) {
                (Field::Vector(a), Field::Vector(b)) => a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| x.partial_cmp(y).unwrap_or(Ordering::Equal))
                    .find(|o| o.is_ne())
                    .unwrap_or_else(|| a.len().cmp(&b.len())),
                _ => Ordering::Equal,
            },
            (ra, rb) => ra.cmp(&rb),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(i) => write!(f, "{}", i),
            Field::Float(x) if x.is_nan() => write!(f, "NaN"),
            Field::Float(x) => write!(f, "{}", x),
            Field::Text(s) => write!(f, "{}", s),
            Field::Vector(v) => write!(f, "{:?}", v),
            Field::Missing => write!(f, "NaN"),
        }
    }
}

impl From<i64> for Field {
    fn from(v: i64) -> Self {
        Field::Int(v)
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v.into())
    }
}

impl From<usize> for Field {
    fn from(v: usize) -> Self {
        Field::Int(v as i64)
    }
}

impl From<f64> for Field {
    fn from(v: f64) -> Self {
        Field::Float(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::Text(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::Text(v)
    }
}

impl From<Vec<f64>> for Field {
    fn from(v: Vec<f64>) -> Self {
        Field::Vector(v)
    }
}

// =============================================================================
// Records
// =============================================================================

/// A mapping from field name to value. Field order is not significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Field>,
}

/// An ordered sequence of records. Position is significant: several stages
/// correlate "the i-th record" across sets.
pub type RecordSet = Vec<Record>;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Field>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or overwrite a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Field>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Numeric value of a field, `None` when absent, missing or non-numeric.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Field::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Field::as_str)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Lift every `prefix.name` field to `name`, dropping everything else.
    ///
    /// Flattened JSON inputs store nested objects under dotted names; this
    /// recovers the nested object as a record of its own.
    pub fn project_prefix(&self, prefix: &str) -> Record {
        let dotted = format!("{}.", prefix);
        let fields = self
            .fields
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&dotted).map(|rest| (rest.to_string(), v.clone())))
            .collect();
        Record { fields }
    }
}

impl<K: Into<String>, V: Into<Field>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// =============================================================================
// Hierarchy
// =============================================================================

/// Global KP id: KPs are numbered consecutively within each PE.
pub fn global_kp_id(pe_id: i64, local_kp_id: i64, num_kp: i64) -> i64 {
    pe_id * num_kp + local_kp_id
}

/// PE owning a global KP id. `None` when `num_kp` is zero.
pub fn pe_of_kp(kp_id: i64, num_kp: i64) -> Option<i64> {
    kp_id.checked_div_euclid(num_kp)
}

/// LP categories, in their canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LpType {
    Server,
    Terminal,
    Router,
}

impl LpType {
    pub const ALL: [LpType; 3] = [LpType::Server, LpType::Terminal, LpType::Router];

    /// Position in [`LpType::ALL`].
    pub fn index(self) -> usize {
        match self {
            LpType::Server => 0,
            LpType::Terminal => 1,
            LpType::Router => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LpType::Server => "server",
            LpType::Terminal => "terminal",
            LpType::Router => "router",
        }
    }
}

impl fmt::Display for LpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Time windows
// =============================================================================

/// The two time coordinates trace samples are indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeAxis {
    /// Wall-clock time.
    #[serde(rename = "RT")]
    Rt,
    /// Global virtual (simulated) time.
    #[serde(rename = "GVT")]
    Gvt,
}

impl TimeAxis {
    /// Record field holding this coordinate.
    pub fn field(self) -> &'static str {
        match self {
            TimeAxis::Rt => "RT",
            TimeAxis::Gvt => "GVT",
        }
    }
}

/// Whether the lower end of a window is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bounds {
    /// `[low, high]`
    #[default]
    Closed,
    /// `(low, high]`
    LeftOpen,
}

/// A numeric interval over one time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub axis: TimeAxis,
    pub low: f64,
    pub high: f64,
    #[serde(default)]
    pub bounds: Bounds,
}

impl TimeWindow {
    pub fn closed(axis: TimeAxis, low: f64, high: f64) -> Self {
        Self { axis, low, high, bounds: Bounds::Closed }
    }

    pub fn left_open(axis: TimeAxis, low: f64, high: f64) -> Self {
        Self { axis, low, high, bounds: Bounds::LeftOpen }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_low = match self.bounds {
            Bounds::Closed => value >= self.low,
            Bounds::LeftOpen => value > self.low,
        };
        above_low && value <= self.high
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = match self.bounds {
            Bounds::Closed => '[',
            Bounds::LeftOpen => '(',
        };
        write!(f, "{} {}{}, {}]", self.axis.field(), open, self.low, self.high)
    }
}
