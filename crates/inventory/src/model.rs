use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::config::CartonConfig;
use crate::error::InventoryError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One raw input row: column name -> cell text.
pub type RawRow = BTreeMap<String, String>;

/// Pre-loaded rows grouped by carton name.
#[derive(Debug, Default)]
pub struct InventoryInput {
    pub rows: BTreeMap<String, Vec<RawRow>>,
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A single identity cell. Numeric text compares numerically so `10` and
/// `10.0` are the same coordinate; everything else compares as exact text.
/// A missing cell equals nothing, itself included (SQL `NULL` semantics).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IdentityValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Missing,
}

/// Integers beyond this cannot round-trip through f64.
const F64_EXACT_INT: i64 = 1 << 53;

impl IdentityValue {
    pub fn parse(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() || matches!(t, "None" | "none" | "null" | "NULL") {
            return Self::Missing;
        }
        if let Ok(i) = t.parse::<i64>() {
            return Self::Integer(i);
        }
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Number(v),
            _ => Self::Text(t.to_string()),
        }
    }
}

impl PartialEq for IdentityValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Integer(i), Self::Number(n)) | (Self::Number(n), Self::Integer(i)) => {
                i.abs() < F64_EXACT_INT && n.fract() == 0.0 && *n == *i as f64
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for IdentityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n:?}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Missing => write!(f, "None"),
        }
    }
}

/// Ordered (field, value) pairs used to look an entry up in the target database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityKey(pub Vec<(String, IdentityValue)>);

impl IdentityKey {
    pub fn get(&self, field: &str) -> Option<&IdentityValue> {
        self.0.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    /// False when any identity field is missing; such a key cannot match a record.
    pub fn is_complete(&self) -> bool {
        !self.0.iter().any(|(_, v)| matches!(v, IdentityValue::Missing))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Magnitudes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaceholderOrigin {
    /// Derived from a measured band in the same system.
    Transform { from: String, coefficient: f64 },
    /// Fixed "unobservable / too faint" value from configuration.
    Sentinel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Magnitude {
    Measured { value: f64 },
    Missing,
    Invalid { raw: String },
    Placeholder { value: f64, origin: PlaceholderOrigin },
}

impl Magnitude {
    /// Empty, `None` and `null` cells are missing; non-finite or unparseable
    /// cells are invalid.
    pub fn parse(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() || matches!(t, "None" | "none" | "null" | "NULL") {
            return Self::Missing;
        }
        match t.parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Measured { value: v },
            _ => Self::Invalid { raw: t.to_string() },
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Measured { value } | Self::Placeholder { value, .. } => Some(*value),
            Self::Missing | Self::Invalid { .. } => None,
        }
    }

    pub fn measured(&self) -> Option<f64> {
        match self {
            Self::Measured { value } => Some(*value),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn needs_placeholder(&self) -> bool {
        matches!(self, Self::Missing | Self::Invalid { .. })
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// More than one database record satisfied every identity field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchError {
    pub row: usize,
    pub identity: IdentityKey,
    /// Database keys of every candidate, in snapshot order.
    pub candidates: Vec<String>,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {}: {} matches {} records ({})",
            self.row,
            self.identity,
            self.candidates.len(),
            self.candidates.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "side", rename_all = "snake_case")]
pub enum ViolatedBound {
    Min { bound: f64 },
    Max { bound: f64 },
    NotFinite,
}

impl ViolatedBound {
    pub fn bound(&self) -> Option<f64> {
        match self {
            Self::Min { bound } | Self::Max { bound } => Some(*bound),
            Self::NotFinite => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierFlag {
    pub band: String,
    /// `None` when the band has no usable value.
    pub value: Option<f64>,
    pub bound: ViolatedBound,
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriorityViolation {
    Missing,
    Invalid { raw: String },
    Below { min: i64 },
    Above { max: i64 },
}

// ---------------------------------------------------------------------------
// Entry lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStage {
    Raw,
    Matched,
    PlaceholderFilled,
    OutlierChecked,
    Finalized,
    /// Pipeline stopped at matching (ambiguous identity).
    Halted,
}

impl EntryStage {
    fn next_allowed(self, to: EntryStage) -> bool {
        matches!(
            (self, to),
            (Self::Raw, Self::Matched)
                | (Self::Raw, Self::Halted)
                | (Self::Matched, Self::PlaceholderFilled)
                | (Self::PlaceholderFilled, Self::OutlierChecked)
                | (Self::OutlierChecked, Self::Finalized)
        )
    }
}

impl fmt::Display for EntryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Matched => write!(f, "matched"),
            Self::PlaceholderFilled => write!(f, "placeholder_filled"),
            Self::OutlierChecked => write!(f, "outlier_checked"),
            Self::Finalized => write!(f, "finalized"),
            Self::Halted => write!(f, "halted"),
        }
    }
}

/// One candidate target row of a carton.
#[derive(Debug, Clone, Serialize)]
pub struct CartonEntry {
    /// 1-based position in the input.
    pub row: usize,
    pub carton: String,
    pub identity: IdentityKey,
    pub magnitudes: BTreeMap<String, Magnitude>,
    pub priority: Option<i64>,
    #[serde(skip)]
    pub priority_raw: String,
    pub stage: EntryStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_result: Option<MatchResult>,
    pub outliers: Vec<OutlierFlag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_violation: Option<PriorityViolation>,
    #[serde(skip)]
    pub raw_fields: RawRow,
}

impl CartonEntry {
    /// Build an entry from a raw row. Every column in
    /// `config.expected_columns` must be present.
    pub fn from_row(row: usize, raw: &RawRow, config: &CartonConfig) -> Result<Self, InventoryError> {
        for column in &config.expected_columns {
            if !raw.contains_key(column) {
                return Err(InventoryError::MissingColumn {
                    carton: config.carton.clone(),
                    row,
                    column: column.clone(),
                });
            }
        }

        let identity = IdentityKey(
            config
                .identity_fields
                .iter()
                .map(|f| (f.clone(), IdentityValue::parse(&raw[f])))
                .collect(),
        );

        let magnitudes = config
            .bands
            .iter()
            .map(|b| (b.clone(), Magnitude::parse(&raw[b])))
            .collect();

        let priority_raw = raw[&config.priority_column].trim().to_string();
        let priority = priority_raw.parse::<i64>().ok();

        Ok(Self {
            row,
            carton: config.carton.clone(),
            identity,
            magnitudes,
            priority,
            priority_raw,
            stage: EntryStage::Raw,
            match_result: None,
            outliers: Vec::new(),
            priority_violation: None,
            raw_fields: raw.clone(),
        })
    }

    /// One-way stage transition; skipping or going back is an error.
    pub fn advance(&mut self, to: EntryStage) -> Result<(), InventoryError> {
        if !self.stage.next_allowed(to) {
            return Err(InventoryError::Stage {
                row: self.row,
                from: self.stage.to_string(),
                to: to.to_string(),
            });
        }
        self.stage = to;
        Ok(())
    }

    pub fn is_halted(&self) -> bool {
        self.stage == EntryStage::Halted
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BandCounts {
    pub transform_placeholders: usize,
    pub sentinel_placeholders: usize,
    pub outliers: usize,
}

/// Observed min/max of a numeric column over finalized entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartonSummary {
    pub total_entries: usize,
    pub found: usize,
    pub new: usize,
    pub ambiguous: usize,
    pub finalized: usize,
    pub entries_with_outliers: usize,
    pub priority_violations: usize,
    pub bands: BTreeMap<String, BandCounts>,
    pub priority_min: Option<i64>,
    pub priority_max: Option<i64>,
    /// `<SYSTEM>_<kind>` strings seen in the raw magnitudes; `None` when clean.
    pub magnitude_placeholders: Option<BTreeSet<String>>,
    /// Distinct values per configured set column; empty cells count as `None`.
    pub value_sets: BTreeMap<String, BTreeSet<String>>,
    /// Per configured range column; absent when no finalized entry has a number there.
    pub value_ranges: BTreeMap<String, ValueRange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartonReport {
    pub carton: String,
    pub config: CartonConfig,
    pub summary: CartonSummary,
    pub entries: Vec<CartonEntry>,
    pub match_errors: Vec<MatchError>,
}

/// A carton whose run stopped on a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartonFailure {
    pub carton: String,
    pub kind: String,
    pub message: String,
    #[serde(skip)]
    pub error: Option<InventoryError>,
}

impl CartonFailure {
    pub fn new(carton: &str, error: InventoryError) -> Self {
        Self {
            carton: carton.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub cartons_requested: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryRun {
    pub meta: RunMeta,
    pub reports: Vec<CartonReport>,
    pub failures: Vec<CartonFailure>,
}
