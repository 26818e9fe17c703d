use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    pub name: String,
    /// Process-wide defaults applied to every carton.
    #[serde(default)]
    pub defaults: CartonSettings,
    /// Per-carton overrides keyed by carton name.
    #[serde(default)]
    pub cartons: BTreeMap<String, CartonSettings>,
    #[serde(default)]
    pub targetdb: Option<TargetDbConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Carton settings (unresolved)
// ---------------------------------------------------------------------------

/// One layer of carton configuration. Every field is optional here; the
/// resolver decides what is required once defaults and overrides are merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CartonSettings {
    /// Input CSV for this carton, relative to the config file.
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub bands: Option<Vec<String>>,
    #[serde(default)]
    pub band_ranges: BTreeMap<String, BandRange>,
    #[serde(default)]
    pub priority_range: Option<PriorityRange>,
    #[serde(default)]
    pub identity_fields: Option<Vec<String>>,
    #[serde(default)]
    pub placeholder_sentinel: Option<f64>,
    /// Keyed `<from>_to_<to>`, value is the linear coefficient.
    #[serde(default)]
    pub transform_coefficients: BTreeMap<String, f64>,
    /// System name -> member bands.
    #[serde(default)]
    pub photometric_systems: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub expected_columns: Option<Vec<String>>,
    #[serde(default)]
    pub priority_column: Option<String>,
    #[serde(default)]
    pub placeholder_scan: Option<PlaceholderScan>,
    /// Columns whose distinct values are collected per carton (e.g. cadence, instrument).
    #[serde(default)]
    pub set_columns: Option<Vec<String>>,
    /// Numeric columns whose min/max are reported per carton (e.g. value).
    #[serde(default)]
    pub range_columns: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Ranges
// ---------------------------------------------------------------------------

/// Inclusive magnitude range for one band.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BandRange {
    pub min: f64,
    pub max: f64,
}

impl BandRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Inclusive priority range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PriorityRange {
    pub min: i64,
    pub max: i64,
}

impl PriorityRange {
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Thresholds for the raw placeholder inventory.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PlaceholderScan {
    #[serde(default = "default_bright_limit")]
    pub bright_limit: f64,
    #[serde(default = "default_faint_limit")]
    pub faint_limit: f64,
    #[serde(default = "default_flag_zero")]
    pub flag_zero: bool,
}

fn default_bright_limit() -> f64 {
    -9.0
}

fn default_faint_limit() -> f64 {
    50.0
}

fn default_flag_zero() -> bool {
    true
}

impl Default for PlaceholderScan {
    fn default() -> Self {
        Self {
            bright_limit: default_bright_limit(),
            faint_limit: default_faint_limit(),
            flag_zero: default_flag_zero(),
        }
    }
}

// ---------------------------------------------------------------------------
// Target database + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetDbConfig {
    pub file: String,
    pub key_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    '|'
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: None,
            csv: None,
            delimiter: default_delimiter(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// A linear transform deriving `to` from a measured `from` in the same system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandTransform {
    pub key: String,
    pub from: String,
    pub to: String,
    pub coefficient: f64,
}

impl BandTransform {
    pub fn apply(&self, source: f64) -> f64 {
        source * self.coefficient
    }
}

/// Fully resolved configuration for one carton. Every declared band has a
/// range; transforms only reference declared bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartonConfig {
    pub carton: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub bands: Vec<String>,
    pub band_ranges: BTreeMap<String, BandRange>,
    pub priority_range: PriorityRange,
    pub priority_column: String,
    pub identity_fields: Vec<String>,
    pub expected_columns: Vec<String>,
    pub placeholder_sentinel: Option<f64>,
    /// Ordered by target band, then source band, in declaration order.
    pub transforms: Vec<BandTransform>,
    /// Band -> photometric system, for bands assigned to one.
    pub systems: BTreeMap<String, String>,
    pub placeholder_scan: PlaceholderScan,
    pub set_columns: Vec<String>,
    pub range_columns: Vec<String>,
}

impl CartonConfig {
    pub fn range(&self, band: &str) -> Option<&BandRange> {
        self.band_ranges.get(band)
    }

    /// System the band belongs to, or the band name itself when unassigned.
    pub fn system_of<'a>(&'a self, band: &'a str) -> &'a str {
        self.systems.get(band).map(String::as_str).unwrap_or(band)
    }

    pub fn transforms_into<'a>(&'a self, band: &'a str) -> impl Iterator<Item = &'a BandTransform> + 'a {
        self.transforms.iter().filter(move |t| t.to == band)
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate + Resolve
// ---------------------------------------------------------------------------

impl InventoryConfig {
    pub fn from_toml(input: &str) -> Result<Self, InventoryError> {
        let config: InventoryConfig =
            toml::from_str(input).map_err(|e| InventoryError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks only. Carton-level problems surface from `resolve`
    /// so one bad carton does not take the others down.
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.name.trim().is_empty() {
            return Err(InventoryError::ConfigParse("name must not be empty".into()));
        }
        if !self.output.delimiter.is_ascii() {
            return Err(InventoryError::ConfigParse(format!(
                "output delimiter must be ASCII, got '{}'",
                self.output.delimiter
            )));
        }
        if self.defaults.file.is_some() {
            return Err(InventoryError::ConfigParse(
                "defaults.file is not allowed; set `file` per carton".into(),
            ));
        }
        if let Some(ref db) = self.targetdb {
            if db.key_column.trim().is_empty() {
                return Err(InventoryError::ConfigParse(
                    "targetdb.key_column must not be empty".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn carton_names(&self) -> impl Iterator<Item = &String> {
        self.cartons.keys()
    }

    pub fn resolve(&self, carton: &str) -> Result<CartonConfig, InventoryError> {
        resolve_carton(carton, self.cartons.get(carton), &self.defaults)
    }
}

/// Merge `overrides` onto `defaults` and validate the result.
pub fn resolve_carton(
    carton: &str,
    overrides: Option<&CartonSettings>,
    defaults: &CartonSettings,
) -> Result<CartonConfig, InventoryError> {
    let empty = CartonSettings::default();
    let own = overrides.unwrap_or(&empty);

    let bands = own
        .bands
        .clone()
        .or_else(|| defaults.bands.clone())
        .ok_or_else(|| InventoryError::configuration(carton, "no bands configured"))?;
    if bands.is_empty() {
        return Err(InventoryError::configuration(carton, "bands must not be empty"));
    }
    if let Some(dup) = first_duplicate(&bands) {
        return Err(InventoryError::configuration(carton, format!("band '{dup}' declared twice")));
    }

    let mut merged_ranges = defaults.band_ranges.clone();
    merged_ranges.extend(own.band_ranges.iter().map(|(k, v)| (k.clone(), *v)));
    let mut band_ranges = BTreeMap::new();
    for band in &bands {
        let range = merged_ranges.get(band).ok_or_else(|| {
            InventoryError::configuration(carton, format!("band '{band}' has no range"))
        })?;
        if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
            return Err(InventoryError::configuration(
                carton,
                format!("band '{band}' has invalid range [{}, {}]", range.min, range.max),
            ));
        }
        band_ranges.insert(band.clone(), *range);
    }

    let priority_range = own
        .priority_range
        .or(defaults.priority_range)
        .ok_or_else(|| InventoryError::configuration(carton, "no priority_range configured"))?;
    if priority_range.min > priority_range.max {
        return Err(InventoryError::configuration(
            carton,
            format!("priority_range min {} exceeds max {}", priority_range.min, priority_range.max),
        ));
    }

    let identity_fields = own
        .identity_fields
        .clone()
        .or_else(|| defaults.identity_fields.clone())
        .ok_or_else(|| InventoryError::configuration(carton, "no identity_fields configured"))?;
    if identity_fields.is_empty() {
        return Err(InventoryError::configuration(carton, "identity_fields must not be empty"));
    }
    if let Some(dup) = first_duplicate(&identity_fields) {
        return Err(InventoryError::configuration(
            carton,
            format!("identity field '{dup}' declared twice"),
        ));
    }

    let placeholder_sentinel = own.placeholder_sentinel.or(defaults.placeholder_sentinel);
    if let Some(s) = placeholder_sentinel {
        if !s.is_finite() {
            return Err(InventoryError::configuration(carton, "placeholder_sentinel must be finite"));
        }
    }

    let systems = resolve_systems(carton, &bands, defaults, own)?;
    let transforms = resolve_transforms(carton, &bands, &systems, defaults, own)?;

    let priority_column = own
        .priority_column
        .clone()
        .or_else(|| defaults.priority_column.clone())
        .unwrap_or_else(|| "priority".to_string());

    let set_columns = own
        .set_columns
        .clone()
        .or_else(|| defaults.set_columns.clone())
        .unwrap_or_default();
    let range_columns = own
        .range_columns
        .clone()
        .or_else(|| defaults.range_columns.clone())
        .unwrap_or_default();

    let mut expected_columns: Vec<String> = own
        .expected_columns
        .clone()
        .or_else(|| defaults.expected_columns.clone())
        .unwrap_or_default();
    for col in identity_fields
        .iter()
        .chain(bands.iter())
        .chain(std::iter::once(&priority_column))
        .chain(set_columns.iter())
        .chain(range_columns.iter())
    {
        if !expected_columns.contains(col) {
            expected_columns.push(col.clone());
        }
    }

    Ok(CartonConfig {
        carton: carton.to_string(),
        file: own.file.clone(),
        bands,
        band_ranges,
        priority_range,
        priority_column,
        identity_fields,
        expected_columns,
        placeholder_sentinel,
        transforms,
        systems,
        placeholder_scan: own
            .placeholder_scan
            .or(defaults.placeholder_scan)
            .unwrap_or_default(),
        set_columns,
        range_columns,
    })
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = BTreeSet::new();
    items.iter().find(|i| !seen.insert(i.as_str())).map(String::as_str)
}

/// Band -> system for declared bands. A band listed under two systems is an error.
fn resolve_systems(
    carton: &str,
    bands: &[String],
    defaults: &CartonSettings,
    own: &CartonSettings,
) -> Result<BTreeMap<String, String>, InventoryError> {
    let mut merged = defaults.photometric_systems.clone();
    merged.extend(own.photometric_systems.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut systems: BTreeMap<String, String> = BTreeMap::new();
    for (system, members) in &merged {
        for member in members {
            let Some(band) = match_band(member, bands) else {
                continue;
            };
            if let Some(prev) = systems.insert(band.to_string(), system.clone()) {
                if prev != *system {
                    return Err(InventoryError::configuration(
                        carton,
                        format!("band '{band}' assigned to both '{prev}' and '{system}'"),
                    ));
                }
            }
        }
    }
    Ok(systems)
}

fn resolve_transforms(
    carton: &str,
    bands: &[String],
    systems: &BTreeMap<String, String>,
    defaults: &CartonSettings,
    own: &CartonSettings,
) -> Result<Vec<BandTransform>, InventoryError> {
    // (key, coefficient, declared by the carton itself)
    let mut merged: BTreeMap<&str, (f64, bool)> = defaults
        .transform_coefficients
        .iter()
        .map(|(k, v)| (k.as_str(), (*v, false)))
        .collect();
    for (k, v) in &own.transform_coefficients {
        merged.insert(k.as_str(), (*v, true));
    }

    let mut transforms = Vec::new();
    for (key, (coefficient, own_key)) in merged {
        let parsed = key
            .split_once("_to_")
            .and_then(|(from, to)| Some((match_band(from, bands)?, match_band(to, bands)?)));

        let Some((from, to)) = parsed else {
            // Defaults may describe bands this carton does not declare.
            if own_key {
                return Err(InventoryError::configuration(
                    carton,
                    format!("transform '{key}' does not name two declared bands"),
                ));
            }
            log::debug!("carton '{carton}': skipping default transform '{key}'");
            continue;
        };

        if from == to {
            return Err(InventoryError::configuration(
                carton,
                format!("transform '{key}' maps a band onto itself"),
            ));
        }
        if !coefficient.is_finite() {
            return Err(InventoryError::configuration(
                carton,
                format!("transform '{key}' has a non-finite coefficient"),
            ));
        }
        match (systems.get(from), systems.get(to)) {
            (Some(sys_from), Some(sys_to)) if sys_from != sys_to => {
                return Err(InventoryError::configuration(
                    carton,
                    format!("transform '{key}' crosses systems '{sys_from}' and '{sys_to}'"),
                ));
            }
            (Some(sys), None) | (None, Some(sys)) => {
                return Err(InventoryError::configuration(
                    carton,
                    format!("transform '{key}' links system '{sys}' to a band outside any system"),
                ));
            }
            _ => {}
        }

        transforms.push(BandTransform {
            key: key.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            coefficient,
        });
    }

    let position = |band: &str| bands.iter().position(|b| b == band).unwrap_or(usize::MAX);
    transforms.sort_by_key(|t| (position(t.to.as_str()), position(t.from.as_str())));
    Ok(transforms)
}

/// Resolve a band token by exact name, or by name with the `_mag` suffix dropped.
fn match_band<'a>(token: &str, bands: &'a [String]) -> Option<&'a str> {
    bands
        .iter()
        .find(|b| b.as_str() == token)
        .or_else(|| bands.iter().find(|b| b.strip_suffix("_mag") == Some(token)))
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
