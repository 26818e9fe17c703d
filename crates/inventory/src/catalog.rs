//! Carton list files and the carton catalog.
//!
//! A list file names (carton, plan, category) triples with their
//! robostrategy stage and active flag. The catalog is a CSV export of every
//! carton version known to the target database; it answers whether a listed
//! triple exists and which versions a selection should pick.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

const NOT_AVAILABLE: &str = "N/A";
const LIST_COLUMNS: [&str; 5] = ["carton", "plan", "category", "stage", "active"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartonListEntry {
    pub carton: String,
    pub plan: String,
    pub category: String,
    pub stage: String,
    pub active: String,
}

impl CartonListEntry {
    pub fn from_catalog(row: &CatalogCarton) -> Self {
        Self {
            carton: row.carton.clone(),
            plan: row.plan.clone(),
            category: row.category_label.clone(),
            stage: NOT_AVAILABLE.to_string(),
            active: NOT_AVAILABLE.to_string(),
        }
    }

    fn fields(&self) -> [&str; 5] {
        [&self.carton, &self.plan, &self.category, &self.stage, &self.active]
    }
}

/// Parse a `|`-delimited list file. The first line is a header; blank lines
/// are skipped and leading/trailing pipes are optional.
pub fn parse_carton_list(text: &str) -> Result<Vec<CartonListEntry>, InventoryError> {
    let mut entries = Vec::new();

    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let inner = inner.strip_suffix('|').unwrap_or(inner);
        let fields: Vec<&str> = inner.split('|').map(str::trim).collect();

        if fields.len() != LIST_COLUMNS.len() {
            return Err(InventoryError::ListParse {
                line: line_no,
                message: format!("expected {} fields, found {}", LIST_COLUMNS.len(), fields.len()),
            });
        }
        if fields[0].is_empty() {
            return Err(InventoryError::ListParse {
                line: line_no,
                message: "empty carton name".into(),
            });
        }

        entries.push(CartonListEntry {
            carton: fields[0].to_string(),
            plan: fields[1].to_string(),
            category: fields[2].to_string(),
            stage: fields[3].to_string(),
            active: fields[4].to_string(),
        });
    }

    Ok(entries)
}

/// Render entries in the fixed-width list format read by [`parse_carton_list`].
pub fn format_carton_list(entries: &[CartonListEntry]) -> String {
    let mut widths = LIST_COLUMNS.map(str::len);
    for e in entries {
        for (w, field) in widths.iter_mut().zip(e.fields()) {
            *w = (*w).max(field.len());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &LIST_COLUMNS, &widths);
    for e in entries {
        push_row(&mut out, &e.fields(), &widths);
    }
    out
}

fn push_row(out: &mut String, fields: &[&str; 5], widths: &[usize; 5]) {
    out.push('|');
    for (field, w) in fields.iter().zip(widths.iter().copied()) {
        out.push_str(&format!(" {field:>w$} |"));
    }
    out.push('\n');
}

/// One carton version from the catalog export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCarton {
    pub carton: String,
    pub plan: String,
    pub category_label: String,
    pub version_pk: i64,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub mapper_label: String,
}

#[derive(Debug, Clone, Default)]
pub struct CartonCatalog {
    pub rows: Vec<CatalogCarton>,
}

/// Version details for a plan as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanVersion {
    pub tag: String,
    pub version_pk: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExistenceCheck {
    pub entry: CartonListEntry,
    pub in_catalog: bool,
    /// Present when the catalog knows the entry's plan at all.
    pub plan_version: Option<PlanVersion>,
    /// Catalog rows with the same carton name, for a not-found entry.
    pub alternatives: Vec<CatalogCarton>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    Latest,
    All,
    Single(i64),
}

#[derive(Debug, Clone)]
pub struct SelectionCriteria {
    /// Glob over carton names, case-insensitive. `None` selects every carton.
    pub pattern: Option<String>,
    pub versions: VersionPolicy,
    /// Carton name -> version_pk, overriding `versions` for that carton.
    pub forced: BTreeMap<String, i64>,
}

impl CartonCatalog {
    pub fn from_csv(csv_data: &str) -> Result<Self, InventoryError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(csv_data.as_bytes());
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<CatalogCarton>, _>>()
            .map_err(|e| InventoryError::Io(format!("carton catalog: {e}")))?;
        Ok(Self { rows })
    }

    pub fn check(&self, entry: &CartonListEntry) -> ExistenceCheck {
        let in_catalog = self.rows.iter().any(|r| {
            r.carton == entry.carton && r.plan == entry.plan && r.category_label == entry.category
        });
        let plan_version = self
            .rows
            .iter()
            .filter(|r| r.plan == entry.plan)
            .max_by_key(|r| r.version_pk)
            .map(|r| PlanVersion {
                tag: r.tag.clone(),
                version_pk: r.version_pk,
            });
        let alternatives = if in_catalog {
            Vec::new()
        } else {
            self.rows.iter().filter(|r| r.carton == entry.carton).cloned().collect()
        };

        if !in_catalog {
            log::debug!(
                "carton '{}' plan '{}' category '{}' not in catalog, {} alternatives",
                entry.carton,
                entry.plan,
                entry.category,
                alternatives.len()
            );
        }

        ExistenceCheck {
            entry: entry.clone(),
            in_catalog,
            plan_version,
            alternatives,
        }
    }

    pub fn check_existence(&self, entries: &[CartonListEntry]) -> Vec<ExistenceCheck> {
        entries.iter().map(|e| self.check(e)).collect()
    }

    /// Pick carton versions by name pattern and version policy. Results are
    /// sorted by carton name, then catalog order.
    pub fn select(&self, criteria: &SelectionCriteria) -> Result<Vec<CartonListEntry>, InventoryError> {
        let pattern = criteria.pattern.as_deref().map(NamePattern::new).transpose()?;
        let candidates: Vec<&CatalogCarton> = self
            .rows
            .iter()
            .filter(|r| pattern.as_ref().map_or(true, |p| p.matches(&r.carton)))
            .collect();

        let names: BTreeSet<&str> = candidates.iter().map(|r| r.carton.as_str()).collect();
        let mut selected = Vec::new();

        for name in names {
            let versions: Vec<&CatalogCarton> =
                candidates.iter().copied().filter(|r| r.carton == name).collect();
            let wanted = match (criteria.forced.get(name), criteria.versions) {
                (Some(&pk), _) => Some(pk),
                (None, VersionPolicy::Single(pk)) => Some(pk),
                (None, VersionPolicy::All) => None,
                (None, VersionPolicy::Latest) => versions.iter().map(|r| r.version_pk).max(),
            };
            selected.extend(
                versions
                    .into_iter()
                    .filter(|r| wanted.map_or(true, |pk| r.version_pk == pk))
                    .map(CartonListEntry::from_catalog),
            );
        }

        if selected.is_empty() {
            return Err(InventoryError::Selection(
                "no carton/version_pk pairs match the selection criteria".into(),
            ));
        }
        Ok(selected)
    }
}

/// Case-insensitive carton name pattern (`*`, `?` and `[...]` wildcards).
pub struct NamePattern(glob::Pattern);

const NAME_MATCH: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, InventoryError> {
        glob::Pattern::new(pattern)
            .map(Self)
            .map_err(|e| InventoryError::Selection(format!("invalid carton pattern {pattern:?}: {e}")))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.matches_with(name, NAME_MATCH)
    }
}
