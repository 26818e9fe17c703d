use std::collections::{BTreeMap, BTreeSet};

use crate::model::{BandCounts, CartonSummary, EntryStage, Magnitude, PlaceholderOrigin, ValueRange};
use crate::record::CartonRecord;

/// Compute summary statistics for a processed carton.
pub fn compute_summary(record: &CartonRecord) -> CartonSummary {
    let mut bands: BTreeMap<String, BandCounts> = record
        .config
        .bands
        .iter()
        .map(|b| (b.clone(), BandCounts::default()))
        .collect();

    let mut found = 0;
    let mut new = 0;
    let mut finalized = 0;
    let mut entries_with_outliers = 0;
    let mut priority_violations = 0;
    let mut priority_min: Option<i64> = None;
    let mut priority_max: Option<i64> = None;
    let mut value_sets: BTreeMap<String, BTreeSet<String>> = record
        .config
        .set_columns
        .iter()
        .map(|c| (c.clone(), BTreeSet::new()))
        .collect();
    let mut value_ranges: BTreeMap<String, ValueRange> = BTreeMap::new();

    for entry in &record.entries {
        if let Some(ref m) = entry.match_result {
            if m.found {
                found += 1;
            } else {
                new += 1;
            }
        }
        if entry.stage != EntryStage::Finalized {
            continue;
        }
        finalized += 1;

        for (band, magnitude) in &entry.magnitudes {
            let Some(counts) = bands.get_mut(band) else {
                continue;
            };
            if let Magnitude::Placeholder { origin, .. } = magnitude {
                match origin {
                    PlaceholderOrigin::Transform { .. } => counts.transform_placeholders += 1,
                    PlaceholderOrigin::Sentinel => counts.sentinel_placeholders += 1,
                }
            }
        }
        for flag in &entry.outliers {
            if let Some(counts) = bands.get_mut(&flag.band) {
                counts.outliers += 1;
            }
        }
        if !entry.outliers.is_empty() {
            entries_with_outliers += 1;
        }
        if entry.priority_violation.is_some() {
            priority_violations += 1;
        }
        if let Some(p) = entry.priority {
            priority_min = Some(priority_min.map_or(p, |m| m.min(p)));
            priority_max = Some(priority_max.map_or(p, |m| m.max(p)));
        }

        for (column, values) in value_sets.iter_mut() {
            let cell = entry.raw_fields.get(column).map(|v| v.trim()).unwrap_or("");
            values.insert(if cell.is_empty() { "None".to_string() } else { cell.to_string() });
        }
        for column in &record.config.range_columns {
            let Some(v) = entry
                .raw_fields
                .get(column)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
            else {
                continue;
            };
            value_ranges
                .entry(column.clone())
                .and_modify(|r| {
                    r.min = r.min.min(v);
                    r.max = r.max.max(v);
                })
                .or_insert(ValueRange { min: v, max: v });
        }
    }

    CartonSummary {
        total_entries: record.entries.len(),
        found,
        new,
        ambiguous: record.match_errors.len(),
        finalized,
        entries_with_outliers,
        priority_violations,
        bands,
        priority_min,
        priority_max,
        magnitude_placeholders: if record.raw_placeholders.is_empty() {
            None
        } else {
            Some(record.raw_placeholders.clone())
        },
        value_sets,
        value_ranges,
    }
}
