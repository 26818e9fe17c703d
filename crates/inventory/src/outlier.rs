use crate::config::CartonConfig;
use crate::error::InventoryError;
use crate::model::{CartonEntry, EntryStage, OutlierFlag, PriorityViolation, ViolatedBound};

/// Flag every declared band whose value (measured or placeholder) lies
/// outside its inclusive range. Sentinels are not special-cased; a band with
/// no finite value is always an outlier.
pub fn check_entry(entry: &mut CartonEntry, config: &CartonConfig) -> Result<(), InventoryError> {
    let mut flags = Vec::new();

    for band in &config.bands {
        let magnitude = entry.magnitudes.get(band);
        let value = magnitude.and_then(|m| m.value());
        let placeholder = magnitude.is_some_and(|m| m.is_placeholder());

        let range = config.range(band).ok_or_else(|| {
            InventoryError::configuration(&config.carton, format!("band '{band}' has no range"))
        })?;

        let bound = match value {
            Some(v) if !v.is_finite() => Some(ViolatedBound::NotFinite),
            Some(v) if v < range.min => Some(ViolatedBound::Min { bound: range.min }),
            Some(v) if v > range.max => Some(ViolatedBound::Max { bound: range.max }),
            Some(_) => None,
            None => Some(ViolatedBound::NotFinite),
        };

        if let Some(bound) = bound {
            flags.push(OutlierFlag {
                band: band.clone(),
                value: value.filter(|v| v.is_finite()),
                bound,
                placeholder,
            });
        }
    }

    let priority_violation = check_priority(entry, config);
    entry.advance(EntryStage::OutlierChecked)?;
    entry.outliers = flags;
    entry.priority_violation = priority_violation;
    Ok(())
}

fn check_priority(entry: &CartonEntry, config: &CartonConfig) -> Option<PriorityViolation> {
    let range = &config.priority_range;
    match entry.priority {
        None if entry.priority_raw.is_empty() => Some(PriorityViolation::Missing),
        None => Some(PriorityViolation::Invalid {
            raw: entry.priority_raw.clone(),
        }),
        Some(p) if p < range.min => Some(PriorityViolation::Below { min: range.min }),
        Some(p) if p > range.max => Some(PriorityViolation::Above { max: range.max }),
        Some(_) => None,
    }
}

/// Check every non-halted entry. Returns the number of entries with at least one flag.
pub fn check_entries(entries: &mut [CartonEntry], config: &CartonConfig) -> Result<usize, InventoryError> {
    let mut flagged = 0;
    for entry in entries.iter_mut().filter(|e| !e.is_halted()) {
        check_entry(entry, config)?;
        if !entry.outliers.is_empty() {
            flagged += 1;
        }
    }
    Ok(flagged)
}
