//! Magnitude placeholder substitution and the raw placeholder inventory.
//!
//! Substitution order for a band that is missing or invalid:
//! 1. the first configured transform into the band whose source band holds a
//!    measured value (placeholders are never used as sources);
//! 2. the configured sentinel;
//! 3. otherwise a `Placeholder` error, fatal for the carton.

use std::collections::BTreeSet;

use crate::config::CartonConfig;
use crate::error::InventoryError;
use crate::model::{CartonEntry, EntryStage, Magnitude, PlaceholderOrigin};

/// Fill every missing/invalid declared band of a `Matched` entry.
pub fn fill_entry(entry: &mut CartonEntry, config: &CartonConfig) -> Result<(), InventoryError> {
    let mut filled = Vec::new();

    for band in &config.bands {
        let needs = entry
            .magnitudes
            .get(band)
            .map_or(true, Magnitude::needs_placeholder);
        if !needs {
            continue;
        }

        let derived = config.transforms_into(band).find_map(|t| {
            let source = entry.magnitudes.get(&t.from)?.measured()?;
            Some(Magnitude::Placeholder {
                value: t.apply(source),
                origin: PlaceholderOrigin::Transform {
                    from: t.from.clone(),
                    coefficient: t.coefficient,
                },
            })
        });

        let placeholder = match (derived, config.placeholder_sentinel) {
            (Some(p), _) => p,
            (None, Some(sentinel)) => Magnitude::Placeholder {
                value: sentinel,
                origin: PlaceholderOrigin::Sentinel,
            },
            (None, None) => {
                return Err(InventoryError::Placeholder {
                    carton: config.carton.clone(),
                    row: entry.row,
                    band: band.clone(),
                })
            }
        };
        filled.push((band.clone(), placeholder));
    }

    // Applied after the scan so sources are always the original measurements.
    entry.magnitudes.extend(filled);
    entry.advance(EntryStage::PlaceholderFilled)
}

/// Fill every non-halted entry. The first failure aborts the carton.
pub fn fill_entries(entries: &mut [CartonEntry], config: &CartonConfig) -> Result<usize, InventoryError> {
    let mut count = 0;
    for entry in entries.iter_mut().filter(|e| !e.is_halted()) {
        fill_entry(entry, config)?;
        count += entry.magnitudes.values().filter(|m| m.is_placeholder()).count();
    }
    Ok(count)
}

/// Kinds of placeholder already present in the raw input, as
/// `<SYSTEM>_None`, `<SYSTEM>_Invalid` or `<SYSTEM>_<value>`.
pub fn scan_raw_placeholders(entries: &[CartonEntry], config: &CartonConfig) -> BTreeSet<String> {
    let scan = &config.placeholder_scan;
    let mut kinds = BTreeSet::new();

    for band in &config.bands {
        let system = config.system_of(band);
        for entry in entries {
            let raw = entry.raw_fields.get(band).map(String::as_str).unwrap_or("");
            match Magnitude::parse(raw) {
                Magnitude::Missing => {
                    kinds.insert(format!("{system}_None"));
                }
                Magnitude::Invalid { .. } => {
                    kinds.insert(format!("{system}_Invalid"));
                }
                Magnitude::Measured { value } => {
                    if value < scan.bright_limit
                        || value > scan.faint_limit
                        || (scan.flag_zero && value == 0.0)
                    {
                        kinds.insert(format!("{system}_{value:?}"));
                    }
                }
                Magnitude::Placeholder { .. } => {}
            }
        }
    }

    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::model::RawRow;

    const CONFIG: &str = r#"
name = "t"
[defaults]
bands = ["g_mag", "r_mag", "i_mag", "h_mag"]
identity_fields = ["catalogid"]
priority_range = { min = 0, max = 10 }
placeholder_sentinel = 99.9
[defaults.band_ranges]
g_mag = { min = 10.0, max = 20.0 }
r_mag = { min = 10.0, max = 20.0 }
i_mag = { min = 10.0, max = 20.0 }
h_mag = { min = 5.0, max = 18.0 }
[defaults.transform_coefficients]
g_to_r = 0.9
r_to_i = 0.95
[defaults.photometric_systems]
SDSS = ["g_mag", "r_mag", "i_mag"]
TMASS = ["h_mag"]

[cartons.no_sentinel]
placeholder_sentinel = nan
"#;

    fn cfg(carton: &str) -> CartonConfig {
        InventoryConfig::from_toml(CONFIG).unwrap().resolve(carton).unwrap()
    }

    fn matched(cells: &[(&str, &str)], config: &CartonConfig) -> CartonEntry {
        let mut raw: RawRow = cells.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        for col in &config.expected_columns {
            raw.entry(col.clone()).or_default();
        }
        let mut e = CartonEntry::from_row(1, &raw, config).unwrap();
        e.advance(EntryStage::Matched).unwrap();
        e
    }

    #[test]
    fn transform_from_alternate_band() {
        let c = cfg("bright_test");
        let mut e = matched(&[("g_mag", "15"), ("i_mag", "14"), ("h_mag", "12")], &c);
        fill_entry(&mut e, &c).unwrap();
        assert_eq!(
            e.magnitudes["r_mag"],
            Magnitude::Placeholder {
                value: 15.0 * 0.9,
                origin: PlaceholderOrigin::Transform { from: "g_mag".into(), coefficient: 0.9 },
            }
        );
        assert_eq!(e.magnitudes["r_mag"].value(), Some(13.5));
        assert!(e.magnitudes["r_mag"].is_placeholder());
        assert_eq!(e.stage, EntryStage::PlaceholderFilled);
    }

    #[test]
    fn placeholders_never_chain() {
        let c = cfg("chain");
        // r is missing (derived from g), i is missing: its source r is a
        // placeholder, so i falls back to the sentinel.
        let mut e = matched(&[("g_mag", "15"), ("h_mag", "12")], &c);
        fill_entry(&mut e, &c).unwrap();
        assert_eq!(e.magnitudes["r_mag"].value(), Some(13.5));
        assert_eq!(
            e.magnitudes["i_mag"],
            Magnitude::Placeholder { value: 99.9, origin: PlaceholderOrigin::Sentinel }
        );
    }

    #[test]
    fn invalid_values_are_replaced() {
        let c = cfg("x");
        let mut e = matched(&[("g_mag", "nan"), ("r_mag", "16"), ("i_mag", "15"), ("h_mag", "inf")], &c);
        fill_entry(&mut e, &c).unwrap();
        assert_eq!(e.magnitudes["g_mag"].value(), Some(99.9));
        assert_eq!(e.magnitudes["h_mag"].value(), Some(99.9));
        assert_eq!(e.magnitudes["r_mag"], Magnitude::Measured { value: 16.0 });
    }

    #[test]
    fn totality() {
        let c = cfg("x");
        let mut e = matched(&[], &c);
        fill_entry(&mut e, &c).unwrap();
        for band in &c.bands {
            assert!(e.magnitudes[band].value().is_some(), "{band} left empty");
        }
    }

    #[test]
    fn no_sentinel_no_source_is_error() {
        let toml = CONFIG.replace("placeholder_sentinel = 99.9\n", "");
        let c = InventoryConfig::from_toml(&toml).unwrap().resolve("x").unwrap();
        let mut e = matched(&[("g_mag", "15"), ("i_mag", "14")], &c);
        let err = fill_entry(&mut e, &c).unwrap_err();
        assert_eq!(
            err,
            InventoryError::Placeholder { carton: "x".into(), row: 1, band: "h_mag".into() }
        );
        // Entry did not advance
        assert_eq!(e.stage, EntryStage::Matched);
    }

    #[test]
    fn non_finite_sentinel_rejected_at_resolution() {
        let config = InventoryConfig::from_toml(CONFIG).unwrap();
        assert!(config.resolve("no_sentinel").is_err());
    }

    #[test]
    fn fill_skips_halted_entries() {
        let c = cfg("x");
        let mut raw: RawRow = c.expected_columns.iter().map(|k| (k.clone(), String::new())).collect();
        raw.insert("catalogid".into(), "1".into());
        let mut halted = CartonEntry::from_row(1, &raw, &c).unwrap();
        halted.advance(EntryStage::Halted).unwrap();
        let mut entries = vec![halted, matched(&[("g_mag", "15")], &c)];
        fill_entries(&mut entries, &c).unwrap();
        assert_eq!(entries[0].stage, EntryStage::Halted);
        assert_eq!(entries[0].magnitudes["g_mag"], Magnitude::Missing);
        assert_eq!(entries[1].stage, EntryStage::PlaceholderFilled);
    }

    #[test]
    fn raw_inventory_kinds() {
        let c = cfg("x");
        let entries = vec![
            matched(&[("g_mag", "-99.9"), ("r_mag", "15"), ("i_mag", "0"), ("h_mag", "")], &c),
            matched(&[("g_mag", "16"), ("r_mag", "nan"), ("i_mag", "999"), ("h_mag", "12")], &c),
        ];
        let kinds = scan_raw_placeholders(&entries, &c);
        let expected: BTreeSet<String> = [
            "SDSS_-99.9",
            "SDSS_0.0",
            "SDSS_999.0",
            "SDSS_Invalid",
            "TMASS_None",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(kinds, expected);
    }

    #[test]
    fn raw_inventory_clean_carton_is_empty() {
        let c = cfg("x");
        let entries = vec![matched(&[("g_mag", "15"), ("r_mag", "15"), ("i_mag", "15"), ("h_mag", "12")], &c)];
        assert!(scan_raw_placeholders(&entries, &c).is_empty());
    }
}
