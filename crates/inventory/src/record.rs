use std::collections::BTreeSet;

use crate::config::CartonConfig;
use crate::error::InventoryError;
use crate::evidence::compute_summary;
use crate::lookup::TargetLookup;
use crate::matcher::match_entries;
use crate::model::{CartonEntry, CartonReport, EntryStage, MatchError, RawRow};
use crate::outlier::check_entries;
use crate::placeholder::{fill_entries, scan_raw_placeholders};

/// One carton's entries and resolved config for the duration of a run.
/// Entries are never removed; halted entries stay in place.
#[derive(Debug, Clone)]
pub struct CartonRecord {
    pub config: CartonConfig,
    pub entries: Vec<CartonEntry>,
    pub match_errors: Vec<MatchError>,
    /// Raw placeholder kinds seen before substitution.
    pub raw_placeholders: BTreeSet<String>,
}

impl CartonRecord {
    pub fn from_rows(config: CartonConfig, rows: &[RawRow]) -> Result<Self, InventoryError> {
        let entries = rows
            .iter()
            .enumerate()
            .map(|(i, raw)| CartonEntry::from_row(i + 1, raw, &config))
            .collect::<Result<Vec<_>, _>>()?;
        let raw_placeholders = scan_raw_placeholders(&entries, &config);

        Ok(Self {
            config,
            entries,
            match_errors: Vec::new(),
            raw_placeholders,
        })
    }

    pub fn carton(&self) -> &str {
        &self.config.carton
    }

    /// Raw -> Matched -> PlaceholderFilled -> OutlierChecked -> Finalized.
    /// Ambiguous entries stop at matching and are kept in `match_errors`.
    pub fn process(&mut self, lookup: &dyn TargetLookup) -> Result<(), InventoryError> {
        let carton = self.config.carton.clone();

        self.match_errors = match_entries(&carton, &mut self.entries, lookup)?;
        log::debug!(
            "carton '{carton}': matched {} entries, {} ambiguous",
            self.entries.len(),
            self.match_errors.len()
        );

        let placeholders = fill_entries(&mut self.entries, &self.config)?;
        log::debug!("carton '{carton}': {placeholders} placeholder magnitudes");

        let flagged = check_entries(&mut self.entries, &self.config)?;
        log::debug!("carton '{carton}': {flagged} entries with outliers");

        for entry in self.entries.iter_mut().filter(|e| !e.is_halted()) {
            entry.advance(EntryStage::Finalized)?;
        }
        Ok(())
    }

    pub fn into_report(self) -> CartonReport {
        let summary = compute_summary(&self);
        CartonReport {
            carton: self.config.carton.clone(),
            config: self.config,
            summary,
            entries: self.entries,
            match_errors: self.match_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InventoryConfig;
    use crate::lookup::TargetSnapshot;

    const CONFIG: &str = r#"
name = "t"
[defaults]
bands = ["g_mag", "r_mag"]
identity_fields = ["catalogid"]
priority_range = { min = 0, max = 10 }
placeholder_sentinel = 99.9
transform_coefficients = { g_to_r = 0.9 }
[defaults.band_ranges]
g_mag = { min = 10.0, max = 20.0 }
r_mag = { min = 10.0, max = 20.0 }
"#;

    fn rows(data: &[[&str; 4]]) -> Vec<RawRow> {
        data.iter()
            .map(|r| {
                ["catalogid", "g_mag", "r_mag", "priority"]
                    .iter()
                    .zip(r.iter())
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn full_pipeline_stages() {
        let c = InventoryConfig::from_toml(CONFIG).unwrap().resolve("c").unwrap();
        let snap = TargetSnapshot::from_csv("catalogid,x\n1,a\n2,b\n2,c\n", "catalogid").unwrap();
        let mut record = CartonRecord::from_rows(
            c,
            &rows(&[["1", "15", "", "3"], ["2", "15", "14", "3"], ["3", "", "", "3"]]),
        )
        .unwrap();
        record.process(&snap).unwrap();

        assert_eq!(record.entries[0].stage, EntryStage::Finalized);
        assert_eq!(record.entries[1].stage, EntryStage::Halted);
        assert_eq!(record.entries[2].stage, EntryStage::Finalized);
        assert_eq!(record.match_errors.len(), 1);
        assert_eq!(record.entries[0].magnitudes["r_mag"].value(), Some(13.5));
        // No systems declared, so kinds report under the band name
        let kinds: Vec<&str> = record.raw_placeholders.iter().map(String::as_str).collect();
        assert_eq!(kinds, vec!["g_mag_None", "r_mag_None"]);
    }

    #[test]
    fn missing_expected_column_fails_population() {
        let c = InventoryConfig::from_toml(CONFIG).unwrap().resolve("c").unwrap();
        let mut bad = rows(&[["1", "15", "15", "3"]]);
        bad[0].remove("r_mag");
        let err = CartonRecord::from_rows(c, &bad).unwrap_err();
        assert_eq!(
            err,
            InventoryError::MissingColumn { carton: "c".into(), row: 1, column: "r_mag".into() }
        );
    }
}
