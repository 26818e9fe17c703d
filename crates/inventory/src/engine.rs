use rayon::prelude::*;

use crate::config::InventoryConfig;
use crate::error::InventoryError;
use crate::lookup::TargetLookup;
use crate::model::{CartonFailure, CartonReport, InventoryInput, InventoryRun, RawRow, RunMeta};
use crate::record::CartonRecord;

/// Resolve, populate and process a single carton.
pub fn process_carton(
    carton: &str,
    config: &InventoryConfig,
    rows: &[RawRow],
    lookup: &dyn TargetLookup,
) -> Result<CartonReport, InventoryError> {
    let carton_config = config.resolve(carton)?;
    let mut record = CartonRecord::from_rows(carton_config, rows)?;
    record.process(lookup)?;
    let report = record.into_report();

    let s = &report.summary;
    log::info!(
        "carton '{carton}': {} entries, {} found, {} new, {} ambiguous, {} with outliers",
        s.total_entries,
        s.found,
        s.new,
        s.ambiguous,
        s.entries_with_outliers,
    );
    Ok(report)
}

/// Process every carton in `input`. Cartons are independent and run in
/// parallel; a fatal error in one is recorded and the rest continue.
/// Reports and failures come back in carton-name order.
pub fn run(config: &InventoryConfig, input: &InventoryInput, lookup: &dyn TargetLookup) -> InventoryRun {
    let outcomes: Vec<(&String, Result<CartonReport, InventoryError>)> = input
        .rows
        .par_iter()
        .map(|(carton, rows)| (carton, process_carton(carton, config, rows, lookup)))
        .collect();

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (carton, outcome) in outcomes {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                log::warn!("carton '{carton}' failed: {e}");
                failures.push(CartonFailure::new(carton, e));
            }
        }
    }

    InventoryRun {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            cartons_requested: input.rows.len(),
        },
        reports,
        failures,
    }
}
