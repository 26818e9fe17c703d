//! Per-carton summary CSV. One row per processed carton; failed cartons are
//! left out (they appear in the JSON output and on stderr).

use cartons_inventory::model::{CartonReport, CartonSummary};

const COLUMNS: [&str; 15] = [
    "carton",
    "file",
    "bands",
    "entries",
    "found",
    "new",
    "ambiguous",
    "finalized",
    "entries_with_outliers",
    "priority_violations",
    "priority_min",
    "priority_max",
    "magnitude_placeholders",
    "value_sets",
    "value_ranges",
];

/// `cadence=a,b;instrument=x`
fn value_sets(s: &CartonSummary) -> String {
    s.value_sets
        .iter()
        .map(|(column, values)| {
            format!("{column}={}", values.iter().cloned().collect::<Vec<_>>().join(","))
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// `value=0.5..2.5`
fn value_ranges(s: &CartonSummary) -> String {
    s.value_ranges
        .iter()
        .map(|(column, r)| format!("{column}={}..{}", r.min, r.max))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn summary_csv(reports: &[CartonReport], delimiter: char) -> Result<String, String> {
    let delimiter = u8::try_from(delimiter).map_err(|_| format!("delimiter '{delimiter}' is not ASCII"))?;
    let mut wtr = csv::WriterBuilder::new().delimiter(delimiter).from_writer(Vec::new());

    wtr.write_record(COLUMNS).map_err(|e| e.to_string())?;
    for report in reports {
        let s = &report.summary;
        let placeholders = s
            .magnitude_placeholders
            .as_ref()
            .map(|k| k.iter().cloned().collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        wtr.write_record([
            report.carton.clone(),
            report.config.file.clone().unwrap_or_default(),
            report.config.bands.join(","),
            s.total_entries.to_string(),
            s.found.to_string(),
            s.new.to_string(),
            s.ambiguous.to_string(),
            s.finalized.to_string(),
            s.entries_with_outliers.to_string(),
            s.priority_violations.to_string(),
            s.priority_min.map(|p| p.to_string()).unwrap_or_default(),
            s.priority_max.map(|p| p.to_string()).unwrap_or_default(),
            placeholders,
            value_sets(s),
            value_ranges(s),
        ])
        .map_err(|e| e.to_string())?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
