use crate::error::InventoryError;
use crate::model::RawRow;

/// Load CSV text into ordered raw rows (header -> cell). Cells are trimmed;
/// short rows leave the trailing columns absent.
pub fn load_csv_rows(carton: &str, csv_data: &str) -> Result<Vec<RawRow>, InventoryError> {
    load_delimited_rows(carton, csv_data, b',')
}

pub fn load_delimited_rows(carton: &str, data: &str, delimiter: u8) -> Result<Vec<RawRow>, InventoryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| InventoryError::Io(format!("carton '{carton}': {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| InventoryError::Io(format!("carton '{carton}': {e}")))?;
        let row: RawRow = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| record.get(i).map(|v| (h.clone(), v.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_basic() {
        let csv = "\
catalogid, g_mag ,r_mag,priority
1001,15.2,,2000
1002, 17.0 ,16.1,2100
";
        let rows = load_csv_rows("bhm_rm_core", csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["catalogid"], "1001");
        assert_eq!(rows[0]["r_mag"], "");
        assert_eq!(rows[1]["g_mag"], "17.0");
    }

    #[test]
    fn short_row_drops_trailing_columns() {
        let csv = "catalogid,g_mag,priority\n1001,15.2\n";
        let rows = load_csv_rows("c", csv).unwrap();
        assert!(rows[0].contains_key("g_mag"));
        assert!(!rows[0].contains_key("priority"));
    }

    #[test]
    fn pipe_delimited() {
        let rows = load_delimited_rows("c", "catalogid|g_mag\n7|12.5\n", b'|').unwrap();
        assert_eq!(rows[0]["g_mag"], "12.5");
    }
}
