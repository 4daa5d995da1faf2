//! `colsync-io` — Decode spreadsheet files into [`colsync_table::Table`]
//! structures and encode updated tables back out.

pub mod csv;
pub mod xlsx;

use std::path::Path;

use colsync_table::Table;

/// Load a table from a file, picking the decoder by extension.
pub fn load_table(path: &Path) -> Result<Table, String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") | Some("tsv") => csv::import(path),
        Some("xlsx") | Some("xls") | Some("xlsm") | Some("ods") => xlsx::import(path),
        _ => Err(format!(
            "unsupported file type: {} (expected .xlsx, .xls, .xlsm, .ods, .csv or .tsv)",
            path.display()
        )),
    }
}

/// Write a table to a file, picking the encoder by extension.
pub fn save_table(table: &Table, path: &Path) -> Result<(), String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") | Some("tsv") => csv::export(table, path),
        Some("xlsx") => xlsx::export(table, path),
        _ => Err(format!(
            "unsupported output type: {} (expected .xlsx, .csv or .tsv)",
            path.display()
        )),
    }
}
