// CSV/TSV import/export. CSV carries no merged or validation ranges.

use std::io::Read;
use std::path::Path;

use colsync_table::{Cell, Table};

pub fn import(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    import_from_string(&name, &content, delimiter)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| e.to_string())?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(name: &str, content: &str, delimiter: u8) -> Result<Table, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let header_record = match records.next() {
        Some(r) => r.map_err(|e| e.to_string())?,
        None => return Err(format!("{name}: no header row")),
    };

    let headers: Vec<String> = header_record
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut table = Table::new(name, headers);
    for record in records {
        let record = record.map_err(|e| e.to_string())?;
        table.push_row(record.iter().map(Cell::from_field).collect());
    }

    Ok(table)
}

pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    writer
        .write_record(&table.headers)
        .map_err(|e| e.to_string())?;
    for row in &table.rows {
        let fields: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        writer.write_record(&fields).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_types_fields() {
        let table = import_from_string("t", "id,name,qty\n1,ann,3\n2,bob,\n", b',').unwrap();
        assert_eq!(table.headers, vec!["id", "name", "qty"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], Cell::number(1.0));
        assert_eq!(table.rows[0][1], Cell::text("ann"));
        assert_eq!(table.rows[1][2], Cell::Empty);
    }

    #[test]
    fn sniffs_semicolons() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3\n"), b',');
    }

    #[test]
    fn empty_header_cells_get_positional_names() {
        let table = import_from_string("t", "id,,qty\n1,x,3\n", b',').unwrap();
        assert_eq!(table.headers, vec!["id", "column_2", "qty"]);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = Table::new("out", vec!["id".into(), "v".into()]);
        table.push_row(vec![Cell::number(1.0), Cell::text("a")]);
        table.push_row(vec![Cell::number(2.0), Cell::Empty]);

        export(&table, &path).unwrap();
        let back = import(&path).unwrap();

        assert_eq!(back.headers, table.headers);
        assert_eq!(back.rows, table.rows);
    }
}
