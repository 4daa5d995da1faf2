// XLSX import/export.
//
// calamine reads cell data; merged-cell and data-validation rectangles are
// recovered straight from the worksheet XML (zip + quick-xml) since the
// range API does not surface them. Export goes through rust_xlsxwriter.

use std::io::Read;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use quick_xml::events::Event;
use rust_xlsxwriter::{Format, Workbook};

use colsync_table::{Cell, MergedRange, Table, ValidationRange};

/// Import the first worksheet of an Excel file (xlsx, xls, xlsm, ods).
///
/// The first row of the used range becomes the header row; everything
/// below becomes data rows. Merged regions and data validations are only
/// recovered for zip-based formats (xlsx/xlsm).
pub fn import(path: &Path) -> Result<Table, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| format!("{} contains no sheets", path.display()))?;

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| format!("failed to read sheet '{first}': {e}"))?;

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (height, _) = range.get_size();
    if height == 0 {
        return Err(format!("sheet '{first}' is empty"));
    }

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().unwrap_or(&[]);
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let h = data_to_cell(cell).to_string();
            if h.is_empty() {
                format!("column_{}", i + 1)
            } else {
                h
            }
        })
        .collect();

    let mut table = Table::new(name, headers);
    for row in rows_iter {
        table.push_row(row.iter().map(data_to_cell).collect());
    }

    // The used range may not start at A1; merge/validation refs are
    // absolute, so shift them into the table's coordinate space (header
    // row = 0).
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    if matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("xlsx") | Some("xlsm")
    ) {
        let (merged, validations) = read_sheet_metadata(path)?;
        table.merged = merged
            .into_iter()
            .filter_map(|m| rebase_merge(m, start_row, start_col))
            .collect();
        table.validations = validations
            .into_iter()
            .filter_map(|v| rebase_validation(v, start_row, start_col))
            .collect();
    }

    Ok(table)
}

fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(n) => Cell::number(*n),
        Data::Int(n) => Cell::number(*n as f64),
        Data::Bool(b) => Cell::Bool(*b),
        // Dates stay as serial numbers; the engine compares values, it
        // does not render them.
        Data::DateTime(dt) => Cell::number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{e:?}")),
    }
}

fn rebase_merge(m: MergedRange, start_row: usize, start_col: usize) -> Option<MergedRange> {
    if m.start_row < start_row || m.start_col < start_col {
        return None;
    }
    Some(MergedRange::new(
        m.start_row - start_row,
        m.start_col - start_col,
        m.end_row - start_row,
        m.end_col - start_col,
    ))
}

fn rebase_validation(
    mut v: ValidationRange,
    start_row: usize,
    start_col: usize,
) -> Option<ValidationRange> {
    if v.start_row < start_row || v.start_col < start_col {
        return None;
    }
    v.start_row -= start_row;
    v.end_row -= start_row;
    v.start_col -= start_col;
    v.end_col -= start_col;
    Some(v)
}

// ---------------------------------------------------------------------------
// Worksheet XML scan (merges + validations)
// ---------------------------------------------------------------------------

fn read_sheet_metadata(path: &Path) -> Result<(Vec<MergedRange>, Vec<ValidationRange>), String> {
    let file = std::fs::File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;

    // First worksheet. Writers emit xl/worksheets/sheet1.xml for the first
    // sheet; fall back to the lexicographically first worksheet part.
    let sheet_part = if archive.by_name("xl/worksheets/sheet1.xml").is_ok() {
        "xl/worksheets/sheet1.xml".to_string()
    } else {
        let mut candidates: Vec<String> = archive
            .file_names()
            .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
            .map(|n| n.to_string())
            .collect();
        candidates.sort();
        match candidates.into_iter().next() {
            Some(n) => n,
            None => return Ok((Vec::new(), Vec::new())),
        }
    };

    let mut xml = String::new();
    archive
        .by_name(&sheet_part)
        .map_err(|e| e.to_string())?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;

    Ok(scan_sheet_xml(&xml))
}

fn scan_sheet_xml(xml: &str) -> (Vec<MergedRange>, Vec<ValidationRange>) {
    let mut merged = Vec::new();
    let mut validations = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    // (kind, sqref, formula text) of the dataValidation being scanned
    let mut pending: Option<(String, String, String)> = None;
    let mut in_formula = false;

    loop {
        match reader.read_event() {
            // Self-closing elements: <mergeCell ref=".."/> and validations
            // without formula children
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"mergeCell" => {
                    if let Some(r) = attr_value(e, b"ref").and_then(|v| parse_range_ref(&v)) {
                        merged.push(r);
                    }
                }
                b"dataValidation" => {
                    let kind = attr_value(e, b"type").unwrap_or_default();
                    let sqref = attr_value(e, b"sqref").unwrap_or_default();
                    push_validations(&mut validations, &kind, &sqref, "");
                }
                _ => {}
            },
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"mergeCell" => {
                    if let Some(r) = attr_value(e, b"ref").and_then(|v| parse_range_ref(&v)) {
                        merged.push(r);
                    }
                }
                b"dataValidation" => {
                    let kind = attr_value(e, b"type").unwrap_or_default();
                    let sqref = attr_value(e, b"sqref").unwrap_or_default();
                    pending = Some((kind, sqref, String::new()));
                }
                b"formula1" | b"formula2" => in_formula = pending.is_some(),
                _ => {}
            },
            Ok(Event::Text(ref t)) if in_formula => {
                if let Some((_, _, payload)) = pending.as_mut() {
                    payload.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"formula1" | b"formula2" => in_formula = false,
                b"dataValidation" => {
                    if let Some((kind, sqref, payload)) = pending.take() {
                        push_validations(&mut validations, &kind, &sqref, &payload);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    (merged, validations)
}

fn push_validations(out: &mut Vec<ValidationRange>, kind: &str, sqref: &str, payload: &str) {
    // sqref may hold several space-separated rectangles
    for part in sqref.split_whitespace() {
        if let Some(rect) = parse_range_ref(part) {
            out.push(ValidationRange {
                start_row: rect.start_row,
                start_col: rect.start_col,
                end_row: rect.end_row,
                end_col: rect.end_col,
                kind: kind.to_string(),
                payload: payload.to_string(),
            });
        }
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Parse an A1 cell reference ("B2", "$B$2") into 0-based (row, col).
fn parse_cell_ref(s: &str) -> Option<(usize, usize)> {
    let mut col = 0usize;
    let mut row = 0usize;
    let mut saw_col = false;
    let mut saw_row = false;

    for ch in s.chars() {
        match ch {
            '$' => {}
            'A'..='Z' | 'a'..='z' if !saw_row => {
                col = col * 26 + (ch.to_ascii_uppercase() as usize - 'A' as usize + 1);
                saw_col = true;
            }
            '0'..='9' if saw_col => {
                row = row * 10 + (ch as usize - '0' as usize);
                saw_row = true;
            }
            _ => return None,
        }
    }

    if saw_col && saw_row && row > 0 {
        Some((row - 1, col - 1))
    } else {
        None
    }
}

/// Parse "B2:C4" (or a single cell "B2") into a 0-based rectangle.
fn parse_range_ref(s: &str) -> Option<MergedRange> {
    match s.split_once(':') {
        Some((a, b)) => {
            let (sr, sc) = parse_cell_ref(a)?;
            let (er, ec) = parse_cell_ref(b)?;
            if sr <= er && sc <= ec {
                Some(MergedRange::new(sr, sc, er, ec))
            } else {
                None
            }
        }
        None => {
            let (r, c) = parse_cell_ref(s)?;
            Some(MergedRange::new(r, c, r, c))
        }
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write a table to an .xlsx file. Merged regions are re-established;
/// validation rules are bookkeeping-only and are not written back.
pub fn export(table: &Table, path: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    // Merges first — merge_range blanks every covered cell, and the
    // primary value is written over the blank afterwards.
    let merge_format = Format::new();
    for m in &table.merged {
        worksheet
            .merge_range(
                m.start_row as u32,
                m.start_col as u16,
                m.end_row as u32,
                m.end_col as u16,
                "",
                &merge_format,
            )
            .map_err(|e| format!("failed to write merge: {e}"))?;
    }

    for (col, header) in table.headers.iter().enumerate() {
        if shadowed_on_sheet(table, 0, col) {
            continue;
        }
        worksheet
            .write_string(0, col as u16, header)
            .map_err(|e| format!("failed to write header: {e}"))?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let sheet_row = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            if shadowed_on_sheet(table, sheet_row as usize, col) {
                continue;
            }
            let col = col as u16;
            let result = match cell {
                Cell::Empty => continue,
                Cell::Text(s) => worksheet.write_string(sheet_row, col, s),
                Cell::Number(n) => worksheet.write_number(sheet_row, col, n.into_inner()),
                Cell::Bool(b) => worksheet.write_boolean(sheet_row, col, *b),
            };
            result.map_err(|e| format!("failed to write cell: {e}"))?;
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("failed to save {}: {e}", path.display()))
}

/// True when the sheet coordinate is covered by a merge but is not its
/// primary cell (such cells keep the blank merge_range wrote).
fn shadowed_on_sheet(table: &Table, row: usize, col: usize) -> bool {
    table
        .merged
        .iter()
        .any(|m| m.contains(row, col) && !m.is_primary(row, col))
}

/// Output naming for updated tables: `report.xlsx` → `report_updated.xlsx`.
pub fn updated_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_updated.xlsx"))
}
