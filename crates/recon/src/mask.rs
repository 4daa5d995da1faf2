use colsync_table::MergedRange;

/// Whether the cell at data row `row_idx`, column `col_idx` is a shadow
/// cell inside a merged range (and must be skipped).
///
/// Data row 0 is sheet row 1 (the header occupies sheet row 0). The first
/// range containing the coordinate decides; ranges are expected to be
/// non-overlapping, so this is a deterministic tie-break rather than a
/// policy. The primary (top-left) cell of a range is never a shadow.
pub fn is_shadow(row_idx: usize, col_idx: usize, merged: &[MergedRange]) -> bool {
    let sheet_row = row_idx + 1;
    for range in merged {
        if range.contains(sheet_row, col_idx) {
            return !range.is_primary(sheet_row, col_idx);
        }
    }
    false
}
