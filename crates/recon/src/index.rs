use std::collections::HashMap;

use colsync_table::{Cell, Table};

use crate::mask::is_shadow;

/// Key → value lookup over the source table, plus the distinct keys in
/// first-occurrence order (which fixes the ordering of `not_found_keys`).
#[derive(Debug, Default)]
pub struct SourceIndex {
    map: HashMap<Cell, Cell>,
    key_order: Vec<Cell>,
}

impl SourceIndex {
    pub fn get(&self, key: &Cell) -> Option<&Cell> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &Cell) -> bool {
        self.map.contains_key(key)
    }

    /// Distinct keys in the order they first appeared in the source.
    pub fn keys(&self) -> &[Cell] {
        &self.key_order
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Build the lookup from the source's key column to its value column.
///
/// Rows whose key or value coordinate is a merge shadow are skipped
/// entirely (not indexed, even partially). Duplicate keys resolve
/// last-write-wins; the key keeps its first-occurrence position.
pub fn build_index(source: &Table, key_col: usize, value_col: usize) -> SourceIndex {
    let mut index = SourceIndex::default();

    for (i, row) in source.rows.iter().enumerate() {
        if is_shadow(i, key_col, &source.merged) || is_shadow(i, value_col, &source.merged) {
            continue;
        }
        let key = row[key_col].clone();
        if !index.map.contains_key(&key) {
            index.key_order.push(key.clone());
        }
        index.map.insert(key, row[value_col].clone());
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use colsync_table::MergedRange;

    fn source(rows: Vec<Vec<Cell>>) -> Table {
        let mut t = Table::new("b", vec!["id".into(), "v".into()]);
        for row in rows {
            t.push_row(row);
        }
        t
    }

    #[test]
    fn empty_table_yields_empty_index() {
        let t = source(vec![]);
        let idx = build_index(&t, 0, 1);
        assert!(idx.is_empty());
        assert!(idx.keys().is_empty());
    }

    #[test]
    fn duplicate_key_last_write_wins() {
        let t = source(vec![
            vec![Cell::number(1.0), Cell::text("a")],
            vec![Cell::number(2.0), Cell::text("x")],
            vec![Cell::number(1.0), Cell::text("b")],
        ]);
        let idx = build_index(&t, 0, 1);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.get(&Cell::number(1.0)), Some(&Cell::text("b")));
        // first-occurrence order preserved
        assert_eq!(idx.keys(), &[Cell::number(1.0), Cell::number(2.0)]);
    }

    #[test]
    fn shadow_rows_are_skipped_entirely() {
        let mut t = source(vec![
            vec![Cell::number(1.0), Cell::text("a")],
            vec![Cell::Empty, Cell::text("hidden")],
        ]);
        // Key column merged over sheet rows 1..=2: data row 1 is a shadow
        t.merged.push(MergedRange::new(1, 0, 2, 0));

        let idx = build_index(&t, 0, 1);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get(&Cell::number(1.0)), Some(&Cell::text("a")));
    }

    #[test]
    fn shadow_on_value_column_also_skips() {
        let mut t = source(vec![
            vec![Cell::number(1.0), Cell::text("a")],
            vec![Cell::number(2.0), Cell::Empty],
        ]);
        t.merged.push(MergedRange::new(1, 1, 2, 1));

        let idx = build_index(&t, 0, 1);
        assert_eq!(idx.len(), 1);
        assert!(!idx.contains(&Cell::number(2.0)));
    }
}
