use std::collections::HashMap;

use serde::Serialize;

use crate::cell::Cell;
use crate::range::{MergedRange, ValidationRange};

/// An in-memory table: a header row plus positionally-aligned data rows.
///
/// Rows are fixed-length `Vec<Cell>` aligned with `headers`; name-based
/// access goes through a [`HeaderIndex`] built once per table. Merged and
/// validation rectangles ride along in sheet coordinates (header row = 0).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub merged: Vec<MergedRange>,
    pub validations: Vec<ValidationRange>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
            merged: Vec::new(),
            validations: Vec::new(),
        }
    }

    /// Append a row, padding or truncating to header width.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Insert a new column at position `at` (header and every row), with
    /// `Cell::Empty` in each row. Merged and validation rectangles whose
    /// column bounds sit at or past `at` shift right by one.
    pub fn insert_column(&mut self, at: usize, name: impl Into<String>) {
        self.headers.insert(at, name.into());
        for row in &mut self.rows {
            row.insert(at, Cell::Empty);
        }
        for m in &mut self.merged {
            m.shift_for_insert(at);
        }
        for v in &mut self.validations {
            v.shift_for_insert(at);
        }
    }
}

/// Name → column index lookup, built once so positional and name-based
/// access can never drift apart.
#[derive(Debug)]
pub struct HeaderIndex {
    by_name: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let by_name = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
