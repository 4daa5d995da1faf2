use serde::{Deserialize, Serialize};

/// A merged cell rectangle in sheet coordinates.
///
/// 0-based and inclusive on both ends; the header row is sheet row 0, so
/// data row `i` of a [`Table`](crate::Table) sits at sheet row `i + 1`.
/// The top-left cell is the primary cell; every other covered cell is a
/// shadow cell whose value lives in the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
}

impl MergedRange {
    pub fn new(start_row: usize, start_col: usize, end_row: usize, end_col: usize) -> Self {
        Self { start_row, start_col, end_row, end_col }
    }

    pub fn is_valid(&self) -> bool {
        self.start_row <= self.end_row && self.start_col <= self.end_col
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    pub fn is_primary(&self, row: usize, col: usize) -> bool {
        row == self.start_row && col == self.start_col
    }

    /// Shift column bounds right by one for a column inserted at `at`.
    /// Each bound moves independently.
    pub fn shift_for_insert(&mut self, at: usize) {
        if self.start_col >= at {
            self.start_col += 1;
        }
        if self.end_col >= at {
            self.end_col += 1;
        }
    }
}

/// A data-validation rectangle, carried through opaquely.
///
/// The engine never interprets the rule; it only keeps the rectangle's
/// column bounds in step when a column is inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRange {
    pub start_row: usize,
    pub start_col: usize,
    pub end_row: usize,
    pub end_col: usize,
    /// Rule type as found in the source file, e.g. "list" or "whole".
    pub kind: String,
    /// Raw rule payload (formulas, operator), untouched.
    pub payload: String,
}

impl ValidationRange {
    pub fn shift_for_insert(&mut self, at: usize) {
        if self.start_col >= at {
            self.start_col += 1;
        }
        if self.end_col >= at {
            self.end_col += 1;
        }
    }
}
