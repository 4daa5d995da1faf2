//! `colsync-table` — In-memory table model.
//!
//! Headers plus positionally-aligned rows, with merged-cell and
//! data-validation rectangles carried alongside. No I/O; decoders build
//! these structures, the recon engine consumes them.

pub mod cell;
pub mod range;
pub mod table;

pub use cell::Cell;
pub use range::{MergedRange, ValidationRange};
pub use table::{HeaderIndex, Table};
