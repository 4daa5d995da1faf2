use ordered_float::OrderedFloat;
use serde::ser::{Serialize, Serializer};

/// A single cell value.
///
/// Numbers are wrapped in `OrderedFloat` so cells can key a lookup map.
/// Equality is strict across variants: `Number(5)` and `Text("5")` are
/// distinct values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Text(String),
    Number(OrderedFloat<f64>),
    Bool(bool),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Empty
    }
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn number(n: f64) -> Self {
        Cell::Number(OrderedFloat(n))
    }

    /// Parse a raw text field into a typed cell (numbers and booleans
    /// recognized, everything else kept as text).
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            return Cell::Empty;
        }
        if let Ok(n) = field.parse::<f64>() {
            return Cell::number(n);
        }
        match field {
            "TRUE" => Cell::Bool(true),
            "FALSE" => Cell::Bool(false),
            _ => Cell::Text(field.to_string()),
        }
    }

    /// Empty, or text that is nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Number(n) => {
                let n = n.into_inner();
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Cell::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

// Reports serialize cells as plain JSON values, not tagged variants.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(n) => serializer.serialize_f64(n.into_inner()),
            Cell::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}
