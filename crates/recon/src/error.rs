use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// A column reference does not resolve to any header.
    UnknownColumn { table: &'static str, column: String },
    /// Row range violates `1 <= start <= end <= rows`.
    InvalidRowRange { start: usize, end: usize, rows: usize },
    /// The create-new-column sentinel is meaningless when nothing is written.
    CreateColumnInAudit,
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (missing column selection, bad mode, etc.).
    ConfigValidation(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn { table, column } => {
                write!(f, "table {table}: no column named '{column}'")
            }
            Self::InvalidRowRange { start, end, rows } => {
                write!(
                    f,
                    "invalid row range {start}..{end}: must satisfy 1 <= start <= end <= {rows}"
                )
            }
            Self::CreateColumnInAudit => {
                write!(f, "audit mode compares an existing column; cannot create one")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
