use serde::Deserialize;

use crate::error::ReconError;
use crate::model::{Mode, ReconOptions, RowRange, Selection, TargetColumn};

// ---------------------------------------------------------------------------
// Top-level job config
// ---------------------------------------------------------------------------

/// A reconciliation job described in TOML: which files, which columns,
/// which mode. File paths are resolved by the caller (relative to the
/// config file); the engine only sees the selection.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub mode: Mode,
    pub target: TargetConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub range: Option<RangeConfig>,
    #[serde(default)]
    pub options: OptionsConfig,
}

#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub file: String,
    pub key: String,
    /// Column to write/compare. Omit and set `create_column = true` to
    /// synthesize a new column next to the key instead.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub create_column: bool,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RangeConfig {
    pub start_row: usize,
    pub end_row: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionsConfig {
    #[serde(default)]
    pub skip_if_filled: bool,
}

impl JobConfig {
    pub fn from_toml(s: &str) -> Result<Self, ReconError> {
        let config: JobConfig =
            toml::from_str(s).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ReconError> {
        match (&self.target.value, self.target.create_column) {
            (Some(_), true) => {
                return Err(ReconError::ConfigValidation(
                    "target.value and target.create_column are mutually exclusive".into(),
                ))
            }
            (None, false) => {
                return Err(ReconError::ConfigValidation(
                    "set target.value or target.create_column = true".into(),
                ))
            }
            _ => {}
        }
        if self.mode == Mode::Audit && self.target.create_column {
            return Err(ReconError::ConfigValidation(
                "audit mode compares an existing column; target.create_column is invalid".into(),
            ));
        }
        if let Some(range) = &self.range {
            if range.start_row < 1 || range.end_row < range.start_row {
                return Err(ReconError::ConfigValidation(format!(
                    "range {}..{} is not a valid 1-based row range",
                    range.start_row, range.end_row
                )));
            }
        }
        Ok(())
    }

    pub fn selection(&self) -> Selection {
        Selection {
            target_key: self.target.key.clone(),
            target_value: match &self.target.value {
                Some(name) => TargetColumn::Existing(name.clone()),
                None => TargetColumn::CreateAfterKey,
            },
            source_key: self.source.key.clone(),
            source_value: self.source.value.clone(),
        }
    }

    pub fn recon_options(&self) -> ReconOptions {
        ReconOptions {
            row_range: self.range.map(|r| RowRange { start: r.start_row, end: r.end_row }),
            skip_if_filled: self.options.skip_if_filled,
        }
    }
}
