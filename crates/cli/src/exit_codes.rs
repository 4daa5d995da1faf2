//! Exit codes for scripting against `colsync`.

/// Clean run (update completed, or audit found full agreement).
pub const EXIT_SUCCESS: u8 = 0;
/// Audit found mismatches or source keys missing from the target.
pub const EXIT_AUDIT_MISMATCH: u8 = 1;
/// Bad arguments or column selection.
pub const EXIT_ARGS_ERROR: u8 = 2;
/// File could not be read, decoded, or written.
pub const EXIT_IO_ERROR: u8 = 3;
/// Job config failed to parse or validate.
pub const EXIT_CONFIG_ERROR: u8 = 4;
