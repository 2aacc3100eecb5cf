//! Stable exit codes for courier CLI commands.

/// Command succeeded or the scheduled cycles completed.
pub const OK: i32 = 0;
/// The run halted on a failure that needs an operator before restarting.
pub const HALTED: i32 = 1;
/// Config could not be loaded or failed validation, or setup failed.
pub const INVALID: i32 = 2;
