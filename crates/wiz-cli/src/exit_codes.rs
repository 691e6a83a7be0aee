//! Stable exit codes
//!
//! Scripts rely on these; never renumber them.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Config error - missing or invalid wiz.yml, .env or secret files
pub const CONFIG_ERROR: i32 = 2;

/// Missing reference - a binding names an absent variable or file, or value paths overlap
pub const MISSING_REFERENCE: i32 = 3;

/// External tool error - kubectl or helm failed, could not start or timed out
pub const EXTERNAL_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;

/// Interrupted by Ctrl-C (128 + SIGINT)
pub const INTERRUPTED: i32 = 130;
