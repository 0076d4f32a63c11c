//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

#![allow(dead_code)]

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure, including cluster errors
pub const ERROR: i32 = 1;

/// Validation error - structural or cluster validation failed
pub const VALIDATION_ERROR: i32 = 2;

/// Render error - a producer or chart failed
pub const RENDER_ERROR: i32 = 3;

/// Config error - unreadable, unknown version or failed migration
pub const CONFIG_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
