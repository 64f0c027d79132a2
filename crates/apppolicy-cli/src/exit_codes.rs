//! Process exit codes. Part of the public contract: CI pipelines branch on them.

use apppolicy_core::PolicyError;

pub const SUCCESS: i32 = 0;
pub const FINDINGS: i32 = 1; // Findings at or above --fail-on
pub const PARSE_ERROR: i32 = 2; // Unreadable or malformed input, including I/O failures
pub const SCHEMA_ERROR: i32 = 3;
pub const BAD_SIGNATURE: i32 = 4;
pub const TRUST_ERROR: i32 = 5; // No trusted key, or pack signer not trusted

/// Map a command failure to its exit code.
///
/// Errors that do not originate in the policy core (e.g. failing to write an output
/// file) are reported as [`PARSE_ERROR`].
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PolicyError>()
        .map_or(PARSE_ERROR, PolicyError::exit_code)
}
