//! Process exit codes (spec §6): `0` success, `1` generic failure,
//! `2` configuration error, `130` cancelled.

/// Successful run.
pub const SUCCESS: i32 = 0;
/// Any failure not covered by the more specific codes below.
pub const GENERIC_FAILURE: i32 = 1;
/// Missing/invalid configuration, or a project lock already held.
pub const CONFIG_ERROR: i32 = 2;
/// The run was cancelled (user interrupt).
pub const CANCELLED: i32 = 130;
