//! ID prefix constants and client-side ID generation.
//!
//! Every Lectern ID has the shape `{prefix}-{hex8}`, e.g. `ins-a3f8b2c1`.
//! Instance IDs are generated on the client before the batched write so the
//! created identifier is known without waiting for the store.

use crate::errors::CoreError;

pub const PREFIX_COURSE: &str = "crs";
pub const PREFIX_ASSIGNMENT: &str = "asg";
pub const PREFIX_INSTANCE: &str = "ins";
pub const PREFIX_STUDENT: &str = "stu";

/// All known prefixes, in declaration order.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_COURSE,
    PREFIX_ASSIGNMENT,
    PREFIX_INSTANCE,
    PREFIX_STUDENT,
];

/// Length of the random hex suffix.
const HEX_LEN: usize = 8;

/// Generate a prefixed ID from 4 random bytes. Returns e.g. `"ins-a3f8b2c1"`.
///
/// # Errors
///
/// Returns `CoreError::IdGeneration` if the OS random source is unavailable.
pub fn generate_id(prefix: &str) -> Result<String, CoreError> {
    let mut bytes = [0u8; HEX_LEN / 2];
    getrandom::fill(&mut bytes).map_err(|e| CoreError::IdGeneration(e.to_string()))?;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!("{prefix}-{hex}"))
}

/// Check whether `id` has the `{prefix}-{hex8}` shape for the given prefix.
#[must_use]
pub fn has_prefix_shape(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| {
            hex.len() == HEX_LEN
                && hex
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
}
