//! Instrument-role rule applied to every profile write.
//!
//! A director always holds the conducting slot first and may list at most
//! [`MAX_DIRECTOR_INSTRUMENTS`] roles; everybody else may list at most
//! [`MAX_INSTRUMENTS`]. Overflow roles are dropped, never rejected.

use crate::constants::{CONDUCTOR_ROLE, MAX_DIRECTOR_INSTRUMENTS, MAX_INSTRUMENTS};

/// Number of roles a profile may hold.
pub fn instrument_cap(director: bool) -> usize {
    if director {
        MAX_DIRECTOR_INSTRUMENTS
    } else {
        MAX_INSTRUMENTS
    }
}

/// Produce the instrument list to persist for a profile.
///
/// Roles past the forced conductor slot keep the submitted order.
pub fn sanitize_instruments(candidate: &[String], director: bool) -> Vec<String> {
    let mut roles = Vec::with_capacity(candidate.len() + 1);

    if director && candidate.first().map(String::as_str) != Some(CONDUCTOR_ROLE) {
        roles.push(CONDUCTOR_ROLE.to_string());
    }
    roles.extend(candidate.iter().cloned());
    roles.truncate(instrument_cap(director));

    roles
}
