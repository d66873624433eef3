//! Interned strings.

use crate::callbacks::GQuark;
use crate::state::with_state;

pub fn g_quark_from_string(name: &str) -> GQuark {
    with_state(|s| s.intern(name))
}

/// The quark for `name` if it was interned before, else 0.
pub fn g_quark_try_string(name: &str) -> GQuark {
    with_state(|s| s.quark_ids.get(name).copied().unwrap_or(0))
}

pub fn g_quark_to_string(quark: GQuark) -> Option<String> {
    if quark == 0 {
        return None;
    }
    with_state(|s| s.quarks.get(quark as usize - 1).cloned())
}
