use std::path::Path;

use ultragroth_phase2::{Result, Verification};

use crate::open_input;

/// Audit the key at `key` from the initial key and a powers of tau file.
pub fn verify(init: &Path, reference: &Path, key: &Path) -> Result<Verification> {
    ultragroth_phase2::verify_from_init(open_input(init)?, open_input(reference)?, open_input(key)?)
}

/// Audit the single step from `old` to `new`.
pub fn verify_transform(old: &Path, new: &Path) -> Result<Verification> {
    ultragroth_phase2::verify_transform(open_input(old)?, open_input(new)?)
}

/// What `verify` prints on stdout. The audit trail, or the failed check,
/// has already been logged by the audit itself.
pub fn verdict(verification: &Verification) -> String {
    match verification {
        Verification::Valid(_) => "ZKey Ok!".to_string(),
        Verification::Invalid(failure) => failure.to_string(),
    }
}
