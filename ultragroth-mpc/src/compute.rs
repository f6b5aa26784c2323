use std::path::Path;

use ultragroth_phase2::rng::{participant_rng, validate_beacon};
use ultragroth_phase2::Result;

use crate::{open_input, write_output};

/// Contribute to the key at `input`, writing the result to `output`.
/// `entropy` is mixed with OS randomness to seed the contribution.
pub fn compute(input: &Path, output: &Path, entropy: &str, name: Option<&str>) -> Result<[u8; 64]> {
    let old = open_input(input)?;
    let mut rng = participant_rng(entropy.as_bytes());

    write_output(output, |new| {
        ultragroth_phase2::contribute(old, new, &mut rng, name)
    })
}

/// Apply the public beacon to the key at `input`, writing the result to
/// `output`. Bad beacon parameters are rejected before anything is created.
pub fn beacon(
    input: &Path,
    output: &Path,
    name: Option<&str>,
    beacon_hash: &str,
    iterations_exp: u32,
) -> Result<[u8; 64]> {
    validate_beacon(beacon_hash, iterations_exp)?;
    let old = open_input(input)?;

    write_output(output, |new| {
        ultragroth_phase2::beacon(old, new, name, beacon_hash, iterations_exp)
    })
}
