//! Randomness for the two contribution paths.

use blake2::{Blake2b512, Digest};
use rand::rngs::OsRng;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaChaRng;
use sha2::Sha256;
use tracing::debug;

use crate::contribution::{MAX_ITERATIONS_EXP, MIN_ITERATIONS_EXP};
use crate::errors::{Error, Result};
use crate::hex::hex_to_vec_bytes;

/// Longest beacon hash accepted, in bytes.
pub const MAX_BEACON_HASH_LENGTH: usize = 255;

/// RNG for a participant: fresh OS randomness mixed with whatever entropy
/// the operator typed in. Neither input alone determines the seed.
pub fn participant_rng(entropy: &[u8]) -> ChaChaRng {
    let mut os_bytes = [0u8; 64];
    OsRng.fill_bytes(&mut os_bytes);

    let mut hasher = Blake2b512::new();
    hasher.update(os_bytes);
    hasher.update(entropy);
    let digest = hasher.finalize();

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest[..32]);
    ChaChaRng::from_seed(seed)
}

/// Decode and range check the public inputs of a beacon contribution.
pub fn validate_beacon(beacon_hash_hex: &str, iterations_exp: u32) -> Result<Vec<u8>> {
    let beacon_hash = hex_to_vec_bytes(beacon_hash_hex)?;
    if beacon_hash.is_empty() {
        return Err(Error::InvalidBeaconHash("beacon hash is empty".to_string()));
    }
    if beacon_hash.len() > MAX_BEACON_HASH_LENGTH {
        return Err(Error::InvalidBeaconHash(format!(
            "beacon hash is {} bytes, at most {} allowed",
            beacon_hash.len(),
            MAX_BEACON_HASH_LENGTH
        )));
    }
    if !(MIN_ITERATIONS_EXP..=MAX_ITERATIONS_EXP).contains(&iterations_exp) {
        return Err(Error::InvalidIterationsExp(iterations_exp));
    }

    Ok(beacon_hash)
}

/// Delay function: SHA-256 applied `2^iterations_exp` times to the beacon
/// hash. The result seeds the beacon RNG.
pub fn beacon_seed(beacon_hash: &[u8], iterations_exp: u32) -> [u8; 32] {
    let iterations = 1u64 << iterations_exp;
    debug!(iterations, "computing beacon delay function");

    let mut cur_hash: [u8; 32] = Sha256::digest(beacon_hash).into();
    for _ in 1..iterations {
        cur_hash = Sha256::digest(cur_hash).into();
    }
    cur_hash
}

/// Deterministic RNG anyone can rederive from the beacon's public inputs.
pub fn rng_from_beacon_params(beacon_hash: &[u8], iterations_exp: u32) -> ChaChaRng {
    ChaChaRng::from_seed(beacon_seed(beacon_hash, iterations_exp))
}
