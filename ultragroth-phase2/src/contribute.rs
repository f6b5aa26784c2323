use std::io::{Read, Seek, Write};

use bls12_381::{G1Affine, G1Projective, Scalar};
use ff::Field;
use group::{Curve, Group};
use rand::Rng;
use tracing::info;

use crate::contribution::{truncate_name, Contribution, ContributionKind, DeltaPublicKey};
use crate::curve::{hash_to_g2, G1Encoding};
use crate::errors::{Error, Result};
use crate::header::{
    SECTION_A, SECTION_B1, SECTION_B2, SECTION_C1, SECTION_C2, SECTION_COEFFS, SECTION_H,
    SECTION_IC, SECTION_INDEXES_C1, SECTION_INDEXES_C2,
};
use crate::hex::bytes_to_hex;
use crate::multicore::apply_key_to_section;
use crate::params::{create_key_file, KeyFile};
use crate::rng::{rng_from_beacon_params, validate_beacon};
use crate::transcript::{contribution_hash, Channel, TranscriptHasher};

/// This needs to be destroyed by at least one participant
/// for the final parameters to be secure.
struct PrivateKey {
    delta: Scalar,
}

/// Draw a channel secret and the G1 element it is committed against. Both
/// the contributor and a beacon verifier consume randomness in this order.
pub(crate) fn sample_secret<R: Rng>(rng: &mut R) -> (Scalar, G1Affine) {
    let delta = Scalar::random(&mut *rng);
    let s = G1Projective::random(&mut *rng).to_affine();
    (delta, s)
}

/// Compute a keypair for one channel, given that channel's transcript so
/// far and its current delta in G1. Keypairs cannot be reused for multiple
/// contributions.
fn keypair<R: Rng>(
    rng: &mut R,
    hasher: &TranscriptHasher,
    delta_g1: &G1Affine,
) -> (DeltaPublicKey, PrivateKey) {
    let (delta, s) = sample_secret(rng);
    let s_delta = G1Encoding::from((s * delta).to_affine());
    let s = G1Encoding::from(s);

    // H(cs_hash | <previous pubkeys> | s | s_delta)
    let transcript = hasher.transcript_for(&s, &s_delta);

    // Compute delta s-pair in G2
    let r = hash_to_g2(&transcript).to_affine();
    let r_delta = (r * delta).to_affine();

    (
        DeltaPublicKey {
            delta_after: (delta_g1 * delta).to_affine().into(),
            g1_s: s,
            g1_sx: s_delta,
            g2_spx: r_delta.into(),
            transcript,
        },
        PrivateKey { delta },
    )
}

/// Add a participant's contribution to the key read from `old`, writing the
/// re-randomized key to `new`. `old` is never written to.
///
/// This function returns a "hash" that is bound to the contribution.
/// Contributors can use this hash to make sure their contribution is in
/// the final parameters, by checking to see if it appears in the audit
/// trail returned by verification.
pub fn contribute<R, W, G>(old: R, new: W, rng: &mut G, name: Option<&str>) -> Result<[u8; 64]>
where
    R: Read + Seek,
    W: Write + Seek,
    G: Rng,
{
    apply_contribution(old, new, rng, ContributionKind::Generic, name)
}

/// Finalize a ceremony with randomness derived from a public beacon value.
/// Anyone can repeat the derivation, so the result carries no secret.
pub fn beacon<R, W>(
    old: R,
    new: W,
    name: Option<&str>,
    beacon_hash_hex: &str,
    iterations_exp: u32,
) -> Result<[u8; 64]>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let beacon_hash = validate_beacon(beacon_hash_hex, iterations_exp)?;
    let mut rng = rng_from_beacon_params(&beacon_hash, iterations_exp);

    let kind = ContributionKind::Beacon {
        beacon_hash,
        iterations_exp: iterations_exp as u8,
    };
    apply_contribution(old, new, &mut rng, kind, name)
}

fn apply_contribution<R, W, G>(
    old: R,
    new: W,
    rng: &mut G,
    kind: ContributionKind,
    name: Option<&str>,
) -> Result<[u8; 64]>
where
    R: Read + Seek,
    W: Write + Seek,
    G: Rng,
{
    let KeyFile {
        file: mut old_file,
        mut header,
        mut params,
    } = KeyFile::open(old)?;

    let delta_c1_1 = header.delta_c1_1.decode("delta_c1_1")?;
    let delta_c1_2 = header.delta_c1_2.decode("delta_c1_2")?;
    let delta_c2_1 = header.delta_c2_1.decode("delta_c2_1")?;
    let delta_c2_2 = header.delta_c2_2.decode("delta_c2_2")?;

    let hasher1 = TranscriptHasher::replay(Channel::Delta1, &params.cs_hash, &params.contributions);
    let (pubkey1, privkey1) = keypair(rng, &hasher1, &delta_c1_1);

    let hasher2 = TranscriptHasher::replay(Channel::Delta2, &params.cs_hash, &params.contributions);
    let (pubkey2, privkey2) = keypair(rng, &hasher2, &delta_c2_1);

    header.delta_c1_1 = pubkey1.delta_after;
    header.delta_c1_2 = (delta_c1_2 * privkey1.delta).to_affine().into();
    header.delta_c2_1 = pubkey2.delta_after;
    header.delta_c2_2 = (delta_c2_2 * privkey2.delta).to_affine().into();

    let delta1_inv: Scalar = Option::from(privkey1.delta.invert())
        .ok_or(Error::InvalidParameters("delta1 is zero"))?;
    let delta2_inv: Scalar = Option::from(privkey2.delta.invert())
        .ok_or(Error::InvalidParameters("delta2 is zero"))?;

    let mut new_file = create_key_file(new)?;
    header.write(&mut new_file)?;

    for id in [SECTION_IC, SECTION_COEFFS, SECTION_A, SECTION_B1, SECTION_B2] {
        old_file.copy_section(&mut new_file, id)?;
    }
    apply_key_to_section(&mut old_file, &mut new_file, SECTION_C1, delta1_inv, Scalar::one())?;
    apply_key_to_section(&mut old_file, &mut new_file, SECTION_C2, delta2_inv, Scalar::one())?;
    old_file.copy_section(&mut new_file, SECTION_INDEXES_C1)?;
    old_file.copy_section(&mut new_file, SECTION_INDEXES_C2)?;
    apply_key_to_section(&mut old_file, &mut new_file, SECTION_H, delta2_inv, Scalar::one())?;

    let contribution = Contribution {
        delta1: pubkey1,
        delta2: pubkey2,
        kind,
        name: name.map(|name| truncate_name(name).to_string()),
    };
    let hash = contribution_hash(&contribution);

    params.contributions.push(contribution);
    params.write_section(&mut new_file)?;
    new_file.finish()?;

    info!(
        index = params.contributions.len(),
        hash = %bytes_to_hex(&hash),
        "contribution applied"
    );

    Ok(hash)
}
