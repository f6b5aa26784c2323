//! Ceremony audit. A key that fails a check is not an error: the outcome is
//! a [`Verification`] naming the first check that failed and, for checks
//! tied to one contribution, its index.

use std::fmt;
use std::io::{Read, Seek};

use bls12_381::{G1Affine, G1Projective, G2Affine, Scalar};
use group::Curve;
use rand::thread_rng;
use tracing::{debug, info, warn};

use crate::binfile::BinFile;
use crate::contribute::sample_secret;
use crate::contribution::{
    Contribution, ContributionKind, DeltaPublicKey, MAX_ITERATIONS_EXP, MIN_ITERATIONS_EXP,
};
use crate::curve::{hash_to_g2, same_ratio, G1Encoding, G1_SIZE};
use crate::errors::{Error, Result};
use crate::fft::{fft, HShift};
use crate::header::{
    KeyHeader, SECTION_A, SECTION_B1, SECTION_B2, SECTION_C1, SECTION_C2, SECTION_COEFFS,
    SECTION_H, SECTION_IC, SECTION_INDEXES_C1, SECTION_INDEXES_C2,
};
use crate::hex::{bytes_to_hex, format_hash};
use crate::multicore::{
    batch_subtract, merge_pairs, multiexp, random_scalars, read_points, section_points, CHUNK_SIZE,
};
use crate::params::KeyFile;
use crate::reference::ReferenceFile;
use crate::rng::rng_from_beacon_params;
use crate::transcript::{contribution_hash, Channel, TranscriptHasher};

/// Sections a contribution must leave byte for byte unchanged.
const PUBLIC_SECTIONS: [u32; 7] = [
    SECTION_IC,
    SECTION_COEFFS,
    SECTION_A,
    SECTION_B1,
    SECTION_B2,
    SECTION_INDEXES_C1,
    SECTION_INDEXES_C2,
];

/// The individual checks an audit performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Check {
    Transcript(Channel),
    PublicKeyPoint(Channel),
    Knowledge(Channel),
    Chain(Channel),
    BeaconParameters,
    Beacon(Channel),
    ContributionCount,
    PreviousContributions,
    CircuitHash,
    CircuitParameters,
    VerificationKey,
    Delta(Channel),
    DeltaG2(Channel),
    SectionSize(u32),
    SectionContents(u32),
    SameRatio(u32),
    HSection,
}

fn delta_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Delta1 => "delta_c1",
        Channel::Delta2 => "delta_c2",
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Transcript(c) => write!(f, "inconsistent {} transcript", c),
            Check::PublicKeyPoint(c) => write!(f, "{} public key holds an invalid point", c),
            Check::Knowledge(c) => {
                write!(f, "{} public key G1 and G2 do not have the same ratio", c)
            }
            Check::Chain(c) => write!(f, "{}After does not follow the public key", c),
            Check::BeaconParameters => write!(f, "beacon parameters are out of range"),
            Check::Beacon(c) => write!(f, "key of the beacon does not match ({})", c),
            Check::ContributionCount => write!(f, "expected exactly one new contribution"),
            Check::PreviousContributions => write!(f, "previous contributions were altered"),
            Check::CircuitHash => write!(f, "circuit does not match"),
            Check::CircuitParameters => write!(f, "different circuit parameters"),
            Check::VerificationKey => write!(f, "verification key elements differ"),
            Check::Delta(c) => write!(f, "invalid {}_1", delta_name(*c)),
            Check::DeltaG2(c) => write!(f, "invalid {}_2", delta_name(*c)),
            Check::SectionSize(id) => write!(f, "invalid size of section {}", id),
            Check::SectionContents(id) => write!(f, "section {} is not identical", id),
            Check::SameRatio(id) => write!(f, "section {} does not match", id),
            Check::HSection => write!(f, "H section does not match"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationFailure {
    /// Contribution the failed check belongs to, if any.
    pub index: Option<usize>,
    pub check: Check,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "INVALID({}): {}", index, self.check),
            None => write!(f, "INVALID: {}", self.check),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContributionSummary {
    /// Position in the ceremony, starting at 0.
    pub index: usize,
    pub hash: [u8; 64],
    pub name: Option<String>,
    pub kind: ContributionKind,
}

/// Every contribution of a verified key, most recent first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditTrail {
    pub cs_hash: [u8; 64],
    pub contributions: Vec<ContributionSummary>,
}

impl AuditTrail {
    fn new(cs_hash: [u8; 64], contributions: &[Contribution]) -> AuditTrail {
        let contributions = contributions
            .iter()
            .enumerate()
            .rev()
            .map(|(index, c)| ContributionSummary {
                index,
                hash: contribution_hash(c),
                name: c.name.clone(),
                kind: c.kind.clone(),
            })
            .collect();

        AuditTrail {
            cs_hash,
            contributions,
        }
    }

    /// Contribution hashes, for [`crate::contains_contribution`].
    pub fn hashes(&self) -> Vec<[u8; 64]> {
        self.contributions.iter().map(|c| c.hash).collect()
    }
}

impl fmt::Display for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", format_hash(&self.cs_hash, "Circuit Hash: "))?;
        for c in &self.contributions {
            writeln!(f, "-------------------------")?;
            let title = format!(
                "contribution #{} {}:",
                c.index + 1,
                c.name.as_deref().unwrap_or("")
            );
            writeln!(f, "{}", format_hash(&c.hash, &title))?;
            if let ContributionKind::Beacon {
                beacon_hash,
                iterations_exp,
            } = &c.kind
            {
                writeln!(f, "Beacon generator: {}", bytes_to_hex(beacon_hash))?;
                writeln!(f, "Beacon iterations Exp: {}", iterations_exp)?;
            }
        }
        write!(f, "-------------------------")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    Valid(AuditTrail),
    Invalid(VerificationFailure),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }

    pub fn trail(&self) -> Option<&AuditTrail> {
        match self {
            Verification::Valid(trail) => Some(trail),
            Verification::Invalid(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&VerificationFailure> {
        match self {
            Verification::Valid(_) => None,
            Verification::Invalid(failure) => Some(failure),
        }
    }
}

fn invalid(index: Option<usize>, check: Check) -> Verification {
    let failure = VerificationFailure { index, check };
    warn!("{}", failure);
    Verification::Invalid(failure)
}

fn valid(trail: AuditTrail) -> Verification {
    for line in trail.to_string().lines() {
        info!("{}", line);
    }
    Verification::Valid(trail)
}

/// Points of a [`DeltaPublicKey`] once they pass the curve and subgroup
/// checks.
struct KeyPoints {
    delta_after: G1Affine,
    g1_s: G1Affine,
    g1_sx: G1Affine,
    g2_spx: G2Affine,
}

impl KeyPoints {
    fn decode(key: &DeltaPublicKey) -> Result<KeyPoints> {
        Ok(KeyPoints {
            delta_after: key.delta_after.decode_nonzero("deltaAfter")?,
            g1_s: key.g1_s.decode_nonzero("g1_s")?,
            g1_sx: key.g1_sx.decode_nonzero("g1_sx")?,
            g2_spx: key.g2_spx.decode_nonzero("g2_spx")?,
        })
    }
}

/// Running state of the replay: one transcript hasher and the accumulated
/// G1 delta per channel.
struct ChainState {
    hashers: [TranscriptHasher; 2],
    deltas: [G1Affine; 2],
}

impl ChainState {
    fn new(cs_hash: &[u8; 64], contributions: &[Contribution], deltas: [G1Affine; 2]) -> Self {
        ChainState {
            hashers: Channel::ALL
                .map(|channel| TranscriptHasher::replay(channel, cs_hash, contributions)),
            deltas,
        }
    }

    /// Check `c` against the state, then advance past it.
    fn step(&mut self, c: &Contribution) -> Option<Check> {
        for (hasher, channel) in self.hashers.iter().zip(Channel::ALL) {
            let key = channel.of(c);
            if hasher.transcript_for(&key.g1_s, &key.g1_sx) != key.transcript {
                return Some(Check::Transcript(channel));
            }
        }

        let mut keys = vec![];
        for channel in Channel::ALL {
            match KeyPoints::decode(channel.of(c)) {
                Ok(key) => keys.push(key),
                Err(_) => return Some(Check::PublicKeyPoint(channel)),
            }
        }

        let g2_sp = Channel::ALL.map(|channel| hash_to_g2(&channel.of(c).transcript).to_affine());

        for ((channel, key), g2_sp) in Channel::ALL.into_iter().zip(&keys).zip(g2_sp) {
            if !same_ratio((key.g1_s, key.g1_sx), (g2_sp, key.g2_spx)) {
                return Some(Check::Knowledge(channel));
            }
        }

        for (((channel, key), g2_sp), delta) in
            Channel::ALL.into_iter().zip(&keys).zip(g2_sp).zip(self.deltas)
        {
            if !same_ratio((delta, key.delta_after), (g2_sp, key.g2_spx)) {
                return Some(Check::Chain(channel));
            }
        }

        if let Some(check) = check_beacon(c) {
            return Some(check);
        }

        for hasher in self.hashers.iter_mut() {
            hasher.absorb(c);
        }
        self.deltas = [keys[0].delta_after, keys[1].delta_after];

        None
    }
}

/// A beacon contribution must be exactly what its public parameters
/// produce.
fn check_beacon(c: &Contribution) -> Option<Check> {
    let (beacon_hash, iterations_exp) = match &c.kind {
        ContributionKind::Generic => return None,
        ContributionKind::Beacon {
            beacon_hash,
            iterations_exp,
        } => (beacon_hash, u32::from(*iterations_exp)),
    };

    if beacon_hash.is_empty() || !(MIN_ITERATIONS_EXP..=MAX_ITERATIONS_EXP).contains(&iterations_exp)
    {
        return Some(Check::BeaconParameters);
    }

    let rng = &mut rng_from_beacon_params(beacon_hash, iterations_exp);
    for channel in Channel::ALL {
        let (prv_key, g1_s) = sample_secret(rng);
        let key = channel.of(c);
        if key.g1_s != G1Encoding::from(g1_s)
            || key.g1_sx != G1Encoding::from((g1_s * prv_key).to_affine())
        {
            return Some(Check::Beacon(channel));
        }
    }

    None
}

/// Compare the header fields a contribution must not change. Points are
/// compared as encoded.
fn compare_headers(old: &KeyHeader, new: &KeyHeader) -> Option<Check> {
    if !old.same_circuit(new) {
        return Some(Check::CircuitParameters);
    }
    if old.alpha_1 != new.alpha_1
        || old.beta_1 != new.beta_1
        || old.beta_2 != new.beta_2
        || old.gamma_2 != new.gamma_2
    {
        return Some(Check::VerificationKey);
    }
    None
}

fn check_section_sizes<R: Read + Seek>(key: &KeyFile<R>) -> Result<Option<Check>> {
    let header = &key.header;
    let expected = [
        (SECTION_C1, G1_SIZE as u64 * u64::from(header.n_indexes_c1)),
        (SECTION_C2, G1_SIZE as u64 * u64::from(header.n_indexes_c2)),
        (SECTION_INDEXES_C1, 4 * u64::from(header.n_indexes_c1)),
        (SECTION_INDEXES_C2, 4 * u64::from(header.n_indexes_c2)),
        (SECTION_H, G1_SIZE as u64 * u64::from(header.domain_size)),
    ];

    for (id, size) in expected {
        if key.file.section_size(id)? != size {
            return Ok(Some(Check::SectionSize(id)));
        }
    }
    Ok(None)
}

fn compare_public_sections<R1, R2>(old: &mut BinFile<R1>, new: &mut BinFile<R2>) -> Result<Option<Check>>
where
    R1: Read + Seek,
    R2: Read + Seek,
{
    for id in PUBLIC_SECTIONS {
        if !old.section_is_equal(new, id)? {
            return Ok(Some(Check::SectionContents(id)));
        }
    }
    Ok(None)
}

/// Points of a section under audit. Undecodable points fail the audit
/// rather than the call.
fn audited_points<R: Read + Seek>(
    file: &mut BinFile<R>,
    id: u32,
    start: usize,
    len: usize,
) -> Result<Option<Vec<G1Affine>>> {
    match read_points(file, id, start, len, "audited section") {
        Ok(points) => Ok(Some(points)),
        Err(Error::InvalidPoint(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Batched check that every point of section `id` in `new` is the matching
/// point of `old` scaled by the same factor, the one relating `g2.1` to
/// `g2.0`. Both sections must already have the same size.
fn section_has_same_ratio<R1, R2>(
    old: &mut BinFile<R1>,
    new: &mut BinFile<R2>,
    id: u32,
    g2: (G2Affine, G2Affine),
) -> Result<bool>
where
    R1: Read + Seek,
    R2: Read + Seek,
{
    let n = section_points(old, id)?;
    if n == 0 {
        return Ok(true);
    }

    let mut r1 = G1Projective::identity();
    let mut r2 = G1Projective::identity();
    for start in (0..n).step_by(CHUNK_SIZE) {
        let len = (n - start).min(CHUNK_SIZE);
        debug!(section = id, start, n, "same ratio check");

        let (v1, v2) = match (
            audited_points(old, id, start, len)?,
            audited_points(new, id, start, len)?,
        ) {
            (Some(v1), Some(v2)) => (v1, v2),
            _ => return Ok(false),
        };

        let (s, sx) = merge_pairs(&v1, &v2);
        r1 += s;
        r2 += sx;
    }

    Ok(same_ratio((r1.to_affine(), r2.to_affine()), g2))
}

/// Check the H section of `key` against the powers of tau.
///
/// With `r` random and `r_{n-1} = 0`, the reference gives
/// `R1 = Σ r_i (τ^{n+i} - τ^i)·G1 = r(τ)(τ^n - 1)·G1`. Blinding `r_i` by
/// `first · inc^i` and moving to evaluation form turns the same value into
/// a combination of the H basis, `R2 = Σ_j FFT(r')_j · H_j`, up to the
/// inverse of the accumulated delta2, `g2.0` against the initial `g2.1`.
fn h_section_matches<R1, R2>(
    key: &mut KeyFile<R1>,
    reference: &mut ReferenceFile<R2>,
    shift: HShift,
    g2: (G2Affine, G2Affine),
) -> Result<bool>
where
    R1: Read + Seek,
    R2: Read + Seek,
{
    let n = key.header.domain_size as usize;
    let power = key.header.power()?;

    let mut r = random_scalars(&mut thread_rng(), n);
    r[n - 1] = Scalar::zero();

    let mut r1 = G1Projective::identity();
    for start in (0..n - 1).step_by(CHUNK_SIZE) {
        let len = (n - 1 - start).min(CHUNK_SIZE);
        debug!(start, n, "H verification (tau)");

        let high = reference.tau_g1(n + start, len)?;
        let low = reference.tau_g1(start, len)?;
        let diff = batch_subtract(&high, &low);
        r1 += multiexp(&diff, &r[start..start + len]);
    }

    let inc = shift.inc(power);
    let mut t = shift.first(power);
    for r in r.iter_mut() {
        *r *= t;
        t *= inc;
    }
    fft(&mut r, power);

    let mut r2 = G1Projective::identity();
    for start in (0..n).step_by(CHUNK_SIZE) {
        let len = (n - start).min(CHUNK_SIZE);
        debug!(start, n, "H verification (lagrange)");

        let points = match audited_points(&mut key.file, SECTION_H, start, len)? {
            Some(points) => points,
            None => return Ok(false),
        };
        r2 += multiexp(&points, &r[start..start + len]);
    }

    Ok(same_ratio((r1.to_affine(), r2.to_affine()), g2))
}

/// Verify that `key` descends from `init` through the contributions it
/// records, using the powers of tau in `reference` to check the H section.
///
/// Malformed inputs (wrong file type or protocol, a different curve, a
/// reference file with too few powers) are errors. A key that fails any
/// ceremony check yields [`Verification::Invalid`].
pub fn verify_from_init<R1, R2, R3>(init: R1, reference: R2, key: R3) -> Result<Verification>
where
    R1: Read + Seek,
    R2: Read + Seek,
    R3: Read + Seek,
{
    audit_from_init(init, reference, key, None)
}

pub(crate) fn audit_from_init<R1, R2, R3>(
    init: R1,
    reference: R2,
    key: R3,
    shift: Option<HShift>,
) -> Result<Verification>
where
    R1: Read + Seek,
    R2: Read + Seek,
    R3: Read + Seek,
{
    let mut key = KeyFile::open(key)?;
    let mut init = KeyFile::open(init)?;
    let mut reference = ReferenceFile::open(reference)?;

    let power = key.header.power()?;
    reference.require_tau_g1(2 * u64::from(key.header.domain_size) - 1)?;
    debug!(
        power,
        reference_power = reference.power,
        ceremony_power = reference.ceremony_power,
        "verifying key against initial key"
    );

    let cs_hash = key.params.cs_hash;
    let mut state = ChainState::new(&cs_hash, &[], [G1Affine::generator(); 2]);
    for (i, c) in key.params.contributions.iter().enumerate() {
        if let Some(check) = state.step(c) {
            return Ok(invalid(Some(i), check));
        }
    }

    if let Some(check) = compare_headers(&init.header, &key.header) {
        return Ok(invalid(None, check));
    }

    let delta_g1 = [key.header.delta_c1_1, key.header.delta_c2_1];
    let delta_g2 = [key.header.delta_c1_2, key.header.delta_c2_2];
    let mut key_g2 = vec![];
    for (i, channel) in Channel::ALL.into_iter().enumerate() {
        if delta_g1[i] != G1Encoding::from(state.deltas[i]) {
            return Ok(invalid(None, Check::Delta(channel)));
        }
        let g2 = match delta_g2[i].decode("delta_2") {
            Ok(g2) => g2,
            Err(_) => return Ok(invalid(None, Check::DeltaG2(channel))),
        };
        if !same_ratio(
            (G1Affine::generator(), state.deltas[i]),
            (G2Affine::generator(), g2),
        ) {
            return Ok(invalid(None, Check::DeltaG2(channel)));
        }
        key_g2.push(g2);
    }
    let init_g2 = [
        init.header.delta_c1_2.decode("delta_c1_2")?,
        init.header.delta_c2_2.decode("delta_c2_2")?,
    ];

    if init.params.cs_hash != cs_hash {
        return Ok(invalid(None, Check::CircuitHash));
    }

    // section_has_same_ratio counts points in the initial key
    let sizes = match check_section_sizes(&init)? {
        Some(check) => Some(check),
        None => check_section_sizes(&key)?,
    };
    if let Some(check) = sizes {
        return Ok(invalid(None, check));
    }
    if let Some(check) = compare_public_sections(&mut init.file, &mut key.file)? {
        return Ok(invalid(None, check));
    }

    let pairs = [
        (SECTION_C1, (key_g2[0], init_g2[0])),
        (SECTION_C2, (key_g2[1], init_g2[1])),
    ];
    for (id, g2) in pairs {
        if !section_has_same_ratio(&mut init.file, &mut key.file, id, g2)? {
            return Ok(invalid(None, Check::SameRatio(id)));
        }
    }

    let shift = shift.unwrap_or_else(|| HShift::for_power(power));
    if !h_section_matches(&mut key, &mut reference, shift, (key_g2[1], init_g2[1]))? {
        return Ok(invalid(None, Check::HSection));
    }

    Ok(valid(AuditTrail::new(cs_hash, &key.params.contributions)))
}

/// Verify a single ceremony step: `new` must be `old` plus exactly one
/// valid contribution.
pub fn verify_transform<R1, R2>(old: R1, new: R2) -> Result<Verification>
where
    R1: Read + Seek,
    R2: Read + Seek,
{
    let mut old = KeyFile::open(old)?;
    let mut new = KeyFile::open(new)?;

    let previous = &old.params.contributions;
    let contributions = &new.params.contributions;
    if contributions.len() != previous.len() + 1 {
        return Ok(invalid(None, Check::ContributionCount));
    }
    if new.params.cs_hash != old.params.cs_hash {
        return Ok(invalid(None, Check::CircuitHash));
    }
    if contributions[..previous.len()] != previous[..] {
        return Ok(invalid(None, Check::PreviousContributions));
    }
    if let Some(check) = compare_headers(&old.header, &new.header) {
        return Ok(invalid(None, check));
    }

    let old_g1 = [
        old.header.delta_c1_1.decode("delta_c1_1")?,
        old.header.delta_c2_1.decode("delta_c2_1")?,
    ];
    let old_g2 = [
        old.header.delta_c1_2.decode("delta_c1_2")?,
        old.header.delta_c2_2.decode("delta_c2_2")?,
    ];

    let index = previous.len();
    let mut state = ChainState::new(&old.params.cs_hash, previous, old_g1);
    if let Some(check) = state.step(&contributions[index]) {
        return Ok(invalid(Some(index), check));
    }

    let new_g1 = [new.header.delta_c1_1, new.header.delta_c2_1];
    let new_g2 = [new.header.delta_c1_2, new.header.delta_c2_2];
    let mut g2 = vec![];
    for (i, channel) in Channel::ALL.into_iter().enumerate() {
        if new_g1[i] != G1Encoding::from(state.deltas[i]) {
            return Ok(invalid(None, Check::Delta(channel)));
        }
        let after = match new_g2[i].decode("delta_2") {
            Ok(after) => after,
            Err(_) => return Ok(invalid(None, Check::DeltaG2(channel))),
        };
        if !same_ratio((old_g1[i], state.deltas[i]), (old_g2[i], after)) {
            return Ok(invalid(None, Check::DeltaG2(channel)));
        }
        g2.push((after, old_g2[i]));
    }

    let sizes = match check_section_sizes(&old)? {
        Some(check) => Some(check),
        None => check_section_sizes(&new)?,
    };
    if let Some(check) = sizes {
        return Ok(invalid(None, check));
    }
    if let Some(check) = compare_public_sections(&mut old.file, &mut new.file)? {
        return Ok(invalid(None, check));
    }

    let pairs = [(SECTION_C1, g2[0]), (SECTION_C2, g2[1]), (SECTION_H, g2[1])];
    for (id, g2) in pairs {
        if !section_has_same_ratio(&mut old.file, &mut new.file, id, g2)? {
            return Ok(invalid(None, Check::SameRatio(id)));
        }
    }

    Ok(valid(AuditTrail::new(
        new.params.cs_hash,
        &new.params.contributions,
    )))
}

#[cfg(test)]
mod test {
    use super::{audit_from_init, verify_from_init, verify_transform, Check, Verification};
    use crate::binfile::BinFile;
    use crate::contribute::{beacon, contribute};
    use crate::contribution::ContributionKind;
    use crate::curve::{G1_SIZE, G2_SIZE};
    use crate::errors::Error;
    use crate::fft::HShift;
    use crate::header::{
        KeyHeader, SECTION_C1, SECTION_C2, SECTION_H, SECTION_HEADER, SECTION_MPC_PARAMS,
    };
    use crate::hex::bytes_to_hex;
    use crate::test_util::{
        edit_header, edit_params, edit_section, genesis_key, reference_file, reference_file_with,
        section_position, swap_points, TestSetup,
    };
    use crate::transcript::{contains_contribution, Channel};
    use bls12_381::{G1Projective, G2Projective};
    use group::{Curve, Group};
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;
    use std::io::Cursor;

    struct Ceremony {
        k0: Vec<u8>,
        k1: Vec<u8>,
        k2: Vec<u8>,
        last: Vec<u8>,
        reference: Vec<u8>,
        hashes: Vec<[u8; 64]>,
        beacon_hash: Vec<u8>,
    }

    /// Genesis, two participants, then the beacon.
    fn ceremony(seed: u64) -> Ceremony {
        let setup = TestSetup::new(4, seed);
        let k0 = genesis_key(&setup);

        let mut k1 = Cursor::new(vec![]);
        let h1 = contribute(
            Cursor::new(k0.clone()),
            &mut k1,
            &mut ChaChaRng::seed_from_u64(seed + 1),
            Some("alice"),
        )
        .unwrap();
        let k1 = k1.into_inner();

        let mut k2 = Cursor::new(vec![]);
        let h2 = contribute(
            Cursor::new(k1.clone()),
            &mut k2,
            &mut ChaChaRng::seed_from_u64(seed + 2),
            Some("bob"),
        )
        .unwrap();
        let k2 = k2.into_inner();

        let beacon_hash: Vec<u8> = (1u8..=0x1f).collect();
        let mut last = Cursor::new(vec![]);
        let h3 = beacon(
            Cursor::new(k2.clone()),
            &mut last,
            Some("final beacon"),
            &bytes_to_hex(&beacon_hash),
            10,
        )
        .unwrap();

        Ceremony {
            k0,
            k1,
            k2,
            last: last.into_inner(),
            reference: reference_file(&setup),
            hashes: vec![h1, h2, h3],
            beacon_hash,
        }
    }

    fn verify(c: &Ceremony, key: &[u8]) -> Verification {
        verify_from_init(
            Cursor::new(c.k0.clone()),
            Cursor::new(c.reference.clone()),
            Cursor::new(key.to_vec()),
        )
        .unwrap()
    }

    fn failure(v: &Verification) -> (Option<usize>, Check) {
        let failure = v.failure().expect("verification should fail");
        (failure.index, failure.check)
    }

    fn step(old: &[u8], new: &[u8]) -> Verification {
        verify_transform(Cursor::new(old.to_vec()), Cursor::new(new.to_vec())).unwrap()
    }

    /// Offset of the first contribution inside section 13, past csHash and
    /// the contribution count.
    fn first_contribution(key: &[u8]) -> usize {
        section_position(key, SECTION_MPC_PARAMS) + 64 + 4
    }

    /// Offset of the header points, past both moduli and six counters.
    fn header_points(key: &[u8]) -> usize {
        section_position(key, SECTION_HEADER) + 4 + 48 + 4 + 32 + 6 * 4
    }

    #[test]
    fn test_full_ceremony_verifies() {
        let c = ceremony(100);
        let result = verify(&c, &c.last);

        let trail = result.trail().expect("ceremony should verify");
        assert_eq!(trail.contributions.len(), 3);

        let latest = &trail.contributions[0];
        assert_eq!(latest.index, 2);
        assert_eq!(latest.hash, c.hashes[2]);
        assert_eq!(
            latest.kind,
            ContributionKind::Beacon {
                beacon_hash: c.beacon_hash.clone(),
                iterations_exp: 10
            }
        );
        assert_eq!(trail.contributions[2].name.as_deref(), Some("alice"));

        for hash in &c.hashes {
            assert!(contains_contribution(&trail.hashes(), hash));
        }

        let rendered = trail.to_string();
        assert!(rendered.contains("contribution #3 final beacon:"));
        assert!(rendered.contains(&format!("Beacon generator: {}", bytes_to_hex(&c.beacon_hash))));
        assert!(rendered.contains("Beacon iterations Exp: 10"));
    }

    #[test]
    fn test_intermediate_keys_verify() {
        let c = ceremony(110);
        assert!(verify(&c, &c.k0).is_valid());
        assert!(verify(&c, &c.k1).is_valid());
        assert!(verify(&c, &c.k2).is_valid());
    }

    #[test]
    fn test_corrupted_c1_section_is_invalid() {
        let c = ceremony(120);

        let file = BinFile::open(Cursor::new(c.last.clone()), "zkey", 1).unwrap();
        let position = file.section(8).unwrap().position as usize;
        let mut key = c.last.clone();
        key[position + 50] ^= 1;

        let result = verify(&c, &key);
        assert_eq!(failure(&result), (None, Check::SameRatio(8)));
    }

    #[test]
    fn test_tampered_transcript_fails_at_its_index() {
        let c = ceremony(130);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[1].delta1.transcript[7] ^= 1;
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(1), Check::Transcript(Channel::Delta1))
        );
    }

    #[test]
    fn test_tampered_commitments_fail_at_their_index() {
        let c = ceremony(140);
        let rng = &mut ChaChaRng::seed_from_u64(141);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[0].delta2.g1_sx = G1Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(0), Check::Transcript(Channel::Delta2))
        );

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[2].delta1.g1_s = G1Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(2), Check::Transcript(Channel::Delta1))
        );
    }

    #[test]
    fn test_reordered_contributions_are_rejected() {
        let c = ceremony(150);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions.swap(0, 1);
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(0), Check::Transcript(Channel::Delta1))
        );
    }

    #[test]
    fn test_truncated_history_is_rejected() {
        let c = ceremony(160);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions.pop();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (None, Check::Delta(Channel::Delta1))
        );
    }

    #[test]
    fn test_beacon_parameters_must_reproduce_the_keys() {
        let c = ceremony(170);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[2].kind = ContributionKind::Beacon {
                beacon_hash: c.beacon_hash.clone(),
                iterations_exp: 11,
            };
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(2), Check::Beacon(Channel::Delta1))
        );

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[2].kind = ContributionKind::Beacon {
                beacon_hash: c.beacon_hash.clone(),
                iterations_exp: 200,
            };
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(2), Check::BeaconParameters)
        );
    }

    #[test]
    fn test_circuit_hash_must_match() {
        let c = ceremony(180);

        let init = edit_params(c.k0.clone(), |params| {
            params.cs_hash[0] ^= 1;
        });
        let result = verify_from_init(
            Cursor::new(init),
            Cursor::new(c.reference.clone()),
            Cursor::new(c.last.clone()),
        )
        .unwrap();
        assert_eq!(failure(&result), (None, Check::CircuitHash));
    }

    #[test]
    fn test_public_sections_must_be_identical() {
        let c = ceremony(190);

        let file = BinFile::open(Cursor::new(c.last.clone()), "zkey", 1).unwrap();
        let position = file.section(4).unwrap().position as usize;
        let mut key = c.last.clone();
        key[position] ^= 1;

        assert_eq!(failure(&verify(&c, &key)), (None, Check::SectionContents(4)));
    }

    #[test]
    fn test_coset_branch_of_h_check() {
        let setup = TestSetup::with_shift(4, 200, HShift::Coset);
        let k0 = genesis_key(&setup);

        let mut k1 = Cursor::new(vec![]);
        contribute(
            Cursor::new(k0.clone()),
            &mut k1,
            &mut ChaChaRng::seed_from_u64(201),
            None,
        )
        .unwrap();
        let k1 = k1.into_inner();

        let audit = |shift| {
            audit_from_init(
                Cursor::new(k0.clone()),
                Cursor::new(reference_file(&setup)),
                Cursor::new(k1.clone()),
                Some(shift),
            )
            .unwrap()
        };

        assert!(audit(HShift::Coset).is_valid());
        assert_eq!(failure(&audit(HShift::DoubledDomain)), (None, Check::HSection));
    }

    #[test]
    fn test_doubled_domain_fixture_fails_coset_check() {
        let setup = TestSetup::new(8, 210);
        assert_eq!(setup.shift, HShift::DoubledDomain);
        let k0 = genesis_key(&setup);

        let result = audit_from_init(
            Cursor::new(k0.clone()),
            Cursor::new(reference_file(&setup)),
            Cursor::new(k0),
            Some(HShift::Coset),
        )
        .unwrap();
        assert_eq!(failure(&result), (None, Check::HSection));
    }

    #[test]
    fn test_small_reference_is_an_error() {
        let setup = TestSetup::new(4, 220);
        let k0 = genesis_key(&setup);

        let result = verify_from_init(
            Cursor::new(k0.clone()),
            Cursor::new(reference_file_with(&setup, 6)),
            Cursor::new(k0),
        );
        assert!(matches!(
            result,
            Err(Error::ReferenceTooSmall {
                needed: 7,
                available: 6
            })
        ));
    }

    #[test]
    fn test_verify_transform() {
        let c = ceremony(230);

        assert!(step(&c.k0, &c.k1).is_valid());
        assert!(step(&c.k1, &c.k2).is_valid());

        let trail = step(&c.k2, &c.last);
        let trail = trail.trail().expect("beacon step should verify");
        assert_eq!(trail.contributions.len(), 3);

        assert_eq!(failure(&step(&c.k0, &c.k2)), (None, Check::ContributionCount));
        assert_eq!(failure(&step(&c.k2, &c.k1)), (None, Check::ContributionCount));
    }

    #[test]
    fn test_verify_transform_checks_private_sections() {
        let c = ceremony(240);

        let file = BinFile::open(Cursor::new(c.k2.clone()), "zkey", 1).unwrap();
        let position = file.section(12).unwrap().position as usize;
        let mut k2 = c.k2.clone();
        k2[position + 40] ^= 1;

        let result = verify_transform(Cursor::new(c.k1.clone()), Cursor::new(k2)).unwrap();
        assert_eq!(failure(&result), (None, Check::SameRatio(12)));
    }

    #[test]
    fn test_verify_transform_rejects_rewritten_history() {
        let c = ceremony(250);

        let k2 = edit_params(c.k2.clone(), |params| {
            params.contributions[0].name = Some("mallory".to_string());
        });
        let result = verify_transform(Cursor::new(c.k1.clone()), Cursor::new(k2)).unwrap();
        assert_eq!(failure(&result), (None, Check::PreviousContributions));
    }

    #[test]
    fn test_malformed_public_key_bytes_fail_at_their_index() {
        let c = ceremony(260);
        let start = first_contribution(&c.last);

        // g1_s of delta1 is hashed into its own transcript
        let mut key = c.last.clone();
        key[start + G1_SIZE + 20] ^= 1;
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(0), Check::Transcript(Channel::Delta1))
        );

        // deltaAfter and g2_spx are not
        let mut key = c.last.clone();
        key[start + 20] ^= 1;
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(0), Check::PublicKeyPoint(Channel::Delta1))
        );

        let mut key = c.last.clone();
        key[start + 3 * G1_SIZE + 20] ^= 1;
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(0), Check::PublicKeyPoint(Channel::Delta1))
        );

        let mut k1 = c.k1.clone();
        k1[first_contribution(&c.k1) + 20] ^= 1;
        assert_eq!(
            failure(&step(&c.k0, &k1)),
            (Some(0), Check::PublicKeyPoint(Channel::Delta1))
        );
    }

    #[test]
    fn test_malformed_header_bytes_are_invalid() {
        let c = ceremony(270);
        let points = header_points(&c.last);

        let mut key = c.last.clone();
        key[points + 20] ^= 1;
        assert_eq!(failure(&verify(&c, &key)), (None, Check::VerificationKey));

        // alpha, beta1, beta2, gamma2 and delta_c1_1 come first
        let delta_c1_2 = points + 3 * G1_SIZE + 2 * G2_SIZE;
        let mut key = c.last.clone();
        key[delta_c1_2 + 20] ^= 1;
        assert_eq!(
            failure(&verify(&c, &key)),
            (None, Check::DeltaG2(Channel::Delta1))
        );

        let mut k2 = c.k2.clone();
        k2[delta_c1_2 + 20] ^= 1;
        assert_eq!(
            failure(&step(&c.k1, &k2)),
            (None, Check::DeltaG2(Channel::Delta1))
        );
    }

    #[test]
    fn test_public_key_pairings_are_checked() {
        let c = ceremony(280);
        let rng = &mut ChaChaRng::seed_from_u64(281);

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[1].delta1.g2_spx = G2Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(1), Check::Knowledge(Channel::Delta1))
        );

        let key = edit_params(c.last.clone(), |params| {
            params.contributions[1].delta2.delta_after =
                G1Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (Some(1), Check::Chain(Channel::Delta2))
        );

        let k2 = edit_params(c.k2.clone(), |params| {
            params.contributions[1].delta2.g2_spx = G2Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&step(&c.k1, &k2)),
            (Some(1), Check::Knowledge(Channel::Delta2))
        );
    }

    #[test]
    fn test_header_fields_are_checked() {
        let c = ceremony(290);
        let rng = &mut ChaChaRng::seed_from_u64(291);

        let key = edit_header(c.last.clone(), |header| {
            header.alpha_1 = G1Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(failure(&verify(&c, &key)), (None, Check::VerificationKey));

        let key = edit_header(c.last.clone(), |header| header.n_vars += 1);
        assert_eq!(failure(&verify(&c, &key)), (None, Check::CircuitParameters));

        let key = edit_header(c.last.clone(), |header| {
            header.delta_c2_1 = G1Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (None, Check::Delta(Channel::Delta2))
        );

        let key = edit_header(c.last.clone(), |header| {
            header.delta_c1_2 = G2Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&verify(&c, &key)),
            (None, Check::DeltaG2(Channel::Delta1))
        );

        let k2 = edit_header(c.k2.clone(), |header| {
            header.delta_c2_2 = G2Projective::random(&mut *rng).to_affine().into();
        });
        assert_eq!(
            failure(&step(&c.k1, &k2)),
            (None, Check::DeltaG2(Channel::Delta2))
        );
    }

    #[test]
    fn test_swapped_points_are_rejected() {
        let c = ceremony(300);

        let mut key = c.last.clone();
        swap_points(&mut key, SECTION_C1, 0, 1);
        assert_eq!(failure(&verify(&c, &key)), (None, Check::SameRatio(SECTION_C1)));

        let mut key = c.last.clone();
        swap_points(&mut key, SECTION_C2, 1, 2);
        assert_eq!(failure(&verify(&c, &key)), (None, Check::SameRatio(SECTION_C2)));

        let mut key = c.last.clone();
        swap_points(&mut key, SECTION_H, 0, 3);
        assert_eq!(failure(&verify(&c, &key)), (None, Check::HSection));

        let mut k2 = c.k2.clone();
        swap_points(&mut k2, SECTION_H, 0, 1);
        assert_eq!(failure(&step(&c.k1, &k2)), (None, Check::SameRatio(SECTION_H)));
    }

    #[test]
    fn test_section_sizes_are_checked() {
        let c = ceremony(310);

        let key = edit_section(c.last.clone(), SECTION_C2, |bytes| bytes.truncate(G1_SIZE));
        assert_eq!(failure(&verify(&c, &key)), (None, Check::SectionSize(SECTION_C2)));

        let grow = |header: &mut KeyHeader| header.n_indexes_c1 += 1;
        let init = edit_header(c.k0.clone(), grow);
        let key = edit_header(c.last.clone(), grow);
        let result = verify_from_init(
            Cursor::new(init),
            Cursor::new(c.reference.clone()),
            Cursor::new(key),
        )
        .unwrap();
        assert_eq!(failure(&result), (None, Check::SectionSize(SECTION_C1)));
    }

    #[test]
    fn test_initial_key_sections_are_sized() {
        let c = ceremony(320);

        // one C1 point left: only that point would be compared
        let init = edit_section(c.k0.clone(), SECTION_C1, |bytes| bytes.truncate(G1_SIZE));
        let result = verify_from_init(
            Cursor::new(init),
            Cursor::new(c.reference.clone()),
            Cursor::new(c.last.clone()),
        )
        .unwrap();
        assert_eq!(failure(&result), (None, Check::SectionSize(SECTION_C1)));

        let k1 = edit_section(c.k1.clone(), SECTION_C1, |bytes| bytes.truncate(G1_SIZE));
        assert_eq!(failure(&step(&k1, &c.k2)), (None, Check::SectionSize(SECTION_C1)));
    }
}
