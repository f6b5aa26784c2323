//! Fixtures: genesis keys and matching powers of tau files built from a
//! known τ on small domains.

use std::io::{Cursor, Write};

use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use byteorder::{LittleEndian, WriteBytesExt};
use ff::Field;
use group::{Curve, Group};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use crate::binfile::{BinFile, BinFileWriter};
use crate::contribution::{Contribution, ContributionKind, DeltaPublicKey};
use crate::curve::{write_g1, write_g2, G1_SIZE, N8Q, Q_BYTES};
use crate::fft::{root_of_unity, HShift};
use crate::header::{
    KeyHeader, SECTION_A, SECTION_B1, SECTION_B2, SECTION_C1, SECTION_C2, SECTION_COEFFS,
    SECTION_H, SECTION_IC, SECTION_INDEXES_C1, SECTION_INDEXES_C2, SECTION_MPC_PARAMS,
};
use crate::params::{create_key_file, KeyFile, MPCParameters};
use crate::reference::{PTAU_FILE_TYPE, PTAU_VERSION, SECTION_PTAU_HEADER, SECTION_TAU_G1};
use crate::transcript::HashWriter;

pub const N_VARS: u32 = 3;
pub const N_PUBLIC: u32 = 1;
pub const N_INDEXES_C1: u32 = 2;
pub const N_INDEXES_C2: u32 = 3;

fn random_g1(rng: &mut ChaChaRng) -> G1Affine {
    G1Projective::random(&mut *rng).to_affine()
}

fn random_g2(rng: &mut ChaChaRng) -> G2Affine {
    G2Projective::random(&mut *rng).to_affine()
}

fn g1_bytes(points: &[G1Affine]) -> Vec<u8> {
    let mut bytes = vec![];
    for point in points {
        write_g1(&mut bytes, point).unwrap();
    }
    bytes
}

pub fn random_header(rng: &mut ChaChaRng, domain_size: u32) -> KeyHeader {
    KeyHeader {
        n_vars: N_VARS,
        n_public: N_PUBLIC,
        domain_size,
        n_indexes_c1: N_INDEXES_C1,
        n_indexes_c2: N_INDEXES_C2,
        rand_idx: 2,
        alpha_1: random_g1(rng).into(),
        beta_1: random_g1(rng).into(),
        beta_2: random_g2(rng).into(),
        gamma_2: random_g2(rng).into(),
        delta_c1_1: random_g1(rng).into(),
        delta_c1_2: random_g2(rng).into(),
        delta_c2_1: random_g1(rng).into(),
        delta_c2_2: random_g2(rng).into(),
    }
}

fn random_delta(rng: &mut ChaChaRng) -> DeltaPublicKey {
    let mut transcript = [0u8; 64];
    rng.fill(&mut transcript[..]);

    DeltaPublicKey {
        delta_after: random_g1(rng).into(),
        g1_s: random_g1(rng).into(),
        g1_sx: random_g1(rng).into(),
        g2_spx: random_g2(rng).into(),
        transcript,
    }
}

pub fn random_contribution(rng: &mut ChaChaRng, kind: ContributionKind) -> Contribution {
    Contribution {
        delta1: random_delta(rng),
        delta2: random_delta(rng),
        kind,
        name: Some("contribution".to_string()),
    }
}

/// A circuit-shaped genesis key: both deltas are the group generators and
/// H holds the quotient basis for τ.
pub struct TestSetup {
    pub tau: Scalar,
    pub shift: HShift,
    pub header: KeyHeader,
    pub cs_hash: [u8; 64],
    pub ic: Vec<u8>,
    pub coeffs: Vec<u8>,
    pub a: Vec<u8>,
    pub b1: Vec<u8>,
    pub b2: Vec<u8>,
    pub c1: Vec<u8>,
    pub c2: Vec<u8>,
    pub indexes_c1: Vec<u8>,
    pub indexes_c2: Vec<u8>,
    pub h: Vec<u8>,
}

impl TestSetup {
    pub fn new(domain_size: u32, seed: u64) -> TestSetup {
        let power = domain_size.trailing_zeros();
        TestSetup::with_shift(domain_size, seed, HShift::for_power(power))
    }

    pub fn with_shift(domain_size: u32, seed: u64, shift: HShift) -> TestSetup {
        assert!(domain_size.is_power_of_two());
        let rng = &mut ChaChaRng::seed_from_u64(seed);
        let tau = Scalar::random(&mut *rng);

        let mut header = random_header(rng, domain_size);
        header.delta_c1_1 = G1Affine::generator().into();
        header.delta_c1_2 = G2Affine::generator().into();
        header.delta_c2_1 = G1Affine::generator().into();
        header.delta_c2_2 = G2Affine::generator().into();

        let points = |rng: &mut ChaChaRng, n: u32| {
            g1_bytes(&(0..n).map(|_| random_g1(rng)).collect::<Vec<_>>())
        };

        let ic = points(rng, N_PUBLIC + 1);
        let mut coeffs = vec![0u8; 4 + 2 * (12 + 32)];
        rng.fill(&mut coeffs[..]);
        let a = points(rng, N_VARS);
        let b1 = points(rng, N_VARS);
        let mut b2 = vec![];
        for _ in 0..N_VARS {
            write_g2(&mut b2, &random_g2(rng)).unwrap();
        }
        let c1 = points(rng, N_INDEXES_C1);
        let c2 = points(rng, N_INDEXES_C2);

        let mut indexes_c1 = vec![];
        for i in 0..N_INDEXES_C1 {
            indexes_c1.write_u32::<LittleEndian>(i).unwrap();
        }
        let mut indexes_c2 = vec![];
        for i in 0..N_INDEXES_C2 {
            indexes_c2.write_u32::<LittleEndian>(N_INDEXES_C1 + i).unwrap();
        }

        let h = g1_bytes(&h_basis(tau, domain_size, shift));

        let mut cs_hash = HashWriter::new();
        for section in [&ic, &coeffs, &a, &b1, &b2] {
            cs_hash.write_all(section).unwrap();
        }

        TestSetup {
            tau,
            shift,
            header,
            cs_hash: cs_hash.into_hash(),
            ic,
            coeffs,
            a,
            b1,
            b2,
            c1,
            c2,
            indexes_c1,
            indexes_c2,
            h,
        }
    }
}

/// `H_j = (τ^n - 1) / (inc^n - 1) · L_j(τ)` where `L_j` is the Lagrange
/// basis over the points `inc · ω^j`.
fn h_basis(tau: Scalar, domain_size: u32, shift: HShift) -> Vec<G1Affine> {
    let n = u64::from(domain_size);
    let power = domain_size.trailing_zeros();
    let inc = shift.inc(power);
    let omega = root_of_unity(power);

    let inc_n = Field::pow_vartime(&inc, [n]);
    let tau_n = Field::pow_vartime(&tau, [n]);
    let scale = (tau_n - Scalar::one()) * (inc_n - Scalar::one()).invert().unwrap();

    let mut x = inc;
    let mut basis = vec![];
    for _ in 0..domain_size {
        let denominator = Scalar::from(n) * inc_n * (tau - x);
        let l = (tau_n - inc_n) * x * denominator.invert().unwrap();
        basis.push((G1Affine::generator() * (scale * l)).to_affine());
        x *= omega;
    }
    basis
}

pub fn genesis_key(setup: &TestSetup) -> Vec<u8> {
    let mut file = create_key_file(Cursor::new(vec![])).unwrap();
    setup.header.write(&mut file).unwrap();

    let sections = [
        (SECTION_IC, &setup.ic),
        (SECTION_COEFFS, &setup.coeffs),
        (SECTION_A, &setup.a),
        (SECTION_B1, &setup.b1),
        (SECTION_B2, &setup.b2),
        (SECTION_C1, &setup.c1),
        (SECTION_C2, &setup.c2),
        (SECTION_INDEXES_C1, &setup.indexes_c1),
        (SECTION_INDEXES_C2, &setup.indexes_c2),
        (SECTION_H, &setup.h),
    ];
    for (id, bytes) in sections {
        file.start_section(id).unwrap();
        file.writer().write_all(bytes).unwrap();
        file.end_section().unwrap();
    }

    MPCParameters::new(setup.cs_hash)
        .write_section(&mut file)
        .unwrap();
    file.finish().unwrap().into_inner()
}

/// Powers of tau file with exactly the `2n - 1` powers the verifier needs.
pub fn reference_file(setup: &TestSetup) -> Vec<u8> {
    reference_file_with(setup, 2 * u64::from(setup.header.domain_size) - 1)
}

pub fn reference_file_with(setup: &TestSetup, count: u64) -> Vec<u8> {
    let mut file =
        BinFileWriter::create(Cursor::new(vec![]), PTAU_FILE_TYPE, PTAU_VERSION, 2).unwrap();

    file.start_section(SECTION_PTAU_HEADER).unwrap();
    let writer = file.writer();
    writer.write_u32::<LittleEndian>(N8Q).unwrap();
    writer.write_all(&Q_BYTES).unwrap();
    writer
        .write_u32::<LittleEndian>(setup.header.domain_size.trailing_zeros())
        .unwrap();
    writer.write_u32::<LittleEndian>(28).unwrap();

    file.start_section(SECTION_TAU_G1).unwrap();
    let mut power = G1Affine::generator();
    for _ in 0..count {
        write_g1(file.writer(), &power).unwrap();
        power = (power * setup.tau).to_affine();
    }

    file.finish().unwrap().into_inner()
}

/// Re-encode a key after editing its MPC parameters. Every other section is
/// copied unchanged.
pub fn edit_params(key: Vec<u8>, edit: impl FnOnce(&mut MPCParameters)) -> Vec<u8> {
    let mut source = KeyFile::open(Cursor::new(key)).unwrap();
    edit(&mut source.params);

    let mut file = create_key_file(Cursor::new(vec![])).unwrap();
    for id in 1..=SECTION_H {
        source.file.copy_section(&mut file, id).unwrap();
    }
    source.params.write_section(&mut file).unwrap();
    file.finish().unwrap().into_inner()
}

/// Re-encode a key after editing its header. Every other section is copied
/// unchanged.
pub fn edit_header(key: Vec<u8>, edit: impl FnOnce(&mut KeyHeader)) -> Vec<u8> {
    let mut source = KeyFile::open(Cursor::new(key)).unwrap();
    edit(&mut source.header);

    let mut file = create_key_file(Cursor::new(vec![])).unwrap();
    source.header.write(&mut file).unwrap();
    for id in SECTION_IC..=SECTION_MPC_PARAMS {
        source.file.copy_section(&mut file, id).unwrap();
    }
    file.finish().unwrap().into_inner()
}

/// Re-encode a key after editing the payload of section `id`.
pub fn edit_section(key: Vec<u8>, id: u32, edit: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
    let mut source = BinFile::open(Cursor::new(key), "zkey", 1).unwrap();
    let mut payload = source.read_section(id).unwrap();
    edit(&mut payload);

    let mut file = create_key_file(Cursor::new(vec![])).unwrap();
    for section in 1..=SECTION_MPC_PARAMS {
        if section == id {
            file.start_section(id).unwrap();
            file.writer().write_all(&payload).unwrap();
            file.end_section().unwrap();
        } else {
            source.copy_section(&mut file, section).unwrap();
        }
    }
    file.finish().unwrap().into_inner()
}

/// Swap points `i` and `j` of a G1 section in place.
pub fn swap_points(key: &mut [u8], id: u32, i: usize, j: usize) {
    let file = BinFile::open(Cursor::new(key.to_vec()), "zkey", 1).unwrap();
    let position = file.section(id).unwrap().position as usize;

    let (a, b) = (position + i * G1_SIZE, position + j * G1_SIZE);
    let point_i = key[a..a + G1_SIZE].to_vec();
    key.copy_within(b..b + G1_SIZE, a);
    key[b..b + G1_SIZE].copy_from_slice(&point_i);
}

/// Byte offset of section `id`'s payload.
pub fn section_position(key: &[u8], id: u32) -> usize {
    let file = BinFile::open(Cursor::new(key.to_vec()), "zkey", 1).unwrap();
    file.section(id).unwrap().position as usize
}
