//! Parallel point arithmetic over large G1 vectors. Sections are streamed in
//! chunks of at most [`CHUNK_SIZE`] points so memory stays bounded by the
//! chunk, not by the circuit.

use std::io::{Read, Seek, Write};

use bls12_381::{G1Affine, G1Projective, Scalar};
use ff::{Field, PrimeField};
use group::Wnaf;
use rand::{thread_rng, Rng};
use rayon::prelude::*;
use tracing::debug;

use crate::binfile::{BinFile, BinFileWriter};
use crate::curve::{decode_g1, write_g1, G1_SIZE};
use crate::errors::{Error, Result};

/// Points held in memory at once while streaming a section.
pub const CHUNK_SIZE: usize = 1 << 20;

/// Work units handed to the thread pool for a vector of `len` items.
fn split_size(len: usize) -> usize {
    let cpus = num_cpus::get();
    if len < cpus {
        1
    } else {
        len / cpus
    }
}

/// Decode a run of uncompressed G1 points.
pub fn decode_points(bytes: &[u8], what: &'static str) -> Result<Vec<G1Affine>> {
    if bytes.len() % G1_SIZE != 0 {
        return Err(Error::InvalidPoint(what));
    }

    bytes
        .par_chunks(G1_SIZE)
        .map(|point| decode_g1(point, what))
        .collect()
}

/// Number of G1 points in a section, failing if the size is not a whole
/// number of points.
pub fn section_points<R: Read + Seek>(file: &BinFile<R>, id: u32) -> Result<usize> {
    let size = file.section_size(id)?;
    if size % G1_SIZE as u64 != 0 {
        return Err(Error::SectionSize {
            section: id,
            expected: size - size % G1_SIZE as u64,
            actual: size,
        });
    }
    Ok((size / G1_SIZE as u64) as usize)
}

/// Read points `[start, start + len)` of a G1 section.
pub fn read_points<R: Read + Seek>(
    file: &mut BinFile<R>,
    id: u32,
    start: usize,
    len: usize,
    what: &'static str,
) -> Result<Vec<G1Affine>> {
    let bytes = file.read_section_range(id, (start * G1_SIZE) as u64, len * G1_SIZE)?;
    decode_points(&bytes, what)
}

/// Multiply every base by its coefficient and normalize the results.
pub fn batch_exp(bases: &mut [G1Affine], coeffs: &[Scalar]) {
    assert_eq!(bases.len(), coeffs.len());
    let chunk_size = split_size(bases.len());

    bases
        .par_chunks_mut(chunk_size)
        .zip(coeffs.par_chunks(chunk_size))
        .for_each(|(bases, coeffs)| {
            let projective: Vec<G1Projective> = bases
                .iter()
                .zip(coeffs.iter())
                .map(|(base, coeff)| base * coeff)
                .collect();
            G1Projective::batch_normalize(&projective, bases);
        });
}

/// Copy G1 section `id` from `src` to `dst`, scaling point `i` by
/// `first · inc^i`.
pub fn apply_key_to_section<R: Read + Seek, W: Write + Seek>(
    src: &mut BinFile<R>,
    dst: &mut BinFileWriter<W>,
    id: u32,
    first: Scalar,
    inc: Scalar,
) -> Result<()> {
    let n = section_points(src, id)?;
    dst.start_section(id)?;

    let mut t = first;
    let mut start = 0;
    while start < n {
        let len = (n - start).min(CHUNK_SIZE);
        debug!(section = id, start, len, "applying key to chunk");

        let mut points = read_points(src, id, start, len, "key section")?;
        let coeffs: Vec<Scalar> = if inc == Scalar::one() {
            vec![t; len]
        } else {
            let mut coeffs = Vec::with_capacity(len);
            for _ in 0..len {
                coeffs.push(t);
                t *= inc;
            }
            coeffs
        };
        batch_exp(&mut points, &coeffs);

        let writer = dst.writer();
        for point in &points {
            write_g1(&mut *writer, point)?;
        }
        start += len;
    }

    dst.end_section()
}

/// Random linear combination of two equal length vectors with the same
/// small random coefficient applied at each position:
///
/// (a*r1 + b*r2 + c*r3, (as)*r1 + (bs)*r2 + (cs)*r3)
///
/// If every point of `v2` is `s` times the matching point of `v1`, so is the
/// result. Otherwise the result fails that relation with high probability.
pub fn merge_pairs(v1: &[G1Affine], v2: &[G1Affine]) -> (G1Projective, G1Projective) {
    assert_eq!(v1.len(), v2.len());
    let chunk_size = split_size(v1.len());

    v1.par_chunks(chunk_size)
        .zip(v2.par_chunks(chunk_size))
        .map(|(v1, v2)| {
            // We do not need to be overly cautious of the RNG
            // used for this check.
            let rng = &mut thread_rng();

            let mut wnaf = Wnaf::new();
            let mut s = G1Projective::identity();
            let mut sx = G1Projective::identity();
            for (a, b) in v1.iter().zip(v2.iter()) {
                let rho = Scalar::from(u64::from(rng.gen::<u32>()));
                let mut wnaf = wnaf.scalar(&rho);
                s += wnaf.base(G1Projective::from(a));
                sx += wnaf.base(G1Projective::from(b));
            }
            (s, sx)
        })
        .reduce(
            || (G1Projective::identity(), G1Projective::identity()),
            |a, b| (a.0 + b.0, a.1 + b.1),
        )
}

/// `Σ scalars[i] · bases[i]`.
pub fn multiexp(bases: &[G1Affine], scalars: &[Scalar]) -> G1Projective {
    assert_eq!(bases.len(), scalars.len());
    let chunk_size = split_size(bases.len());

    bases
        .par_chunks(chunk_size)
        .zip(scalars.par_chunks(chunk_size))
        .map(|(bases, scalars)| bucket_multiexp(bases, scalars))
        .reduce(G1Projective::identity, |a, b| a + b)
}

/// Pippenger's bucket method: scalars are cut into `c` bit windows, and in
/// each window every base is added once into the bucket of its digit.
fn bucket_multiexp(bases: &[G1Affine], scalars: &[Scalar]) -> G1Projective {
    let c = if bases.len() < 32 {
        3
    } else {
        (bases.len() as f64).ln().ceil() as usize
    };
    let reprs: Vec<_> = scalars.iter().map(|s| s.to_repr()).collect();
    let windows = (Scalar::NUM_BITS as usize + c - 1) / c;

    let mut acc = G1Projective::identity();
    for window in (0..windows).rev() {
        for _ in 0..c {
            acc = acc.double();
        }

        let mut buckets = vec![G1Projective::identity(); (1 << c) - 1];
        for (base, repr) in bases.iter().zip(reprs.iter()) {
            let digit = window_digit(repr.as_ref(), window * c, c);
            if digit != 0 {
                buckets[digit - 1] += base;
            }
        }

        // Σ j·bucket_j as a sum of suffix sums
        let mut running = G1Projective::identity();
        for bucket in buckets.into_iter().rev() {
            running += bucket;
            acc += running;
        }
    }
    acc
}

/// `c` bits of a little-endian scalar encoding, starting at bit `start`.
fn window_digit(repr: &[u8], start: usize, c: usize) -> usize {
    let mut digit = 0;
    for i in 0..c {
        let bit = start + i;
        if bit < repr.len() * 8 && (repr[bit / 8] >> (bit % 8)) & 1 == 1 {
            digit |= 1 << i;
        }
    }
    digit
}

/// `a[i] - b[i]` for every position.
pub fn batch_subtract(a: &[G1Affine], b: &[G1Affine]) -> Vec<G1Affine> {
    assert_eq!(a.len(), b.len());

    let projective: Vec<G1Projective> = a
        .par_iter()
        .zip(b.par_iter())
        .map(|(a, b)| G1Projective::from(a) - b)
        .collect();

    let mut affine = vec![G1Affine::identity(); projective.len()];
    G1Projective::batch_normalize(&projective, &mut affine);
    affine
}

/// Random scalars for a blinding vector.
pub fn random_scalars<R: Rng>(rng: &mut R, n: usize) -> Vec<Scalar> {
    (0..n).map(|_| Scalar::random(&mut *rng)).collect()
}
