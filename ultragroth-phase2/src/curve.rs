//! BLS12-381 binding: field moduli as they appear in key headers, point
//! encodings and the pairing-based ratio check.

use std::io::{self, Read, Write};

use bls12_381::{Bls12, G1Affine, G2Affine, G2Projective};
use group::Group;
use pairing::Engine;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::errors::{Error, Result};

/// Bytes in an uncompressed G1 point.
pub const G1_SIZE: usize = 96;

/// Bytes in an uncompressed G2 point.
pub const G2_SIZE: usize = 192;

/// Bytes needed to hold the base field modulus.
pub const N8Q: u32 = 48;

/// Bytes needed to hold the group order.
pub const N8R: u32 = 32;

/// Base field modulus, little-endian.
pub const Q_BYTES: [u8; 48] = [
    0xab, 0xaa, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xb9, 0xff, 0xff, 0x53, 0xb1, 0xfe, 0xff, 0xab, 0x1e,
    0x24, 0xf6, 0xb0, 0xf6, 0xa0, 0xd2, 0x30, 0x67, 0xbf, 0x12, 0x85, 0xf3, 0x84, 0x4b, 0x77, 0x64,
    0xd7, 0xac, 0x4b, 0x43, 0xb6, 0xa7, 0x1b, 0x4b, 0x9a, 0xe6, 0x7f, 0x39, 0xea, 0x11, 0x01, 0x1a,
];

/// Scalar field order, little-endian.
pub const R_BYTES: [u8; 32] = [
    0x01, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0x02, 0xa4, 0xbd, 0x53,
    0x05, 0xd8, 0xa1, 0x09, 0x08, 0xd8, 0x39, 0x33, 0x48, 0x7d, 0x9d, 0x29, 0x53, 0xa7, 0xed, 0x73,
];

pub fn write_g1<W: Write>(mut writer: W, point: &G1Affine) -> io::Result<()> {
    writer.write_all(point.to_uncompressed().as_ref())
}

pub fn write_g2<W: Write>(mut writer: W, point: &G2Affine) -> io::Result<()> {
    writer.write_all(point.to_uncompressed().as_ref())
}

/// Decode a G1 point, checking that it is on the curve and in the
/// prime order subgroup. `what` names the point in the error.
pub fn decode_g1(bytes: &[u8], what: &'static str) -> Result<G1Affine> {
    let mut repr = [0u8; G1_SIZE];
    if bytes.len() != G1_SIZE {
        return Err(Error::InvalidPoint(what));
    }
    repr.copy_from_slice(bytes);

    Option::from(G1Affine::from_uncompressed(&repr)).ok_or(Error::InvalidPoint(what))
}

pub fn decode_g2(bytes: &[u8], what: &'static str) -> Result<G2Affine> {
    let mut repr = [0u8; G2_SIZE];
    if bytes.len() != G2_SIZE {
        return Err(Error::InvalidPoint(what));
    }
    repr.copy_from_slice(bytes);

    Option::from(G2Affine::from_uncompressed(&repr)).ok_or(Error::InvalidPoint(what))
}

/// A G1 point as it is stored in a file. Decoding is deferred so that a
/// malformed point is reported by the check that needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G1Encoding(pub [u8; G1_SIZE]);

impl G1Encoding {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut repr = [0u8; G1_SIZE];
        reader.read_exact(&mut repr)?;
        Ok(G1Encoding(repr))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    pub fn decode(&self, what: &'static str) -> Result<G1Affine> {
        decode_g1(&self.0, what)
    }

    /// Like [`G1Encoding::decode`], but also rejects the point at infinity.
    pub fn decode_nonzero(&self, what: &'static str) -> Result<G1Affine> {
        let point = self.decode(what)?;
        if bool::from(point.is_identity()) {
            return Err(Error::InvalidPoint(what));
        }
        Ok(point)
    }
}

impl From<G1Affine> for G1Encoding {
    fn from(point: G1Affine) -> Self {
        G1Encoding(point.to_uncompressed())
    }
}

/// A G2 point as it is stored in a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G2Encoding(pub [u8; G2_SIZE]);

impl G2Encoding {
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut repr = [0u8; G2_SIZE];
        reader.read_exact(&mut repr)?;
        Ok(G2Encoding(repr))
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    pub fn decode(&self, what: &'static str) -> Result<G2Affine> {
        decode_g2(&self.0, what)
    }

    pub fn decode_nonzero(&self, what: &'static str) -> Result<G2Affine> {
        let point = self.decode(what)?;
        if bool::from(point.is_identity()) {
            return Err(Error::InvalidPoint(what));
        }
        Ok(point)
    }
}

impl From<G2Affine> for G2Encoding {
    fn from(point: G2Affine) -> Self {
        G2Encoding(point.to_uncompressed())
    }
}

/// Checks if pairs have the same ratio, i.e. `g1.1 = x·g1.0` and
/// `g2.1 = x·g2.0` for the same (unknown) `x`.
pub fn same_ratio(g1: (G1Affine, G1Affine), g2: (G2Affine, G2Affine)) -> bool {
    Bls12::pairing(&g1.0, &g2.1) == Bls12::pairing(&g1.1, &g2.0)
}

/// Hashes to G2 by seeding ChaCha with the first 32 bytes of `digest`.
/// Panics if `digest` is less than 32 bytes.
pub fn hash_to_g2(digest: &[u8]) -> G2Projective {
    assert!(digest.len() >= 32);

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest[..32]);

    G2Projective::random(ChaChaRng::from_seed(seed))
}
