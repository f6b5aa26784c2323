//! Powers of tau file the verifier uses as a source of `τ^i·G1`.

use std::io::{Read, Seek};

use bls12_381::G1Affine;
use byteorder::{LittleEndian, ReadBytesExt};

use crate::binfile::BinFile;
use crate::curve::{G1_SIZE, N8Q, Q_BYTES};
use crate::errors::{Error, Result};
use crate::multicore::read_points;

pub const PTAU_FILE_TYPE: &str = "ptau";
pub const PTAU_VERSION: u32 = 1;

pub const SECTION_PTAU_HEADER: u32 = 1;
pub const SECTION_TAU_G1: u32 = 2;

pub struct ReferenceFile<R> {
    file: BinFile<R>,
    pub power: u32,
    pub ceremony_power: u32,
    tau_g1_points: u64,
}

impl<R: Read + Seek> ReferenceFile<R> {
    pub fn open(reader: R) -> Result<Self> {
        let mut file = BinFile::open(reader, PTAU_FILE_TYPE, PTAU_VERSION)?;

        let mut header = file.section_reader(SECTION_PTAU_HEADER)?;
        let n8q = header.read_u32::<LittleEndian>()?;
        if n8q != N8Q {
            return Err(Error::CurveMismatch);
        }
        let mut q = [0u8; 48];
        header.read_exact(&mut q)?;
        if q != Q_BYTES {
            return Err(Error::CurveMismatch);
        }
        let power = header.read_u32::<LittleEndian>()?;
        let ceremony_power = header.read_u32::<LittleEndian>()?;

        let tau_g1_points = file.section_size(SECTION_TAU_G1)? / G1_SIZE as u64;

        Ok(ReferenceFile {
            file,
            power,
            ceremony_power,
            tau_g1_points,
        })
    }

    /// Number of `τ^i·G1` points available.
    pub fn tau_g1_points(&self) -> u64 {
        self.tau_g1_points
    }

    /// Fail unless at least `needed` powers are present.
    pub fn require_tau_g1(&self, needed: u64) -> Result<()> {
        if self.tau_g1_points < needed {
            return Err(Error::ReferenceTooSmall {
                needed,
                available: self.tau_g1_points,
            });
        }
        Ok(())
    }

    /// `τ^i·G1` for `i` in `[start, start + len)`.
    pub fn tau_g1(&mut self, start: usize, len: usize) -> Result<Vec<G1Affine>> {
        read_points(&mut self.file, SECTION_TAU_G1, start, len, "tauG1")
    }
}
