use std::io::{Read, Seek, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::binfile::{BinFile, BinFileWriter};
use crate::curve::{G1Encoding, G2Encoding, N8Q, N8R, Q_BYTES, R_BYTES};
use crate::errors::{Error, Result};

/// Protocol id stored in section 1 of an UltraGroth key.
pub const ULTRAGROTH_PROTOCOL_ID: u32 = 1337;

pub const SECTION_PROTOCOL: u32 = 1;
pub const SECTION_HEADER: u32 = 2;
pub const SECTION_IC: u32 = 3;
pub const SECTION_COEFFS: u32 = 4;
pub const SECTION_A: u32 = 5;
pub const SECTION_B1: u32 = 6;
pub const SECTION_B2: u32 = 7;
pub const SECTION_C1: u32 = 8;
pub const SECTION_C2: u32 = 9;
pub const SECTION_INDEXES_C1: u32 = 10;
pub const SECTION_INDEXES_C2: u32 = 11;
pub const SECTION_H: u32 = 12;
pub const SECTION_MPC_PARAMS: u32 = 13;

pub const NUM_SECTIONS: u32 = 13;

/// Header of an UltraGroth proving key (sections 1 and 2). Points are kept
/// encoded; see [`G1Encoding`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyHeader {
    pub n_vars: u32,
    pub n_public: u32,
    pub domain_size: u32,
    pub n_indexes_c1: u32,
    pub n_indexes_c2: u32,
    pub rand_idx: u32,
    pub alpha_1: G1Encoding,
    pub beta_1: G1Encoding,
    pub beta_2: G2Encoding,
    pub gamma_2: G2Encoding,
    pub delta_c1_1: G1Encoding,
    pub delta_c1_2: G2Encoding,
    pub delta_c2_1: G1Encoding,
    pub delta_c2_2: G2Encoding,
}

impl KeyHeader {
    /// `log2(domain_size)`.
    pub fn power(&self) -> Result<u32> {
        if !self.domain_size.is_power_of_two() {
            return Err(Error::InvalidDomainSize(self.domain_size));
        }
        Ok(self.domain_size.trailing_zeros())
    }

    pub fn read<R: Read + Seek>(file: &mut BinFile<R>) -> Result<KeyHeader> {
        let mut reader = file.section_reader(SECTION_PROTOCOL)?;
        let protocol = reader.read_u32::<LittleEndian>()?;
        if protocol != ULTRAGROTH_PROTOCOL_ID {
            return Err(Error::NotUltraGroth(protocol));
        }

        let mut reader = file.section_reader(SECTION_HEADER)?;
        read_modulus(&mut reader, N8Q, &Q_BYTES)?;
        read_modulus(&mut reader, N8R, &R_BYTES)?;

        Ok(KeyHeader {
            n_vars: reader.read_u32::<LittleEndian>()?,
            n_public: reader.read_u32::<LittleEndian>()?,
            domain_size: reader.read_u32::<LittleEndian>()?,
            n_indexes_c1: reader.read_u32::<LittleEndian>()?,
            n_indexes_c2: reader.read_u32::<LittleEndian>()?,
            rand_idx: reader.read_u32::<LittleEndian>()?,
            alpha_1: G1Encoding::read(&mut reader)?,
            beta_1: G1Encoding::read(&mut reader)?,
            beta_2: G2Encoding::read(&mut reader)?,
            gamma_2: G2Encoding::read(&mut reader)?,
            delta_c1_1: G1Encoding::read(&mut reader)?,
            delta_c1_2: G2Encoding::read(&mut reader)?,
            delta_c2_1: G1Encoding::read(&mut reader)?,
            delta_c2_2: G2Encoding::read(&mut reader)?,
        })
    }

    /// Write sections 1 and 2.
    pub fn write<W: Write + Seek>(&self, file: &mut BinFileWriter<W>) -> Result<()> {
        file.start_section(SECTION_PROTOCOL)?;
        file.writer()
            .write_u32::<LittleEndian>(ULTRAGROTH_PROTOCOL_ID)?;
        file.end_section()?;

        file.start_section(SECTION_HEADER)?;
        let writer = file.writer();
        writer.write_u32::<LittleEndian>(N8Q)?;
        writer.write_all(&Q_BYTES)?;
        writer.write_u32::<LittleEndian>(N8R)?;
        writer.write_all(&R_BYTES)?;

        writer.write_u32::<LittleEndian>(self.n_vars)?;
        writer.write_u32::<LittleEndian>(self.n_public)?;
        writer.write_u32::<LittleEndian>(self.domain_size)?;
        writer.write_u32::<LittleEndian>(self.n_indexes_c1)?;
        writer.write_u32::<LittleEndian>(self.n_indexes_c2)?;
        writer.write_u32::<LittleEndian>(self.rand_idx)?;

        self.alpha_1.write(&mut *writer)?;
        self.beta_1.write(&mut *writer)?;
        self.beta_2.write(&mut *writer)?;
        self.gamma_2.write(&mut *writer)?;
        self.delta_c1_1.write(&mut *writer)?;
        self.delta_c1_2.write(&mut *writer)?;
        self.delta_c2_1.write(&mut *writer)?;
        self.delta_c2_2.write(&mut *writer)?;
        file.end_section()
    }

    /// Everything except the four delta elements, which are the only
    /// fields a contribution may change.
    pub fn same_circuit(&self, other: &KeyHeader) -> bool {
        self.n_vars == other.n_vars
            && self.n_public == other.n_public
            && self.domain_size == other.domain_size
            && self.n_indexes_c1 == other.n_indexes_c1
            && self.n_indexes_c2 == other.n_indexes_c2
            && self.rand_idx == other.rand_idx
    }
}

fn read_modulus<R: Read>(mut reader: R, expected_len: u32, expected: &[u8]) -> Result<()> {
    let len = reader.read_u32::<LittleEndian>()?;
    if len != expected_len {
        return Err(Error::UnsupportedCurve);
    }

    let mut modulus = vec![0u8; len as usize];
    reader.read_exact(&mut modulus)?;
    if modulus != expected {
        return Err(Error::UnsupportedCurve);
    }

    Ok(())
}

/// Verify that `file` is a complete UltraGroth key: sections 1 to 13, each
/// present exactly once and in order.
pub fn check_layout<R: Read + Seek>(file: &BinFile<R>) -> Result<()> {
    let expected: Vec<u32> = (1..=NUM_SECTIONS).collect();
    if file.order() == expected.as_slice() {
        return Ok(());
    }

    for id in 1..=NUM_SECTIONS {
        file.section(id)?;
    }
    Err(Error::SectionOrder)
}
