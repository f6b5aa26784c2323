use std::io::{self, Read, Seek, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::binfile::{BinFile, BinFileWriter};
use crate::contribution::Contribution;
use crate::errors::{Error, Result};
use crate::header::{check_layout, KeyHeader, NUM_SECTIONS, SECTION_MPC_PARAMS};

pub const ZKEY_FILE_TYPE: &str = "zkey";
pub const ZKEY_VERSION: u32 = 1;

/// MPC state of a key: the circuit digest fixed at genesis and every
/// contribution made since, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MPCParameters {
    pub cs_hash: [u8; 64],
    pub contributions: Vec<Contribution>,
}

impl MPCParameters {
    pub fn new(cs_hash: [u8; 64]) -> Self {
        MPCParameters {
            cs_hash,
            contributions: vec![],
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&self.cs_hash)?;
        writer.write_u32::<LittleEndian>(self.contributions.len() as u32)?;
        for contribution in &self.contributions {
            contribution.write(&mut writer)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<MPCParameters> {
        let mut cs_hash = [0u8; 64];
        reader.read_exact(&mut cs_hash)?;

        let n = reader.read_u32::<LittleEndian>()?;
        let mut contributions = vec![];
        for _ in 0..n {
            contributions.push(Contribution::read(&mut reader)?);
        }

        Ok(MPCParameters {
            cs_hash,
            contributions,
        })
    }

    /// Read section 13, which must be consumed exactly.
    pub fn read_section<R: Read + Seek>(file: &mut BinFile<R>) -> Result<MPCParameters> {
        let size = file.section_size(SECTION_MPC_PARAMS)?;
        let mut reader = file.section_reader(SECTION_MPC_PARAMS)?;
        let params = MPCParameters::read(&mut reader)?;

        if reader.limit() != 0 {
            return Err(Error::SectionSize {
                section: SECTION_MPC_PARAMS,
                expected: size - reader.limit(),
                actual: size,
            });
        }

        Ok(params)
    }

    pub fn write_section<W: Write + Seek>(&self, file: &mut BinFileWriter<W>) -> Result<()> {
        file.start_section(SECTION_MPC_PARAMS)?;
        self.write(file.writer())?;
        file.end_section()
    }
}

/// An opened UltraGroth key with its header and MPC state decoded. The
/// point sections stay on disk and are streamed on demand.
pub struct KeyFile<R> {
    pub file: BinFile<R>,
    pub header: KeyHeader,
    pub params: MPCParameters,
}

impl<R: Read + Seek> KeyFile<R> {
    pub fn open(reader: R) -> Result<Self> {
        let mut file = BinFile::open(reader, ZKEY_FILE_TYPE, ZKEY_VERSION)?;
        check_layout(&file)?;

        let header = KeyHeader::read(&mut file)?;
        header.power()?;
        let params = MPCParameters::read_section(&mut file)?;

        Ok(KeyFile {
            file,
            header,
            params,
        })
    }
}

/// Start a key file with the standard section count.
pub fn create_key_file<W: Write + Seek>(writer: W) -> Result<BinFileWriter<W>> {
    BinFileWriter::create(writer, ZKEY_FILE_TYPE, ZKEY_VERSION, NUM_SECTIONS)
}
