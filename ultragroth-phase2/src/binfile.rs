//! Sectioned binary container shared by proving keys (`zkey`) and
//! reference randomness files (`ptau`).
//!
//! A file is a 4 byte magic, a little-endian `u32` version and section
//! count, followed by the sections themselves. Every section is prefixed
//! by its `u32` id and `u64` size.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::errors::{Error, Result};

/// Largest buffer used when streaming a section.
const COPY_CHUNK_SIZE: u64 = 1 << 22;

/// Byte range of a section inside the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Section {
    pub position: u64,
    pub size: u64,
}

/// Read side of a container. Sections are located once when the file is
/// opened; after that every read seeks to an absolute offset.
pub struct BinFile<R> {
    reader: R,
    sections: BTreeMap<u32, Vec<Section>>,
    order: Vec<u32>,
}

impl<R: Read + Seek> BinFile<R> {
    pub fn open(mut reader: R, kind: &str, max_version: u32) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != kind.as_bytes() {
            return Err(Error::InvalidFileType {
                expected: kind.to_string(),
            });
        }

        let version = reader.read_u32::<LittleEndian>()?;
        if version > max_version {
            return Err(Error::UnsupportedVersion {
                kind: kind.to_string(),
                version,
            });
        }

        let num_sections = reader.read_u32::<LittleEndian>()?;
        let end = reader.seek(SeekFrom::End(0))?;
        let mut position = 12;

        let mut sections: BTreeMap<u32, Vec<Section>> = BTreeMap::new();
        // the count is untrusted; every section header is checked against
        // the file length before it is recorded
        let mut order = vec![];
        for _ in 0..num_sections {
            reader.seek(SeekFrom::Start(position))?;
            let id = reader.read_u32::<LittleEndian>()?;
            let size = reader.read_u64::<LittleEndian>()?;
            position += 12;

            if position.checked_add(size).map_or(true, |e| e > end) {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "section runs past the end of the file",
                )));
            }

            sections.entry(id).or_default().push(Section { position, size });
            order.push(id);
            position += size;
        }

        Ok(BinFile {
            reader,
            sections,
            order,
        })
    }

    /// Section ids in the order they appear in the file.
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Location of a section that must appear exactly once.
    pub fn section(&self, id: u32) -> Result<Section> {
        match self.sections.get(&id).map(|s| s.as_slice()) {
            None | Some([]) => Err(Error::MissingSection(id)),
            Some([section]) => Ok(*section),
            Some(_) => Err(Error::DuplicateSection(id)),
        }
    }

    pub fn section_size(&self, id: u32) -> Result<u64> {
        Ok(self.section(id)?.size)
    }

    /// Reader positioned at the start of the section and bounded by its size.
    pub fn section_reader(&mut self, id: u32) -> Result<io::Take<&mut R>> {
        let section = self.section(id)?;
        self.reader.seek(SeekFrom::Start(section.position))?;
        Ok((&mut self.reader).take(section.size))
    }

    pub fn read_section(&mut self, id: u32) -> Result<Vec<u8>> {
        let size = self.section_size(id)?;
        let mut buf = Vec::with_capacity(size as usize);
        self.section_reader(id)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read `len` bytes starting `offset` bytes into a section.
    pub fn read_section_range(&mut self, id: u32, offset: u64, len: usize) -> Result<Vec<u8>> {
        let section = self.section(id)?;
        if offset + len as u64 > section.size {
            return Err(Error::SectionSize {
                section: id,
                expected: offset + len as u64,
                actual: section.size,
            });
        }

        self.reader
            .seek(SeekFrom::Start(section.position + offset))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Stream a section into `dest` unchanged.
    pub fn copy_section<W: Write + Seek>(
        &mut self,
        dest: &mut BinFileWriter<W>,
        id: u32,
    ) -> Result<()> {
        let size = self.section_size(id)?;
        dest.start_section(id)?;

        let mut offset = 0;
        while offset < size {
            let n = (size - offset).min(COPY_CHUNK_SIZE) as usize;
            let chunk = self.read_section_range(id, offset, n)?;
            dest.writer().write_all(&chunk)?;
            offset += n as u64;
        }

        dest.end_section()
    }

    /// Compare one section byte for byte against the same section of
    /// another file.
    pub fn section_is_equal<R2: Read + Seek>(
        &mut self,
        other: &mut BinFile<R2>,
        id: u32,
    ) -> Result<bool> {
        let size = self.section_size(id)?;
        if size != other.section_size(id)? {
            return Ok(false);
        }

        let mut offset = 0;
        while offset < size {
            let n = (size - offset).min(COPY_CHUNK_SIZE) as usize;
            if self.read_section_range(id, offset, n)? != other.read_section_range(id, offset, n)? {
                return Ok(false);
            }
            offset += n as u64;
        }

        Ok(true)
    }
}

/// Write side of a container. Section sizes are patched in once the
/// section is closed, so the underlying writer must be seekable.
pub struct BinFileWriter<W> {
    writer: W,
    open_section: Option<u64>,
}

impl<W: Write + Seek> BinFileWriter<W> {
    pub fn create(mut writer: W, kind: &str, version: u32, num_sections: u32) -> Result<Self> {
        writer.write_all(kind.as_bytes())?;
        writer.write_u32::<LittleEndian>(version)?;
        writer.write_u32::<LittleEndian>(num_sections)?;

        Ok(BinFileWriter {
            writer,
            open_section: None,
        })
    }

    pub fn start_section(&mut self, id: u32) -> Result<()> {
        if self.open_section.is_some() {
            self.end_section()?;
        }

        self.writer.write_u32::<LittleEndian>(id)?;
        let size_position = self.writer.stream_position()?;
        self.writer.write_u64::<LittleEndian>(0)?;
        self.open_section = Some(size_position);

        Ok(())
    }

    pub fn end_section(&mut self) -> Result<()> {
        let size_position = self.open_section.take().ok_or(Error::NoOpenSection)?;

        let end = self.writer.stream_position()?;
        let size = end - size_position - 8;
        self.writer.seek(SeekFrom::Start(size_position))?;
        self.writer.write_u64::<LittleEndian>(size)?;
        self.writer.seek(SeekFrom::Start(end))?;

        Ok(())
    }

    /// Writer for the payload of the currently open section.
    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn finish(mut self) -> Result<W> {
        if self.open_section.is_some() {
            self.end_section()?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
