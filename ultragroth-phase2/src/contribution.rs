use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::curve::{G1Encoding, G2Encoding};
use crate::errors::{Error, Result};

/// Longest contribution name kept, in bytes.
pub const MAX_NAME_LENGTH: usize = 64;

pub const MIN_ITERATIONS_EXP: u32 = 10;
pub const MAX_ITERATIONS_EXP: u32 = 63;

const PARAM_NAME: u8 = 1;
const PARAM_ITERATIONS_EXP: u8 = 2;
const PARAM_BEACON_HASH: u8 = 3;

const TYPE_GENERIC: u32 = 0;
const TYPE_BEACON: u32 = 1;

/// Public half of one delta channel's contribution. This allows others to
/// verify that you contributed without learning the secret scalar.
///
/// Points are kept as they were written. The transcript of later
/// contributions covers these exact bytes, and verification decodes them
/// only when it needs the group elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaPublicKey {
    /// This is the delta (in G1) after the transformation, kept so that we
    /// can check correctness of the public keys without having the entire
    /// interstitial parameters for each contribution.
    pub delta_after: G1Encoding,

    /// Random element chosen by the contributor.
    pub g1_s: G1Encoding,

    /// That element, taken to the contributor's secret delta.
    pub g1_sx: G1Encoding,

    /// `g2_sp` is H(transcript), `g2_spx` proves knowledge of delta
    pub g2_spx: G2Encoding,

    /// Hash of the transcript (used for mapping to `g2_sp`)
    pub transcript: [u8; 64],
}

impl DeltaPublicKey {
    /// Writes `delta_after ∥ g1_s ∥ g1_sx ∥ g2_spx ∥ transcript`. The same
    /// bytes are fed to transcript hashes.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        self.delta_after.write(&mut writer)?;
        self.g1_s.write(&mut writer)?;
        self.g1_sx.write(&mut writer)?;
        self.g2_spx.write(&mut writer)?;
        writer.write_all(&self.transcript)?;

        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<DeltaPublicKey> {
        let delta_after = G1Encoding::read(&mut reader)?;
        let g1_s = G1Encoding::read(&mut reader)?;
        let g1_sx = G1Encoding::read(&mut reader)?;
        let g2_spx = G2Encoding::read(&mut reader)?;

        let mut transcript = [0u8; 64];
        reader.read_exact(&mut transcript)?;

        Ok(DeltaPublicKey {
            delta_after,
            g1_s,
            g1_sx,
            g2_spx,
            transcript,
        })
    }
}

/// How a contribution's randomness was produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContributionKind {
    /// Secret randomness from a participant.
    Generic,
    /// Randomness anyone can rederive from a public beacon value.
    Beacon {
        beacon_hash: Vec<u8>,
        iterations_exp: u8,
    },
}

/// One step of the ceremony: the effect of a participant (or the beacon)
/// on both delta channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contribution {
    pub delta1: DeltaPublicKey,
    pub delta2: DeltaPublicKey,
    pub kind: ContributionKind,
    pub name: Option<String>,
}

impl Contribution {
    pub fn is_beacon(&self) -> bool {
        matches!(self.kind, ContributionKind::Beacon { .. })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        self.delta1.write(&mut writer)?;
        self.delta2.write(&mut writer)?;

        let mut params = vec![];
        if let Some(name) = &self.name {
            let name = truncate_name(name);
            params.push(PARAM_NAME);
            params.push(name.len() as u8);
            params.extend_from_slice(name.as_bytes());
        }

        match &self.kind {
            ContributionKind::Generic => {
                writer.write_u32::<LittleEndian>(TYPE_GENERIC)?;
            }
            ContributionKind::Beacon {
                beacon_hash,
                iterations_exp,
            } => {
                writer.write_u32::<LittleEndian>(TYPE_BEACON)?;

                params.push(PARAM_ITERATIONS_EXP);
                params.push(*iterations_exp);

                params.push(PARAM_BEACON_HASH);
                params.push(beacon_hash.len() as u8);
                params.extend_from_slice(beacon_hash);
            }
        }

        writer.write_u32::<LittleEndian>(params.len() as u32)?;
        writer.write_all(&params)?;

        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Contribution> {
        let delta1 = DeltaPublicKey::read(&mut reader)?;
        let delta2 = DeltaPublicKey::read(&mut reader)?;
        let contribution_type = reader.read_u32::<LittleEndian>()?;

        let params_length = reader.read_u32::<LittleEndian>()?;
        let mut params = vec![];
        reader
            .by_ref()
            .take(u64::from(params_length))
            .read_to_end(&mut params)?;
        if params.len() != params_length as usize {
            return Err(Error::InvalidParameters(
                "parameter block runs past the end of the contribution",
            ));
        }

        let mut name = None;
        let mut iterations_exp = None;
        let mut beacon_hash = None;

        let mut cursor = &params[..];
        let mut last_tag = 0;
        while !cursor.is_empty() {
            let tag = cursor.read_u8()?;
            if tag <= last_tag {
                return Err(Error::InvalidParameters(
                    "parameters in the contribution must be sorted",
                ));
            }
            last_tag = tag;

            match tag {
                PARAM_NAME => {
                    let bytes = read_length_prefixed(&mut cursor)?;
                    let value = String::from_utf8(bytes)
                        .map_err(|_| Error::InvalidParameters("name is not valid UTF-8"))?;
                    name = Some(value);
                }
                PARAM_ITERATIONS_EXP => {
                    iterations_exp = Some(cursor.read_u8().map_err(truncated)?);
                }
                PARAM_BEACON_HASH => {
                    beacon_hash = Some(read_length_prefixed(&mut cursor)?);
                }
                _ => return Err(Error::InvalidParameters("parameter not recognized")),
            }
        }

        let kind = match (contribution_type, iterations_exp, beacon_hash) {
            (TYPE_GENERIC, None, None) => ContributionKind::Generic,
            (TYPE_BEACON, Some(iterations_exp), Some(beacon_hash)) => ContributionKind::Beacon {
                beacon_hash,
                iterations_exp,
            },
            (TYPE_GENERIC, _, _) => {
                return Err(Error::InvalidParameters(
                    "beacon parameters on a generic contribution",
                ))
            }
            (TYPE_BEACON, _, _) => {
                return Err(Error::InvalidParameters(
                    "beacon contribution is missing its parameters",
                ))
            }
            _ => return Err(Error::InvalidParameters("unknown contribution type")),
        };

        Ok(Contribution {
            delta1,
            delta2,
            kind,
            name,
        })
    }
}

/// Cut a name down to at most `MAX_NAME_LENGTH` bytes without splitting a
/// character.
pub fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LENGTH {
        return name;
    }

    let mut end = MAX_NAME_LENGTH;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn read_length_prefixed(cursor: &mut &[u8]) -> Result<Vec<u8>> {
    let len = cursor.read_u8().map_err(truncated)? as usize;
    let mut bytes = vec![0u8; len];
    cursor.read_exact(&mut bytes).map_err(truncated)?;
    Ok(bytes)
}

fn truncated(_: io::Error) -> Error {
    Error::InvalidParameters("parameters do not match their declared length")
}
