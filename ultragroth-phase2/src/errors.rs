use std::io;

use thiserror::Error;

use crate::hex::HexError;

/// Fatal and input-validation errors. A failed ceremony audit is not an
/// error; see [`crate::verify::Verification`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid file type: expected `{expected}`")]
    InvalidFileType { expected: String },
    #[error("unsupported {kind} file version {version}")]
    UnsupportedVersion { kind: String, version: u32 },
    #[error("missing section {0}")]
    MissingSection(u32),
    #[error("section {0} appears more than once")]
    DuplicateSection(u32),
    #[error("sections are not in the expected order")]
    SectionOrder,
    #[error("section {section} has size {actual}, expected {expected}")]
    SectionSize {
        section: u32,
        expected: u64,
        actual: u64,
    },
    #[error("no section is open")]
    NoOpenSection,
    #[error("protocol {0} is not UltraGroth")]
    NotUltraGroth(u32),
    #[error("key is not defined over BLS12-381")]
    UnsupportedCurve,
    #[error("files are defined over different curves")]
    CurveMismatch,
    #[error("invalid point encoding in {0}")]
    InvalidPoint(&'static str),
    #[error("domain size {0} is not a supported power of two")]
    InvalidDomainSize(u32),
    #[error("reference file holds {available} tau powers, {needed} needed")]
    ReferenceTooSmall { needed: u64, available: u64 },
    #[error("invalid beacon hash: {0}")]
    InvalidBeaconHash(String),
    #[error("invalid numIterationsExp {0}, must be between 10 and 63")]
    InvalidIterationsExp(u32),
    #[error("invalid contribution parameters: {0}")]
    InvalidParameters(&'static str),
}

impl From<HexError> for Error {
    fn from(e: HexError) -> Error {
        Error::InvalidBeaconHash(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
