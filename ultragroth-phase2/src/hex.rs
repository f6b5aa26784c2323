//! Hex text for beacon values and for hashes shown to participants.

use std::fmt::Write;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HexError {
    #[error("odd number of hex digits")]
    OddLength,
    #[error("{0:?} is not a hex digit")]
    InvalidDigit(char),
}

/// Lowercase hex, two digits per byte.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut hex, b| {
            // writing to a String cannot fail
            let _ = write!(hex, "{:02x}", b);
            hex
        })
}

/// Parse hex in either case. The whole string must be digits.
pub fn hex_to_vec_bytes(hex: &str) -> Result<Vec<u8>, HexError> {
    let digits = hex
        .chars()
        .map(|c| c.to_digit(16).map(|d| d as u8).ok_or(HexError::InvalidDigit(c)))
        .collect::<Result<Vec<u8>, _>>()?;

    if digits.len() % 2 != 0 {
        return Err(HexError::OddLength);
    }

    Ok(digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

/// Render a hash the way it is shown to ceremony participants: four rows
/// of sixteen bytes, split in groups of four.
pub fn format_hash(hash: &[u8], title: &str) -> String {
    let mut out = String::from(title);

    for line in hash.chunks(16) {
        out.push_str("\n\t\t");
        for section in line.chunks(4) {
            out.push_str(&bytes_to_hex(section));
            out.push(' ');
        }
    }

    out
}
