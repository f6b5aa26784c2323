//! # Phase 2 MPC for UltraGroth proving keys
//!
//! An UltraGroth proving key carries two secret deltas: `delta_c1` guards
//! the first-round commitment points and `delta_c2` guards the second-round
//! points together with the H query. This crate runs the multi-party
//! ceremony that re-randomizes both, so the key is safe as long as a single
//! participant destroys their secrets.
//!
//! ## Contributing
//!
//! Each participant reads the latest key and writes a new one:
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let old = BufReader::new(File::open("circuit_0001.zkey")?);
//! let new = File::create("circuit_0002.zkey")?;
//! let hash = ultragroth_phase2::contribute(old, new, &mut rand::rngs::OsRng, Some("alice"))?;
//!
//! println!("{}", ultragroth_phase2::format_hash(&hash, "Contribution Hash: "));
//! # Ok::<(), ultragroth_phase2::Error>(())
//! ```
//!
//! The returned hash identifies the contribution. Keep it around: once the
//! ceremony is over, it must appear in the audit trail of the final key.
//!
//! ## Finishing
//!
//! The last step is usually a [`beacon`] contribution, whose randomness
//! comes from a public value chosen ahead of time, iterated with SHA-256.
//! Anyone can recompute it.
//!
//! ## Verifying
//!
//! [`verify_from_init`] replays the whole ceremony against the initial key
//! and a powers of tau file. [`verify_transform`] checks a single step.
//! Both return a [`Verification`]; a key that fails a check is reported
//! there rather than as an [`Error`].

pub mod binfile;
pub mod contribute;
pub mod contribution;
pub mod curve;
pub mod errors;
pub mod fft;
pub mod header;
pub mod hex;
pub mod multicore;
pub mod params;
pub mod reference;
pub mod rng;
pub mod transcript;
pub mod verify;

#[cfg(test)]
mod test_util;

pub use contribute::{beacon, contribute};
pub use errors::{Error, Result};
pub use hex::format_hash;
pub use params::{KeyFile, MPCParameters};
pub use transcript::contains_contribution;
pub use verify::{verify_from_init, verify_transform, AuditTrail, Verification};
