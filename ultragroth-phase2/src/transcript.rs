use std::io::{self, Write};

use blake2::{Blake2b512, Digest};

use crate::contribution::{Contribution, DeltaPublicKey};
use crate::curve::G1Encoding;

/// Abstraction over a writer which hashes the data being written.
///
/// Cloning a `HashWriter` forks the hash state: the clone continues
/// independently of the original, which is how a candidate transcript is
/// computed without disturbing the running one.
#[derive(Clone)]
pub struct HashWriter {
    hasher: Blake2b512,
}

impl HashWriter {
    pub fn new() -> Self {
        HashWriter {
            hasher: Blake2b512::new(),
        }
    }

    /// Hash of everything written so far. The writer stays usable.
    pub fn digest(&self) -> [u8; 64] {
        let mut tmp = [0u8; 64];
        tmp.copy_from_slice(self.hasher.clone().finalize().as_ref());
        tmp
    }

    /// Destroy this writer and return the hash of what was written.
    pub fn into_hash(self) -> [u8; 64] {
        let mut tmp = [0u8; 64];
        tmp.copy_from_slice(self.hasher.finalize().as_ref());
        tmp
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        HashWriter::new()
    }
}

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Which of the two delta trapdoors a transcript belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Delta1,
    Delta2,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Delta1, Channel::Delta2];

    pub fn of(self, contribution: &Contribution) -> &DeltaPublicKey {
        match self {
            Channel::Delta1 => &contribution.delta1,
            Channel::Delta2 => &contribution.delta2,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Delta1 => write!(f, "delta1"),
            Channel::Delta2 => write!(f, "delta2"),
        }
    }
}

/// Running transcript of one delta channel: `cs_hash` followed by the
/// public key of every contribution accepted so far.
#[derive(Clone)]
pub struct TranscriptHasher {
    channel: Channel,
    sink: HashWriter,
}

impl TranscriptHasher {
    pub fn new(channel: Channel, cs_hash: &[u8; 64]) -> Self {
        let mut sink = HashWriter::new();
        sink.hasher.update(cs_hash);
        TranscriptHasher { channel, sink }
    }

    /// Seed a hasher with `cs_hash` and replay `contributions` into it.
    pub fn replay(channel: Channel, cs_hash: &[u8; 64], contributions: &[Contribution]) -> Self {
        let mut hasher = TranscriptHasher::new(channel, cs_hash);
        for contribution in contributions {
            hasher.absorb(contribution);
        }
        hasher
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Append this channel's public record of a contribution.
    pub fn absorb(&mut self, contribution: &Contribution) {
        self.channel
            .of(contribution)
            .write(&mut self.sink)
            .expect("writing to a hasher never fails");
    }

    /// Transcript a new contribution with commitment `(s, s_delta)` would
    /// carry, without advancing this hasher.
    pub fn transcript_for(&self, s: &G1Encoding, s_delta: &G1Encoding) -> [u8; 64] {
        let mut ours = self.sink.clone();
        ours.hasher.update(s.0);
        ours.hasher.update(s_delta.0);
        ours.into_hash()
    }
}

/// Hash bound to a contribution, shown to its contributor and listed by
/// the verifier.
pub fn contribution_hash(contribution: &Contribution) -> [u8; 64] {
    let mut sink = HashWriter::new();
    contribution
        .delta1
        .write(&mut sink)
        .expect("writing to a hasher never fails");
    contribution
        .delta2
        .write(&mut sink)
        .expect("writing to a hasher never fails");
    sink.into_hash()
}

/// Check whether `my_contribution` appears among the hashes returned by
/// verification.
pub fn contains_contribution(contributions: &[[u8; 64]], my_contribution: &[u8; 64]) -> bool {
    contributions
        .iter()
        .any(|contrib| contrib[..] == my_contribution[..])
}
