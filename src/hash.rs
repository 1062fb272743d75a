// src/hash.rs

//! Digests used for change detection
//!
//! Generated artifacts record SHA-256 digests in their `#@ auto` lines so a
//! packager can check them with `sha256sum`. Kit item fingerprints use
//! XXH128 instead; they are recomputed over whole subtrees on every archive
//! run and never leave drydock.

use sha2::{Digest, Sha256};
use std::io::{self, Read};
use xxhash_rust::xxh3::Xxh3;

const READ_CHUNK: usize = 64 * 1024;

/// Digest function behind a [`Hasher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Xxh128,
}

/// Streaming digest, rendered as lowercase hex
pub enum Hasher {
    Sha256(Sha256),
    Xxh128(Box<Xxh3>),
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            HashAlgorithm::Xxh128 => Self::Xxh128(Box::default()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(state) => state.update(bytes),
            Self::Xxh128(state) => state.update(bytes),
        }
    }

    /// Feed `bytes` preceded by their length, so `("ab", "c")` and
    /// `("a", "bc")` digest differently.
    pub fn update_field(&mut self, bytes: &[u8]) {
        self.update(&(bytes.len() as u64).to_le_bytes());
        self.update(bytes);
    }

    pub fn finalize(self) -> String {
        match self {
            Self::Sha256(state) => hex::encode(state.finalize()),
            Self::Xxh128(state) => format!("{:032x}", state.digest128()),
        }
    }
}

/// Digest everything `reader` yields until EOF
pub fn hash_reader<R: Read>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<String> {
    let mut hasher = Hasher::new(algorithm);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk)? {
            0 => return Ok(hasher.finalize()),
            n => hasher.update(&chunk[..n]),
        }
    }
}

/// SHA-256 of `bytes` as hex
pub fn sha256(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new(HashAlgorithm::Sha256);
    hasher.update(bytes);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_sha256_matches_sha256sum() {
        assert_eq!(
            sha256(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_xxh128_is_32_hex_digits() {
        let mut hasher = Hasher::new(HashAlgorithm::Xxh128);
        hasher.update(b"kit/m2/junit");
        let digest = hasher.finalize();
        assert_eq!(digest.len(), 32);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_split_updates_equal_single_update() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Xxh128] {
            let mut split = Hasher::new(algorithm);
            split.update(b"dry");
            split.update(b"dock");
            let mut whole = Hasher::new(algorithm);
            whole.update(b"drydock");
            assert_eq!(split.finalize(), whole.finalize());
        }
    }

    #[test]
    fn test_fields_do_not_run_together() {
        let mut a = Hasher::new(HashAlgorithm::Xxh128);
        a.update_field(b"ab");
        a.update_field(b"c");
        let mut b = Hasher::new(HashAlgorithm::Xxh128);
        b.update_field(b"a");
        b.update_field(b"bc");
        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_reader_spanning_several_chunks() {
        let data = vec![7u8; READ_CHUNK * 2 + 11];
        let digest = hash_reader(HashAlgorithm::Sha256, &mut Cursor::new(&data)).unwrap();
        assert_eq!(digest, sha256(&data));
    }
}
