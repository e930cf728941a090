use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

const ALPHABET: &[u8] = b"0lofzZ198PJQuFOdsSCGMVX6ApDRqvmbihgIt3TBU4eLy7NcrKY5a2xjHwWkEn";
const MIN_LENGTH: usize = 6;

/// Produces short ids, used as disambiguating suffixes for storage keys.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, seed: u64) -> String;
}

/// Deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct ShortIdGenerator {
    length: usize,
}

impl ShortIdGenerator {
    pub fn new() -> Self {
        Self { length: MIN_LENGTH }
    }

    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl Default for ShortIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for ShortIdGenerator {
    fn generate(&self, seed: u64) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..self.length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Stable numeric seed for a string, e.g. a page's permanent id.
pub fn seed_for(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}
