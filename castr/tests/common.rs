#![allow(dead_code)]
use rand::{rngs::StdRng, RngCore, SeedableRng};

use castr::api::EncodeOptions;
use castr::chunker;

/// Deterministic pseudo random data.
pub fn test_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Small chunks so tests get plenty of them from little data.
pub fn small_chunk_config() -> chunker::Config {
    chunker::Config::new(64, 256, 1024).unwrap()
}

pub fn encode_options() -> EncodeOptions {
    EncodeOptions {
        chunker_config: small_chunk_config(),
        ..EncodeOptions::default()
    }
}
