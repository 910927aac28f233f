//! # Referral Code Generation
//!
//! Generated codes are 8 characters drawn uniformly from `A-Z0-9`
//! (36^8 ≈ 2.8 × 10^12 possibilities). Uniqueness is enforced by storage;
//! the caller retries a bounded number of times on collision.

use rand::Rng;

use crate::GENERATED_CODE_LEN;

/// Alphabet for generated codes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draws one code from `rng`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Source of candidate codes.
///
/// The engine asks for a fresh candidate on every attempt; tests plug in a
/// deterministic source to force collisions.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// Thread-local RNG backed source used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn next_code(&self) -> String {
        generate_code(&mut rand::thread_rng())
    }
}
