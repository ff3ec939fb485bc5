//! Keyed deterministic randomness.
//!
//! Every draw derives a fresh ChaCha stream from the world seed, a stream id and a key such as
//! `(hour bucket, tile)`. No generator state lives outside [`crate::world::GameState`], so a
//! restored save draws exactly what the original run would have drawn.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Independent random streams. Values are part of the save-compatibility contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Stream {
    MarketPairs = 1,
    MarketPrice = 2,
    Deposits = 3,
    GreatPeople = 4,
}

/// Mixes the master seed with a stream id and a key.
pub fn derive_seed(master: u64, stream: Stream, key: u64) -> u64 {
    let mut seed = master;
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed ^= (stream as u64).wrapping_mul(1103515245);
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed ^= key.wrapping_mul(48271);
    seed
}

/// 64-bit FNV-1a of a textual key.
pub fn hash_key(key: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    key.bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

pub fn keyed_rng(master: u64, stream: Stream, key: &str) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_seed(master, stream, hash_key(key)))
}

/// A uniform value in `[0, 1)` fixed by `(master, stream, key)`.
pub fn unit(master: u64, stream: Stream, key: &str) -> f64 {
    keyed_rng(master, stream, key).gen::<f64>()
}

pub fn shuffled<T: Clone>(items: &[T], rng: &mut ChaCha8Rng) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}
