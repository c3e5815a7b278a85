//! Replayable pseudo-random byte stream.

use blkscrub_types::Seed;

/// Deterministic PRNG behind the random fill method.
///
/// xorshift64* with the initial state expanded from the seed through one
/// splitmix64 step. Not cryptographic; the only requirement is that
/// [`PatternRng::reseed`] with the same seed replays the exact same stream.
#[derive(Debug, Clone)]
pub struct PatternRng {
    seed: Seed,
    state: u64,
}

impl PatternRng {
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            state: expand_seed(seed.0),
        }
    }

    /// Seed the stream was last initialized with.
    #[must_use]
    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Restart the stream from `seed`.
    pub fn reseed(&mut self, seed: Seed) {
        *self = Self::new(seed);
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Fill `buf` from the stream, eight bytes per step.
    pub fn fill_bytes(&mut self, buf: &mut [u8]) {
        let mut chunks = buf.chunks_exact_mut(8);
        for chunk in &mut chunks {
            chunk.copy_from_slice(&self.next_u64().to_le_bytes());
        }
        let tail = chunks.into_remainder();
        if !tail.is_empty() {
            let word = self.next_u64().to_le_bytes();
            tail.copy_from_slice(&word[..tail.len()]);
        }
    }
}

/// splitmix64 finalizer. Never maps to zero for the states xorshift cares
/// about, so a zero seed still produces a live stream.
fn expand_seed(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    let z = z ^ (z >> 31);
    if z == 0 { 0x9E37_79B9_7F4A_7C15 } else { z }
}
