#![forbid(unsafe_code)]
//! Block fill patterns.
//!
//! A pattern is exactly one block long. The fixed pattern is a pure function
//! of the byte position; the random pattern is drawn from a [`PatternRng`]
//! that the caller owns and can rewind, which is what lets the verify pass
//! regenerate byte-for-byte what the write pass produced.

mod rng;

pub use rng::PatternRng;

use blkscrub_types::{FillMethod, Seed};
use std::fmt::Write as _;

/// Fill `buf[..size]` with the pattern for `method`.
///
/// `Fixed` writes `i mod 256` at offset `i` and leaves `rng` untouched.
/// `Random` draws `size` bytes from `rng`, advancing it.
///
/// # Panics
///
/// If `size > buf.len()`.
pub fn generate(buf: &mut [u8], size: usize, method: FillMethod, rng: &mut PatternRng) {
    let region = &mut buf[..size];
    match method {
        FillMethod::Fixed => fill_fixed(region),
        FillMethod::Random => rng.fill_bytes(region),
    }
}

/// `byte[i] = i mod 256`.
pub fn fill_fixed(buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = (i & 0xFF) as u8;
    }
}

/// Pattern source for one scrub session: a fill method plus the stream it
/// draws from.
#[derive(Debug, Clone)]
pub struct PatternGenerator {
    method: FillMethod,
    rng: PatternRng,
}

impl PatternGenerator {
    #[must_use]
    pub fn new(method: FillMethod, seed: Seed) -> Self {
        Self {
            method,
            rng: PatternRng::new(seed),
        }
    }

    #[must_use]
    pub fn seed(&self) -> Seed {
        self.rng.seed()
    }

    /// Rewind the stream to `seed`.
    pub fn reseed(&mut self, seed: Seed) {
        self.rng.reseed(seed);
    }

    /// Fill the whole of `buf` with the next pattern.
    pub fn generate(&mut self, buf: &mut [u8]) {
        let size = buf.len();
        generate(buf, size, self.method, &mut self.rng);
    }

    /// Whether every block gets a fresh pattern. `Fixed` reuses one buffer
    /// for the whole session.
    #[must_use]
    pub fn varies_per_block(&self) -> bool {
        self.method == FillMethod::Random
    }
}

/// Hex dump, sixteen space-separated bytes per line.
#[must_use]
pub fn hex_dump(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len() * 3 + buf.len() / 16 + 1);
    for line in buf.chunks(16) {
        for (i, byte) in line.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{byte:02X}");
        }
        out.push('\n');
    }
    out
}
