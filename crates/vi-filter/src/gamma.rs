//! Gamma correction and its optional ±1 dither.

use crate::registers::ViControl;

/// A small xorshift PRNG standing in for the source's process-wide `irand`.
/// Carried as a field of `ViCore` rather than a true global.
pub struct DitherRng(u32);

impl DitherRng {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    /// The current generator state, usable as a seed for a fresh
    /// `DitherRng` (e.g. one per worker thread).
    #[must_use]
    pub fn state(&self) -> u32 {
        self.0
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// One of `{-1, 0, 1}`.
    fn next_dither(&mut self) -> i32 {
        (self.next_u32() % 3) as i32 - 1
    }
}

impl Default for DitherRng {
    fn default() -> Self {
        Self::new(0x1234_5678)
    }
}

/// Precomputed sqrt-response gamma LUT, matching the original's 256-entry
/// table built once at `vi_init`.
pub struct GammaTables {
    lut: [u8; 256],
}

impl GammaTables {
    #[must_use]
    pub fn init() -> Self {
        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let normalized = i as f64 / 255.0;
            *entry = (normalized.sqrt() * 255.0).round() as u8;
        }
        Self { lut }
    }

    fn lookup(&self, channel: u8) -> u8 {
        self.lut[channel as usize]
    }

    /// Apply dither (if enabled) then the gamma LUT (if enabled), in that
    /// order, to each of R, G, B.
    #[must_use]
    pub fn apply(&self, rng: &mut DitherRng, r: u8, g: u8, b: u8, ctrl: &ViControl) -> (u8, u8, u8) {
        let (mut r, mut g, mut b) = (r, g, b);

        if ctrl.gamma_dither_enable {
            r = dither_channel(rng, r);
            g = dither_channel(rng, g);
            b = dither_channel(rng, b);
        }

        if ctrl.gamma_enable {
            r = self.lookup(r);
            g = self.lookup(g);
            b = self.lookup(b);
        }

        (r, g, b)
    }
}

fn dither_channel(rng: &mut DitherRng, channel: u8) -> u8 {
    (i32::from(channel) + rng.next_dither()).clamp(0, 255) as u8
}

impl Default for GammaTables {
    fn default() -> Self {
        Self::init()
    }
}
