// Deterministic, portable pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
// The generator core is hand-rolled so that a given seed produces the same
// melody on every platform and compiler version.
//
// Two things live here:
// - `RandomSource`: the small trait the melody generator draws from. The
//   generator never touches a global RNG; callers hand it a source, which
//   is how tests script exact draws and how the CLI makes `--seed` runs
//   reproducible.
// - `MelodyRng`: the production `RandomSource`, seeded from a `u64` or from
//   OS entropy via `getrandom`.
//
// **Determinism.** Every method on `MelodyRng` must produce identical output
// given the same prior state. Do not use floating-point arithmetic in the
// core generator.

/// A source of uniform random numbers.
///
/// Implementors supply `next_f64`; the helpers are defined in terms of it so
/// a scripted source that only returns chosen floats drives every decision.
pub trait RandomSource {
    /// A uniform `f64` in [0, 1).
    fn next_f64(&mut self) -> f64;

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// A uniform index in `[0, n)`, computed as `floor(u * n)`.
    ///
    /// Returns 0 when `n` is 0.
    fn below(&mut self, n: usize) -> usize {
        let index = (self.next_f64() * n as f64) as usize;
        index.min(n.saturating_sub(1))
    }

    /// A uniform `f64` in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }
}

/// Xoshiro256++ PRNG used for melody generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MelodyRng {
    s: [u64; 4],
}

impl MelodyRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// Uses SplitMix64 to expand the seed into the 256-bit internal state.
    /// Two `MelodyRng` instances created with the same seed will produce
    /// identical output sequences.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Create a PRNG seeded from OS entropy.
    ///
    /// Returns the seed alongside the generator so the caller can log it and
    /// replay the run with `MelodyRng::new`.
    pub fn from_entropy() -> Result<(Self, u64), getrandom::Error> {
        let seed = entropy_seed()?;
        Ok((Self::new(seed), seed))
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }
}

impl RandomSource for MelodyRng {
    /// Uses the upper 53 bits of a `u64` to fill the mantissa of an f64.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Draw a fresh `u64` seed from the operating system.
pub fn entropy_seed() -> Result<u64, getrandom::Error> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

/// SplitMix64, used only for seeding xoshiro256++ from a single `u64`.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
