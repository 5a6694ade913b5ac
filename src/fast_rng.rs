// PCG-LCG random number generator with per-event stream selection.
//
// Each event gets its own stream, obtained by jumping the base LCG ahead by
// `event_id * STRIDE` steps, so a given (seed, event) pair always produces the
// same numbers whichever worker processes the event.

use rand_core::impls;
use rand::RngCore;

/// LCG multiplier
const PRN_MULT: u64 = 6364136223846793005;
/// LCG additive constant
const PRN_ADD: u64 = 1442695040888963407;
/// Number of draws reserved for each event's stream
pub const STRIDE: u64 = 152917;

/// Small, copyable PCG generator.
///
/// Uses an LCG as the base generator with the RXS-M-XS output permutation.
#[derive(Clone, Copy, Debug)]
pub struct FastRng {
    seed: u64,
}

impl FastRng {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Generator for one event of a run seeded with `seed`.
    pub fn for_event(seed: u64, event_id: u64) -> Self {
        Self::new(future_seed(event_id.wrapping_mul(STRIDE), seed))
    }

    /// Uniform f64 in [0, 1)
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        // Top 53 bits scaled by 2^-53 so the result stays below 1
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    #[inline(always)]
    fn permute(state: u64) -> u64 {
        let word = ((state >> ((state >> 59) + 5)) ^ state).wrapping_mul(12605985483714917081);
        (word >> 43) ^ word
    }
}

/// LCG state after `n` steps from `seed`, in O(log n).
pub fn future_seed(mut n: u64, seed: u64) -> u64 {
    let mut g = PRN_MULT;
    let mut c = PRN_ADD;
    let mut g_new = 1u64;
    let mut c_new = 0u64;
    while n > 0 {
        if n & 1 == 1 {
            g_new = g_new.wrapping_mul(g);
            c_new = c_new.wrapping_mul(g).wrapping_add(c);
        }
        c = g.wrapping_add(1).wrapping_mul(c);
        g = g.wrapping_mul(g);
        n >>= 1;
    }
    g_new.wrapping_mul(seed).wrapping_add(c_new)
}

impl RngCore for FastRng {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.seed = PRN_MULT.wrapping_mul(self.seed).wrapping_add(PRN_ADD);
        Self::permute(self.seed)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
