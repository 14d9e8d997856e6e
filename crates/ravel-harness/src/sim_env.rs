//! Seeded environment for reproducible tests.
//!
//! # Invariants
//!
//! - Determinism: the same seed yields the same random octets, so every
//!   built message is reproducible
//! - The clock moves only when a test moves it

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use ravel_core::Environment;

/// Environment backed by a seeded ChaCha20 RNG and a settable clock.
///
/// Clones share the RNG and the clock.
#[derive(Clone)]
pub struct SimEnv {
    seed: u64,
    rng: Arc<Mutex<ChaCha20Rng>>,
    now: Arc<Mutex<SystemTime>>,
}

impl SimEnv {
    /// Clock start, in seconds since the epoch.
    pub const START: u32 = 1_700_000_000;

    /// Environment seeded with `seed`, clock at [`SimEnv::START`].
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            now: Arc::new(Mutex::new(UNIX_EPOCH + Duration::from_secs(u64::from(Self::START)))),
        }
    }

    /// Seed this environment was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Moves the clock to `time`.
    pub fn set_time(&self, time: SystemTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }

    /// Current time in whole seconds since the epoch, as packets store it.
    pub fn unix_now(&self) -> u32 {
        let secs = self.now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    /// Fills `buffer` from the seeded RNG.
    ///
    /// Only message production draws randomness; the consumer reads the clock.
    pub fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    /// `N` random octets.
    pub fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        self.random_bytes(&mut out);
        out
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimEnv").field("seed", &self.seed).field("now", &self.now()).finish()
    }
}
