//! Environment abstraction for deterministic testing.
//!
//! Decouples engine logic from system resources (wall clock, randomness).
//! The engine stamps outgoing messages with a local-issue timestamp and a
//! random correlation key; routing both through this trait lets tests pin
//! the clock and the key sequence.

/// Abstract environment providing time and randomness.
///
/// Implementations MUST guarantee:
///
/// - `now_millis()` never goes backwards within a single execution context
/// - `random_bytes()` uses a secure entropy source in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time as unix milliseconds.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Convenience for correlation keys and subscriber IDs.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment backed by the system clock and OS entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore as _;
        rand::thread_rng().fill_bytes(buffer);
    }
}

/// Test utilities: a deterministic environment with a settable clock.
pub mod test_utils {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::Environment;

    /// Deterministic environment for tests.
    ///
    /// The clock starts at a fixed epoch and only moves when the test
    /// advances it; randomness is a seeded counter-based generator, so
    /// correlation keys are reproducible.
    #[derive(Debug, Clone)]
    pub struct MockEnv {
        now: Arc<AtomicU64>,
        rng_state: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create a mock environment at time zero with a default seed.
        pub fn new() -> Self {
            Self::with_seed(0x5eed_0000_0000_0001)
        }

        /// Create a mock environment with an explicit RNG seed.
        pub fn with_seed(seed: u64) -> Self {
            Self {
                now: Arc::new(AtomicU64::new(1_000_000)),
                rng_state: Arc::new(AtomicU64::new(seed)),
            }
        }

        /// Advance the clock by `millis`.
        pub fn advance(&self, millis: u64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }

        /// Set the clock to an absolute time.
        pub fn set_now(&self, millis: u64) {
            self.now.store(millis, Ordering::SeqCst);
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        fn now_millis(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // xorshift64* keeps the sequence reproducible per seed.
            for byte in buffer.iter_mut() {
                let mut x = self.rng_state.load(Ordering::SeqCst);
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                self.rng_state.store(x, Ordering::SeqCst);
                *byte = (x.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 56) as u8;
            }
        }
    }

}
