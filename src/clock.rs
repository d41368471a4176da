use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic time source in seconds.
///
/// The transmission queue is the tick owner: it calls `tick(dt)` once per
/// `process(dt)` and reads `now()` for every deadline. Other components only
/// read `now()` to timestamp what they produce.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;

    /// Advance simulated time. Wall clocks ignore this.
    fn tick(&self, _dt: f64) {}
}

// ── Simulated clock ──────────────────────────────────────────────────

/// Lock-free f64 seconds shared between every component of one engine.
#[derive(Clone, Default)]
pub struct SimClock(Arc<AtomicU64>);

impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(seconds: f64) -> Self {
        Self(Arc::new(AtomicU64::new(seconds.to_bits())))
    }

    pub fn set(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, dt: f64) {
        // Single tick owner, so load+store is enough.
        let now = self.now() + dt.max(0.0);
        self.set(now);
    }
}

impl Clock for SimClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn tick(&self, dt: f64) {
        self.advance(dt);
    }
}

// ── Wall clock ───────────────────────────────────────────────────────

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}
