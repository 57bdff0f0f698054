//! Simulation context: virtual clock and deterministic frame timing.

use crate::error::SimError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Frame-time multipliers are kept inside this range so a jittered frame
/// never runs backwards or stalls for seconds.
const JITTER_CLAMP: (f64, f64) = (0.25, 4.0);

/// Deterministic time source for a simulation run.
///
/// Time only advances when [`SimContext::advance`] is called. Frame lengths
/// are `1 / tick_rate_hz`, optionally perturbed by seeded Gaussian jitter so
/// trackers see the uneven frame times a real game loop produces.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time in seconds
    time_secs: f64,

    /// Nominal frame length in seconds
    base_dt: f64,

    /// Relative frame-time noise (None = fixed step)
    jitter: Option<Normal<f64>>,

    /// RNG for frame jitter
    rng: ChaCha8Rng,
}

impl SimContext {
    /// Creates a fixed-step context.
    pub fn new(seed: u64, tick_rate_hz: u32) -> Self {
        Self {
            seed,
            time_secs: 0.0,
            base_dt: 1.0 / tick_rate_hz.max(1) as f64,
            jitter: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Enables Gaussian frame jitter with relative standard deviation `std_dev`.
    pub fn with_jitter(mut self, std_dev: f64) -> Result<Self, SimError> {
        if std_dev == 0.0 {
            return Ok(self);
        }
        let normal = Normal::new(1.0, std_dev)
            .map_err(|e| SimError::InvalidConfig(format!("frame_jitter: {}", e)))?;
        self.jitter = Some(normal);
        Ok(self)
    }

    /// Draws the length of the next frame.
    pub fn next_frame_dt(&mut self) -> f64 {
        match &self.jitter {
            Some(normal) => {
                let factor = normal
                    .sample(&mut self.rng)
                    .clamp(JITTER_CLAMP.0, JITTER_CLAMP.1);
                self.base_dt * factor
            }
            None => self.base_dt,
        }
    }

    /// Advances virtual time by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.time_secs += dt;
    }

    /// Returns the current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.time_secs
    }

    pub fn base_dt(&self) -> f64 {
        self.base_dt
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}
