use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a task leaving `Testing` completes or errors.
pub trait OutcomeSource: Send + Sync {
    fn succeeds(&self) -> bool;
}

/// Bernoulli draw with a fixed success rate.
pub struct RandomOutcome {
    success_rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomOutcome {
    pub fn new(success_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            rng: Mutex::new(rng),
        }
    }
}

impl OutcomeSource for RandomOutcome {
    fn succeeds(&self) -> bool {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_bool(self.success_rate)
    }
}

/// Always the same answer.
pub struct FixedOutcome(pub bool);

impl OutcomeSource for FixedOutcome {
    fn succeeds(&self) -> bool {
        self.0
    }
}
