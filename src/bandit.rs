//! Two-armed Thompson sampling: ask another question or recommend a movie.
//!
//! Each arm keeps a Beta(α, β) posterior over its success probability,
//! starting from the uniform Beta(1, 1). A pull samples both posteriors and
//! plays the larger sample; an update adds the 0/1 reward to α and its
//! complement to β of the pulled arm only. State lives in one session and is
//! never shared.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::{BanditError, BanditResult};

/// A dialogue action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    /// Offer properties to elicit another preference.
    Ask,
    /// Propose the top-ranked movie.
    Recommend,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::Ask, Arm::Recommend];

    fn index(self) -> usize {
        match self {
            Arm::Ask => 0,
            Arm::Recommend => 1,
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::Ask => write!(f, "ask"),
            Arm::Recommend => write!(f, "recommend"),
        }
    }
}

/// Beta(α, β) posterior of one arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posterior {
    /// Successes + 1.
    pub alpha: u64,
    /// Failures + 1.
    pub beta: u64,
}

impl Default for Posterior {
    fn default() -> Self {
        Self { alpha: 1, beta: 1 }
    }
}

impl Posterior {
    /// Posterior mean α / (α + β).
    pub fn mean(&self) -> f64 {
        self.alpha as f64 / (self.alpha + self.beta) as f64
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> BanditResult<f64> {
        let beta = Beta::new(self.alpha as f64, self.beta as f64).map_err(|e| {
            BanditError::InvalidPosterior {
                message: format!("Beta({}, {}): {e}", self.alpha, self.beta),
            }
        })?;
        Ok(beta.sample(rng))
    }
}

/// Posteriors and pull counts of both arms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanditState {
    posteriors: [Posterior; 2],
    pulls: [u64; 2],
}

impl BanditState {
    pub fn posterior(&self, arm: Arm) -> Posterior {
        self.posteriors[arm.index()]
    }

    /// Posterior mean of `arm`.
    pub fn expected(&self, arm: Arm) -> f64 {
        self.posterior(arm).mean()
    }

    /// Times `arm` was played.
    pub fn pulls(&self, arm: Arm) -> u64 {
        self.pulls[arm.index()]
    }

    /// Fold one 0/1 reward into `arm`'s posterior.
    pub fn record(&mut self, arm: Arm, reward: bool) {
        let p = &mut self.posteriors[arm.index()];
        if reward {
            p.alpha += 1;
        } else {
            p.beta += 1;
        }
    }
}

/// Thompson-sampling policy over [`Arm::Ask`] and [`Arm::Recommend`].
#[derive(Debug, Clone)]
pub struct ThompsonBandit<R = StdRng> {
    state: BanditState,
    rng: R,
    /// Arm returned by the last pull and not yet rewarded.
    outstanding: Option<Arm>,
}

impl ThompsonBandit<StdRng> {
    /// Reproducible draws from a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<R: Rng> ThompsonBandit<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            state: BanditState::default(),
            rng,
            outstanding: None,
        }
    }

    pub fn state(&self) -> &BanditState {
        &self.state
    }

    /// Arm awaiting its reward, if any.
    pub fn outstanding(&self) -> Option<Arm> {
        self.outstanding
    }

    /// Sample both posteriors and play the larger sample; ties go to `Ask`.
    pub fn pull(&mut self) -> BanditResult<Arm> {
        let ask = self.state.posterior(Arm::Ask).sample(&mut self.rng)?;
        let recommend = self.state.posterior(Arm::Recommend).sample(&mut self.rng)?;
        let arm = if ask >= recommend {
            Arm::Ask
        } else {
            Arm::Recommend
        };

        self.state.pulls[arm.index()] += 1;
        self.outstanding = Some(arm);
        tracing::debug!(%arm, ask, recommend, "bandit pull");
        Ok(arm)
    }

    /// Reward the outstanding pull. `arm` must be the arm that pull returned.
    pub fn update(&mut self, arm: Arm, reward: bool) -> BanditResult<()> {
        if self.outstanding != Some(arm) {
            return Err(BanditError::UnpulledArm { arm });
        }
        self.outstanding = None;
        self.state.record(arm, reward);

        let p = self.state.posterior(arm);
        tracing::debug!(%arm, reward, alpha = p.alpha, beta = p.beta, "bandit update");
        Ok(())
    }
}
