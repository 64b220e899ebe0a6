//! Ranking of candidate properties and movies.
//!
//! - **Relevance** ([`relevance`]): entropy + local salience + global salience per (property, value)
//! - **Walk** ([`walk`]): personalized PageRank over the interaction graph
//! - **Ranker** ([`ranker`]): movie ranking and the walk-salience property variant
//!
//! All rankings are sorted by score descending and keep input order on ties.

pub mod ranker;
pub mod relevance;
pub mod walk;

use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};
use crate::graph::{MovieId, PropertyValue};

pub use ranker::GraphRanker;
pub use relevance::RelevanceScorer;
pub use walk::{Personalization, WalkConfig, WalkGraph, WalkScores};

/// Weights of the three terms of a property's composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Weight of the property's entropy z-score.
    pub entropy: f64,
    /// Weight of the pair's salience within the candidate graph.
    pub local: f64,
    /// Weight of the pair's salience across the whole corpus.
    pub global: f64,
}

impl ScoreWeights {
    pub const fn new(entropy: f64, local: f64, global: f64) -> Self {
        Self {
            entropy,
            local,
            global,
        }
    }

    /// Equal thirds: the canonical statistical ranking.
    pub const fn uniform() -> Self {
        Self::new(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0)
    }

    /// 0.8 local walk salience / 0.2 global walk salience.
    pub const fn graph_walk() -> Self {
        Self::new(0.0, 0.8, 0.2)
    }

    /// `entropy·h + local·l + global·g`.
    pub fn combine(&self, entropy_signal: f64, local: f64, global: f64) -> f64 {
        self.entropy * entropy_signal + self.local * local + self.global * global
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Split of personalization mass between anchor nodes and all other nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorWeights {
    pub anchor: f64,
    pub rest: f64,
}

impl AnchorWeights {
    pub fn new(anchor: f64, rest: f64) -> RankResult<Self> {
        let weights = Self { anchor, rest };
        weights.validate()?;
        Ok(weights)
    }

    /// Both weights non-negative and summing to 1.
    pub fn validate(&self) -> RankResult<()> {
        if self.anchor < 0.0 || self.rest < 0.0 || (self.anchor + self.rest - 1.0).abs() > 1e-9 {
            return Err(RankError::InvalidWeights {
                message: format!(
                    "anchor weights ({}, {}) must be non-negative and sum to 1",
                    self.anchor, self.rest
                ),
            });
        }
        Ok(())
    }
}

impl Default for AnchorWeights {
    fn default() -> Self {
        Self {
            anchor: 0.8,
            rest: 0.2,
        }
    }
}

/// Which signals rank the offered properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStrategy {
    /// Entropy + count z-scores (candidate graph and corpus).
    #[default]
    Statistical,
    /// Entropy + walk-salience z-scores (personalized walk and corpus walk).
    GraphWalk,
}

/// One ranked (property, value) row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyScore {
    pub pair: PropertyValue,
    pub value_code: String,
    /// Fact rows carrying the pair in the candidate graph.
    pub count: usize,
    /// Entropy in bits of the pair's property.
    pub entropy: f64,
    pub entropy_signal: f64,
    pub local: f64,
    pub global: f64,
    pub score: f64,
}

/// One ranked movie.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovieScore {
    pub movie: MovieId,
    pub score: f64,
}

/// Stable descending sort by score.
pub(crate) fn sort_descending<T>(items: &mut [T], score: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
}
