//! Recommender configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! canonical settings. Unknown keys are rejected to catch typos.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::rank::{AnchorWeights, PropertyStrategy, ScoreWeights, WalkConfig};
use crate::session::{RejectionMode, SessionConfig};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecommenderConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub session: SessionSettings,
}

/// Where the corpus lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Facts CSV (`movie_id,title,prop,obj,obj_code`).
    #[serde(default = "default_facts")]
    pub facts: PathBuf,
    /// Ratings TSV (`user_id movie_id rating`, no header).
    #[serde(default = "default_ratings")]
    pub ratings: PathBuf,
    /// Global statistics table; built from facts and ratings when missing.
    #[serde(default = "default_stats")]
    pub stats: PathBuf,
    /// Ignore ratings below this value.
    #[serde(default)]
    pub min_rating: Option<f64>,
}

fn default_facts() -> PathBuf {
    PathBuf::from("data/wikidata_integration.csv")
}
fn default_ratings() -> PathBuf {
    PathBuf::from("data/ratings.txt")
}
fn default_stats() -> PathBuf {
    PathBuf::from("data/global_properties.csv")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            facts: default_facts(),
            ratings: default_ratings(),
            stats: default_stats(),
            min_rating: None,
        }
    }
}

/// Ranking weights and walk parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankingConfig {
    #[serde(default)]
    pub strategy: PropertyStrategy,
    /// Weights of the statistical property ranking.
    #[serde(default = "ScoreWeights::uniform")]
    pub property_weights: ScoreWeights,
    /// Weights of the walk-salience property ranking.
    #[serde(default = "ScoreWeights::graph_walk")]
    pub walk_property_weights: ScoreWeights,
    #[serde(default)]
    pub anchor_weights: AnchorWeights,
    #[serde(default)]
    pub use_value_anchors: bool,
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Properties offered per question.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_damping() -> f64 {
    0.85
}
fn default_max_iterations() -> usize {
    1000
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_top_n() -> usize {
    5
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            strategy: PropertyStrategy::default(),
            property_weights: ScoreWeights::uniform(),
            walk_property_weights: ScoreWeights::graph_walk(),
            anchor_weights: AnchorWeights::default(),
            use_value_anchors: false,
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            top_n: default_top_n(),
        }
    }
}

impl RankingConfig {
    pub fn walk(&self) -> WalkConfig {
        WalkConfig {
            damping: self.damping,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Dialogue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    /// Bandit seed; omit for a fresh random seed per session.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Turn cap for driven dialogues.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default)]
    pub rejection_mode: RejectionMode,
}

fn default_max_turns() -> usize {
    200
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            seed: None,
            max_turns: default_max_turns(),
            rejection_mode: RejectionMode::default(),
        }
    }
}

impl RecommenderConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse TOML text; `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: "<generated>".into(),
            message: e.to_string(),
        })
    }

    /// Per-session parameters derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            strategy: self.ranking.strategy,
            property_weights: self.ranking.property_weights,
            walk_property_weights: self.ranking.walk_property_weights,
            anchor_weights: self.ranking.anchor_weights,
            use_value_anchors: self.ranking.use_value_anchors,
            walk: self.ranking.walk(),
            top_n: self.ranking.top_n,
            rejection_mode: self.session.rejection_mode,
            seed: self.session.seed,
        }
    }
}
