//! One user's recommendation dialogue and the state it owns.
//!
//! A [`Session`] owns its candidate graph, accepted preferences, watched
//! movies, interaction overlay and bandit. The knowledge graph, the
//! historical interactions and the statistics table are shared read-only.
//!
//! The direct operations here (`accept_preference`, `reject_properties`,
//! `record_movie_outcome`) apply user feedback; the turn protocol in [`turn`]
//! sequences them with the bandit.

pub mod dialogue;
pub mod turn;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bandit::{Arm, BanditState, ThompsonBandit};
use crate::error::{GraphError, SessionError, SessionResult};
use crate::graph::{
    CandidateGraph, InteractionGraph, MovieId, Node, PropertyValue, SessionInteractions,
};
use crate::rank::{
    AnchorWeights, GraphRanker, MovieScore, PropertyScore, PropertyStrategy, RelevanceScorer,
    ScoreWeights, WalkConfig,
};
use crate::stats::GlobalStatistics;

pub use dialogue::{
    DialogueOutcome, Exchange, OraclePrompter, PropertyChoice, Prompter, Transcript, run_dialogue,
};
pub use turn::{Recommendation, Response, Turn};

/// Why a dialogue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// The user accepted a recommendation.
    Accepted,
    /// No candidate movie or property is left.
    Exhausted,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => write!(f, "recommendation accepted"),
            Self::Exhausted => write!(f, "candidates exhausted"),
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Terminal(TerminalReason),
}

/// The user's answer to a recommended movie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieOutcome {
    /// "yes": the user takes the recommendation.
    Accepted,
    /// "no": not interested.
    Rejected,
    /// Already seen.
    Watched,
}

impl MovieOutcome {
    /// Parse a typed answer (`yes`/`no`/`watched`, case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "accept" | "accepted" => Some(Self::Accepted),
            "no" | "n" | "reject" | "rejected" => Some(Self::Rejected),
            "watched" | "seen" | "w" => Some(Self::Watched),
            _ => None,
        }
    }
}

/// An accepted (property, value) pair and its value code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub pair: PropertyValue,
    pub value_code: Option<String>,
}

/// What rejecting offered properties does to the candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionMode {
    /// Remove the rejected facts; their movies stay candidates.
    #[default]
    StripFacts,
    /// Remove every movie carrying a rejected pair.
    DropMovies,
}

/// Per-session ranking and dialogue parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub strategy: PropertyStrategy,
    pub property_weights: ScoreWeights,
    pub walk_property_weights: ScoreWeights,
    pub anchor_weights: AnchorWeights,
    /// Anchor the walk on accepted value codes as well as watched movies.
    pub use_value_anchors: bool,
    pub walk: WalkConfig,
    /// Properties offered per question.
    pub top_n: usize,
    pub rejection_mode: RejectionMode,
    /// Bandit seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: PropertyStrategy::default(),
            property_weights: ScoreWeights::uniform(),
            walk_property_weights: ScoreWeights::graph_walk(),
            anchor_weights: AnchorWeights::default(),
            use_value_anchors: false,
            walk: WalkConfig::default(),
            top_n: 5,
            rejection_mode: RejectionMode::default(),
            seed: None,
        }
    }
}

/// One user's dialogue state.
#[derive(Debug)]
pub struct Session {
    stats: Arc<GlobalStatistics>,
    candidates: CandidateGraph,
    interactions: SessionInteractions,
    preferences: Vec<Preference>,
    watched: Vec<MovieId>,
    bandit: ThompsonBandit,
    ranker: GraphRanker,
    config: SessionConfig,
    status: SessionStatus,
    pending: Option<turn::Pending>,
    turns: usize,
}

impl Session {
    /// Start a dialogue from `candidates` (the full graph, or an externally
    /// pre-filtered view) seeded by the user's first preference.
    pub fn new(
        candidates: CandidateGraph,
        interactions: Arc<InteractionGraph>,
        stats: Arc<GlobalStatistics>,
        user: u64,
        initial: PropertyValue,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.anchor_weights.validate()?;
        config.walk.validate()?;

        let bandit = match config.seed {
            Some(seed) => ThompsonBandit::seeded(seed),
            None => ThompsonBandit::from_entropy(),
        };
        let mut session = Self {
            stats,
            candidates,
            interactions: SessionInteractions::new(interactions, user),
            preferences: Vec::new(),
            watched: Vec::new(),
            bandit,
            ranker: GraphRanker::new(config.walk),
            config,
            status: SessionStatus::Active,
            pending: None,
            turns: 0,
        };

        tracing::info!(
            user,
            movies = session.candidates.movie_count(),
            initial = %initial,
            "session started"
        );
        session.accept_preference(&initial.property, &initial.value)?;
        Ok(session)
    }

    // -- inspection --------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Terminal(_))
    }

    pub fn terminal_reason(&self) -> Option<TerminalReason> {
        match self.status {
            SessionStatus::Terminal(reason) => Some(reason),
            SessionStatus::Active => None,
        }
    }

    pub fn candidates(&self) -> &CandidateGraph {
        &self.candidates
    }

    pub fn preferences(&self) -> &[Preference] {
        &self.preferences
    }

    /// Accepted pairs, oldest first.
    pub fn accepted_pairs(&self) -> Vec<PropertyValue> {
        self.preferences.iter().map(|p| p.pair.clone()).collect()
    }

    pub fn watched(&self) -> &[MovieId] {
        &self.watched
    }

    pub fn interactions(&self) -> &SessionInteractions {
        &self.interactions
    }

    pub fn bandit_state(&self) -> &BanditState {
        self.bandit.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Completed turns of the turn protocol.
    pub fn turns(&self) -> usize {
        self.turns
    }

    // -- ranking -----------------------------------------------------------

    /// Statistical property ranking over the current candidates.
    pub fn rank_properties(&self, weights: ScoreWeights) -> SessionResult<Vec<PropertyScore>> {
        let accepted = self.accepted_pairs();
        Ok(RelevanceScorer::new(&self.stats, weights).rank(&self.candidates, &accepted)?)
    }

    /// Walk-salience property ranking over the current candidates.
    pub fn rank_properties_by_walk(
        &self,
        use_value_anchors: bool,
        anchor_weights: AnchorWeights,
        weights: ScoreWeights,
    ) -> SessionResult<Vec<PropertyScore>> {
        let scores = self.ranker.walk(
            &self.interactions,
            &self.candidates,
            self.anchors(use_value_anchors),
            anchor_weights,
        )?;
        let accepted = self.accepted_pairs();
        Ok(self
            .ranker
            .rank_properties(&scores, &self.candidates, &self.stats, &accepted, weights)?)
    }

    /// Candidate movies by personalized walk share.
    pub fn rank_movies(
        &self,
        use_value_anchors: bool,
        weights: AnchorWeights,
    ) -> SessionResult<Vec<MovieScore>> {
        let scores = self.ranker.walk(
            &self.interactions,
            &self.candidates,
            self.anchors(use_value_anchors),
            weights,
        )?;
        Ok(self.ranker.rank_movies(&scores, &self.candidates))
    }

    /// Candidate movies by historical rating count.
    pub fn rank_movies_by_popularity(&self) -> Vec<MovieScore> {
        GraphRanker::rank_movies_by_popularity(self.interactions.base(), &self.candidates)
    }

    /// Watched movie nodes, then accepted value codes when enabled.
    pub fn anchors(&self, use_value_anchors: bool) -> Vec<Node> {
        let mut anchors: Vec<Node> = self.watched.iter().map(|&m| Node::Movie(m)).collect();
        if use_value_anchors {
            anchors.extend(
                self.preferences
                    .iter()
                    .filter_map(|p| p.value_code.clone())
                    .map(Node::Value),
            );
        }
        anchors
    }

    // -- feedback ----------------------------------------------------------

    /// Accept a (property, value) preference and narrow the candidates by it.
    pub fn accept_preference(&mut self, property: &str, value: &str) -> SessionResult<()> {
        let pair = PropertyValue::new(property, value);
        let code = self.candidates.value_code(&pair);
        self.accept(pair, code)
    }

    pub(crate) fn accept(&mut self, pair: PropertyValue, value_code: Option<String>) -> SessionResult<()> {
        self.ensure_active()?;
        self.pending = None;

        let before = self.candidates.movie_count();
        self.candidates = self.candidates.narrow(&pair);
        tracing::info!(
            pair = %pair,
            before,
            after = self.candidates.movie_count(),
            "narrowed candidates"
        );
        if !self.preferences.iter().any(|p| p.pair == pair) {
            self.preferences.push(Preference { pair, value_code });
        }
        self.check_exhausted();
        Ok(())
    }

    /// Dislike the given pairs without narrowing to them.
    pub fn reject_properties(&mut self, pairs: &[PropertyValue]) -> SessionResult<()> {
        self.ensure_active()?;
        self.pending = None;

        let before = self.candidates.movie_count();
        match self.config.rejection_mode {
            RejectionMode::StripFacts => self.candidates.strip_pairs(pairs),
            RejectionMode::DropMovies => self.candidates.drop_movies_with(pairs),
        }
        tracing::info!(
            rejected = pairs.len(),
            mode = ?self.config.rejection_mode,
            before,
            after = self.candidates.movie_count(),
            "rejected properties"
        );
        self.check_exhausted();
        Ok(())
    }

    /// Apply the user's answer about `movie`.
    ///
    /// The movie must still be a candidate. Accepting ends the dialogue;
    /// "watched" also anchors future walks on the movie.
    pub fn record_movie_outcome(&mut self, movie: MovieId, outcome: MovieOutcome) -> SessionResult<()> {
        self.ensure_active()?;
        if !self.candidates.contains_movie(movie) {
            return Err(GraphError::MovieNotFound { movie }.into());
        }
        self.pending = None;

        match outcome {
            MovieOutcome::Accepted => {
                self.finish(TerminalReason::Accepted);
                return Ok(());
            }
            MovieOutcome::Watched => {
                if !self.watched.contains(&movie) {
                    self.watched.push(movie);
                }
                self.interactions.record_watched(movie);
                self.candidates.remove_movie(movie);
            }
            MovieOutcome::Rejected => {
                self.candidates.remove_movie(movie);
            }
        }
        tracing::info!(%movie, ?outcome, remaining = self.candidates.movie_count(), "movie judged");
        self.check_exhausted();
        Ok(())
    }

    // -- lifecycle ---------------------------------------------------------

    fn ensure_active(&self) -> SessionResult<()> {
        match self.status {
            SessionStatus::Active => Ok(()),
            SessionStatus::Terminal(reason) => Err(SessionError::Terminal { reason }),
        }
    }

    fn check_exhausted(&mut self) {
        if self.candidates.is_empty() {
            self.finish(TerminalReason::Exhausted);
        }
    }

    fn finish(&mut self, reason: TerminalReason) {
        if self.is_terminal() {
            return;
        }
        self.status = SessionStatus::Terminal(reason);
        self.pending = None;
        tracing::info!(
            %reason,
            preferences = self.preferences.len(),
            watched = self.watched.len(),
            turns = self.turns,
            ask_mean = self.bandit.state().expected(Arm::Ask),
            recommend_mean = self.bandit.state().expected(Arm::Recommend),
            "session finished"
        );
    }
}
