//! Graph-walk ranking of candidate movies and properties.
//!
//! The walk runs over the session's interaction edges plus the movie–value
//! edges of the current candidate graph, personalized toward the session's
//! anchors: watched movies and, optionally, the value codes of accepted
//! preferences.

use crate::error::RankResult;
use crate::graph::{CandidateGraph, InteractionGraph, Node, PropertyValue, SessionInteractions};
use crate::stats::GlobalStatistics;

use super::relevance::{CandidateTally, RelevanceScorer};
use super::{
    AnchorWeights, MovieScore, Personalization, PropertyScore, ScoreWeights, WalkConfig,
    WalkGraph, WalkScores, sort_descending,
};

/// Personalized PageRank ranker.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphRanker {
    config: WalkConfig,
}

impl GraphRanker {
    pub fn new(config: WalkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// Interaction edges ∪ candidate movie–value edges.
    pub fn walk_graph(interactions: &SessionInteractions, candidates: &CandidateGraph) -> WalkGraph {
        let mut graph = WalkGraph::from_edges(interactions.edges());
        for fact in candidates.facts() {
            graph.add_edge(
                &Node::Movie(fact.movie),
                &Node::Value(fact.value_code.clone()),
            );
        }
        graph
    }

    /// Stationary distribution of the personalized walk.
    pub fn walk(
        &self,
        interactions: &SessionInteractions,
        candidates: &CandidateGraph,
        anchors: Vec<Node>,
        weights: AnchorWeights,
    ) -> RankResult<WalkScores> {
        let graph = Self::walk_graph(interactions, candidates);
        let personalization = Personalization::from_anchors(anchors, weights);
        let scores = graph.pagerank(&personalization, &self.config)?;
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            iterations = scores.iterations,
            personalized = !matches!(personalization, Personalization::Uniform),
            "graph walk finished"
        );
        Ok(scores)
    }

    /// Candidate movies by their share of the walk distribution, descending;
    /// ties keep ascending movie id.
    pub fn rank_movies(&self, scores: &WalkScores, candidates: &CandidateGraph) -> Vec<MovieScore> {
        let mut ranked: Vec<MovieScore> = candidates
            .movie_ids()
            .into_iter()
            .map(|movie| MovieScore {
                movie,
                score: scores.get(&Node::Movie(movie)),
            })
            .collect();
        sort_descending(&mut ranked, |m| m.score);
        ranked
    }

    /// Candidate movies by number of historical ratings, descending.
    pub fn rank_movies_by_popularity(
        interactions: &InteractionGraph,
        candidates: &CandidateGraph,
    ) -> Vec<MovieScore> {
        let mut ranked: Vec<MovieScore> = candidates
            .movie_ids()
            .into_iter()
            .map(|movie| MovieScore {
                movie,
                score: interactions.rating_count(movie) as f64,
            })
            .collect();
        sort_descending(&mut ranked, |m| m.score);
        ranked
    }

    /// Property ranking with walk salience in place of counts: the local term
    /// is the z-score of each value node's personalized walk share within its
    /// property, the global term the corpus salience z-score.
    pub fn rank_properties(
        &self,
        scores: &WalkScores,
        candidates: &CandidateGraph,
        stats: &GlobalStatistics,
        accepted: &[PropertyValue],
        weights: ScoreWeights,
    ) -> RankResult<Vec<PropertyScore>> {
        let tally = CandidateTally::from_graph(candidates);
        RelevanceScorer::new(stats, weights).rank_tally(
            &tally,
            accepted,
            |row| scores.get(&Node::Value(row.value_code.clone())),
            |entry| entry.salience_zscore,
        )
    }
}
