//! Corpus facade: the shared read-only data every session draws on.
//!
//! The `Corpus` owns the knowledge graph, the historical interactions and the
//! global statistics table behind `Arc`s, and opens sessions over them.

use std::fmt;
use std::sync::Arc;

use crate::config::DataConfig;
use crate::error::{CineResult, SessionResult};
use crate::graph::{CandidateGraph, InteractionGraph, KnowledgeGraph, MovieId, PropertyValue};
use crate::rank::WalkConfig;
use crate::session::{Session, SessionConfig};
use crate::stats::GlobalStatistics;

/// Shared corpus of facts, ratings and statistics.
#[derive(Debug, Clone)]
pub struct Corpus {
    knowledge_graph: Arc<KnowledgeGraph>,
    interactions: Arc<InteractionGraph>,
    stats: Arc<GlobalStatistics>,
}

impl Corpus {
    pub fn new(
        knowledge_graph: KnowledgeGraph,
        interactions: InteractionGraph,
        stats: GlobalStatistics,
    ) -> Self {
        Self {
            knowledge_graph: Arc::new(knowledge_graph),
            interactions: Arc::new(interactions),
            stats: Arc::new(stats),
        }
    }

    /// Corpus whose statistics are computed from the facts and ratings.
    pub fn build(
        knowledge_graph: KnowledgeGraph,
        interactions: InteractionGraph,
        walk: &WalkConfig,
    ) -> CineResult<Self> {
        let stats = GlobalStatistics::build(&knowledge_graph, &interactions, walk)?;
        Ok(Self::new(knowledge_graph, interactions, stats))
    }

    /// Load facts and ratings from disk, and the statistics table if present.
    ///
    /// A missing table is rebuilt in memory; it is not written back.
    pub fn load(data: &DataConfig, walk: &WalkConfig) -> CineResult<Self> {
        let kg = KnowledgeGraph::load_csv(&data.facts)?;
        let interactions = InteractionGraph::load_ratings(&data.ratings, data.min_rating)?;

        if data.stats.exists() {
            let stats = GlobalStatistics::load_csv(&data.stats)?;
            Ok(Self::new(kg, interactions, stats))
        } else {
            tracing::warn!(
                path = %data.stats.display(),
                "statistics table missing, building in memory"
            );
            Self::build(kg, interactions, walk)
        }
    }

    pub fn knowledge_graph(&self) -> &Arc<KnowledgeGraph> {
        &self.knowledge_graph
    }

    pub fn interactions(&self) -> &Arc<InteractionGraph> {
        &self.interactions
    }

    pub fn stats(&self) -> &Arc<GlobalStatistics> {
        &self.stats
    }

    /// Open a session over the whole catalogue.
    pub fn create_session(
        &self,
        user: u64,
        initial: PropertyValue,
        config: SessionConfig,
    ) -> SessionResult<Session> {
        self.create_session_with(
            CandidateGraph::full(Arc::clone(&self.knowledge_graph)),
            user,
            initial,
            config,
        )
    }

    /// Open a session over the given movies only.
    pub fn create_session_for(
        &self,
        movies: impl IntoIterator<Item = MovieId>,
        user: u64,
        initial: PropertyValue,
        config: SessionConfig,
    ) -> SessionResult<Session> {
        self.create_session_with(
            CandidateGraph::for_movies(Arc::clone(&self.knowledge_graph), movies),
            user,
            initial,
            config,
        )
    }

    fn create_session_with(
        &self,
        candidates: CandidateGraph,
        user: u64,
        initial: PropertyValue,
        config: SessionConfig,
    ) -> SessionResult<Session> {
        Session::new(
            candidates,
            Arc::clone(&self.interactions),
            Arc::clone(&self.stats),
            user,
            initial,
            config,
        )
    }

    /// Summary counts.
    pub fn info(&self) -> CorpusInfo {
        CorpusInfo {
            movies: self.knowledge_graph.movie_count(),
            facts: self.knowledge_graph.len(),
            interactions: self.interactions.len(),
            stat_pairs: self.stats.len(),
        }
    }
}

/// Summary of a loaded corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusInfo {
    pub movies: usize,
    pub facts: usize,
    pub interactions: usize,
    pub stat_pairs: usize,
}

impl fmt::Display for CorpusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cinebot corpus")?;
        writeln!(f, "  movies:       {}", self.movies)?;
        writeln!(f, "  facts:        {}", self.facts)?;
        writeln!(f, "  interactions: {}", self.interactions)?;
        write!(f, "  stat pairs:   {}", self.stat_pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Fact;
    use crate::session::TerminalReason;

    fn corpus() -> Corpus {
        let kg = KnowledgeGraph::new([
            Fact::new(1, "genre", "Comedy", "Q157443"),
            Fact::new(1, "director", "A", "QA"),
            Fact::new(2, "genre", "Comedy", "Q157443"),
            Fact::new(2, "director", "B", "QB"),
            Fact::new(3, "genre", "Drama", "Q130232"),
        ]);
        let ratings = InteractionGraph::from_ratings([(100, MovieId(1)), (101, MovieId(2))]);
        Corpus::build(kg, ratings, &WalkConfig::default()).unwrap()
    }

    #[test]
    fn info_counts() {
        let info = corpus().info();
        assert_eq!(info.movies, 3);
        assert_eq!(info.facts, 5);
        assert_eq!(info.interactions, 2);
        assert_eq!(info.stat_pairs, 4);
        assert!(info.to_string().contains("movies:       3"));
    }

    #[test]
    fn sessions_are_independent() {
        let corpus = corpus();
        let config = SessionConfig {
            seed: Some(1),
            ..Default::default()
        };
        let mut a = corpus
            .create_session(900, PropertyValue::new("genre", "Comedy"), config.clone())
            .unwrap();
        let b = corpus
            .create_session(901, PropertyValue::new("genre", "Comedy"), config)
            .unwrap();

        a.record_movie_outcome(MovieId(1), crate::session::MovieOutcome::Watched)
            .unwrap();
        assert_eq!(a.interactions().watched_edges().len(), 1);
        assert!(b.interactions().watched_edges().is_empty());
        assert!(b.candidates().contains_movie(MovieId(1)));
        assert_eq!(corpus.interactions().len(), 2);
    }

    #[test]
    fn restricted_session_only_sees_its_movies() {
        let corpus = corpus();
        let session = corpus
            .create_session_for(
                [MovieId(3)],
                900,
                PropertyValue::new("genre", "Comedy"),
                SessionConfig::default(),
            )
            .unwrap();
        assert_eq!(session.terminal_reason(), Some(TerminalReason::Exhausted));
    }
}
