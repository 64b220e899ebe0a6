//! User/movie/value interaction edges for graph-walk ranking.
//!
//! The historical edges (who rated what) are loaded once and shared. Each
//! session appends its own "watched" edges to a private overlay so concurrent
//! sessions never observe each other's additions.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};

use super::MovieId;

/// A node of the interaction graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Node {
    User(u64),
    Movie(MovieId),
    /// A property value, named by its value code.
    Value(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::User(id) => write!(f, "U{id}"),
            Node::Movie(id) => write!(f, "{id}"),
            Node::Value(code) => write!(f, "{code}"),
        }
    }
}

/// An undirected edge between two nodes.
pub type Edge = (Node, Node);

/// Shared, read-only historical interaction edges.
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    edges: Vec<Edge>,
    /// Number of User↔Movie edges per movie.
    movie_degree: HashMap<MovieId, usize>,
}

impl InteractionGraph {
    /// Build from arbitrary edges.
    pub fn new(edges: impl IntoIterator<Item = Edge>) -> Self {
        let edges: Vec<Edge> = edges.into_iter().collect();
        let mut movie_degree: HashMap<MovieId, usize> = HashMap::new();
        for edge in &edges {
            if let (Node::User(_), Node::Movie(m)) | (Node::Movie(m), Node::User(_)) = edge {
                *movie_degree.entry(*m).or_insert(0) += 1;
            }
        }
        Self {
            edges,
            movie_degree,
        }
    }

    /// One User↔Movie edge per (user, movie) rating.
    pub fn from_ratings(ratings: impl IntoIterator<Item = (u64, MovieId)>) -> Self {
        Self::new(
            ratings
                .into_iter()
                .map(|(user, movie)| (Node::User(user), Node::Movie(movie))),
        )
    }

    /// Load a tab-separated `user_id movie_id rating` file without a header.
    ///
    /// Ratings below `min_rating` are skipped when a threshold is given.
    pub fn load_ratings(path: &Path, min_rating: Option<f64>) -> GraphResult<Self> {
        let file = File::open(path).map_err(|source| GraphError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_reader(file);

        let mut ratings = Vec::new();
        for record in reader.deserialize::<(u64, u64, f64)>() {
            let (user, movie, rating) = record.map_err(|e| GraphError::Csv {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            if min_rating.is_some_and(|min| rating < min) {
                continue;
            }
            ratings.push((user, MovieId(movie)));
        }

        let graph = Self::from_ratings(ratings);
        tracing::info!(
            path = %path.display(),
            edges = graph.len(),
            "loaded interaction edges"
        );
        Ok(graph)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of historical users connected to `movie`.
    pub fn rating_count(&self, movie: MovieId) -> usize {
        self.movie_degree.get(&movie).copied().unwrap_or(0)
    }
}

/// A session's view of the interaction graph: shared edges plus its own
/// watched edges.
#[derive(Debug, Clone)]
pub struct SessionInteractions {
    base: Arc<InteractionGraph>,
    user: u64,
    watched: Vec<Edge>,
}

impl SessionInteractions {
    pub fn new(base: Arc<InteractionGraph>, user: u64) -> Self {
        Self {
            base,
            user,
            watched: Vec::new(),
        }
    }

    /// The synthetic node standing for the session's user.
    pub fn user_node(&self) -> Node {
        Node::User(self.user)
    }

    /// Append a Movie↔SessionUser edge to the private overlay.
    pub fn record_watched(&mut self, movie: MovieId) {
        self.watched.push((Node::Movie(movie), self.user_node()));
    }

    /// Historical edges followed by this session's watched edges.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.base.edges().iter().chain(self.watched.iter())
    }

    pub fn watched_edges(&self) -> &[Edge] {
        &self.watched
    }

    pub fn base(&self) -> &Arc<InteractionGraph> {
        &self.base
    }
}
