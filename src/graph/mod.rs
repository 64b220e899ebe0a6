//! Knowledge graph data model: movies described by (property, value) facts.
//!
//! - **Arena** ([`KnowledgeGraph`]): immutable, shared store of every fact
//! - **Candidates** ([`CandidateGraph`]): a session's narrowing view, an index subset of the arena
//! - **Interactions** ([`InteractionGraph`]): user/movie/value edges for graph-walk ranking
//!
//! The arena and the historical interaction edges are built once and shared
//! read-only; sessions only ever mutate their own candidate view and overlay.

pub mod candidate;
pub mod interaction;
pub mod knowledge;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use candidate::CandidateGraph;
pub use interaction::{InteractionGraph, Node, SessionInteractions};
pub use knowledge::KnowledgeGraph;

/// Identifier of a movie in the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(pub u64);

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

impl From<u64> for MovieId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A (property, value) pair such as `("genre", "Comedy")`.
///
/// This is the unit of user preference: accepted, rejected and ranked as a whole.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property: String,
    pub value: String,
}

impl PropertyValue {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Parse `property=value` (as typed on the command line).
    pub fn parse(s: &str) -> Option<Self> {
        let (property, value) = s.split_once('=')?;
        let (property, value) = (property.trim(), value.trim());
        if property.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self::new(property, value))
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.property, self.value)
    }
}

/// One (movie, property, value, value-code) record.
///
/// The value code is the stable external identifier of the value and doubles
/// as its node name in the interaction graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub movie: MovieId,
    pub property: String,
    pub value: String,
    pub value_code: String,
}

impl Fact {
    pub fn new(
        movie: impl Into<MovieId>,
        property: impl Into<String>,
        value: impl Into<String>,
        value_code: impl Into<String>,
    ) -> Self {
        Self {
            movie: movie.into(),
            property: property.into(),
            value: value.into(),
            value_code: value_code.into(),
        }
    }

    /// Whether this fact states exactly the given pair.
    pub fn matches(&self, pair: &PropertyValue) -> bool {
        self.property == pair.property && self.value == pair.value
    }

    pub fn pair(&self) -> PropertyValue {
        PropertyValue::new(&self.property, &self.value)
    }
}
