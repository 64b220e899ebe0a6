//! Candidate view over the fact arena and the narrowing operations on it.
//!
//! A [`CandidateGraph`] is an ascending list of arena rows. Because the arena
//! is sorted by movie id, iterating the rows always yields facts in movie
//! order, and every operation here only ever removes rows.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{Fact, KnowledgeGraph, MovieId, PropertyValue};

/// The facts still consistent with every accepted preference.
///
/// Cloning is cheap relative to the arena: only row indices are copied.
#[derive(Debug, Clone)]
pub struct CandidateGraph {
    kg: Arc<KnowledgeGraph>,
    rows: Vec<usize>,
    /// Pairs this view has been narrowed by; none of their facts remain.
    consumed: BTreeSet<PropertyValue>,
}

impl CandidateGraph {
    /// View over the entire knowledge graph.
    pub fn full(kg: Arc<KnowledgeGraph>) -> Self {
        let rows = (0..kg.len()).collect();
        Self {
            kg,
            rows,
            consumed: BTreeSet::new(),
        }
    }

    /// View over the given movies only (e.g. after an external content filter).
    pub fn for_movies(kg: Arc<KnowledgeGraph>, movies: impl IntoIterator<Item = MovieId>) -> Self {
        let movies: BTreeSet<MovieId> = movies.into_iter().collect();
        let rows = movies
            .iter()
            .filter_map(|&m| kg.movie_rows(m))
            .flatten()
            .collect();
        Self {
            kg,
            rows,
            consumed: BTreeSet::new(),
        }
    }

    /// The shared arena this view indexes into.
    pub fn knowledge_graph(&self) -> &Arc<KnowledgeGraph> {
        &self.kg
    }

    /// Facts in movie-id order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.rows.iter().map(|&row| self.kg.fact(row))
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct movie ids, ascending.
    pub fn movie_ids(&self) -> Vec<MovieId> {
        let mut ids: Vec<MovieId> = self.facts().map(|f| f.movie).collect();
        ids.dedup();
        ids
    }

    pub fn movie_count(&self) -> usize {
        self.movie_ids().len()
    }

    pub fn contains_movie(&self, movie: MovieId) -> bool {
        self.facts().any(|f| f.movie == movie)
    }

    /// Whether any fact states `pair`.
    pub fn contains_pair(&self, pair: &PropertyValue) -> bool {
        self.facts().any(|f| f.matches(pair))
    }

    /// Value code of `pair` among the candidates, falling back to the arena.
    pub fn value_code(&self, pair: &PropertyValue) -> Option<String> {
        self.facts()
            .find(|f| f.matches(pair))
            .map(|f| f.value_code.clone())
            .or_else(|| self.kg.value_code(pair).map(str::to_owned))
    }

    /// Shrink to the movies that carry `pair`.
    ///
    /// Every fact of a matching movie is kept, except the facts stating `pair`
    /// itself, so an accepted preference is never offered again. The result's
    /// movies are a subset of this view's movies. A pair with no matching fact
    /// yields an empty view, except a pair this view was already narrowed by,
    /// which returns the view unchanged.
    pub fn narrow(&self, pair: &PropertyValue) -> Self {
        if self.consumed.contains(pair) {
            return self.clone();
        }

        let matching: BTreeSet<MovieId> = self
            .facts()
            .filter(|f| f.matches(pair))
            .map(|f| f.movie)
            .collect();

        let rows = self
            .rows
            .iter()
            .copied()
            .filter(|&row| {
                let fact = self.kg.fact(row);
                matching.contains(&fact.movie) && !fact.matches(pair)
            })
            .collect();

        let mut consumed = self.consumed.clone();
        consumed.insert(pair.clone());
        Self {
            kg: Arc::clone(&self.kg),
            rows,
            consumed,
        }
    }

    /// Pairs this view has been narrowed by.
    pub fn consumed_pairs(&self) -> impl Iterator<Item = &PropertyValue> {
        self.consumed.iter()
    }

    /// Drop every fact stating one of `pairs`, keeping the movies' other facts.
    pub fn strip_pairs(&mut self, pairs: &[PropertyValue]) {
        let kg = Arc::clone(&self.kg);
        self.rows
            .retain(|&row| !pairs.iter().any(|p| kg.fact(row).matches(p)));
    }

    /// Drop every movie carrying one of `pairs`.
    pub fn drop_movies_with(&mut self, pairs: &[PropertyValue]) {
        let doomed: BTreeSet<MovieId> = self
            .facts()
            .filter(|f| pairs.iter().any(|p| f.matches(p)))
            .map(|f| f.movie)
            .collect();
        let kg = Arc::clone(&self.kg);
        self.rows.retain(|&row| !doomed.contains(&kg.fact(row).movie));
    }

    /// Drop all facts of one movie. Returns whether the movie was present.
    pub fn remove_movie(&mut self, movie: MovieId) -> bool {
        let before = self.rows.len();
        let kg = Arc::clone(&self.kg);
        self.rows.retain(|&row| kg.fact(row).movie != movie);
        self.rows.len() != before
    }

    /// Values of `property` by descending occurrence count, ties by first appearance.
    pub fn most_popular_values(&self, property: &str, limit: usize) -> Vec<(String, usize)> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for fact in self.facts().filter(|f| f.property == property) {
            let count = counts.entry(fact.value.as_str()).or_insert(0);
            if *count == 0 {
                order.push(fact.value.as_str());
            }
            *count += 1;
        }

        let mut values: Vec<(String, usize)> = order
            .into_iter()
            .map(|v| (v.to_owned(), counts[v]))
            .collect();
        values.sort_by(|a, b| b.1.cmp(&a.1));
        values.truncate(limit);
        values
    }

    /// Properties present on at least `min_share` of the candidate movies,
    /// in order of first appearance.
    pub fn properties_with_coverage(&self, min_share: f64) -> Vec<String> {
        let total = self.movie_count();
        if total == 0 {
            return Vec::new();
        }

        let mut order: Vec<&str> = Vec::new();
        let mut movies: HashMap<&str, BTreeSet<MovieId>> = HashMap::new();
        for fact in self.facts() {
            let set = movies.entry(fact.property.as_str()).or_default();
            if set.is_empty() {
                order.push(fact.property.as_str());
            }
            set.insert(fact.movie);
        }

        order
            .into_iter()
            .filter(|p| movies[p].len() as f64 / total as f64 >= min_share)
            .map(str::to_owned)
            .collect()
    }
}
