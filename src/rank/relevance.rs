//! Property relevance: how useful is asking about a (property, value) now?
//!
//! Three signals per candidate pair, each a z-score:
//! - **entropy**: how evenly the pair's property splits the candidates, compared
//!   across properties
//! - **local salience**: how common the pair is among the candidates, compared
//!   within its property
//! - **global salience**: the precomputed corpus-wide figure for the pair
//!
//! The composite is their weighted sum. Pairs carrying an accepted value are
//! never returned.

use std::collections::{HashMap, HashSet};

use crate::error::RankResult;
use crate::graph::{CandidateGraph, PropertyValue};
use crate::stats::{self, GlobalStatEntry, GlobalStatistics, Moments};

use super::{PropertyScore, ScoreWeights, sort_descending};

/// Occurrences of one distinct pair in the candidate graph.
#[derive(Debug, Clone)]
pub(crate) struct PairTally {
    pub pair: PropertyValue,
    pub value_code: String,
    pub count: usize,
}

/// Distinct pairs of a candidate graph, grouped by property.
///
/// Order: properties by first appearance, then values by first appearance,
/// walking the candidate facts in movie order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateTally {
    pub rows: Vec<PairTally>,
    /// Property → (entropy in bits, fact rows).
    properties: HashMap<String, (f64, usize)>,
}

impl CandidateTally {
    pub fn from_graph(graph: &CandidateGraph) -> Self {
        let mut property_order: Vec<String> = Vec::new();
        let mut by_property: HashMap<String, Vec<PairTally>> = HashMap::new();
        let mut position: HashMap<PropertyValue, (String, usize)> = HashMap::new();

        for fact in graph.facts() {
            let pair = fact.pair();
            if let Some((property, i)) = position.get(&pair) {
                if let Some(rows) = by_property.get_mut(property) {
                    rows[*i].count += 1;
                }
                continue;
            }
            let rows = by_property.entry(fact.property.clone()).or_insert_with(|| {
                property_order.push(fact.property.clone());
                Vec::new()
            });
            position.insert(pair.clone(), (fact.property.clone(), rows.len()));
            rows.push(PairTally {
                pair,
                value_code: fact.value_code.clone(),
                count: 1,
            });
        }

        let mut properties = HashMap::new();
        let mut rows = Vec::new();
        for property in property_order {
            let group = by_property.remove(&property).unwrap_or_default();
            let h = stats::entropy(group.iter().map(|r| r.count));
            let n = group.iter().map(|r| r.count).sum();
            properties.insert(property, (h, n));
            rows.extend(group);
        }

        Self { rows, properties }
    }

    /// Entropy in bits of `property` among the candidates; 0 if absent.
    pub fn entropy(&self, property: &str) -> f64 {
        self.properties.get(property).map(|&(h, _)| h).unwrap_or(0.0)
    }

    /// Moments of the entropy signal, one observation per fact row.
    fn entropy_moments(&self) -> Moments {
        Moments::weighted(self.properties.values().copied())
    }

    /// Per-property moments of `measure`, one observation per fact row.
    fn local_moments(&self, measure: &impl Fn(&PairTally) -> f64) -> HashMap<&str, Moments> {
        let mut groups: HashMap<&str, Vec<(f64, usize)>> = HashMap::new();
        for row in &self.rows {
            groups
                .entry(row.pair.property.as_str())
                .or_default()
                .push((measure(row), row.count));
        }
        groups
            .into_iter()
            .map(|(p, obs)| (p, Moments::weighted(obs)))
            .collect()
    }
}

/// Ranks candidate (property, value) pairs by composite relevance.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceScorer<'a> {
    stats: &'a GlobalStatistics,
    weights: ScoreWeights,
}

impl<'a> RelevanceScorer<'a> {
    pub fn new(stats: &'a GlobalStatistics, weights: ScoreWeights) -> Self {
        Self { stats, weights }
    }

    /// Statistical ranking: local salience is the pair's count, global
    /// salience the corpus count z-score.
    ///
    /// Fails with `PairNotFound` when a candidate pair is missing from the
    /// statistics table.
    pub fn rank(
        &self,
        graph: &CandidateGraph,
        accepted: &[PropertyValue],
    ) -> RankResult<Vec<PropertyScore>> {
        let tally = CandidateTally::from_graph(graph);
        self.rank_tally(&tally, accepted, |row| row.count as f64, |entry| entry.zscore)
    }

    /// Shared scoring core: `local` measures a pair (z-scored within its
    /// property), `global` picks the corpus figure from the pair's entry.
    pub(crate) fn rank_tally(
        &self,
        tally: &CandidateTally,
        accepted: &[PropertyValue],
        local: impl Fn(&PairTally) -> f64,
        global: impl Fn(&GlobalStatEntry) -> f64,
    ) -> RankResult<Vec<PropertyScore>> {
        let excluded: HashSet<&str> = accepted.iter().map(|p| p.value.as_str()).collect();
        let entropy_moments = tally.entropy_moments();
        let local_moments = tally.local_moments(&local);

        let mut scored = Vec::with_capacity(tally.rows.len());
        for row in &tally.rows {
            if excluded.contains(row.pair.value.as_str()) {
                continue;
            }
            let entropy = tally.entropy(&row.pair.property);
            let entropy_signal = entropy_moments.zscore(entropy);
            let local_z = local_moments
                .get(row.pair.property.as_str())
                .map(|m| m.zscore(local(row)))
                .unwrap_or(0.0);
            let global_z = global(self.stats.get(&row.pair)?);

            scored.push(PropertyScore {
                pair: row.pair.clone(),
                value_code: row.value_code.clone(),
                count: row.count,
                entropy,
                entropy_signal,
                local: local_z,
                global: global_z,
                score: self.weights.combine(entropy_signal, local_z, global_z),
            });
        }

        sort_descending(&mut scored, |s| s.score);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{RankError, StatsError};
    use crate::graph::{Fact, KnowledgeGraph};

    fn scenario() -> CandidateGraph {
        let kg = KnowledgeGraph::new([
            Fact::new(1, "genre", "Comedy", "Q157443"),
            Fact::new(1, "director", "A", "QA"),
            Fact::new(2, "genre", "Comedy", "Q157443"),
            Fact::new(2, "director", "B", "QB"),
            Fact::new(3, "genre", "Drama", "Q130232"),
            Fact::new(3, "director", "A", "QA"),
            Fact::new(3, "country", "US", "Q30"),
        ]);
        CandidateGraph::full(Arc::new(kg))
    }

    fn flat_stats(graph: &CandidateGraph) -> GlobalStatistics {
        GlobalStatistics::new(graph.facts().map(|f| (f.pair(), GlobalStatEntry::default())))
    }

    #[test]
    fn tally_groups_by_first_appearance() {
        let tally = CandidateTally::from_graph(&scenario());
        let order: Vec<String> = tally.rows.iter().map(|r| r.pair.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "genre - Comedy",
                "genre - Drama",
                "director - A",
                "director - B",
                "country - US"
            ]
        );
        assert!((tally.entropy("genre") - 0.918_295_834).abs() < 1e-6);
        assert_eq!(tally.entropy("country"), 0.0);
    }

    #[test]
    fn ranking_is_distinct_and_sorted() {
        let graph = scenario();
        let stats = flat_stats(&graph);
        let ranked = RelevanceScorer::new(&stats, ScoreWeights::uniform())
            .rank(&graph, &[])
            .unwrap();

        assert_eq!(ranked.len(), 5);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranked.iter().all(|r| r.score.is_finite()));
        // Single-valued country has zero local deviation.
        let country = ranked.iter().find(|r| r.pair.property == "country").unwrap();
        assert_eq!(country.local, 0.0);
        // More frequent value within a property ranks above the rarer one.
        let pos = |v: &str| ranked.iter().position(|r| r.pair.value == v).unwrap();
        assert!(pos("Comedy") < pos("Drama"));
        assert!(pos("A") < pos("B"));
    }

    #[test]
    fn accepted_values_never_appear() {
        let graph = scenario();
        let stats = flat_stats(&graph);
        let ranked = RelevanceScorer::new(&stats, ScoreWeights::uniform())
            .rank(&graph, &[PropertyValue::new("director", "A")])
            .unwrap();
        assert!(ranked.iter().all(|r| r.pair.value != "A"));
        assert_eq!(ranked.len(), 4);
    }

    #[test]
    fn global_signal_comes_from_statistics() {
        let graph = scenario();
        let mut entries: Vec<(PropertyValue, GlobalStatEntry)> = graph
            .facts()
            .map(|f| (f.pair(), GlobalStatEntry::default()))
            .collect();
        for (pair, entry) in &mut entries {
            if pair.value == "B" {
                entry.zscore = 10.0;
            }
        }
        let stats = GlobalStatistics::new(entries);
        let ranked = RelevanceScorer::new(&stats, ScoreWeights::new(0.0, 0.0, 1.0))
            .rank(&graph, &[])
            .unwrap();
        assert_eq!(ranked[0].pair, PropertyValue::new("director", "B"));
        assert_eq!(ranked[0].score, 10.0);
    }

    #[test]
    fn missing_statistics_is_not_found() {
        let graph = scenario();
        let stats = GlobalStatistics::new([(
            PropertyValue::new("genre", "Comedy"),
            GlobalStatEntry::default(),
        )]);
        let err = RelevanceScorer::new(&stats, ScoreWeights::uniform())
            .rank(&graph, &[])
            .unwrap_err();
        assert!(matches!(err, RankError::Stats(StatsError::PairNotFound { .. })));
    }
}
