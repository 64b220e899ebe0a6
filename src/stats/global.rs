//! Corpus-wide statistics per (property, value), computed once offline.
//!
//! The table is a cross-run cache persisted as CSV with the header
//! `prop,obj,count,global_zscore,salience,salience_zscore`. Changing the
//! columns is a breaking change: old tables must be rebuilt.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RankResult, StatsError, StatsResult};
use crate::graph::{InteractionGraph, KnowledgeGraph, Node, PropertyValue};
use crate::rank::{Personalization, WalkConfig, WalkGraph};

use super::Moments;

/// Immutable statistics of one (property, value) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStatEntry {
    /// Facts carrying the pair in the full corpus.
    pub count: u64,
    /// Z-score of `count` within the pair's property.
    pub zscore: f64,
    /// Uniform PageRank of the value node over the full corpus graph.
    pub salience: f64,
    /// Z-score of `salience` within the pair's property.
    pub salience_zscore: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatRecord {
    prop: String,
    obj: String,
    count: u64,
    global_zscore: f64,
    salience: f64,
    salience_zscore: f64,
}

/// Read-only lookup table keyed by (property, value).
#[derive(Debug, Clone, Default)]
pub struct GlobalStatistics {
    entries: HashMap<PropertyValue, GlobalStatEntry>,
}

impl GlobalStatistics {
    pub fn new(entries: impl IntoIterator<Item = (PropertyValue, GlobalStatEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Compute the table from the full knowledge graph and the historical
    /// interaction edges.
    ///
    /// Salience is the uniform PageRank of each value node over ratings plus
    /// every movie–value edge of the corpus.
    pub fn build(
        kg: &KnowledgeGraph,
        interactions: &InteractionGraph,
        walk: &WalkConfig,
    ) -> RankResult<Self> {
        let mut graph = WalkGraph::from_edges(interactions.edges());
        for fact in kg.facts() {
            graph.add_edge(
                &Node::Movie(fact.movie),
                &Node::Value(fact.value_code.clone()),
            );
        }
        let scores = graph.pagerank(&Personalization::Uniform, walk)?;

        // property → [(pair, count, salience)]
        let mut groups: BTreeMap<&str, Vec<(&PropertyValue, u64, f64)>> = BTreeMap::new();
        for pair in kg.pairs() {
            let count = kg.rows_matching(pair).len() as u64;
            let salience = kg
                .value_code(pair)
                .map(|code| scores.get(&Node::Value(code.to_owned())))
                .unwrap_or(0.0);
            groups
                .entry(pair.property.as_str())
                .or_default()
                .push((pair, count, salience));
        }

        let mut entries = HashMap::with_capacity(kg.len());
        for rows in groups.values() {
            let counts = Moments::weighted(rows.iter().map(|&(_, c, _)| (c as f64, c as usize)));
            let saliences = Moments::weighted(rows.iter().map(|&(_, c, s)| (s, c as usize)));
            for &(pair, count, salience) in rows {
                entries.insert(
                    pair.clone(),
                    GlobalStatEntry {
                        count,
                        zscore: counts.zscore(count as f64),
                        salience,
                        salience_zscore: saliences.zscore(salience),
                    },
                );
            }
        }

        tracing::info!(
            pairs = entries.len(),
            properties = groups.len(),
            walk_iterations = scores.iterations,
            "built global statistics"
        );
        Ok(Self { entries })
    }

    /// Statistics of `pair`; `PairNotFound` if the table does not cover it.
    pub fn get(&self, pair: &PropertyValue) -> StatsResult<&GlobalStatEntry> {
        self.entries
            .get(pair)
            .ok_or_else(|| StatsError::PairNotFound {
                property: pair.property.clone(),
                value: pair.value.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by (property, value).
    pub fn sorted(&self) -> Vec<(&PropertyValue, &GlobalStatEntry)> {
        let mut rows: Vec<_> = self.entries.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    pub fn load_csv(path: &Path) -> StatsResult<Self> {
        let file = File::open(path).map_err(|source| StatsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);

        let mut entries = HashMap::new();
        for record in reader.deserialize::<StatRecord>() {
            let r = record.map_err(|e| StatsError::Csv {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            entries.insert(
                PropertyValue::new(r.prop, r.obj),
                GlobalStatEntry {
                    count: r.count,
                    zscore: r.global_zscore,
                    salience: r.salience,
                    salience_zscore: r.salience_zscore,
                },
            );
        }

        tracing::info!(path = %path.display(), pairs = entries.len(), "loaded global statistics");
        Ok(Self { entries })
    }

    pub fn save_csv(&self, path: &Path) -> StatsResult<()> {
        let csv_err = |e: csv::Error| StatsError::Csv {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        let file = File::create(path).map_err(|source| StatsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        for (pair, entry) in self.sorted() {
            writer
                .serialize(StatRecord {
                    prop: pair.property.clone(),
                    obj: pair.value.clone(),
                    count: entry.count,
                    global_zscore: entry.zscore,
                    salience: entry.salience,
                    salience_zscore: entry.salience_zscore,
                })
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|source| StatsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
