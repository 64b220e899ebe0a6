//! Personalized PageRank over the undirected interaction graph.
//!
//! The walk graph is a simple undirected graph: parallel edges collapse into
//! one and self-loops are skipped. Each undirected edge is walked in both
//! directions. Dangling mass (isolated nodes) is redistributed along the
//! personalization vector.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::error::{RankError, RankResult};
use crate::graph::Node;

use super::AnchorWeights;

/// Power-iteration parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Probability of following an edge instead of teleporting.
    pub damping: f64,
    pub max_iterations: usize,
    /// Per-node L1 tolerance; iteration stops when the total change is below `N * tolerance`.
    pub tolerance: f64,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

impl WalkConfig {
    pub fn validate(&self) -> RankResult<()> {
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(RankError::InvalidWeights {
                message: format!("damping {} outside (0, 1)", self.damping),
            });
        }
        Ok(())
    }
}

/// Where the random surfer teleports to.
#[derive(Debug, Clone, PartialEq)]
pub enum Personalization {
    /// Every node equally likely: classic PageRank.
    Uniform,
    /// `weights.anchor` split over the anchors, `weights.rest` over all other
    /// nodes, then normalised over the nodes actually in the graph.
    Anchored {
        anchors: Vec<Node>,
        weights: AnchorWeights,
    },
}

impl Personalization {
    /// Anchored personalization, or uniform when there is nothing to anchor on.
    pub fn from_anchors(anchors: Vec<Node>, weights: AnchorWeights) -> Self {
        if anchors.is_empty() {
            Self::Uniform
        } else {
            Self::Anchored { anchors, weights }
        }
    }
}

/// Stationary visitation probabilities of a walk.
#[derive(Debug, Clone)]
pub struct WalkScores {
    scores: HashMap<Node, f64>,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap.
    pub converged: bool,
}

impl WalkScores {
    /// Probability of `node`; 0 for nodes outside the walk graph.
    pub fn get(&self, node: &Node) -> f64 {
        self.scores.get(node).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.scores.contains_key(node)
    }

    /// Sum over all nodes; 1 up to float error.
    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Node, f64)> {
        self.scores.iter().map(|(n, &s)| (n, s))
    }
}

/// Undirected simple graph of users, movies and values.
#[derive(Debug, Clone, Default)]
pub struct WalkGraph {
    graph: UnGraph<Node, ()>,
    index: HashMap<Node, NodeIndex>,
    edges: HashSet<(NodeIndex, NodeIndex)>,
}

impl WalkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a (Node, Node)>) -> Self {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.add_edge(a, b);
        }
        graph
    }

    fn ensure_node(&mut self, node: &Node) -> NodeIndex {
        if let Some(&idx) = self.index.get(node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node.clone(), idx);
        idx
    }

    /// Add a node without edges.
    pub fn add_node(&mut self, node: &Node) {
        self.ensure_node(node);
    }

    /// Add an undirected edge unless it already exists.
    pub fn add_edge(&mut self, a: &Node, b: &Node) {
        let ia = self.ensure_node(a);
        let ib = self.ensure_node(b);
        if ia == ib {
            return;
        }
        let key = if ia < ib { (ia, ib) } else { (ib, ia) };
        if self.edges.insert(key) {
            self.graph.add_edge(ia, ib, ());
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.index.contains_key(node)
    }

    /// Teleport distribution over node indices, summing to 1.
    fn teleport(&self, personalization: &Personalization) -> RankResult<Vec<f64>> {
        let n = self.node_count();
        let uniform = vec![1.0 / n as f64; n];

        let (anchors, weights) = match personalization {
            Personalization::Uniform => return Ok(uniform),
            Personalization::Anchored { anchors, weights } => (anchors, weights),
        };
        weights.validate()?;

        // Shares are sized over the whole anchor set; anchors outside the
        // graph carry no mass.
        let all: BTreeSet<&Node> = anchors.iter().collect();
        let present: BTreeSet<usize> = all
            .iter()
            .filter_map(|a| self.index.get(*a))
            .map(|idx| idx.index())
            .collect();
        if present.is_empty() {
            return Ok(uniform);
        }

        let per_anchor = weights.anchor / all.len() as f64;
        let per_rest = if present.len() == n {
            0.0
        } else {
            weights.rest / n.saturating_sub(all.len()).max(1) as f64
        };

        let mut p: Vec<f64> = (0..n)
            .map(|i| if present.contains(&i) { per_anchor } else { per_rest })
            .collect();
        let total: f64 = p.iter().sum();
        if total <= 0.0 {
            return Ok(uniform);
        }
        p.iter_mut().for_each(|x| *x /= total);
        Ok(p)
    }

    /// Run the power iteration.
    ///
    /// Fails with [`RankError::EmptyGraph`] on a graph without nodes rather
    /// than returning an empty distribution.
    pub fn pagerank(
        &self,
        personalization: &Personalization,
        config: &WalkConfig,
    ) -> RankResult<WalkScores> {
        let n = self.node_count();
        if n == 0 {
            return Err(RankError::EmptyGraph);
        }
        config.validate()?;

        let p = self.teleport(personalization)?;
        let neighbors: Vec<Vec<usize>> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors(idx).map(|nb| nb.index()).collect())
            .collect();
        let degree: Vec<f64> = neighbors.iter().map(|nb| nb.len() as f64).collect();

        let d = config.damping;
        let mut x = vec![1.0 / n as f64; n];
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_iterations {
            iterations += 1;

            let dangling: f64 = (0..n).filter(|&i| degree[i] == 0.0).map(|i| x[i]).sum();
            for v in 0..n {
                let inflow: f64 = neighbors[v].iter().map(|&u| x[u] / degree[u]).sum();
                next[v] = d * (inflow + dangling * p[v]) + (1.0 - d) * p[v];
            }

            let err: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut x, &mut next);
            if err < n as f64 * config.tolerance {
                converged = true;
                break;
            }
        }

        if converged {
            tracing::debug!(nodes = n, iterations, "pagerank converged");
        } else {
            tracing::warn!(
                nodes = n,
                iterations,
                "pagerank hit the iteration cap before converging"
            );
        }

        let total: f64 = x.iter().sum();
        let scores = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].clone(), x[idx.index()] / total))
            .collect();

        Ok(WalkScores {
            scores,
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MovieId;

    fn movie(id: u64) -> Node {
        Node::Movie(MovieId(id))
    }

    fn star() -> WalkGraph {
        // User 1 rated movies 10..=13; movie 10 also has a value node.
        let mut g = WalkGraph::new();
        for m in 10..=13 {
            g.add_edge(&Node::User(1), &movie(m));
        }
        g.add_edge(&movie(10), &Node::Value("Q1".into()));
        g
    }

    #[test]
    fn empty_graph_fails_fast() {
        let g = WalkGraph::new();
        let err = g
            .pagerank(&Personalization::Uniform, &WalkConfig::default())
            .unwrap_err();
        assert!(matches!(err, RankError::EmptyGraph));
    }

    #[test]
    fn uniform_scores_sum_to_one() {
        let scores = star()
            .pagerank(&Personalization::Uniform, &WalkConfig::default())
            .unwrap();
        assert!(scores.converged);
        assert!((scores.total() - 1.0).abs() < 1e-6);
        // The hub collects the most mass.
        let hub = scores.get(&Node::User(1));
        assert!(scores.iter().all(|(_, s)| s <= hub));
    }

    #[test]
    fn parallel_edges_collapse() {
        let mut g = star();
        g.add_edge(&movie(11), &Node::User(1));
        g.add_edge(&movie(11), &movie(11));
        assert_eq!(g.edge_count(), 5);
    }

    #[test]
    fn anchors_pull_mass_toward_them() {
        let g = star();
        let cfg = WalkConfig::default();
        let uniform = g.pagerank(&Personalization::Uniform, &cfg).unwrap();
        let anchored = g
            .pagerank(
                &Personalization::from_anchors(vec![movie(12)], AnchorWeights::default()),
                &cfg,
            )
            .unwrap();
        assert!((anchored.total() - 1.0).abs() < 1e-6);
        assert!(anchored.get(&movie(12)) > uniform.get(&movie(12)));
        assert!(anchored.get(&movie(12)) > anchored.get(&movie(13)));
    }

    #[test]
    fn absent_anchors_fall_back_to_uniform() {
        let g = star();
        let cfg = WalkConfig::default();
        let uniform = g.pagerank(&Personalization::Uniform, &cfg).unwrap();
        let ghost = g
            .pagerank(
                &Personalization::from_anchors(vec![movie(99)], AnchorWeights::default()),
                &cfg,
            )
            .unwrap();
        for (node, score) in uniform.iter() {
            assert!((ghost.get(node) - score).abs() < 1e-12);
        }
    }

    #[test]
    fn absent_anchor_still_takes_its_share() {
        let g = star();
        let cfg = WalkConfig::default();
        let watched = g
            .pagerank(
                &Personalization::from_anchors(vec![movie(12)], AnchorWeights::default()),
                &cfg,
            )
            .unwrap();
        let with_value = g
            .pagerank(
                &Personalization::from_anchors(
                    vec![movie(12), Node::Value("Qaccepted".into())],
                    AnchorWeights::default(),
                ),
                &cfg,
            )
            .unwrap();
        assert!((with_value.total() - 1.0).abs() < 1e-6);
        // Half the anchor weight is lost to the absent value, so the watched
        // movie is pulled less strongly.
        assert!(with_value.get(&movie(12)) < watched.get(&movie(12)));
    }

    #[test]
    fn isolated_nodes_keep_distribution_normalized() {
        let mut g = star();
        g.add_node(&Node::User(7));
        let scores = g
            .pagerank(&Personalization::Uniform, &WalkConfig::default())
            .unwrap();
        assert!((scores.total() - 1.0).abs() < 1e-6);
        assert!(scores.get(&Node::User(7)) > 0.0);
    }

    #[test]
    fn invalid_damping_is_rejected() {
        let cfg = WalkConfig {
            damping: 1.0,
            ..Default::default()
        };
        assert!(star().pagerank(&Personalization::Uniform, &cfg).is_err());
    }
}
