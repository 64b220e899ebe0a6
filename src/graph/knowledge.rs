//! Immutable fact arena with movie and (property, value) indexes.
//!
//! Facts are stored once, sorted by movie id, so every movie owns a contiguous
//! row range. Candidate views refer to rows by index instead of copying facts.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use serde::Deserialize;

use crate::error::{GraphError, GraphResult};

use super::{Fact, MovieId, PropertyValue};

/// Read-only store of every (movie, property, value, value-code) fact.
///
/// Supports lookup by movie and filtering by (property, value) in O(1) index
/// steps. Shared between sessions behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    /// All facts, stably sorted by movie id.
    facts: Vec<Fact>,
    /// MovieId → contiguous row range in `facts`.
    movie_rows: BTreeMap<MovieId, Range<usize>>,
    /// (property, value) → rows carrying that pair, ascending.
    pair_rows: HashMap<PropertyValue, Vec<usize>>,
    /// Display titles, when the source provides them.
    titles: HashMap<MovieId, String>,
}

/// One row of the facts CSV. Extra columns (e.g. `imdbId`) are ignored.
#[derive(Debug, Deserialize)]
struct FactRecord {
    movie_id: u64,
    #[serde(default)]
    title: Option<String>,
    prop: String,
    obj: String,
    #[serde(default)]
    obj_code: Option<String>,
}

impl KnowledgeGraph {
    /// Build the arena from facts in any order.
    pub fn new(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut facts: Vec<Fact> = facts.into_iter().collect();
        // Stable: facts of one movie keep their source order.
        facts.sort_by_key(|f| f.movie);

        let mut movie_rows: BTreeMap<MovieId, Range<usize>> = BTreeMap::new();
        let mut pair_rows: HashMap<PropertyValue, Vec<usize>> = HashMap::new();
        for (row, fact) in facts.iter().enumerate() {
            movie_rows
                .entry(fact.movie)
                .and_modify(|r| r.end = row + 1)
                .or_insert(row..row + 1);
            pair_rows.entry(fact.pair()).or_default().push(row);
        }

        Self {
            facts,
            movie_rows,
            pair_rows,
            titles: HashMap::new(),
        }
    }

    /// Attach display titles.
    pub fn with_titles(mut self, titles: impl IntoIterator<Item = (MovieId, String)>) -> Self {
        self.titles.extend(titles);
        self
    }

    /// Load facts from a CSV file with the header `movie_id,title,prop,obj,obj_code`.
    ///
    /// `title` and `obj_code` are optional; a missing value code falls back to
    /// the value label itself.
    pub fn load_csv(path: &Path) -> GraphResult<Self> {
        let file = File::open(path).map_err(|source| GraphError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut reader = csv::Reader::from_reader(file);

        let mut facts = Vec::new();
        let mut titles = HashMap::new();
        for record in reader.deserialize::<FactRecord>() {
            let record = record.map_err(|e| GraphError::Csv {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let movie = MovieId(record.movie_id);
            if let Some(title) = record.title.filter(|t| !t.is_empty()) {
                titles.entry(movie).or_insert(title);
            }
            let code = record
                .obj_code
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| record.obj.clone());
            facts.push(Fact::new(movie, record.prop, record.obj, code));
        }

        let kg = Self::new(facts).with_titles(titles);
        tracing::info!(
            path = %path.display(),
            facts = kg.len(),
            movies = kg.movie_count(),
            "loaded knowledge graph"
        );
        Ok(kg)
    }

    /// All facts in arena order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    /// The fact stored at `row`.
    pub fn fact(&self, row: usize) -> &Fact {
        &self.facts[row]
    }

    /// Number of facts.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Number of distinct movies.
    pub fn movie_count(&self) -> usize {
        self.movie_rows.len()
    }

    /// Movie ids in ascending order.
    pub fn movie_ids(&self) -> impl Iterator<Item = MovieId> + '_ {
        self.movie_rows.keys().copied()
    }

    /// Row range of a movie's facts, if the movie is known.
    pub fn movie_rows(&self, movie: MovieId) -> Option<Range<usize>> {
        self.movie_rows.get(&movie).cloned()
    }

    /// All facts about one movie.
    pub fn movie_facts(&self, movie: MovieId) -> &[Fact] {
        match self.movie_rows.get(&movie) {
            Some(range) => &self.facts[range.clone()],
            None => &[],
        }
    }

    /// Rows carrying exactly `pair`, ascending.
    pub fn rows_matching(&self, pair: &PropertyValue) -> &[usize] {
        self.pair_rows.get(pair).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Facts carrying exactly `pair`.
    pub fn filter<'a>(&'a self, pair: &PropertyValue) -> impl Iterator<Item = &'a Fact> + 'a {
        self.rows_matching(pair).iter().map(|&row| &self.facts[row])
    }

    /// Distinct (property, value) pairs in the arena.
    pub fn pairs(&self) -> impl Iterator<Item = &PropertyValue> {
        self.pair_rows.keys()
    }

    /// Value code of a pair, taken from its first fact.
    pub fn value_code(&self, pair: &PropertyValue) -> Option<&str> {
        self.filter(pair).next().map(|f| f.value_code.as_str())
    }

    /// Display title of a movie.
    pub fn title(&self, movie: MovieId) -> Option<&str> {
        self.titles.get(&movie).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn sample() -> KnowledgeGraph {
        KnowledgeGraph::new([
            Fact::new(3, "genre", "Drama", "Q130232"),
            Fact::new(1, "genre", "Comedy", "Q157443"),
            Fact::new(2, "genre", "Comedy", "Q157443"),
            Fact::new(1, "director", "A", "Q1"),
            Fact::new(3, "director", "A", "Q1"),
            Fact::new(2, "director", "B", "Q2"),
        ])
    }

    #[test]
    fn facts_are_grouped_by_movie() {
        let kg = sample();
        assert_eq!(kg.len(), 6);
        assert_eq!(kg.movie_count(), 3);
        let ids: Vec<u64> = kg.facts().iter().map(|f| f.movie.0).collect();
        assert_eq!(ids, vec![1, 1, 2, 2, 3, 3]);
        // Source order survives within a movie.
        assert_eq!(kg.movie_facts(MovieId(1))[0].property, "genre");
        assert_eq!(kg.movie_facts(MovieId(1))[1].property, "director");
    }

    #[test]
    fn filter_by_pair() {
        let kg = sample();
        let comedies: Vec<MovieId> = kg
            .filter(&PropertyValue::new("genre", "Comedy"))
            .map(|f| f.movie)
            .collect();
        assert_eq!(comedies, vec![MovieId(1), MovieId(2)]);
        assert_eq!(kg.rows_matching(&PropertyValue::new("genre", "Horror")).len(), 0);
        assert_eq!(kg.value_code(&PropertyValue::new("director", "A")), Some("Q1"));
    }

    #[test]
    fn unknown_movie_has_no_facts() {
        let kg = sample();
        assert!(kg.movie_facts(MovieId(42)).is_empty());
        assert!(kg.movie_rows(MovieId(42)).is_none());
    }

    #[test]
    fn load_csv_with_titles_and_missing_codes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "movie_id,title,prop,obj,obj_code,imdbId").unwrap();
        writeln!(file, "7,Up,genre,Animation,Q202866,tt1049413").unwrap();
        writeln!(file, "7,Up,director,Pete Docter,,tt1049413").unwrap();
        file.flush().unwrap();

        let kg = KnowledgeGraph::load_csv(file.path()).unwrap();
        assert_eq!(kg.len(), 2);
        assert_eq!(kg.title(MovieId(7)), Some("Up"));
        assert_eq!(
            kg.value_code(&PropertyValue::new("director", "Pete Docter")),
            Some("Pete Docter")
        );
    }

    #[test]
    fn load_csv_reports_bad_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "movie_id,title,prop,obj,obj_code").unwrap();
        writeln!(file, "not-a-number,Up,genre,Animation,Q1").unwrap();
        file.flush().unwrap();

        let err = KnowledgeGraph::load_csv(file.path()).unwrap_err();
        assert!(matches!(err, GraphError::Csv { .. }));
    }
}
