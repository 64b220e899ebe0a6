//! End-to-end dialogue tests over a corpus loaded from disk.

use std::path::Path;

use cinebot::config::{DataConfig, RecommenderConfig};
use cinebot::corpus::Corpus;
use cinebot::graph::{MovieId, PropertyValue};
use cinebot::rank::{PropertyStrategy, WalkConfig};
use cinebot::session::{
    DialogueOutcome, MovieOutcome, OraclePrompter, RejectionMode, Response, SessionConfig,
    TerminalReason, Turn, run_dialogue,
};
use cinebot::stats::GlobalStatistics;

const FACTS: &str = "\
movie_id,title,prop,obj,obj_code
1,Alpha,genre,comedy film,Q157443
1,Alpha,director,Ann,Q1001
1,Alpha,country,United States,Q30
2,Bravo,genre,comedy film,Q157443
2,Bravo,director,Bob,Q1002
2,Bravo,country,United Kingdom,Q145
2,Bravo,cast member,Cleo,Q2001
3,Charlie,genre,drama film,Q130232
3,Charlie,director,Ann,Q1001
3,Charlie,country,United States,Q30
4,Delta,genre,comedy film,Q157443
4,Delta,director,Dan,Q1003
4,Delta,country,France,Q142
4,Delta,cast member,Cleo,Q2001
4,Delta,cast member,Eve,Q2002
5,Echo,genre,comedy film,Q157443
5,Echo,director,Ann,Q1001
5,Echo,country,United States,Q30
5,Echo,cast member,Eve,Q2002
6,Foxtrot,genre,drama film,Q130232
6,Foxtrot,director,Bob,Q1002
6,Foxtrot,country,France,Q142
";

const RATINGS: &str = "\
10\t1\t4.0
10\t2\t5.0
11\t2\t3.0
11\t4\t4.5
12\t5\t2.0
12\t4\t5.0
13\t3\t4.0
13\t6\t1.0
";

fn write_corpus(dir: &Path) -> DataConfig {
    let facts = dir.join("facts.csv");
    let ratings = dir.join("ratings.txt");
    std::fs::write(&facts, FACTS).unwrap();
    std::fs::write(&ratings, RATINGS).unwrap();
    DataConfig {
        facts,
        ratings,
        stats: dir.join("global_properties.csv"),
        min_rating: None,
    }
}

fn load() -> (tempfile::TempDir, Corpus) {
    let dir = tempfile::TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let corpus = Corpus::load(&data, &WalkConfig::default()).unwrap();
    (dir, corpus)
}

fn comedy() -> PropertyValue {
    PropertyValue::new("genre", "comedy film")
}

fn seeded(seed: u64) -> SessionConfig {
    SessionConfig {
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn corpus_loads_and_builds_missing_statistics() {
    let (_dir, corpus) = load();
    let info = corpus.info();
    assert_eq!(info.movies, 6);
    assert_eq!(info.facts, 22);
    assert_eq!(info.interactions, 8);
    assert_eq!(corpus.knowledge_graph().title(MovieId(4)), Some("Delta"));
    assert!(corpus.stats().get(&comedy()).is_ok());
}

#[test]
fn saved_statistics_are_reloaded() {
    let dir = tempfile::TempDir::new().unwrap();
    let data = write_corpus(dir.path());
    let fresh = Corpus::load(&data, &WalkConfig::default()).unwrap();
    fresh.stats().save_csv(&data.stats).unwrap();

    let reloaded = GlobalStatistics::load_csv(&data.stats).unwrap();
    assert_eq!(reloaded.len(), fresh.stats().len());
    let a = fresh.stats().get(&comedy()).unwrap();
    let b = reloaded.get(&comedy()).unwrap();
    assert_eq!(a.count, 4);
    assert_eq!(b.count, 4);
    assert!((a.zscore - b.zscore).abs() < 1e-12);
}

#[test]
fn min_rating_drops_low_ratings() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut data = write_corpus(dir.path());
    data.min_rating = Some(3.0);
    let corpus = Corpus::load(&data, &WalkConfig::default()).unwrap();
    assert_eq!(corpus.interactions().len(), 6);
}

#[test]
fn oracle_reaches_its_target_for_some_seed() {
    let (_dir, corpus) = load();
    let mut accepted = 0;
    for seed in 0..20 {
        let mut session = corpus.create_session(99, comedy(), seeded(seed)).unwrap();
        let mut oracle = OraclePrompter::new(corpus.knowledge_graph().clone(), MovieId(4));
        let transcript = run_dialogue(&mut session, &mut oracle, 100).unwrap();

        match transcript.outcome {
            DialogueOutcome::Finished(TerminalReason::Accepted) => {
                assert_eq!(transcript.accepted, Some(MovieId(4)));
                accepted += 1;
            }
            DialogueOutcome::Finished(TerminalReason::Exhausted) => {}
            DialogueOutcome::TurnLimit => panic!("seed {seed} did not finish"),
        }
        // Every accepted preference is a pair of the target.
        let target = corpus.knowledge_graph().movie_facts(MovieId(4));
        for pref in &transcript.preferences {
            assert!(target.iter().any(|f| f.matches(&pref.pair)));
        }
    }
    assert!(accepted > 0, "no seed reached the target");
}

#[test]
fn same_seed_same_dialogue() {
    let (_dir, corpus) = load();
    let run = |seed| {
        let mut session = corpus.create_session(99, comedy(), seeded(seed)).unwrap();
        let mut oracle = OraclePrompter::new(corpus.knowledge_graph().clone(), MovieId(5));
        let transcript = run_dialogue(&mut session, &mut oracle, 100).unwrap();
        transcript
            .exchanges
            .iter()
            .map(|e| (e.arm, e.response))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(7), run(7));
}

#[test]
fn graph_walk_strategy_runs_a_dialogue() {
    let (_dir, corpus) = load();
    let config = SessionConfig {
        strategy: PropertyStrategy::GraphWalk,
        use_value_anchors: true,
        seed: Some(3),
        ..Default::default()
    };
    let mut session = corpus.create_session(99, comedy(), config).unwrap();
    let mut oracle = OraclePrompter::new(corpus.knowledge_graph().clone(), MovieId(2))
        .with_history([MovieId(1)]);
    let transcript = run_dialogue(&mut session, &mut oracle, 100).unwrap();
    assert!(matches!(transcript.outcome, DialogueOutcome::Finished(_)));
}

#[test]
fn watched_answer_rewards_recommend_and_anchors() {
    let (_dir, corpus) = load();
    for seed in 0..20 {
        let mut session = corpus.create_session(99, comedy(), seeded(seed)).unwrap();
        let Turn::Recommend(rec) = session.next_turn().unwrap() else {
            continue;
        };
        session
            .respond(Response::Movie(MovieOutcome::Watched))
            .unwrap();
        let state = session.bandit_state();
        assert_eq!(state.posterior(cinebot::bandit::Arm::Recommend).alpha, 2);
        assert_eq!(session.watched(), &[rec.movie]);
        assert!(!session.candidates().contains_movie(rec.movie));
        assert_eq!(session.interactions().watched_edges().len(), 1);
        // The shared history is untouched.
        assert_eq!(corpus.interactions().len(), 8);
        return;
    }
    panic!("no seed recommended on the first turn");
}

#[test]
fn rejecting_all_strips_or_drops() {
    let (_dir, corpus) = load();
    let cleo = PropertyValue::new("cast member", "Cleo");

    let mut strip = corpus.create_session(99, comedy(), seeded(1)).unwrap();
    strip.reject_properties(&[cleo.clone()]).unwrap();
    assert!(strip.candidates().contains_movie(MovieId(2)));
    assert!(!strip.candidates().contains_pair(&cleo));

    let mut drop = corpus
        .create_session(
            99,
            comedy(),
            SessionConfig {
                rejection_mode: RejectionMode::DropMovies,
                ..seeded(1)
            },
        )
        .unwrap();
    drop.reject_properties(&[cleo]).unwrap();
    assert!(!drop.candidates().contains_movie(MovieId(2)));
    assert!(!drop.candidates().contains_movie(MovieId(4)));
    assert_eq!(drop.candidates().movie_ids(), vec![MovieId(1), MovieId(5)]);
}

#[test]
fn accepting_a_recommendation_is_terminal() {
    let (_dir, corpus) = load();
    let mut session = corpus.create_session(99, comedy(), seeded(0)).unwrap();
    session
        .record_movie_outcome(MovieId(1), MovieOutcome::Accepted)
        .unwrap();
    assert!(session.is_terminal());
    assert_eq!(session.terminal_reason(), Some(TerminalReason::Accepted));
    assert!(session.respond(Response::RejectAll).is_err());
}

#[test]
fn config_file_drives_sessions() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cinebot.toml");
    std::fs::write(
        &path,
        "[ranking]\ntop_n = 2\n\n[session]\nseed = 5\nmax_turns = 10\n",
    )
    .unwrap();
    let config = RecommenderConfig::load(&path).unwrap();

    let (_data, corpus) = load();
    let mut session = corpus
        .create_session(99, comedy(), config.session_config())
        .unwrap();
    for _ in 0..config.session.max_turns {
        match session.next_turn().unwrap() {
            Turn::Ask { options } => {
                assert!(options.len() <= 2);
                session.respond(Response::RejectAll).unwrap();
            }
            Turn::Recommend(_) => session
                .respond(Response::Movie(MovieOutcome::Rejected))
                .unwrap(),
            Turn::Finished { reason } => {
                assert_eq!(reason, TerminalReason::Exhausted);
                return;
            }
        }
    }
}
