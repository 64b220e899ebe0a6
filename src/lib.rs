// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cinebot
//!
//! The core of a conversational movie recommender. Starting from one stated
//! preference, a session alternates between asking the user about a
//! (property, value) pair and recommending a movie, until the user accepts a
//! movie or nothing is left to offer.
//!
//! ## Architecture
//!
//! - **Graphs** (`graph`): fact arena, narrowed candidate views, interaction edges
//! - **Statistics** (`stats`): entropy, z-scores and the corpus-wide table
//! - **Ranking** (`rank`): property relevance and personalized PageRank
//! - **Bandit** (`bandit`): Thompson sampling over ask / recommend
//! - **Session** (`session`): per-user state machine and the turn protocol
//! - **Corpus** (`corpus`): shared data and session creation
//!
//! ## Library usage
//!
//! ```no_run
//! use cinebot::config::RecommenderConfig;
//! use cinebot::corpus::Corpus;
//! use cinebot::graph::PropertyValue;
//! use cinebot::session::{Response, Turn};
//!
//! let config = RecommenderConfig::default();
//! let corpus = Corpus::load(&config.data, &config.ranking.walk()).unwrap();
//! let mut session = corpus
//!     .create_session(1, PropertyValue::new("genre", "comedy film"), config.session_config())
//!     .unwrap();
//! if let Turn::Ask { options } = session.next_turn().unwrap() {
//!     println!("{} options", options.len());
//!     session.respond(Response::Select(0)).unwrap();
//! }
//! ```

pub mod bandit;
pub mod config;
pub mod corpus;
pub mod error;
pub mod graph;
pub mod rank;
pub mod session;
pub mod stats;
