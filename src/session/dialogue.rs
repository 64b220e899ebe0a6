//! Driving a session to completion against a [`Prompter`].
//!
//! The prompter stands in for whatever talks to the user: a terminal, a chat
//! frontend, or the [`OraclePrompter`] used for simulation and tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bandit::Arm;
use crate::error::SessionResult;
use crate::graph::{KnowledgeGraph, MovieId};
use crate::rank::PropertyScore;

use super::{MovieOutcome, Preference, Recommendation, Response, Session, TerminalReason, Turn};

/// The user's answer to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyChoice {
    Select(usize),
    RejectAll,
}

impl From<PropertyChoice> for Response {
    fn from(choice: PropertyChoice) -> Self {
        match choice {
            PropertyChoice::Select(i) => Response::Select(i),
            PropertyChoice::RejectAll => Response::RejectAll,
        }
    }
}

/// Answers the session's turns.
pub trait Prompter {
    /// Pick one of the offered rows, or none.
    fn choose_property(&mut self, options: &[PropertyScore]) -> PropertyChoice;

    /// Judge a recommended movie.
    fn judge_movie(&mut self, recommendation: &Recommendation) -> MovieOutcome;
}

/// One completed exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub arm: Arm,
    pub turn: Turn,
    pub response: Response,
}

/// How a dialogue run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueOutcome {
    Finished(TerminalReason),
    /// The turn cap was reached with the session still active.
    TurnLimit,
}

/// Record of a dialogue run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub exchanges: Vec<Exchange>,
    pub outcome: DialogueOutcome,
    pub preferences: Vec<Preference>,
    pub watched: Vec<MovieId>,
    /// The accepted movie, when the dialogue ended in acceptance.
    pub accepted: Option<MovieId>,
}

impl Transcript {
    pub fn turns(&self) -> usize {
        self.exchanges.len()
    }

    pub fn questions(&self) -> usize {
        self.exchanges.iter().filter(|e| e.arm == Arm::Ask).count()
    }
}

/// Alternate turns and prompter answers until the session ends or
/// `max_turns` exchanges have taken place.
pub fn run_dialogue<P: Prompter + ?Sized>(
    session: &mut Session,
    prompter: &mut P,
    max_turns: usize,
) -> SessionResult<Transcript> {
    let mut exchanges = Vec::new();
    let mut accepted = None;

    let outcome = loop {
        if exchanges.len() >= max_turns {
            tracing::warn!(max_turns, "dialogue stopped at the turn limit");
            break DialogueOutcome::TurnLimit;
        }
        let turn = session.next_turn()?;
        let response = match &turn {
            Turn::Finished { reason } => break DialogueOutcome::Finished(*reason),
            Turn::Ask { options } => prompter.choose_property(options).into(),
            Turn::Recommend(rec) => {
                let outcome = prompter.judge_movie(rec);
                if outcome == MovieOutcome::Accepted {
                    accepted = Some(rec.movie);
                }
                Response::Movie(outcome)
            }
        };
        session.respond(response)?;
        let arm = turn.arm().unwrap_or(Arm::Ask);
        exchanges.push(Exchange {
            arm,
            turn,
            response,
        });
    };

    Ok(Transcript {
        exchanges,
        outcome,
        preferences: session.preferences().to_vec(),
        watched: session.watched().to_vec(),
        accepted,
    })
}

/// Simulated user who has one target movie in mind.
///
/// Picks the first offered pair the target carries, rejects the rest,
/// accepts only the target and calls movies from its history "watched".
#[derive(Debug, Clone)]
pub struct OraclePrompter {
    kg: Arc<KnowledgeGraph>,
    target: MovieId,
    history: BTreeSet<MovieId>,
}

impl OraclePrompter {
    pub fn new(kg: Arc<KnowledgeGraph>, target: MovieId) -> Self {
        Self {
            kg,
            target,
            history: BTreeSet::new(),
        }
    }

    /// Movies the simulated user has already seen.
    pub fn with_history(mut self, history: impl IntoIterator<Item = MovieId>) -> Self {
        self.history.extend(history);
        self
    }

    pub fn target(&self) -> MovieId {
        self.target
    }
}

impl Prompter for OraclePrompter {
    fn choose_property(&mut self, options: &[PropertyScore]) -> PropertyChoice {
        let facts = self.kg.movie_facts(self.target);
        options
            .iter()
            .position(|o| facts.iter().any(|f| f.matches(&o.pair)))
            .map(PropertyChoice::Select)
            .unwrap_or(PropertyChoice::RejectAll)
    }

    fn judge_movie(&mut self, recommendation: &Recommendation) -> MovieOutcome {
        if recommendation.movie == self.target {
            MovieOutcome::Accepted
        } else if self.history.contains(&recommendation.movie) {
            MovieOutcome::Watched
        } else {
            MovieOutcome::Rejected
        }
    }
}
