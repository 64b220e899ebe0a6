//! The turn protocol: rank, let the bandit pick an action, present it, apply
//! the response, reward the bandit.
//!
//! Reward rule: 1 when the user picks the top-ranked property of a question,
//! 1 when a recommended movie is answered "watched", 0 for every other answer.

use serde::{Deserialize, Serialize};

use crate::bandit::Arm;
use crate::error::{SessionError, SessionResult};
use crate::graph::{MovieId, PropertyValue};
use crate::rank::{MovieScore, PropertyScore, PropertyStrategy};

use super::{MovieOutcome, Session, SessionStatus, TerminalReason};

/// What the session presents to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Pick one of these properties, or reject them all.
    Ask { options: Vec<PropertyScore> },
    /// Judge this movie.
    Recommend(Recommendation),
    /// The dialogue is over.
    Finished { reason: TerminalReason },
}

impl Turn {
    /// The bandit arm behind this turn, if one was pulled.
    pub fn arm(&self) -> Option<Arm> {
        match self {
            Turn::Ask { .. } => Some(Arm::Ask),
            Turn::Recommend(_) => Some(Arm::Recommend),
            Turn::Finished { .. } => None,
        }
    }
}

/// The top-ranked movie with a human-readable justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub movie: MovieId,
    pub title: Option<String>,
    pub score: f64,
    /// Accepted preferences the movie satisfies.
    pub because: Vec<PropertyValue>,
}

/// The user's answer to the pending turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    /// Zero-based row of the offered properties.
    Select(usize),
    /// None of the offered properties.
    RejectAll,
    /// Answer to a recommendation.
    Movie(MovieOutcome),
}

/// A presented turn awaiting its response.
#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Ask(Vec<PropertyScore>),
    Recommend(MovieScore),
}

impl Pending {
    fn arm(&self) -> Arm {
        match self {
            Pending::Ask(_) => Arm::Ask,
            Pending::Recommend(_) => Arm::Recommend,
        }
    }
}

impl Session {
    /// Property and movie rankings under the configured strategy.
    pub fn rankings(&self) -> SessionResult<(Vec<PropertyScore>, Vec<MovieScore>)> {
        let config = &self.config;
        let properties = match config.strategy {
            PropertyStrategy::Statistical => self.rank_properties(config.property_weights)?,
            PropertyStrategy::GraphWalk => self.rank_properties_by_walk(
                config.use_value_anchors,
                config.anchor_weights,
                config.walk_property_weights,
            )?,
        };
        let movies = self.rank_movies(config.use_value_anchors, config.anchor_weights)?;
        Ok((properties, movies))
    }

    /// Present the next turn.
    ///
    /// Rankings are recomputed from the current state. A turn already waiting
    /// for its response is presented again without pulling the bandit.
    pub fn next_turn(&mut self) -> SessionResult<Turn> {
        if let SessionStatus::Terminal(reason) = self.status {
            return Ok(Turn::Finished { reason });
        }
        if let Some(pending) = &self.pending {
            return Ok(self.present(pending.clone()));
        }
        if self.candidates.is_empty() {
            self.finish(TerminalReason::Exhausted);
            return Ok(Turn::Finished {
                reason: TerminalReason::Exhausted,
            });
        }

        let (properties, movies) = self.rankings()?;
        if properties.is_empty() || movies.is_empty() {
            self.finish(TerminalReason::Exhausted);
            return Ok(Turn::Finished {
                reason: TerminalReason::Exhausted,
            });
        }

        let pending = match self.bandit.pull()? {
            Arm::Ask => {
                let mut options = properties;
                options.truncate(self.config.top_n.max(1));
                Pending::Ask(options)
            }
            Arm::Recommend => Pending::Recommend(movies[0]),
        };
        match &pending {
            Pending::Ask(options) => {
                tracing::info!(turn = self.turns, options = options.len(), "asking")
            }
            Pending::Recommend(top) => {
                tracing::info!(turn = self.turns, movie = %top.movie, score = top.score, "recommending")
            }
        }
        let turn = self.present(pending.clone());
        self.pending = Some(pending);
        Ok(turn)
    }

    /// Apply the user's answer to the pending turn and reward the bandit.
    pub fn respond(&mut self, response: Response) -> SessionResult<()> {
        self.ensure_active()?;
        let pending = self.pending.take().ok_or(SessionError::NoPendingTurn)?;
        let arm = pending.arm();

        let reward = match (pending, response) {
            (Pending::Ask(options), Response::Select(index)) => {
                let Some(choice) = options.get(index) else {
                    let len = options.len();
                    self.pending = Some(Pending::Ask(options));
                    return Err(SessionError::OptionOutOfRange { index, len });
                };
                let (pair, code) = (choice.pair.clone(), choice.value_code.clone());
                self.accept(pair, Some(code))?;
                index == 0
            }
            (Pending::Ask(options), Response::RejectAll) => {
                let pairs: Vec<PropertyValue> = options.into_iter().map(|o| o.pair).collect();
                self.reject_properties(&pairs)?;
                false
            }
            (Pending::Recommend(top), Response::Movie(outcome)) => {
                self.record_movie_outcome(top.movie, outcome)?;
                outcome == MovieOutcome::Watched
            }
            (pending @ Pending::Ask(_), Response::Movie(_)) => {
                self.pending = Some(pending);
                return Err(SessionError::ResponseMismatch { expected: "ask" });
            }
            (pending @ Pending::Recommend(_), _) => {
                self.pending = Some(pending);
                return Err(SessionError::ResponseMismatch {
                    expected: "recommend",
                });
            }
        };

        self.bandit.update(arm, reward)?;
        self.turns += 1;
        Ok(())
    }

    fn present(&self, pending: Pending) -> Turn {
        match pending {
            Pending::Ask(options) => Turn::Ask { options },
            Pending::Recommend(top) => {
                let kg = self.candidates.knowledge_graph();
                let facts = kg.movie_facts(top.movie);
                let because = self
                    .preferences
                    .iter()
                    .filter(|p| facts.iter().any(|f| f.matches(&p.pair)))
                    .map(|p| p.pair.clone())
                    .collect();
                Turn::Recommend(Recommendation {
                    movie: top.movie,
                    title: kg.title(top.movie).map(str::to_owned),
                    score: top.score,
                    because,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use crate::session::tests::{scenario_session, scenario_session_with};

    fn comedy() -> Session {
        scenario_session(PropertyValue::new("genre", "Comedy")).unwrap()
    }

    /// A fresh comedy session whose first turn pulled `arm`.
    fn opening_with(arm: Arm) -> (Session, Turn) {
        for seed in 0..64 {
            let config = SessionConfig {
                seed: Some(seed),
                ..Default::default()
            };
            let mut s = scenario_session_with(PropertyValue::new("genre", "Comedy"), config).unwrap();
            let turn = s.next_turn().unwrap();
            if turn.arm() == Some(arm) {
                return (s, turn);
            }
        }
        panic!("no seed opened with {arm:?}");
    }

    #[test]
    fn respond_without_turn_fails() {
        let mut s = comedy();
        assert!(matches!(
            s.respond(Response::RejectAll),
            Err(SessionError::NoPendingTurn)
        ));
    }

    #[test]
    fn pending_turn_is_presented_again() {
        let mut s = comedy();
        let first = s.next_turn().unwrap();
        let pulls = s.bandit_state().pulls(Arm::Ask) + s.bandit_state().pulls(Arm::Recommend);
        let again = s.next_turn().unwrap();
        assert_eq!(first, again);
        let after = s.bandit_state().pulls(Arm::Ask) + s.bandit_state().pulls(Arm::Recommend);
        assert_eq!(pulls, after);
    }

    #[test]
    fn mismatched_response_keeps_the_turn() {
        let mut s = comedy();
        let turn = s.next_turn().unwrap();
        let wrong = match turn {
            Turn::Ask { .. } => Response::Movie(MovieOutcome::Rejected),
            Turn::Recommend(_) => Response::Select(0),
            Turn::Finished { .. } => panic!("fresh session finished"),
        };
        assert!(matches!(
            s.respond(wrong),
            Err(SessionError::ResponseMismatch { .. })
        ));
        assert_eq!(s.next_turn().unwrap(), turn);
    }

    #[test]
    fn first_row_selection_rewards_ask() {
        let mut s = comedy();
        // Drive until the bandit asks.
        for _ in 0..20 {
            match s.next_turn().unwrap() {
                Turn::Ask { options } => {
                    assert!(options.len() <= s.config().top_n);
                    assert!(matches!(
                        s.respond(Response::Select(options.len())),
                        Err(SessionError::OptionOutOfRange { .. })
                    ));
                    let before = s.bandit_state().posterior(Arm::Ask);
                    s.respond(Response::Select(0)).unwrap();
                    let after = s.bandit_state().posterior(Arm::Ask);
                    assert_eq!(after.alpha, before.alpha + 1);
                    assert!(s.preferences().iter().any(|p| p.pair == options[0].pair));
                    return;
                }
                Turn::Recommend(rec) => {
                    let before = s.bandit_state().posterior(Arm::Recommend);
                    s.respond(Response::Movie(MovieOutcome::Watched)).unwrap();
                    let after = s.bandit_state().posterior(Arm::Recommend);
                    assert_eq!(after.alpha, before.alpha + 1);
                    assert!(s.watched().contains(&rec.movie));
                }
                Turn::Finished { .. } => return,
            }
        }
    }

    #[test]
    fn recommendation_explains_itself() {
        let mut s = comedy();
        for _ in 0..20 {
            match s.next_turn().unwrap() {
                Turn::Recommend(rec) => {
                    assert_eq!(rec.because, vec![PropertyValue::new("genre", "Comedy")]);
                    s.respond(Response::Movie(MovieOutcome::Accepted)).unwrap();
                    assert_eq!(s.terminal_reason(), Some(TerminalReason::Accepted));
                    // Accepting earns no reward.
                    assert_eq!(s.bandit_state().posterior(Arm::Recommend).alpha, 1);
                    assert_eq!(
                        s.next_turn().unwrap(),
                        Turn::Finished {
                            reason: TerminalReason::Accepted
                        }
                    );
                    return;
                }
                Turn::Ask { .. } => s.respond(Response::RejectAll).unwrap(),
                Turn::Finished { .. } => return,
            }
        }
    }

    #[test]
    fn lower_row_selection_penalizes_ask() {
        let (mut s, turn) = opening_with(Arm::Ask);
        let Turn::Ask { options } = turn else {
            unreachable!()
        };
        assert!(options.len() > 1);
        let ask = s.bandit_state().posterior(Arm::Ask);
        let recommend = s.bandit_state().posterior(Arm::Recommend);

        s.respond(Response::Select(1)).unwrap();
        let after = s.bandit_state().posterior(Arm::Ask);
        assert_eq!(after.alpha, ask.alpha);
        assert_eq!(after.beta, ask.beta + 1);
        assert_eq!(s.bandit_state().posterior(Arm::Recommend), recommend);
        assert!(s.preferences().iter().any(|p| p.pair == options[1].pair));
    }

    #[test]
    fn rejecting_all_rows_penalizes_ask() {
        let (mut s, turn) = opening_with(Arm::Ask);
        let Turn::Ask { options } = turn else {
            unreachable!()
        };
        let ask = s.bandit_state().posterior(Arm::Ask);

        s.respond(Response::RejectAll).unwrap();
        let after = s.bandit_state().posterior(Arm::Ask);
        assert_eq!(after.alpha, ask.alpha);
        assert_eq!(after.beta, ask.beta + 1);
        for option in &options {
            assert!(!s.candidates().contains_pair(&option.pair));
        }
        assert_eq!(s.preferences().len(), 1);
    }

    #[test]
    fn rejected_recommendation_penalizes_recommend() {
        let (mut s, turn) = opening_with(Arm::Recommend);
        let Turn::Recommend(rec) = turn else {
            unreachable!()
        };
        let ask = s.bandit_state().posterior(Arm::Ask);
        let recommend = s.bandit_state().posterior(Arm::Recommend);

        s.respond(Response::Movie(MovieOutcome::Rejected)).unwrap();
        let after = s.bandit_state().posterior(Arm::Recommend);
        assert_eq!(after.alpha, recommend.alpha);
        assert_eq!(after.beta, recommend.beta + 1);
        assert_eq!(s.bandit_state().posterior(Arm::Ask), ask);
        assert!(!s.candidates().contains_movie(rec.movie));
        assert!(s.watched().is_empty());
    }
}
