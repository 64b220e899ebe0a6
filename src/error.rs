//! Rich diagnostic error types for the cinebot recommender core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. An empty candidate set is deliberately
//! absent from this module: it is a terminal session state, not a failure.

use miette::Diagnostic;
use thiserror::Error;

use crate::bandit::Arm;
use crate::graph::MovieId;
use crate::session::TerminalReason;

/// Top-level error type for the recommender core.
#[derive(Debug, Error, Diagnostic)]
pub enum CineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bandit(#[from] BanditError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("failed to read {path}")]
    #[diagnostic(
        code(cinebot::graph::io),
        help("Check that the data file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in {path}: {message}")]
    #[diagnostic(
        code(cinebot::graph::csv),
        help(
            "Facts are read as CSV with the header `movie_id,title,prop,obj,obj_code`; \
             ratings as tab-separated `user_id movie_id rating` without a header."
        )
    )]
    Csv { path: String, message: String },

    #[error("movie {movie} is not in the candidate graph")]
    #[diagnostic(
        code(cinebot::graph::movie_not_found),
        help(
            "Only movies that are still candidates can be judged. \
             Take the movie id from the latest movie ranking."
        )
    )]
    MovieNotFound { movie: MovieId },
}

pub type GraphResult<T> = std::result::Result<T, GraphError>;

// ---------------------------------------------------------------------------
// Statistics errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StatsError {
    #[error("no global statistics for ({property}, {value})")]
    #[diagnostic(
        code(cinebot::stats::not_found),
        help(
            "The statistics table must cover every (property, value) pair of the \
             knowledge graph. Rebuild it with `cinebot stats build` after changing the facts."
        )
    )]
    PairNotFound { property: String, value: String },

    #[error("failed to access statistics table {path}")]
    #[diagnostic(
        code(cinebot::stats::io),
        help("Check that the statistics path exists and is writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed statistics table {path}: {message}")]
    #[diagnostic(
        code(cinebot::stats::csv),
        help(
            "The table header must be `prop,obj,count,global_zscore,salience,salience_zscore`. \
             The schema is a cross-run cache: rebuild it instead of editing it."
        )
    )]
    Csv { path: String, message: String },
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;

// ---------------------------------------------------------------------------
// Ranking errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RankError {
    #[error("graph-walk ranking over an empty graph")]
    #[diagnostic(
        code(cinebot::rank::empty_graph),
        help("The walk needs at least one node. Check that ratings or candidate facts were loaded.")
    )]
    EmptyGraph,

    #[error("invalid ranking parameters: {message}")]
    #[diagnostic(
        code(cinebot::rank::invalid_weights),
        help(
            "Anchor weights must be non-negative and sum to 1; \
             the damping factor must lie strictly between 0 and 1."
        )
    )]
    InvalidWeights { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Stats(#[from] StatsError),
}

pub type RankResult<T> = std::result::Result<T, RankError>;

// ---------------------------------------------------------------------------
// Bandit errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BanditError {
    #[error("update for arm {arm} which was not returned by the outstanding pull")]
    #[diagnostic(
        code(cinebot::bandit::unpulled_arm),
        help("Every update must follow exactly one `pull()` and name the arm it returned.")
    )]
    UnpulledArm { arm: Arm },

    #[error("invalid Beta posterior: {message}")]
    #[diagnostic(
        code(cinebot::bandit::invalid_posterior),
        help("Posterior counters start at (1, 1) and only grow; this indicates corrupted state.")
    )]
    InvalidPosterior { message: String },
}

pub type BanditResult<T> = std::result::Result<T, BanditError>;

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("session already finished: {reason}")]
    #[diagnostic(
        code(cinebot::session::terminal),
        help("Start a new session; a finished dialogue accepts no further input.")
    )]
    Terminal { reason: TerminalReason },

    #[error("no turn is waiting for a response")]
    #[diagnostic(
        code(cinebot::session::no_pending_turn),
        help("Call `next_turn()` before `respond()`.")
    )]
    NoPendingTurn,

    #[error("response does not answer the pending {expected} turn")]
    #[diagnostic(
        code(cinebot::session::response_mismatch),
        help("Answer a question with a property choice and a recommendation with a movie outcome.")
    )]
    ResponseMismatch { expected: &'static str },

    #[error("option {index} is out of range for {len} offered properties")]
    #[diagnostic(
        code(cinebot::session::option_out_of_range),
        help("Choose one of the offered rows by its zero-based position.")
    )]
    OptionOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Bandit(#[from] BanditError),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cinebot::config::read),
        help("Ensure the config file exists, or omit `--config` to use the defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(cinebot::config::parse),
        help("Check the TOML syntax. Unknown sections are rejected.")
    )]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience result alias for the top-level API.
pub type CineResult<T> = std::result::Result<T, CineError>;
