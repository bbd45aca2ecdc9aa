//! Library error type.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, GambitError>;

/// Errors produced while building games, profiles, or solving.
#[derive(Debug, Error)]
pub enum GambitError {
    #[error("a game needs at least one player")]
    NoPlayers,

    #[error("payoff table size overflows for this game shape")]
    GameTooLarge,

    #[error("player {player} has no strategies")]
    EmptyStrategySet { player: usize },

    #[error("game has {expected} payoff entries but {actual} were supplied")]
    PayoffLength { expected: usize, actual: usize },

    #[error("mismatching number of players: expected {expected}, got {actual}")]
    PlayerCount { expected: usize, actual: usize },

    #[error("mismatching number of strategies for player {player}: expected {expected}, got {actual}")]
    StrategyCount {
        player: usize,
        expected: usize,
        actual: usize,
    },

    #[error("profile has {actual} entries but the game has {expected} strategies")]
    ProfileLength { expected: usize, actual: usize },

    #[error("no such player: {player}")]
    NoSuchPlayer { player: usize },

    #[error("perturbation dimension mismatch: expected {expected}, got {actual}")]
    PerturbationLength { expected: usize, actual: usize },

    #[error("perturbation vector must be nonzero")]
    ZeroPerturbation,

    #[error("perturbation has tied best responses for player {player}")]
    TiedPerturbation { player: usize },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("singular Jacobian while following the equilibrium path")]
    Singular,

    #[error("step size collapsed at lambda = {lambda}")]
    StepCollapse { lambda: f64 },

    #[error("path turned back above its starting point at lambda = {lambda}")]
    PathReversed { lambda: f64 },

    #[error("several support changes coincide at lambda = {lambda}")]
    DegenerateBoundary { lambda: f64 },

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GambitError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        GambitError::Parse {
            line,
            message: message.into(),
        }
    }
}
