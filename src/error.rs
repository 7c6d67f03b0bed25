use thiserror::Error;

#[derive(Debug, Error)]
/// Error type for environment sampling, solver runs, and grid construction.
pub enum MdpError {
    #[error("state {0} does not belong to this environment")]
    UnknownState(String),

    #[error("no value recorded for state {state} and action {action}")]
    MissingValue { state: String, action: String },

    #[error(
        "transition probabilities for state {state}, action {action} sum to {sum}, draw fell past the distribution"
    )]
    Unnormalized {
        state: String,
        action: String,
        sum: f64,
    },

    #[error("environment has no non-terminal states")]
    NoNonTerminalStates,

    #[error("state {0} has no legal actions")]
    NoLegalActions(String),

    #[error("solver did not converge within {limit} iterations")]
    IterationLimit { limit: u32 },

    #[error("failed to read layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("layout contains no cells")]
    EmptyLayout,

    #[error("layout line {line} has {found} cells, expected {expected}")]
    RaggedLayout {
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl MdpError {
    pub(crate) fn missing_value<S, A>(state: &S, action: Option<&A>) -> Self
    where
        S: std::fmt::Debug,
        A: std::fmt::Debug,
    {
        Self::MissingValue {
            state: format!("{state:?}"),
            action: format!("{action:?}"),
        }
    }
}
