use thiserror::Error;

use crate::Timestamp;

/// Errors raised by providers, hubs and config builders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no record at timestamp {0}")]
    NotFound(Timestamp),

    #[error("index {index} out of range for cache of {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    /// Recomputing from this timestamp would read records already pruned.
    #[error("history needed to recompute from {0} was pruned")]
    HistoryPruned(Timestamp),

    /// A node was mutated while it was still reacting to a previous change.
    #[error("{0} is busy propagating a change")]
    Reentrant(String),

    #[error("{label} received more than {limit} identical records in a row")]
    Overflow { label: String, limit: u8 },

    /// The provider faulted earlier and refuses further mutations.
    #[error("{0} is faulted")]
    Faulted(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        assert_eq!(
            Error::MissingParameter("length").to_string(),
            "missing required parameter `length`"
        );
        assert_eq!(
            Error::IndexOutOfRange { index: 5, len: 3 }.to_string(),
            "index 5 out of range for cache of 3 records"
        );
        assert_eq!(
            Error::HistoryPruned(40).to_string(),
            "history needed to recompute from 40 was pruned"
        );
        assert_eq!(
            Error::Overflow {
                label: "QUOTES".into(),
                limit: 100
            }
            .to_string(),
            "QUOTES received more than 100 identical records in a row"
        );
    }
}
