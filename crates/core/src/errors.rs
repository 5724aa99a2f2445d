use thiserror::Error;

use crate::schedule::{FetchError, ParseError};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ScheduleError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Parse(_) => "parse",
        }
    }

    /// Text safe to show in a channel when a query fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "I couldn't get the food truck schedule right now. Try again later.",
            Self::Parse(_) => {
                "The food truck schedule page looks different than I expected. Try again later."
            }
        }
    }
}
