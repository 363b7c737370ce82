use serde::{Deserialize, Serialize};
use std::fmt;

/// The acceptance state of a deployed resource.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum State {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Status {
    pub state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// === impl State ===

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Accepted => f.write_str("Accepted"),
            Self::Rejected => f.write_str("Rejected"),
        }
    }
}

// === impl Status ===

impl Status {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn accepted() -> Self {
        Self {
            state: State::Accepted,
            reason: None,
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        Self {
            state: State::Rejected,
            reason: Some(reason.to_string()),
        }
    }
}

impl From<State> for Status {
    fn from(state: State) -> Self {
        Self {
            state,
            reason: None,
        }
    }
}
