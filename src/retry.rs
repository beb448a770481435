//! The bounded immediate-retry policy: {Attempting -> Success | Attempting -> Retrying ->
//! Attempting | Attempting -> Exhausted}.  No backoff, no distinction between transient and
//! permanent failures; the attempt ceiling is the only stopping condition.

use std::fmt::{Debug, Formatter};

/////////////////////////////////////////////// State //////////////////////////////////////////////

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    /// The next attempt is attempt number `attempt`, counted from one.
    Attempting { attempt: u64 },
    /// The attempt ceiling was reached.
    Exhausted,
}

/////////////////////////////////////////////// Retry //////////////////////////////////////////////

/// Tracks attempts against a configured ceiling.  Callers loop while [Retry::attempting] yields
/// an attempt number and report each failure with [Retry::failed].
pub struct Retry {
    max_attempts: u64,
    state: State,
}

impl Retry {
    /// A fresh policy allowing up to `max_attempts` attempts.  A ceiling of zero is treated as
    /// one; every operation gets at least one attempt.
    pub fn new(max_attempts: u64) -> Self {
        Self {
            max_attempts: std::cmp::max(max_attempts, 1),
            state: State::Attempting { attempt: 1 },
        }
    }

    /// The current attempt number, or None once exhausted.
    pub fn attempting(&self) -> Option<u64> {
        match self.state {
            State::Attempting { attempt } => Some(attempt),
            State::Exhausted => None,
        }
    }

    /// Record a failed attempt and transition to the next state.
    pub fn failed(&mut self) {
        self.state = match self.state {
            State::Attempting { attempt } if attempt < self.max_attempts => {
                State::Attempting { attempt: attempt + 1 }
            }
            _ => State::Exhausted,
        };
    }
}

impl Debug for Retry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(fmt, "{:?}/{}", self.state, self.max_attempts)
    }
}

/////////////////////////////////////////////// tests //////////////////////////////////////////////
