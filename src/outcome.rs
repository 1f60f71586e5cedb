//! Best-effort step results
//!
//! Detection, translation and reply generation never fail the request. They
//! fall back to a default value instead, and report that they did so through
//! [`Outcome`] so callers and tests can tell a real result from a fallback.

use std::fmt;

/// Whether a best-effort step produced its real result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The step ran and its result is authoritative
    Succeeded,
    /// The step failed and a fallback value was used
    Degraded {
        /// Why the fallback was used
        reason: String,
    },
}

impl Outcome {
    /// Build a degraded outcome from any displayable cause
    pub fn degraded(reason: impl fmt::Display) -> Self {
        Self::Degraded {
            reason: reason.to_string(),
        }
    }

    /// Whether the step fell back
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// A value paired with the outcome of the step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradable<T> {
    /// The produced or fallback value
    pub value: T,
    /// How the value was obtained
    pub outcome: Outcome,
}

impl<T> Degradable<T> {
    /// Wrap an authoritative value
    pub const fn succeeded(value: T) -> Self {
        Self {
            value,
            outcome: Outcome::Succeeded,
        }
    }

    /// Wrap a fallback value
    pub fn degraded(value: T, reason: impl fmt::Display) -> Self {
        Self {
            value,
            outcome: Outcome::degraded(reason),
        }
    }

    /// Whether the value is a fallback
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.outcome.is_degraded()
    }

    /// Discard the outcome
    pub fn into_value(self) -> T {
        self.value
    }
}
