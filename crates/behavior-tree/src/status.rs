//! Status returned by behavior nodes.

use std::fmt;

/// The result of evaluating a behavior node once.
///
/// # Tick Semantics
///
/// A tick may conclude immediately or report that its work is still in
/// progress. Callers that drive a tree periodically (see [`crate::Ticker`])
/// simply tick the root again on the next period until the status settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Status {
    /// The behavior has not concluded yet.
    ///
    /// Returned by [`crate::async_tick`] wrappers while the background work
    /// is outstanding.
    Running,

    /// The behavior completed successfully.
    ///
    /// For conditions: The condition was met.
    /// For actions: The action executed without errors.
    Success,

    /// The behavior failed.
    ///
    /// For conditions: The condition was not met.
    /// For actions: The action could not be executed.
    Failure,
}

impl Status {
    /// Returns `true` if this status is `Running`.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running)
    }

    /// Returns `true` if this status is `Success`.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    /// Returns `true` if this status is `Failure`.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failure)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Running => "running",
            Status::Success => "success",
            Status::Failure => "failure",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_exactly_one_variant() {
        for status in [Status::Running, Status::Success, Status::Failure] {
            let hits = [status.is_running(), status.is_success(), status.is_failure()];
            assert_eq!(hits.iter().filter(|hit| **hit).count(), 1, "{status}");
        }
    }

    #[test]
    fn display_is_lower_case() {
        assert_eq!(Status::Running.to_string(), "running");
        assert_eq!(Status::Success.to_string(), "success");
        assert_eq!(Status::Failure.to_string(), "failure");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&Status::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: Status = serde_json::from_str("\"failure\"").unwrap();
        assert_eq!(parsed, Status::Failure);
    }
}
