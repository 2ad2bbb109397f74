//! VC flow data structures that are needed on the frontend, without all of the other
//! dependencies that can cause compilation issues with web targets.
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Status of a VC flow.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Status {
    /// The identity provider window has been opened, waiting for it to signal readiness.
    AwaitingReady,
    /// The credential request has been sent, waiting on the identity provider to respond.
    AwaitingResponse,
    /// The flow has finished.
    Complete(Outcome),
}

/// Outcome of a VC flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome {
    /// The identity provider reported an error, or the host failed to relay the request.
    Error { cause: String },
    /// The flow was abandoned (cancelled, timed out, or its window was closed).
    Failure { reason: String },
    /// Credentials were received and decoded.
    Success { info: Json },
}

impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl Outcome {
    fn ordering(&self) -> u8 {
        match self {
            Outcome::Error { .. } => 0,
            Outcome::Failure { .. } => 1,
            Outcome::Success { .. } => 2,
        }
    }
}

impl PartialOrd for Outcome {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.ordering().partial_cmp(&other.ordering())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_compare_by_kind() {
        let a = Outcome::Error {
            cause: "UNKNOWN".into(),
        };
        let b = Outcome::Error {
            cause: "UNSUPPORTED_ORIGIN".into(),
        };
        assert_eq!(a, b);
        assert!(Status::AwaitingReady < Status::AwaitingResponse);
        assert!(Status::AwaitingResponse < Status::Complete(a));
    }
}
