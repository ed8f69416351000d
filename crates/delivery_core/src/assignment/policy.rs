use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::ONE_MIN_MS;
use crate::error::ScenarioError;

/// What happens to a ready order when no courier can be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Resource)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AssignmentRetryPolicy {
    /// Reject with `NoCourierAvailable` on the first failed attempt.
    Reject,
    /// Try again every `interval_ms`. After `max_attempts` failed attempts in
    /// total the order is rejected; `None` retries until a courier frees up.
    Retry {
        interval_ms: u64,
        #[serde(default)]
        max_attempts: Option<u32>,
    },
}

impl Default for AssignmentRetryPolicy {
    fn default() -> Self {
        AssignmentRetryPolicy::Retry {
            interval_ms: ONE_MIN_MS,
            max_attempts: Some(30),
        }
    }
}

/// Decision after a failed assignment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryIn(u64),
    Reject,
}

impl AssignmentRetryPolicy {
    /// A zero interval would requeue the retry at the same instant forever.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        match *self {
            AssignmentRetryPolicy::Retry { interval_ms: 0, .. } => Err(ScenarioError::Invalid(
                "assignment retry interval must be greater than zero".into(),
            )),
            _ => Ok(()),
        }
    }

    /// `failed_attempts` counts the attempt that just failed.
    pub fn decide(&self, failed_attempts: u32) -> RetryDecision {
        match *self {
            AssignmentRetryPolicy::Reject => RetryDecision::Reject,
            AssignmentRetryPolicy::Retry {
                interval_ms,
                max_attempts,
            } => match max_attempts {
                Some(max) if failed_attempts >= max => RetryDecision::Reject,
                _ => RetryDecision::RetryIn(interval_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_gives_up_after_max_attempts() {
        let policy = AssignmentRetryPolicy::Retry {
            interval_ms: 500,
            max_attempts: Some(3),
        };
        assert_eq!(policy.decide(1), RetryDecision::RetryIn(500));
        assert_eq!(policy.decide(2), RetryDecision::RetryIn(500));
        assert_eq!(policy.decide(3), RetryDecision::Reject);
        assert_eq!(AssignmentRetryPolicy::Reject.decide(1), RetryDecision::Reject);
    }

    #[test]
    fn unbounded_retry_never_rejects() {
        let policy = AssignmentRetryPolicy::Retry {
            interval_ms: 10,
            max_attempts: None,
        };
        assert_eq!(policy.decide(10_000), RetryDecision::RetryIn(10));
    }

    #[test]
    fn zero_retry_interval_is_invalid() {
        let policy = AssignmentRetryPolicy::Retry {
            interval_ms: 0,
            max_attempts: None,
        };
        assert!(matches!(policy.validate(), Err(ScenarioError::Invalid(_))));
        assert!(AssignmentRetryPolicy::default().validate().is_ok());
        assert!(AssignmentRetryPolicy::Reject.validate().is_ok());
    }

    #[test]
    fn policy_parses_from_json() {
        let policy: AssignmentRetryPolicy =
            serde_json::from_str(r#"{"policy": "retry", "interval_ms": 30000}"#).expect("parse");
        assert_eq!(
            policy,
            AssignmentRetryPolicy::Retry {
                interval_ms: 30_000,
                max_attempts: None
            }
        );
        let reject: AssignmentRetryPolicy =
            serde_json::from_str(r#"{"policy": "reject"}"#).expect("parse");
        assert_eq!(reject, AssignmentRetryPolicy::Reject);
    }
}
