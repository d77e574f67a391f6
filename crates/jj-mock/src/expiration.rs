//! Policies deciding when a mock handler stops being eligible.
//!
//! A policy is consulted once per request that otherwise matched its
//! handler, so failed matcher checks never consume the budget.

use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("max_requests must be greater than zero, got {0}")]
    NonPositiveBudget(i64),
}

/// Counter shared by every request hitting one registration.
pub struct RequestBudget {
    max: u32,
    served: Mutex<u32>,
}

impl RequestBudget {
    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn served(&self) -> u32 {
        *self.served.lock()
    }
}

pub enum ExpirationPolicy {
    /// Always eligible.
    Never,
    /// Eligible for the first `max` requests.
    AfterRequests(RequestBudget),
}

impl ExpirationPolicy {
    pub fn never() -> Self {
        ExpirationPolicy::Never
    }

    pub fn after_requests(max: i64) -> Result<Self, PolicyError> {
        let max = u32::try_from(max)
            .ok()
            .filter(|max| *max > 0)
            .ok_or(PolicyError::NonPositiveBudget(max))?;
        Ok(ExpirationPolicy::AfterRequests(RequestBudget {
            max,
            served: Mutex::new(0),
        }))
    }

    /// Count one request; `true` once the budget is spent.
    ///
    /// An expired policy stays expired and its counter no longer moves.
    pub fn is_expired(&self) -> bool {
        match self {
            ExpirationPolicy::Never => false,
            ExpirationPolicy::AfterRequests(budget) => {
                let mut served = budget.served.lock();
                if *served < budget.max {
                    *served += 1;
                    false
                } else {
                    true
                }
            }
        }
    }
}

/// Cloning yields a fresh policy with its counter at zero.
impl Clone for ExpirationPolicy {
    fn clone(&self) -> Self {
        match self {
            ExpirationPolicy::Never => ExpirationPolicy::Never,
            ExpirationPolicy::AfterRequests(budget) => {
                ExpirationPolicy::AfterRequests(RequestBudget {
                    max: budget.max,
                    served: Mutex::new(0),
                })
            }
        }
    }
}

/// Compares configuration, not counter state.
impl PartialEq for ExpirationPolicy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ExpirationPolicy::Never, ExpirationPolicy::Never) => true,
            (ExpirationPolicy::AfterRequests(a), ExpirationPolicy::AfterRequests(b)) => {
                a.max == b.max
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ExpirationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationPolicy::Never => f.write_str("ExpireNever"),
            ExpirationPolicy::AfterRequests(budget) => f
                .debug_struct("ExpireAfterRequests")
                .field("max", &budget.max)
                .field("served", &budget.served())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_never_expires() {
        let policy = ExpirationPolicy::never();
        for _ in 0..100 {
            assert!(!policy.is_expired());
        }
    }

    #[test]
    fn test_after_requests_sequence() {
        let policy = ExpirationPolicy::after_requests(2).unwrap();
        assert!(!policy.is_expired());
        assert!(!policy.is_expired());
        assert!(policy.is_expired());
        assert!(policy.is_expired());

        let ExpirationPolicy::AfterRequests(budget) = &policy else {
            panic!("expected AfterRequests");
        };
        assert_eq!(budget.served(), 2);
    }

    #[test]
    fn test_non_positive_budget_rejected() {
        assert_eq!(
            ExpirationPolicy::after_requests(0).unwrap_err(),
            PolicyError::NonPositiveBudget(0)
        );
        assert_eq!(
            ExpirationPolicy::after_requests(-3).unwrap_err(),
            PolicyError::NonPositiveBudget(-3)
        );
    }

    #[test]
    fn test_clone_resets_counter() {
        let policy = ExpirationPolicy::after_requests(1).unwrap();
        assert!(!policy.is_expired());
        assert!(policy.is_expired());

        let copy = policy.clone();
        assert_eq!(copy, policy);
        assert!(!copy.is_expired());
    }

    #[test]
    fn test_concurrent_requests_do_not_lose_updates() {
        let policy = Arc::new(ExpirationPolicy::after_requests(50).unwrap());
        let served: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let policy = Arc::clone(&policy);
                    scope.spawn(move || (0..20).filter(|_| !policy.is_expired()).count())
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(served, 50);
    }
}
