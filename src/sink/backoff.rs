//! Exponential backoff state used by the connection manager.

use std::time::Duration;

use super::config::RetryPolicy;

/// Reconnect delay that doubles after every close and resets on connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryDelay {
    policy: RetryPolicy,
    current: Duration,
}

impl RetryDelay {
    /// Start at the policy's initial delay.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            current: policy.initial,
            policy,
        }
    }

    /// Delay the next reconnect will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return the delay to wait now and double the stored one, capped at the
    /// policy maximum.
    pub fn advance(&mut self) -> Duration {
        let wait = self.current;
        self.current = self.current.saturating_mul(2).min(self.policy.max);
        wait
    }

    /// Return to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn secs(policy: (u64, u64)) -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_secs(policy.0),
            max: Duration::from_secs(policy.1),
        }
    }

    #[rstest]
    fn doubles_up_to_ceiling() {
        let mut delay = RetryDelay::new(RetryPolicy::default());
        let waits: Vec<u64> = (0..9).map(|_| delay.advance().as_secs()).collect();
        assert_eq!(waits, vec![2, 4, 8, 16, 32, 60, 60, 60, 60]);
    }

    #[rstest]
    fn reset_returns_to_initial() {
        let mut delay = RetryDelay::new(RetryPolicy::default());
        delay.advance();
        delay.advance();
        assert_eq!(delay.current(), Duration::from_secs(8));
        delay.reset();
        assert_eq!(delay.current(), Duration::from_secs(2));
    }

    #[rstest]
    #[case((1, 1), vec![1, 1, 1])]
    #[case((5, 12), vec![5, 10, 12])]
    #[case((3, 100), vec![3, 6, 12])]
    fn custom_policies(#[case] policy: (u64, u64), #[case] expected: Vec<u64>) {
        let mut delay = RetryDelay::new(secs(policy));
        let waits: Vec<u64> = expected.iter().map(|_| delay.advance().as_secs()).collect();
        assert_eq!(waits, expected);
    }

    proptest! {
        #[test]
        fn stays_within_bounds(initial in 1u64..120, extra in 0u64..600, steps in 0usize..64) {
            let policy = secs((initial, initial + extra));
            let mut delay = RetryDelay::new(policy);
            for step in 0..steps {
                let wait = delay.advance();
                prop_assert!(wait >= policy.initial && wait <= policy.max);
                let doubled = policy.initial.saturating_mul(1u32 << step.min(31));
                prop_assert_eq!(wait, doubled.min(policy.max));
            }
            prop_assert!(delay.current() >= policy.initial && delay.current() <= policy.max);
        }
    }
}
