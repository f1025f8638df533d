//! Search budgets for exhaustive placement searches.

use std::time::{Duration, Instant};

/// The outcome of a bounded search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Search<T> {
    /// The search completed with a result.
    Found(T),
    /// The search completed, but no result exists.
    Exhausted,
    /// The search ran out of time.
    Aborted,
}

impl<T> Search<T> {
    /// Maps the found value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Search<U> {
        match self {
            Search::Found(t) => Search::Found(f(t)),
            Search::Exhausted => Search::Exhausted,
            Search::Aborted => Search::Aborted,
        }
    }

    /// Returns `true` if the search ran out of time.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Search::Aborted)
    }

    /// Converts into an [`Option`], discarding the reason for a missing result.
    pub fn found(self) -> Option<T> {
        match self {
            Search::Found(t) => Some(t),
            _ => None,
        }
    }
}

/// Returned by [`SearchBudget::check`] once the deadline has passed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutOfTime;

/// The resources a placement search may use.
///
/// Budgets are plain values: wrappers that fall back to another search
/// derive a fresh budget with [`SearchBudget::restarted`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SearchBudget {
    start: Instant,
    timeout: Duration,
    upper_limit: Option<usize>,
}

impl SearchBudget {
    /// Creates a budget whose clock starts now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
            upper_limit: None,
        }
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(Duration::MAX)
    }

    /// Sets the maximum number of results an enumeration may produce.
    pub fn with_upper_limit(mut self, upper_limit: Option<usize>) -> Self {
        self.upper_limit = upper_limit;
        self
    }

    /// The same budget, with the clock restarted now.
    pub fn restarted(&self) -> Self {
        Self {
            start: Instant::now(),
            ..*self
        }
    }

    /// The maximum number of results an enumeration may produce.
    #[inline]
    pub fn upper_limit(&self) -> Option<usize> {
        self.upper_limit
    }

    /// Returns `true` if `count` results have reached the upper limit.
    #[inline]
    pub fn limit_reached(&self, count: usize) -> bool {
        self.upper_limit.is_some_and(|limit| count >= limit)
    }

    /// The time elapsed since the budget started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns `true` if the deadline has passed.
    #[inline]
    pub fn expired(&self) -> bool {
        self.elapsed() > self.timeout
    }

    /// Returns an error once the deadline has passed.
    #[inline]
    pub fn check(&self) -> Result<(), OutOfTime> {
        if self.expired() {
            Err(OutOfTime)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_expires() {
        let budget = SearchBudget::new(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(budget.check(), Err(OutOfTime));
        assert!(SearchBudget::unlimited().check().is_ok());
    }

    #[test]
    fn upper_limit() {
        let budget = SearchBudget::unlimited().with_upper_limit(Some(2));
        assert!(!budget.limit_reached(1));
        assert!(budget.limit_reached(2));
        assert!(!SearchBudget::unlimited().limit_reached(usize::MAX));
    }

    #[test]
    fn restarted_budget_keeps_limits() {
        let budget = SearchBudget::new(Duration::from_secs(1)).with_upper_limit(Some(4));
        let fresh = budget.restarted();
        assert_eq!(fresh.upper_limit(), Some(4));
        assert!(fresh.elapsed() <= budget.elapsed());
    }

    #[test]
    fn search_map() {
        assert_eq!(Search::Found(2).map(|x| x * 2), Search::Found(4));
        assert_eq!(Search::<u8>::Aborted.map(|x| x * 2), Search::Aborted);
        assert!(Search::<u8>::Exhausted.found().is_none());
    }
}
