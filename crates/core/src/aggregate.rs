//! Aggregate root trait and optimistic concurrency expectations.

/// Aggregate root marker + minimal interface.
///
/// Aggregates own their state transitions; persistence compares `version()`
/// against an [`ExpectedVersion`] so two writers cannot both apply a transition
/// computed from the same snapshot.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Incremented once per state transition.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// The aggregate must not exist yet.
    Absent,
    /// Require the stored aggregate to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    /// `stored` is `None` when the aggregate has never been persisted.
    pub fn matches(self, stored: Option<u64>) -> bool {
        match (self, stored) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Exact(v), Some(actual)) => v == actual,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_only_matches_missing_aggregates() {
        assert!(ExpectedVersion::Absent.matches(None));
        assert!(!ExpectedVersion::Absent.matches(Some(1)));
    }

    #[test]
    fn exact_requires_same_version() {
        assert!(ExpectedVersion::Exact(2).matches(Some(2)));
        assert!(!ExpectedVersion::Exact(2).matches(Some(3)));
        assert!(!ExpectedVersion::Exact(2).matches(None));
        assert!(ExpectedVersion::Any.matches(None));
    }
}
