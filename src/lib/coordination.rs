//! Completion tracking for fanned-out work.
//!
//! A run splits a dataset or contig into work units, and the per-unit
//! results must fold into one aggregate exactly once even though workers
//! retry and can deliver the same contribution twice. The planner
//! [`register`](CoordinationStore::register)s an aggregate with the full
//! set of work-unit tokens, each worker contributes its totals under its
//! token, and the store applies a contribution only while the token is
//! still pending, in one atomic step that also removes the token. A
//! replayed contribution finds its token gone and becomes a no-op. The
//! contribution that empties the pending set sees [`Outcome::Completed`]
//! and carries the final totals; every other caller sees
//! [`Outcome::Pending`], so exactly one worker drives the downstream step.

use crate::errors::{Result, VarsumError};
use crate::retry::{RetryPolicy, retry_with_backoff};
use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Aggregate field for the alternate-allele tally.
pub const VARIANT_COUNT: &str = "variantCount";
/// Aggregate field for the called-allele tally.
pub const CALL_COUNT: &str = "callCount";
/// Aggregate field for the sample count taken from the header line.
pub const SAMPLE_COUNT: &str = "sampleCount";
/// Aggregate field for the shared-variant tally.
pub const DUPLICATE_COUNT: &str = "duplicateCount";

/// One aggregate's coordination record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateState {
    /// Work-unit tokens that have not contributed yet.
    pub pending: BTreeSet<String>,
    /// Running totals by field name. A field never contributed to is
    /// absent, which readers treat as zero.
    pub totals: BTreeMap<String, u64>,
}

/// One atomic contribution: remove `token` from the pending set and add
/// each `(field, value)` pair to the totals, only if the token is present.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalUpdate<'a> {
    pub key: &'a str,
    pub token: &'a str,
    pub additions: &'a [(&'a str, u64)],
}

/// Store-level result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The token was pending; the returned state reflects this update.
    Applied(AggregateState),
    /// The token was not pending (or the aggregate does not exist), so
    /// nothing changed.
    ConditionFailed,
}

/// Atomic coordination backend.
///
/// `conditional_update` must check the token, remove it, and apply the
/// additions as one atomic operation; the returned state is the sole
/// arbiter of who observed completion.
pub trait CoordinationStore: Send + Sync {
    /// Create the aggregate record with `tokens` pending and empty totals.
    ///
    /// # Errors
    ///
    /// Returns [`VarsumError::AlreadyRegistered`] when a record with
    /// unfinished tokens exists (a completed record is replaced), and
    /// [`VarsumError::InvalidParameter`] for duplicate or empty tokens.
    fn register(&self, key: &str, tokens: &[String]) -> Result<()>;

    /// Apply one conditional contribution.
    fn conditional_update(&self, update: &ConditionalUpdate<'_>) -> Result<UpdateOutcome>;

    /// Set one totals field unconditionally, creating it if absent.
    fn set_field(&self, key: &str, field: &str, value: u64) -> Result<()>;

    /// Read an aggregate's current state.
    fn fetch(&self, key: &str) -> Result<Option<AggregateState>>;
}

/// Result of one worker contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This contribution emptied the pending set; the caller owns the
    /// downstream completion step. Carries the final totals.
    Completed(BTreeMap<String, u64>),
    /// Applied, but other tokens are still outstanding.
    Pending { remaining: usize },
    /// The token had already contributed; nothing changed.
    AlreadyApplied,
}

/// Retrying front end over a [`CoordinationStore`].
///
/// Transient store errors are retried on a fixed cadence without an attempt
/// limit, matching the at-least-once delivery of the surrounding work
/// queue. Permanent errors surface immediately.
pub struct CompletionCoordinator<'a> {
    store: &'a dyn CoordinationStore,
    retry: RetryPolicy,
}

impl<'a> CompletionCoordinator<'a> {
    pub fn new(store: &'a dyn CoordinationStore) -> Self {
        Self { store, retry: RetryPolicy::unbounded(Duration::from_secs(1)) }
    }

    /// Coordinator with a caller-chosen retry policy.
    pub fn with_retry(store: &'a dyn CoordinationStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Register `key` with the given pending tokens.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable store errors, including
    /// [`VarsumError::AlreadyRegistered`].
    pub fn register(&self, key: &str, tokens: &[String]) -> Result<()> {
        retry_with_backoff(&self.retry, "aggregate registration", || {
            self.store.register(key, tokens)
        })
    }

    /// Contribute `additions` under `token` and report where the aggregate
    /// stands.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable store errors; retryable ones are retried
    /// per the coordinator's policy first.
    pub fn contribute(&self, key: &str, token: &str, additions: &[(&str, u64)]) -> Result<Outcome> {
        let update = ConditionalUpdate { key, token, additions };
        let outcome = retry_with_backoff(&self.retry, "contribution", || {
            self.store.conditional_update(&update)
        })?;
        Ok(match outcome {
            UpdateOutcome::Applied(state) => {
                if state.pending.is_empty() {
                    Outcome::Completed(state.totals)
                } else {
                    Outcome::Pending { remaining: state.pending.len() }
                }
            }
            UpdateOutcome::ConditionFailed => {
                debug!("Contribution {token} to {key} was already applied");
                Outcome::AlreadyApplied
            }
        })
    }

    /// Set one totals field, outside the token protocol.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable store errors.
    pub fn set_field(&self, key: &str, field: &str, value: u64) -> Result<()> {
        retry_with_backoff(&self.retry, "aggregate field write", || {
            self.store.set_field(key, field, value)
        })
    }

    /// Read the aggregate state for `key`.
    ///
    /// # Errors
    ///
    /// Propagates non-retryable store errors.
    pub fn fetch(&self, key: &str) -> Result<Option<AggregateState>> {
        retry_with_backoff(&self.retry, "aggregate fetch", || self.store.fetch(key))
    }
}

/// Mutex-held [`CoordinationStore`] for tests and single-process runs.
///
/// The lock spans each whole operation, which gives the required
/// atomicity. Supports injecting a burst of transient failures to
/// exercise retry paths in tests.
#[derive(Default)]
pub struct MemoryCoordinationStore {
    records: Mutex<BTreeMap<String, AggregateState>>,
    failing_calls: AtomicU32,
}

impl MemoryCoordinationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` store calls fail with a retryable error.
    pub fn fail_next_calls(&self, n: u32) {
        self.failing_calls.store(n, Ordering::SeqCst);
    }

    fn maybe_fail(&self, key: &str) -> Result<()> {
        let mut remaining = self.failing_calls.load(Ordering::SeqCst);
        while remaining > 0 {
            match self.failing_calls.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Err(VarsumError::Coordination {
                        key: key.to_string(),
                        reason: "injected transient failure".to_string(),
                        retryable: true,
                    });
                }
                Err(current) => remaining = current,
            }
        }
        Ok(())
    }
}

impl CoordinationStore for MemoryCoordinationStore {
    fn register(&self, key: &str, tokens: &[String]) -> Result<()> {
        self.maybe_fail(key)?;
        if tokens.is_empty() {
            return Err(VarsumError::InvalidParameter {
                parameter: "tokens".to_string(),
                reason: "at least one work-unit token is required".to_string(),
            });
        }
        let pending: BTreeSet<String> = tokens.iter().cloned().collect();
        if pending.len() != tokens.len() {
            return Err(VarsumError::InvalidParameter {
                parameter: "tokens".to_string(),
                reason: "work-unit tokens must be unique".to_string(),
            });
        }

        let mut records = self.records.lock();
        if let Some(existing) = records.get(key) {
            if !existing.pending.is_empty() {
                return Err(VarsumError::AlreadyRegistered { key: key.to_string() });
            }
        }
        records.insert(key.to_string(), AggregateState { pending, totals: BTreeMap::new() });
        Ok(())
    }

    fn conditional_update(&self, update: &ConditionalUpdate<'_>) -> Result<UpdateOutcome> {
        self.maybe_fail(update.key)?;
        let mut records = self.records.lock();
        let Some(state) = records.get_mut(update.key) else {
            return Ok(UpdateOutcome::ConditionFailed);
        };
        if !state.pending.remove(update.token) {
            return Ok(UpdateOutcome::ConditionFailed);
        }
        for &(field, value) in update.additions {
            *state.totals.entry(field.to_string()).or_insert(0) += value;
        }
        Ok(UpdateOutcome::Applied(state.clone()))
    }

    fn set_field(&self, key: &str, field: &str, value: u64) -> Result<()> {
        self.maybe_fail(key)?;
        let mut records = self.records.lock();
        let Some(state) = records.get_mut(key) else {
            return Err(VarsumError::Coordination {
                key: key.to_string(),
                reason: "aggregate is not registered".to_string(),
                retryable: false,
            });
        };
        state.totals.insert(field.to_string(), value);
        Ok(())
    }

    fn fetch(&self, key: &str) -> Result<Option<AggregateState>> {
        self.maybe_fail(key)?;
        Ok(self.records.lock().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // === Contribution protocol ===

    #[test]
    fn test_contributions_drain_tokens_and_sum_totals() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        coordinator.register("agg", &tokens(&["w1", "w2", "w3"])).unwrap();

        let first = coordinator
            .contribute("agg", "w1", &[(VARIANT_COUNT, 5), (CALL_COUNT, 10)])
            .unwrap();
        assert_eq!(first, Outcome::Pending { remaining: 2 });

        let second = coordinator
            .contribute("agg", "w2", &[(VARIANT_COUNT, 3), (CALL_COUNT, 6)])
            .unwrap();
        assert_eq!(second, Outcome::Pending { remaining: 1 });

        match coordinator.contribute("agg", "w3", &[(VARIANT_COUNT, 2)]).unwrap() {
            Outcome::Completed(totals) => {
                assert_eq!(totals.get(VARIANT_COUNT), Some(&10));
                assert_eq!(totals.get(CALL_COUNT), Some(&16));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_replayed_contribution_is_a_no_op() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        coordinator.register("agg", &tokens(&["w1", "w2"])).unwrap();

        coordinator.contribute("agg", "w1", &[(VARIANT_COUNT, 5)]).unwrap();
        let replay = coordinator.contribute("agg", "w1", &[(VARIANT_COUNT, 5)]).unwrap();
        assert_eq!(replay, Outcome::AlreadyApplied);

        let state = coordinator.fetch("agg").unwrap().unwrap();
        assert_eq!(state.totals.get(VARIANT_COUNT), Some(&5));
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn test_contribution_to_unknown_aggregate_is_a_no_op() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        let outcome = coordinator.contribute("nope", "w1", &[(VARIANT_COUNT, 1)]).unwrap();
        assert_eq!(outcome, Outcome::AlreadyApplied);
    }

    #[test]
    fn test_exactly_one_caller_observes_completion() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        let unit_tokens: Vec<String> = (0..8).map(|i| format!("w{i}")).collect();
        coordinator.register("agg", &unit_tokens).unwrap();

        let completions = AtomicU32::new(0);
        let coordinator = &coordinator;
        let completions_ref = &completions;
        std::thread::scope(|scope| {
            for token in &unit_tokens {
                scope.spawn(move || {
                    match coordinator.contribute("agg", token, &[(VARIANT_COUNT, 1)]).unwrap() {
                        Outcome::Completed(totals) => {
                            // The completing caller sees every contribution.
                            assert_eq!(totals.get(VARIANT_COUNT), Some(&8));
                            completions_ref.fetch_add(1, Ordering::SeqCst);
                        }
                        Outcome::Pending { .. } => {}
                        Outcome::AlreadyApplied => panic!("tokens are distinct"),
                    }
                });
            }
        });
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    // === Registration ===

    #[test]
    fn test_register_while_pending_is_rejected() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        coordinator.register("agg", &tokens(&["w1", "w2"])).unwrap();

        let err = coordinator.register("agg", &tokens(&["other"])).unwrap_err();
        assert!(matches!(err, VarsumError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_register_after_completion_resets_the_aggregate() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        coordinator.register("agg", &tokens(&["w1"])).unwrap();
        let done = coordinator.contribute("agg", "w1", &[(VARIANT_COUNT, 9)]).unwrap();
        assert!(matches!(done, Outcome::Completed(_)));

        coordinator.register("agg", &tokens(&["x1", "x2"])).unwrap();
        let state = coordinator.fetch("agg").unwrap().unwrap();
        assert_eq!(state.pending.len(), 2);
        assert!(state.totals.is_empty());
    }

    #[test]
    fn test_register_rejects_duplicate_tokens() {
        let store = MemoryCoordinationStore::new();
        let err = store.register("agg", &tokens(&["w1", "w1"])).unwrap_err();
        assert!(matches!(err, VarsumError::InvalidParameter { .. }));
    }

    #[test]
    fn test_register_rejects_empty_tokens() {
        let store = MemoryCoordinationStore::new();
        let err = store.register("agg", &[]).unwrap_err();
        assert!(matches!(err, VarsumError::InvalidParameter { .. }));
    }

    // === Fields and fetch ===

    #[test]
    fn test_set_field_upserts() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&store);
        coordinator.register("agg", &tokens(&["w1"])).unwrap();

        coordinator.set_field("agg", SAMPLE_COUNT, 42).unwrap();
        coordinator.set_field("agg", SAMPLE_COUNT, 43).unwrap();
        let state = coordinator.fetch("agg").unwrap().unwrap();
        assert_eq!(state.totals.get(SAMPLE_COUNT), Some(&43));
    }

    #[test]
    fn test_set_field_requires_registration() {
        let store = MemoryCoordinationStore::new();
        let err = store.set_field("nope", SAMPLE_COUNT, 1).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_fetch_missing_aggregate() {
        let store = MemoryCoordinationStore::new();
        assert_eq!(store.fetch("nope").unwrap(), None);
    }

    // === Retry behavior ===

    #[test]
    fn test_transient_failures_are_retried() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::with_retry(
            &store,
            RetryPolicy::bounded(5, Duration::from_millis(1)),
        );
        coordinator.register("agg", &tokens(&["w1"])).unwrap();

        store.fail_next_calls(2);
        match coordinator.contribute("agg", "w1", &[(CALL_COUNT, 7)]).unwrap() {
            Outcome::Completed(totals) => assert_eq!(totals.get(CALL_COUNT), Some(&7)),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_retry_exhaustion_surfaces_the_error() {
        let store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::with_retry(
            &store,
            RetryPolicy::bounded(2, Duration::from_millis(1)),
        );
        coordinator.register("agg", &tokens(&["w1"])).unwrap();

        store.fail_next_calls(10);
        let err = coordinator.contribute("agg", "w1", &[(CALL_COUNT, 7)]).unwrap_err();
        assert!(err.is_retryable());
    }
}
