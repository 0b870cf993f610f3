//! Bounded multi-round termination.
//!
//! A session runs up to `max_rounds` rounds. Each round after the first takes
//! a fresh snapshot, re-reads the keep-list and reconciles again, which catches
//! programs that a supervisor restarts after they were killed. A round that
//! kills nothing ends the session, as does an empty kill-set, a keep-list that
//! can no longer be read, or a cancellation seen between rounds. A round whose
//! snapshot fails is skipped and the next one tries again.

use crate::baseline::BaselineStore;
use crate::cancel::CancellationToken;
use crate::process_kill::{EscalationChain, TerminationOutcome};
use crate::process_list::ProcessSnapshotSource;
use crate::reconcile::Reconciler;
use crate::types::{ProcError, ProcessSet, RoundResult, SessionResult, StopReason};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Everything a session needs to know before it starts.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    kill_set: ProcessSet,
    max_rounds: u32,
    settle_interval: Duration,
}

impl SessionPlan {
    /// `kill_set` is what the first round targets, usually the set the user
    /// just confirmed. Later rounds work from fresh snapshots.
    pub fn new(kill_set: ProcessSet, max_rounds: u32, settle_interval: Duration) -> Self {
        Self {
            kill_set,
            max_rounds: max_rounds.max(1),
            settle_interval,
        }
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }
}

pub struct TerminationDriver {
    source: Arc<dyn ProcessSnapshotSource>,
    store: Arc<dyn BaselineStore>,
    reconciler: Reconciler,
    chain: Arc<EscalationChain>,
    concurrency: usize,
}

impl TerminationDriver {
    pub fn new(
        source: Arc<dyn ProcessSnapshotSource>,
        store: Arc<dyn BaselineStore>,
        reconciler: Reconciler,
        chain: Arc<EscalationChain>,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            store,
            reconciler,
            chain,
            concurrency: concurrency.max(1),
        }
    }

    /// Run a whole session. Never fails: every problem ends up in the
    /// returned [`SessionResult`].
    pub async fn run_session(&self, plan: SessionPlan, cancel: &CancellationToken) -> SessionResult {
        let mut result = SessionResult::empty(StopReason::MaxRounds);

        // Protected names never reach a termination call, however the set was built.
        let mut targets = self.reconciler.strip_protected(&plan.kill_set);
        if targets.is_empty() {
            debug!("Nothing to terminate");
            result.stop = StopReason::NothingToDo;
            return result;
        }
        if cancel.is_cancelled() {
            result.stop = StopReason::Cancelled;
            return result;
        }

        let mut failed_snapshot = None;
        for round in 1..=plan.max_rounds {
            if round > 1 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Session cancelled after {} rounds", result.rounds_run);
                        result.stop = StopReason::Cancelled;
                        return result;
                    }
                    _ = tokio::time::sleep(plan.settle_interval) => {}
                }

                targets = match self.next_targets().await {
                    Ok(targets) => targets,
                    Err(ProcError::NoBaseline(reason)) => {
                        warn!("Round {} aborted, stopping: {}", round, reason);
                        result.stop = StopReason::BaselineUnavailable(reason);
                        return result;
                    }
                    Err(e) => {
                        warn!("Round {} aborted: {}", round, e);
                        failed_snapshot = Some(e.to_string());
                        continue;
                    }
                };
                failed_snapshot = None;

                if targets.is_empty() {
                    info!("No extra processes left after {} rounds", result.rounds_run);
                    result.stop = StopReason::Completed;
                    return result;
                }
            }

            let outcome = self.run_round(round, &targets).await;
            let made_progress = outcome.succeeded > 0;
            result.record(outcome);

            if !made_progress {
                info!("Round {} terminated nothing, stopping", round);
                result.stop = StopReason::NoProgress;
                return result;
            }
        }

        result.stop = match failed_snapshot {
            Some(message) => StopReason::EnumerationFailed(message),
            None => {
                info!("Reached the limit of {} rounds", plan.max_rounds);
                StopReason::MaxRounds
            }
        };
        result
    }

    /// Snapshot now, then reconcile against the keep-list as it is now.
    async fn next_targets(&self) -> Result<ProcessSet, ProcError> {
        let current = self.snapshot().await?;
        let baseline = self.store.load_required()?;
        self.reconciler.kill_set(&current, &baseline)
    }

    async fn snapshot(&self) -> Result<ProcessSet, ProcError> {
        let source = self.source.clone();
        tokio::task::spawn_blocking(move || source.snapshot())
            .await
            .map_err(|e| ProcError::Enumeration(format!("snapshot task failed: {}", e)))?
    }

    /// Attempt every target once, at most `concurrency` at a time. One
    /// target failing has no effect on the others.
    async fn run_round(&self, round: u32, targets: &ProcessSet) -> RoundResult {
        info!("Round {}: terminating {} processes", round, targets.len());

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for name in targets.iter().cloned() {
            let permits = permits.clone();
            let chain = self.chain.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let target = name.clone();
                let outcome = tokio::task::spawn_blocking(move || chain.terminate(&target)).await;
                (name, outcome)
            });
        }

        let mut killed = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(TerminationOutcome::Killed { by }))) => {
                    info!("Terminated {} ({})", name, by);
                    killed.insert(name);
                }
                Ok((name, Ok(TerminationOutcome::Survived { errors }))) => {
                    for e in &errors {
                        debug!("{}", e);
                    }
                    warn!("{} survived round {}", name, round);
                }
                Ok((name, Err(e))) => warn!("Termination of {} panicked: {}", name, e),
                Err(e) => warn!("Termination task failed: {}", e),
            }
        }

        let survivors: ProcessSet = targets
            .iter()
            .filter(|name| !killed.contains(name.as_str()))
            .cloned()
            .collect();

        let result = RoundResult {
            round,
            attempted: targets.len(),
            succeeded: killed.len(),
            survivors,
        };
        info!(
            "Round {}: {}/{} terminated, {} survived",
            round,
            result.succeeded,
            result.attempted,
            result.survivors.len()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::MemoryBaselineStore;
    use crate::process_kill::TerminationStrategy;
    use crate::types::{NoBaselineReason, ProcessEntry};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Queued snapshots, the last one repeating. `None` is a failed listing.
    struct Script(Mutex<VecDeque<Option<ProcessSet>>>);

    impl ProcessSnapshotSource for Script {
        fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError> {
            unreachable!("driver only asks for snapshots")
        }

        fn snapshot(&self) -> Result<ProcessSet, ProcError> {
            let mut queue = self.0.lock();
            let next = if queue.len() > 1 {
                queue.pop_front().flatten()
            } else {
                queue.front().cloned().flatten()
            };
            next.ok_or_else(|| ProcError::Enumeration("tasklist failed".to_string()))
        }
    }

    struct Always(bool);

    impl TerminationStrategy for Always {
        fn name(&self) -> &'static str {
            "always"
        }

        fn terminate(&self, image: &str) -> Result<(), ProcError> {
            if self.0 {
                Ok(())
            } else {
                Err(ProcError::Termination {
                    name: image.to_string(),
                    strategy: "always",
                    message: "denied".to_string(),
                })
            }
        }
    }

    fn set(names: &[&str]) -> ProcessSet {
        names.iter().copied().collect()
    }

    fn driver_with(
        snapshots: Vec<Option<ProcessSet>>,
        store: Arc<MemoryBaselineStore>,
        succeed: bool,
    ) -> TerminationDriver {
        TerminationDriver::new(
            Arc::new(Script(Mutex::new(snapshots.into()))),
            store,
            Reconciler::new(set(&["svchost.exe"])),
            Arc::new(EscalationChain::new(vec![Box::new(Always(succeed))])),
            2,
        )
    }

    fn driver(snapshots: Vec<ProcessSet>, succeed: bool) -> TerminationDriver {
        driver_with(
            snapshots.into_iter().map(Some).collect(),
            Arc::new(MemoryBaselineStore::with(set(&["keep.exe"]))),
            succeed,
        )
    }

    #[tokio::test]
    async fn protected_names_in_the_plan_are_never_attempted() {
        let driver = driver(vec![set(&["keep.exe"])], true);
        let plan = SessionPlan::new(set(&["svchost.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;
        assert_eq!(result.stop, StopReason::NothingToDo);
        assert_eq!(result.total_attempted, 0);
    }

    #[tokio::test]
    async fn later_rounds_reconcile_fresh_snapshots() {
        let driver = driver(
            vec![set(&["keep.exe", "respawn.exe", "new.exe"]), set(&["keep.exe"])],
            true,
        );
        let plan = SessionPlan::new(set(&["a.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;

        assert_eq!(result.rounds_run, 2);
        assert_eq!(result.rounds[1].attempted, 2);
        assert_eq!(result.total_killed, 3);
        assert_eq!(result.respawn_kills(), 2);
        assert_eq!(result.stop, StopReason::Completed);
    }

    #[tokio::test]
    async fn enumeration_failure_keeps_earlier_totals() {
        let driver = driver(vec![], true);
        let plan = SessionPlan::new(set(&["a.exe", "b.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;

        assert_eq!(result.rounds_run, 1);
        assert_eq!(result.total_killed, 2);
        assert!(matches!(result.stop, StopReason::EnumerationFailed(_)));
    }

    #[tokio::test]
    async fn failed_snapshot_skips_only_its_round() {
        let driver = driver_with(
            vec![None, Some(set(&["keep.exe", "back.exe"])), Some(set(&["keep.exe"]))],
            Arc::new(MemoryBaselineStore::with(set(&["keep.exe"]))),
            true,
        );
        let plan = SessionPlan::new(set(&["a.exe"]), 4, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;

        assert_eq!(result.rounds_run, 2);
        assert_eq!(result.rounds[1].round, 3);
        assert_eq!(result.rounds[1].survivors, ProcessSet::new());
        assert_eq!(result.total_killed, 2);
        assert_eq!(result.stop, StopReason::Completed);
    }

    #[tokio::test]
    async fn keep_list_is_read_again_every_round() {
        let store = Arc::new(MemoryBaselineStore::with(set(&["keep.exe"])));
        let driver = driver_with(vec![Some(set(&["keep.exe", "x.exe"]))], store.clone(), true);
        store.save(&set(&["keep.exe", "x.exe"])).unwrap();

        let plan = SessionPlan::new(set(&["x.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;

        assert_eq!(result.rounds_run, 1);
        assert_eq!(result.stop, StopReason::Completed);
    }

    #[tokio::test]
    async fn lost_keep_list_stops_the_session() {
        let store = Arc::new(MemoryBaselineStore::with(ProcessSet::new()));
        let driver = driver_with(vec![Some(set(&["keep.exe", "x.exe"]))], store, true);
        let plan = SessionPlan::new(set(&["x.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;

        assert_eq!(result.rounds_run, 1);
        assert_eq!(result.total_killed, 1);
        assert_eq!(result.stop, StopReason::BaselineUnavailable(NoBaselineReason::Empty));
    }

    #[tokio::test]
    async fn already_cancelled_runs_nothing() {
        let driver = driver(vec![set(&["a.exe"])], true);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let plan = SessionPlan::new(set(&["a.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &cancel).await;
        assert_eq!(result.rounds_run, 0);
        assert_eq!(result.stop, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn survivors_are_reported() {
        let driver = driver(vec![set(&["a.exe"])], false);
        let plan = SessionPlan::new(set(&["a.exe", "b.exe"]), 3, Duration::ZERO);
        let result = driver.run_session(plan, &CancellationToken::new()).await;
        assert_eq!(result.survivors, set(&["a.exe", "b.exe"]));
        assert_eq!(result.stop, StopReason::NoProgress);
    }

    #[test]
    fn plan_needs_at_least_one_round() {
        let plan = SessionPlan::new(set(&["a.exe"]), 0, Duration::ZERO);
        assert_eq!(plan.max_rounds(), 1);
    }
}
