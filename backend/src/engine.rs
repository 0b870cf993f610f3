//! The operations a host application calls: save the keep-list, compute what
//! would be closed, and run a confirmed termination session.

use crate::baseline::{BaselineStore, YamlBaselineStore};
use crate::cancel::CancellationToken;
use crate::config::{SessionConfig, Settings};
use crate::driver::{SessionPlan, TerminationDriver};
use crate::process_kill::EscalationChain;
use crate::process_list::{ProcessSnapshotSource, TasklistSource};
use crate::protect::protected_set;
use crate::reconcile::Reconciler;
use crate::types::{NoBaselineReason, ProcError, ProcessEntry, ProcessSet, SessionResult, StopReason};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

/// How hard to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillMode {
    /// Force kill by image name; one extra sweep for restarted programs.
    Standard,
    /// Force kill including child processes with a WMI fallback, for the
    /// full configured number of rounds.
    Force,
}

impl KillMode {
    pub fn rounds(&self, config: &SessionConfig) -> u32 {
        match self {
            KillMode::Standard => config.max_rounds.min(2),
            KillMode::Force => config.max_rounds,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KillMode::Standard => "Close other processes",
            KillMode::Force => "Force close other processes",
        }
    }
}

/// What the user is asked to approve before the first round.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub mode: KillMode,
    pub candidates: ProcessSet,
    pub preview_limit: usize,
    pub planned_rounds: u32,
}

impl ConfirmRequest {
    /// Prompt text with at most `preview_limit` names.
    pub fn message(&self) -> String {
        let (shown, hidden) = self.candidates.preview(self.preview_limit);
        let mut text = format!(
            "Close the following {} processes? (up to {} rounds)\n",
            self.candidates.len(),
            self.planned_rounds
        );
        for name in shown {
            let _ = writeln!(text, "{}", name);
        }
        if hidden > 0 {
            let _ = writeln!(text, "...and {} more", hidden);
        }
        text
    }
}

/// Asks the user whether a session may start. Asked once per session.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn confirm(&self, request: &ConfirmRequest) -> bool;
}

/// Approves everything, for unattended runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationGate for AutoConfirm {
    async fn confirm(&self, _request: &ConfirmRequest) -> bool {
        true
    }
}

pub struct Engine {
    source: Arc<dyn ProcessSnapshotSource>,
    store: Arc<dyn BaselineStore>,
    reconciler: Reconciler,
    config: SessionConfig,
    standard: Arc<EscalationChain>,
    force: Arc<EscalationChain>,
}

impl Engine {
    pub fn new(
        source: Arc<dyn ProcessSnapshotSource>,
        store: Arc<dyn BaselineStore>,
        protected: ProcessSet,
        config: SessionConfig,
    ) -> Self {
        Self {
            source,
            store,
            reconciler: Reconciler::new(protected),
            config,
            standard: Arc::new(EscalationChain::standard()),
            force: Arc::new(EscalationChain::forceful()),
        }
    }

    /// `tasklist`/`taskkill`/`wmic` with the keep-list file from `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            Arc::new(TasklistSource::new()),
            Arc::new(YamlBaselineStore::new(settings.baseline_path.clone())),
            protected_set(),
            settings.session.clone(),
        )
    }

    /// Replace the escalation chains used by the two modes.
    pub fn with_chains(mut self, standard: EscalationChain, force: EscalationChain) -> Self {
        self.standard = Arc::new(standard);
        self.force = Arc::new(force);
        self
    }

    pub fn protected(&self) -> &ProcessSet {
        self.reconciler.protected()
    }

    pub async fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError> {
        let source = self.source.clone();
        tokio::task::spawn_blocking(move || source.list_processes())
            .await
            .map_err(|e| ProcError::Enumeration(format!("listing task failed: {}", e)))?
    }

    pub async fn take_snapshot(&self) -> Result<ProcessSet, ProcError> {
        let source = self.source.clone();
        tokio::task::spawn_blocking(move || source.snapshot())
            .await
            .map_err(|e| ProcError::Enumeration(format!("snapshot task failed: {}", e)))?
    }

    /// Current keep-list. Missing, empty and unreadable lists are all
    /// `NoBaseline`; none of them may turn into an empty keep-list.
    pub fn load_baseline(&self) -> Result<ProcessSet, ProcError> {
        self.store.load_required()
    }

    /// Snapshot the running processes and make them the new keep-list.
    /// Returns how many names were saved.
    pub async fn save_baseline(&self) -> Result<usize, ProcError> {
        let current = self.take_snapshot().await?;
        if current.is_empty() {
            return Err(ProcError::EmptySnapshot);
        }
        self.store.save(&current)?;
        Ok(current.len())
    }

    /// What would be closed right now.
    pub async fn compute_kill_set(&self, baseline: &ProcessSet) -> Result<ProcessSet, ProcError> {
        if baseline.is_empty() {
            return Err(ProcError::NoBaseline(NoBaselineReason::Empty));
        }
        let current = self.take_snapshot().await?;
        self.reconciler.kill_set(&current, baseline)
    }

    pub fn driver(&self, mode: KillMode) -> TerminationDriver {
        let chain = match mode {
            KillMode::Standard => self.standard.clone(),
            KillMode::Force => self.force.clone(),
        };
        TerminationDriver::new(
            self.source.clone(),
            self.store.clone(),
            self.reconciler.clone(),
            chain,
            self.config.concurrency,
        )
    }

    pub async fn run_termination_session(
        &self,
        mode: KillMode,
        plan: SessionPlan,
        cancel: &CancellationToken,
    ) -> SessionResult {
        self.driver(mode).run_session(plan, cancel).await
    }

    /// Load the keep-list, work out the kill-set, ask once, then run the
    /// whole session. Later rounds read the keep-list again, so edits made
    /// while the session runs are honoured. Errors only when nothing could be
    /// attempted at all.
    pub async fn close_others(
        &self,
        mode: KillMode,
        gate: &dyn ConfirmationGate,
        cancel: &CancellationToken,
    ) -> Result<SessionResult, ProcError> {
        let baseline = self.load_baseline()?;
        info!("Loaded {} kept processes", baseline.len());

        let kill_set = self.compute_kill_set(&baseline).await?;
        if kill_set.is_empty() {
            return Ok(SessionResult::empty(StopReason::NothingToDo));
        }

        let rounds = mode.rounds(&self.config);
        let request = ConfirmRequest {
            mode,
            candidates: kill_set.clone(),
            preview_limit: self.config.preview_limit,
            planned_rounds: rounds,
        };
        if !gate.confirm(&request).await {
            info!("User declined closing {} processes", kill_set.len());
            return Ok(SessionResult::empty(StopReason::Declined));
        }

        let plan = SessionPlan::new(kill_set, rounds, self.config.settle_interval());
        Ok(self.run_termination_session(mode, plan, cancel).await)
    }
}
