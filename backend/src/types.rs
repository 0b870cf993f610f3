//! Data types and error definitions for keep-list reconciliation.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Image name of a running program, e.g. `notepad.exe`. Not a PID: every
/// running instance of a program shares one identifier.
pub type ProcessIdentifier = String;

/// A set of distinct process identifiers.
///
/// Ordered so previews and logs come out the same way every time. Sets are
/// built fresh and combined with set algebra; nothing mutates a set after
/// handing it to a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSet(BTreeSet<ProcessIdentifier>);

impl ProcessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessIdentifier> {
        self.0.iter()
    }

    /// Elements of `self` that are in neither `a` nor `b`.
    pub fn difference_of_both(&self, a: &ProcessSet, b: &ProcessSet) -> ProcessSet {
        self.0
            .iter()
            .filter(|name| !a.contains(name) && !b.contains(name))
            .cloned()
            .collect()
    }

    /// The first `limit` names plus how many were left out.
    pub fn preview(&self, limit: usize) -> (Vec<&str>, usize) {
        let shown: Vec<&str> = self.0.iter().take(limit).map(String::as_str).collect();
        let hidden = self.len().saturating_sub(shown.len());
        (shown, hidden)
    }

    pub fn into_vec(self) -> Vec<ProcessIdentifier> {
        self.0.into_iter().collect()
    }
}

impl<S: Into<ProcessIdentifier>> FromIterator<S> for ProcessSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for ProcessSet {
    type Item = ProcessIdentifier;
    type IntoIter = std::collections::btree_set::IntoIter<ProcessIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ProcessSet {
    type Item = &'a ProcessIdentifier;
    type IntoIter = std::collections::btree_set::Iter<'a, ProcessIdentifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One row of the OS process listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub name: ProcessIdentifier,
    pub pid: u32,
    pub session_name: String,
    pub session_number: u32,
    pub memory_kb: u64,
}

/// Outcome of one pass of snapshot, reconcile and terminate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundResult {
    /// 1-based.
    pub round: u32,
    pub attempted: usize,
    pub succeeded: usize,
    pub survivors: ProcessSet,
}

/// Why a termination session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The very first kill-set was empty.
    NothingToDo,
    /// A later round found nothing left to terminate.
    Completed,
    /// A round terminated nothing.
    NoProgress,
    MaxRounds,
    Cancelled,
    /// The user declined the confirmation prompt.
    Declined,
    /// The snapshot for the last round failed. Earlier rounds still count.
    EnumerationFailed(String),
    /// The keep-list disappeared or broke between rounds.
    BaselineUnavailable(NoBaselineReason),
}

/// Totals for a whole bounded retry session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub total_attempted: usize,
    pub total_killed: usize,
    pub rounds_run: u32,
    pub rounds: Vec<RoundResult>,
    /// Survivors of the last round that ran.
    pub survivors: ProcessSet,
    pub stop: StopReason,
}

impl SessionResult {
    pub fn empty(stop: StopReason) -> Self {
        Self {
            total_attempted: 0,
            total_killed: 0,
            rounds_run: 0,
            rounds: Vec::new(),
            survivors: ProcessSet::new(),
            stop,
        }
    }

    pub(crate) fn record(&mut self, round: RoundResult) {
        self.total_attempted += round.attempted;
        self.total_killed += round.succeeded;
        self.rounds_run += 1;
        self.survivors = round.survivors.clone();
        self.rounds.push(round);
    }

    /// Kills made after the first round, i.e. programs that came back.
    pub fn respawn_kills(&self) -> usize {
        self.rounds.iter().skip(1).map(|r| r.succeeded).sum()
    }
}

/// Why no baseline could be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoBaselineReason {
    Missing,
    Empty,
    Unreadable(String),
}

impl fmt::Display for NoBaselineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoBaselineReason::Missing => write!(f, "no keep-list has been saved"),
            NoBaselineReason::Empty => write!(f, "the keep-list is empty"),
            NoBaselineReason::Unreadable(msg) => write!(f, "the keep-list is unreadable: {}", msg),
        }
    }
}

/// Errors that can occur during reconciliation and termination.
#[derive(Error, Debug)]
pub enum ProcError {
    #[error("Failed to enumerate processes: {0}")]
    Enumeration(String),
    #[error("No baseline configured: {0}")]
    NoBaseline(NoBaselineReason),
    #[error("Failed to write keep-list to {path}: {message}")]
    BaselineWrite { path: String, message: String },
    #[error("Refusing to save an empty process snapshot")]
    EmptySnapshot,
    #[error("{strategy} could not terminate {name}: {message}")]
    Termination {
        name: ProcessIdentifier,
        strategy: &'static str,
        message: String,
    },
    #[error("Invalid settings: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
