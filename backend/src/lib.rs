//! UI-agnostic keep-list process closer for Windows.
//!
//! Snapshots running processes, compares them against a saved keep-list and a
//! fixed set of protected system images, and closes everything else over a
//! bounded number of rounds. Uses `tasklist`, `taskkill` and `wmic` for system
//! interaction.

mod baseline;
mod cancel;
mod config;
mod driver;
mod engine;
mod os_command;
mod process_kill;
mod process_list;
mod protect;
mod reconcile;
mod types;

pub use baseline::{BaselineStore, MemoryBaselineStore, YamlBaselineStore};
pub use cancel::CancellationToken;
pub use config::{SessionConfig, Settings};
pub use driver::{SessionPlan, TerminationDriver};
pub use engine::{AutoConfirm, ConfirmRequest, ConfirmationGate, Engine, KillMode};
pub use process_kill::{EscalationChain, Taskkill, TerminationOutcome, TerminationStrategy, WmicTerminate};
pub use process_list::{parse_tasklist_csv, ProcessSnapshotSource, TasklistSource};
pub use protect::protected_set;
pub use reconcile::{reconcile, Reconciler};
pub use types::{
    NoBaselineReason, ProcError, ProcessEntry, ProcessIdentifier, ProcessSet, RoundResult,
    SessionResult, StopReason,
};
