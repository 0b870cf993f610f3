#![allow(dead_code)]

use async_trait::async_trait;
use backend::{
    BaselineStore, ConfirmRequest, ConfirmationGate, MemoryBaselineStore, ProcError, ProcessEntry,
    ProcessSet, ProcessSnapshotSource, TerminationStrategy,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn set(names: &[&str]) -> ProcessSet {
    names.iter().copied().collect()
}

/// Returns queued snapshots in order, repeating the last one forever.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<ProcessSet, String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(snapshots: Vec<ProcessSet>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(snapshots.into_iter().map(Ok).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn with_results(results: Vec<Result<ProcessSet, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessSnapshotSource for ScriptedSource {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError> {
        let set = self.snapshot()?;
        Ok(set
            .into_iter()
            .enumerate()
            .map(|(i, name)| ProcessEntry {
                name,
                pid: 100 + i as u32,
                session_name: "Console".to_string(),
                session_number: 1,
                memory_kb: 1024,
            })
            .collect())
    }

    fn snapshot(&self) -> Result<ProcessSet, ProcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(set)) => Ok(set),
            Some(Err(msg)) => Err(ProcError::Enumeration(msg)),
            None => Err(ProcError::Enumeration("no snapshot scripted".to_string())),
        }
    }
}

/// Wraps a source and replaces the keep-list right before snapshot number
/// `at` (1-based), like a user saving a new list while a session runs.
pub struct EditingSource {
    inner: Arc<ScriptedSource>,
    store: Arc<MemoryBaselineStore>,
    keep: ProcessSet,
    at: usize,
}

impl EditingSource {
    pub fn new(
        inner: Arc<ScriptedSource>,
        store: Arc<MemoryBaselineStore>,
        keep: ProcessSet,
        at: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner,
            store,
            keep,
            at,
        })
    }
}

impl ProcessSnapshotSource for EditingSource {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError> {
        self.inner.list_processes()
    }

    fn snapshot(&self) -> Result<ProcessSet, ProcError> {
        if self.inner.calls() + 1 == self.at {
            self.store.save(&self.keep)?;
        }
        self.inner.snapshot()
    }
}

type Policy = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Recorder {
    label: &'static str,
    policy: Policy,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Strategy double that succeeds according to `policy` and records calls.
#[derive(Clone)]
pub struct RecordingStrategy(Arc<Recorder>);

impl RecordingStrategy {
    pub fn new(label: &'static str, policy: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::with_delay(label, Duration::ZERO, policy)
    }

    pub fn with_delay(
        label: &'static str,
        delay: Duration,
        policy: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(Recorder {
            label,
            policy: Box::new(policy),
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }))
    }

    pub fn always(label: &'static str) -> Self {
        Self::new(label, |_| true)
    }

    pub fn never(label: &'static str) -> Self {
        Self::new(label, |_| false)
    }

    pub fn calls(&self) -> Vec<String> {
        let mut calls = self.0.calls.lock().clone();
        calls.sort();
        calls
    }

    pub fn call_count(&self) -> usize {
        self.0.calls.lock().len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.0.peak.load(Ordering::SeqCst)
    }

    pub fn boxed(&self) -> Box<dyn TerminationStrategy> {
        Box::new(self.clone())
    }
}

impl TerminationStrategy for RecordingStrategy {
    fn name(&self) -> &'static str {
        self.0.label
    }

    fn terminate(&self, image: &str) -> Result<(), ProcError> {
        let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.peak.fetch_max(now, Ordering::SeqCst);
        self.0.calls.lock().push(image.to_string());
        if !self.0.delay.is_zero() {
            std::thread::sleep(self.0.delay);
        }
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);

        if (self.0.policy)(image) {
            Ok(())
        } else {
            Err(ProcError::Termination {
                name: image.to_string(),
                strategy: self.0.label,
                message: "access denied".to_string(),
            })
        }
    }
}

/// Gives a fixed answer and counts how often it was asked.
pub struct CountingGate {
    answer: bool,
    asked: AtomicUsize,
    last: Mutex<Option<ConfirmRequest>>,
}

impl CountingGate {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<ConfirmRequest> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl ConfirmationGate for CountingGate {
    async fn confirm(&self, request: &ConfirmRequest) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(request.clone());
        self.answer
    }
}
