//! Process termination by image name.
//!
//! A [`TerminationStrategy`] is one OS-level way of killing every instance of
//! an image. An [`EscalationChain`] tries its strategies in order and stops at
//! the first one that reports success.

use crate::os_command;
use crate::types::ProcError;
use tracing::{debug, warn};

/// One way of terminating all processes matching an image name.
pub trait TerminationStrategy: Send + Sync {
    /// Short name for logs, e.g. `taskkill`.
    fn name(&self) -> &'static str;

    fn terminate(&self, image: &str) -> Result<(), ProcError>;
}

/// `taskkill /IM <image> [/F] [/T]`.
#[derive(Debug, Clone, Copy)]
pub struct Taskkill {
    pub force: bool,
    pub include_tree: bool,
}

impl Taskkill {
    pub fn new(force: bool, include_tree: bool) -> Self {
        Self {
            force,
            include_tree,
        }
    }

    fn failure(&self, image: &str, message: String) -> ProcError {
        ProcError::Termination {
            name: image.to_string(),
            strategy: self.name(),
            message,
        }
    }
}

impl TerminationStrategy for Taskkill {
    fn name(&self) -> &'static str {
        "taskkill"
    }

    fn terminate(&self, image: &str) -> Result<(), ProcError> {
        let mut args = vec!["/IM", image];
        if self.force {
            args.push("/F");
        }
        if self.include_tree {
            args.push("/T");
        }

        let output = os_command::run("taskkill", &args)
            .map_err(|e| self.failure(image, e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(self.failure(image, os_command::describe_failure(&output)))
        }
    }
}

/// `wmic process where name="<image>" call terminate`, a separate kill path
/// that sometimes succeeds where taskkill is refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct WmicTerminate;

impl WmicTerminate {
    /// WQL string literal for `image`. Backslashes and quotes are escaped.
    fn where_clause(image: &str) -> String {
        let escaped = image.replace('\\', "\\\\").replace('"', "\\\"");
        format!("name=\"{}\"", escaped)
    }
}

impl TerminationStrategy for WmicTerminate {
    fn name(&self) -> &'static str {
        "wmic"
    }

    fn terminate(&self, image: &str) -> Result<(), ProcError> {
        let clause = Self::where_clause(image);
        let output = os_command::run("wmic", &["process", "where", &clause, "call", "terminate"])
            .map_err(|e| ProcError::Termination {
                name: image.to_string(),
                strategy: self.name(),
                message: e.to_string(),
            })?;

        // wmic exits 0 even when nothing matched or Terminate() was refused,
        // so the per-instance ReturnValue is what counts.
        let checked = if output.status.success() {
            check_return_values(&String::from_utf8_lossy(&output.stdout))
        } else {
            Err(os_command::describe_failure(&output))
        };
        checked.map_err(|message| ProcError::Termination {
            name: image.to_string(),
            strategy: self.name(),
            message,
        })
    }
}

/// Every `ReturnValue = N;` line in wmic's output must be 0, and there must
/// be at least one.
fn check_return_values(stdout: &str) -> Result<(), String> {
    let mut seen = 0;
    for line in stdout.lines() {
        let rest = match line.trim().strip_prefix("ReturnValue") {
            Some(rest) => rest,
            None => continue,
        };
        let value = rest.trim().trim_start_matches('=').trim().trim_end_matches(';').trim();
        match value.parse::<u32>() {
            Ok(0) => seen += 1,
            Ok(code) => return Err(format!("Terminate() returned {}", code)),
            Err(_) => return Err(format!("unexpected wmic output {:?}", line.trim())),
        }
    }

    if seen == 0 {
        let text = stdout.trim();
        Err(if text.is_empty() {
            "no matching instance".to_string()
        } else {
            text.to_string()
        })
    } else {
        Ok(())
    }
}

/// What happened to one identifier in one round.
#[derive(Debug)]
pub enum TerminationOutcome {
    /// Killed by the named strategy.
    Killed { by: &'static str },
    /// Every strategy failed; one error per strategy, in order.
    Survived { errors: Vec<ProcError> },
}

/// Ordered list of strategies, tried in sequence per identifier.
pub struct EscalationChain {
    strategies: Vec<Box<dyn TerminationStrategy>>,
}

impl EscalationChain {
    pub fn new(strategies: Vec<Box<dyn TerminationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Force kill only.
    pub fn standard() -> Self {
        Self::new(vec![Box::new(Taskkill::new(true, false))])
    }

    /// Force kill including child processes, then WMI as a fallback.
    pub fn forceful() -> Self {
        Self::new(vec![
            Box::new(Taskkill::new(true, true)),
            Box::new(WmicTerminate),
        ])
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy until one succeeds. Never fails as a whole.
    pub fn terminate(&self, image: &str) -> TerminationOutcome {
        let mut errors = Vec::new();

        for strategy in &self.strategies {
            match strategy.terminate(image) {
                Ok(()) => {
                    debug!("{} terminated {}", strategy.name(), image);
                    return TerminationOutcome::Killed { by: strategy.name() };
                }
                Err(e) => {
                    debug!("{}", e);
                    errors.push(e);
                }
            }
        }

        warn!("Could not terminate {} ({} strategies failed)", image, errors.len());
        TerminationOutcome::Survived { errors }
    }
}
