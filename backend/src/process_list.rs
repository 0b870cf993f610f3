//! Process listing via `tasklist /FO CSV /NH`.

use crate::os_command;
use crate::types::{ProcError, ProcessEntry, ProcessSet};
use tracing::{debug, warn};

/// Anything that can enumerate the running processes.
///
/// Implementations must return an error rather than a partial or empty
/// listing when the query itself fails: an empty snapshot would make every
/// process look extra.
pub trait ProcessSnapshotSource: Send + Sync {
    /// Every running process, one entry per instance.
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError>;

    /// Distinct image names of the running processes.
    fn snapshot(&self) -> Result<ProcessSet, ProcError> {
        Ok(self.list_processes()?.into_iter().map(|p| p.name).collect())
    }
}

/// Lists processes with the stock Windows `tasklist` tool.
#[derive(Debug, Clone, Default)]
pub struct TasklistSource;

impl TasklistSource {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSnapshotSource for TasklistSource {
    fn list_processes(&self) -> Result<Vec<ProcessEntry>, ProcError> {
        let output = os_command::run("tasklist", &["/FO", "CSV", "/NH"])
            .map_err(|e| ProcError::Enumeration(format!("failed to run tasklist: {}", e)))?;

        let failure = (!output.status.success()).then(|| os_command::describe_failure(&output));
        let entries = parse_listing(failure, &output.stdout)?;
        debug!("Listed {} processes", entries.len());
        Ok(entries)
    }
}

/// Turn a finished `tasklist` run into entries. A failed run, or output
/// without a single parsable row, is an error and never an empty listing.
fn parse_listing(failure: Option<String>, stdout: &[u8]) -> Result<Vec<ProcessEntry>, ProcError> {
    if let Some(message) = failure {
        return Err(ProcError::Enumeration(format!("tasklist failed: {}", message)));
    }

    // tasklist writes in the OEM code page; image names are ASCII in
    // practice and anything else only has to round-trip to taskkill.
    let stdout = String::from_utf8_lossy(stdout);
    let entries = parse_tasklist_csv(&stdout);
    if entries.is_empty() {
        return Err(ProcError::Enumeration(
            "tasklist output contained no processes".to_string(),
        ));
    }
    Ok(entries)
}

/// Parse the whole `tasklist /FO CSV /NH` output, skipping malformed lines.
pub fn parse_tasklist_csv(output: &str) -> Vec<ProcessEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_tasklist_line(line) {
            Ok(entry) => entries.push(entry),
            Err(reason) => warn!("Skipping tasklist line {:?}: {}", line, reason),
        }
    }

    entries
}

/// Parse one CSV row: `"Image Name","PID","Session Name","Session#","Mem Usage"`.
fn parse_tasklist_line(line: &str) -> Result<ProcessEntry, String> {
    let fields = split_csv_line(line).ok_or_else(|| "unterminated quote".to_string())?;

    if fields.len() < 2 {
        return Err(format!("expected at least 2 fields, found {}", fields.len()));
    }

    let name = fields[0].clone();
    if name.is_empty() {
        return Err("empty image name".to_string());
    }

    let pid = fields[1]
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid PID {:?}", fields[1]))?;

    let session_name = fields.get(2).cloned().unwrap_or_default();
    let session_number = fields
        .get(3)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);

    // "12,345 K", "12.345 K" or "12 345 K" depending on locale.
    let memory_kb = fields
        .get(4)
        .map(|s| s.chars().filter(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(ProcessEntry {
        name,
        pid,
        session_name,
        session_number,
        memory_kb,
    })
}

/// Split a CSV line honouring quotes. Delimiters inside quotes are kept,
/// `""` inside a quoted field is a literal quote. Returns `None` on an
/// unterminated quoted field.
fn split_csv_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}
