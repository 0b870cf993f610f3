//! User-facing text for finished sessions.

use backend::{SessionResult, StopReason};

/// One-paragraph summary of a session for the log and status bar.
pub fn describe(result: &SessionResult) -> String {
    match &result.stop {
        StopReason::NothingToDo => return "No processes need closing.".to_string(),
        StopReason::Declined => return "Cancelled, nothing was closed.".to_string(),
        _ => {}
    }

    let mut text = format!(
        "Closed {} of {} processes in {} round{}",
        result.total_killed,
        result.total_attempted,
        result.rounds_run,
        if result.rounds_run == 1 { "" } else { "s" }
    );

    let respawned = result.respawn_kills();
    if respawned > 0 {
        text.push_str(&format!(", {} of them restarted after the first round", respawned));
    }
    text.push('.');

    match &result.stop {
        StopReason::Cancelled => text.push_str(" Stopped early."),
        StopReason::EnumerationFailed(msg) => {
            text.push_str(&format!(" Could not list processes: {}.", msg))
        }
        StopReason::BaselineUnavailable(reason) => {
            text.push_str(&format!(" Stopped because {}.", reason))
        }
        _ => {}
    }

    if !result.survivors.is_empty() && result.stop != StopReason::Completed {
        let (shown, hidden) = result.survivors.preview(5);
        text.push_str(&format!(" Still running: {}", shown.join(", ")));
        if hidden > 0 {
            text.push_str(&format!(" and {} more", hidden));
        }
        text.push('.');
    }

    text
}
