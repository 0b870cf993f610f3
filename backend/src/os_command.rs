//! Construction and execution of the Windows helper programs.

use std::process::{Command, Output};

/// `CREATE_NO_WINDOW`, keeps console helpers from flashing a window.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A `Command` for `program` that never opens a console window.
pub(crate) fn command(program: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(program);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd
}

/// Run `program args...` to completion and capture its output.
pub(crate) fn run(program: &str, args: &[&str]) -> std::io::Result<Output> {
    command(program).args(args).output()
}

/// Best-effort text of a helper's stderr, falling back to stdout.
pub(crate) fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    let text = text.trim();
    if text.is_empty() {
        format!("exit status {}", output.status)
    } else {
        text.to_string()
    }
}
