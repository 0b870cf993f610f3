//! Opening the keep-list in a text editor.

use std::io;
use std::path::Path;
use std::process::Command;

/// Launch the platform editor on `path` without waiting for it.
pub fn open_in_editor(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist, save a process list first", path.display()),
        ));
    }

    editor_command(path).spawn().map(|_| ())
}

#[cfg(windows)]
fn editor_command(path: &Path) -> Command {
    let mut cmd = Command::new("notepad.exe");
    cmd.arg(path);
    cmd
}

#[cfg(not(windows))]
fn editor_command(path: &Path) -> Command {
    let program = std::env::var("EDITOR").unwrap_or_else(|_| "xdg-open".to_string());
    let mut cmd = Command::new(program);
    cmd.arg(path);
    cmd
}
