//! Images that are never terminated, whatever the keep-list says.

use crate::types::ProcessSet;

/// Core Windows processes. Killing any of these logs the user out, blue
/// screens the machine or breaks the shell.
const SYSTEM_IMAGES: &[&str] = &[
    "System Idle Process",
    "System",
    "Secure System",
    "Registry",
    "Memory Compression",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "lsaiso.exe",
    "svchost.exe",
    "fontdrvhost.exe",
    "dwm.exe",
    "explorer.exe",
    "sihost.exe",
    "ctfmon.exe",
    "spoolsv.exe",
    "MsMpEng.exe",
];

/// Helpers this program spawns while it works.
const HELPER_IMAGES: &[&str] = &[
    "tasklist.exe",
    "taskkill.exe",
    "WMIC.exe",
    "wmic.exe",
    "WmiPrvSE.exe",
    "conhost.exe",
];

/// The fixed protected set plus this program's own image.
pub fn protected_set() -> ProcessSet {
    let own = own_image_name();
    SYSTEM_IMAGES
        .iter()
        .chain(HELPER_IMAGES)
        .map(|s| s.to_string())
        .chain(own)
        .collect()
}

/// File name of the running executable, e.g. `OneKill.exe`.
fn own_image_name() -> Option<String> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_critical_images_and_self() {
        let set = protected_set();
        for name in ["svchost.exe", "csrss.exe", "winlogon.exe", "taskkill.exe"] {
            assert!(set.contains(name), "{} should be protected", name);
        }
        if let Some(own) = own_image_name() {
            assert!(set.contains(&own));
        }
    }
}
