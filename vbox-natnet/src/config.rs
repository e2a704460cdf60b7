//! Locating the VBoxManage executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable pointing at the VirtualBox installation directory.
pub const INSTALL_PATH_ENV: &str = "VBOX_INSTALL_PATH";

/// Executable name used when nothing more specific is configured.
pub const DEFAULT_VBOXMANAGE: &str = "VBoxManage";

#[cfg(windows)]
const EXECUTABLE: &str = "VBoxManage.exe";
#[cfg(not(windows))]
const EXECUTABLE: &str = "VBoxManage";

/// Resolve the VBoxManage path from an explicit override or the environment.
pub fn resolve_vboxmanage(explicit: Option<&Path>) -> PathBuf {
    resolve_with(explicit, std::env::var_os(INSTALL_PATH_ENV))
}

/// Resolution order: explicit path, `$VBOX_INSTALL_PATH/VBoxManage`, then
/// plain `VBoxManage` looked up on `PATH`.
pub fn resolve_with(explicit: Option<&Path>, install_path: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    match install_path {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(EXECUTABLE),
        _ => PathBuf::from(DEFAULT_VBOXMANAGE),
    }
}
