use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "patchwire.yaml";
pub const DAEMON_SOCKET: &str = "patchwire.sock";
pub const TEMPLATES_DIR: &str = "templates";

pub fn patchwire_root(home: &Path) -> PathBuf {
    home.join(".patchwire")
}

pub fn default_socket_path(home: &Path) -> PathBuf {
    patchwire_root(home).join(DAEMON_SOCKET)
}

pub fn default_templates_dir(home: &Path) -> PathBuf {
    patchwire_root(home).join(TEMPLATES_DIR)
}

/// `path` as is when absolute, otherwise relative to `base`.
pub(crate) fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
