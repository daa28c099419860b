//! Daemon settings, read from a YAML file.
//!
//! ```yaml
//! socket: run/patchwire.sock     # relative paths resolve against this file
//! templates: templates           # both default under ~/.patchwire
//! template: page.html
//! retain_comments: false
//! retain_doctype: false
//! log_filter: info
//! log_format: text               # or json
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use patchwire_core::CanonicalOptions;

use crate::error::{io_err, DaemonError};
use crate::paths::{default_socket_path, default_templates_dir, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Unix socket the daemon listens on.
    #[serde(default)]
    pub socket: PathBuf,
    /// Directory of `*.tera` templates.
    #[serde(default)]
    pub templates: PathBuf,
    /// Template rendered for every session.
    pub template: String,
    #[serde(default)]
    pub retain_comments: bool,
    #[serde(default)]
    pub retain_doctype: bool,
    /// Default `tracing` filter; `RUST_LOG` overrides it.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Settings {
    /// Settings rooted in `home/.patchwire`, rendering `template`.
    pub fn defaults_for(home: &Path, template: impl Into<String>) -> Self {
        Settings {
            socket: default_socket_path(home),
            templates: default_templates_dir(home),
            template: template.into(),
            retain_comments: false,
            retain_doctype: false,
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
        }
    }

    /// Load settings from `path`, resolving relative paths against the
    /// directory holding the file. Omitted paths fall back to
    /// [`Settings::defaults_for`] under the user's home directory.
    pub fn load_at(path: &Path) -> Result<Self, DaemonError> {
        Settings::load_with_home(path, dirs::home_dir())
    }

    fn load_with_home(path: &Path, home: Option<PathBuf>) -> Result<Self, DaemonError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(DaemonError::SettingsNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(err) => return Err(io_err(path, err)),
        };
        let mut settings: Settings =
            serde_yaml::from_str(&raw).map_err(|source| DaemonError::Settings {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or(Path::new("."));
        if settings.socket.as_os_str().is_empty() || settings.templates.as_os_str().is_empty() {
            let home = home.ok_or(DaemonError::HomeNotFound)?;
            let defaults = Settings::defaults_for(&home, "");
            if settings.socket.as_os_str().is_empty() {
                settings.socket = defaults.socket;
            }
            if settings.templates.as_os_str().is_empty() {
                settings.templates = defaults.templates;
            }
        }
        settings.socket = resolve(base, &settings.socket);
        settings.templates = resolve(base, &settings.templates);
        Ok(settings)
    }

    pub fn canonical(&self) -> CanonicalOptions {
        CanonicalOptions {
            retain_comments: self.retain_comments,
            retain_doctype: self.retain_doctype,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_resolve_against_the_settings_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("patchwire.yaml");
        std::fs::write(
            &path,
            "socket: run/pw.sock\ntemplates: /srv/templates\ntemplate: page.html\nretain_comments: true\n",
        )
        .expect("write");

        let settings = Settings::load_at(&path).expect("load");
        assert_eq!(settings.socket, dir.path().join("run/pw.sock"));
        assert_eq!(settings.templates, PathBuf::from("/srv/templates"));
        assert_eq!(settings.log_filter, "info");
        assert_eq!(settings.log_format, LogFormat::Text);
        assert!(settings.canonical().retain_comments);
        assert!(!settings.canonical().retain_doctype);
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let err = Settings::load_at(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, DaemonError::SettingsNotFound { .. }));
    }

    #[test]
    fn missing_required_field_is_a_parse_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("patchwire.yaml");
        std::fs::write(&path, "socket: pw.sock\nretain_doctype: true\n").expect("write");
        let err = Settings::load_at(&path).unwrap_err();
        assert!(matches!(err, DaemonError::Settings { .. }), "got: {err}");
    }

    #[test]
    fn omitted_paths_default_under_home() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("patchwire.yaml");
        std::fs::write(&path, "template: page.html\n").expect("write");
        let settings =
            Settings::load_with_home(&path, Some(PathBuf::from("/home/u"))).expect("load");
        assert_eq!(settings.socket, PathBuf::from("/home/u/.patchwire/patchwire.sock"));
        assert_eq!(settings.templates, PathBuf::from("/home/u/.patchwire/templates"));
    }

    #[test]
    fn omitted_socket_without_home_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("patchwire.yaml");
        std::fs::write(&path, "templates: t\ntemplate: page.html\n").expect("write");
        let err = Settings::load_with_home(&path, None).unwrap_err();
        assert!(matches!(err, DaemonError::HomeNotFound), "got: {err}");
    }

    #[test]
    fn explicit_paths_need_no_home() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("patchwire.yaml");
        std::fs::write(&path, "socket: pw.sock\ntemplates: t\ntemplate: page.html\n")
            .expect("write");
        let settings = Settings::load_with_home(&path, None).expect("load");
        assert_eq!(settings.socket, dir.path().join("pw.sock"));
    }

    #[test]
    fn defaults_live_under_dot_patchwire() {
        let settings = Settings::defaults_for(Path::new("/home/u"), "page.html");
        assert_eq!(settings.socket, PathBuf::from("/home/u/.patchwire/patchwire.sock"));
        assert_eq!(settings.templates, PathBuf::from("/home/u/.patchwire/templates"));
    }
}
