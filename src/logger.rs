//! Session logger. Everything goes to stderr and, when the file can be
//! opened, to a per-session log in the OS data directory.
//!
//! The file is **truncated at each launch**, so it only ever contains output
//! from the most recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\MDIPaint\mdipaint.log`
//!   Linux:    `$XDG_DATA_HOME/MDIPaint/mdipaint.log` or `~/.local/share/MDIPaint/mdipaint.log`
//!   macOS:    `~/Library/Application Support/MDIPaint/mdipaint.log`
//!
//! Filtering follows `RUST_LOG` when set, otherwise `mdipaint=info`
//! (`mdipaint=debug` with `verbose`).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once, OnceLock};

use tracing::{Subscriber, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static PANIC_HOOK: Once = Once::new();

/// Returns the path to the current session log file, if one was opened.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let path = log_file_path();
    let file = match open_log_file(&path) {
        Ok(file) => {
            let _ = LOG_PATH.set(path.clone());
            Some(file)
        }
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            None
        }
    };

    if build_subscriber(verbose, file).try_init().is_err() {
        return;
    }

    if let Some(path) = log_path() {
        info!(log = %path.display(), "MDIPaint session started");
    }

    // Mirror panics into the log, then run the previous hook.
    PANIC_HOOK.call_once(|| {
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            error!("PANIC: {}", panic_info);
            prev(panic_info);
        }));
    });
}

/// Filter, stderr layer and, when a file is given, a plain-text file layer.
fn build_subscriber(verbose: bool, file: Option<File>) -> impl Subscriber + Send + Sync + 'static {
    let default_directive = if verbose { "mdipaint=debug" } else { "mdipaint=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let file_layer = file.map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

fn log_file_path() -> PathBuf {
    data_dir().join("MDIPaint").join("mdipaint.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    // Linux / fallback
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_the_app_folder() {
        let path = log_file_path();
        assert_eq!(path.file_name().unwrap(), "mdipaint.log");
        assert_eq!(path.parent().unwrap().file_name().unwrap(), "MDIPaint");
    }

    #[test]
    fn log_file_is_created_with_its_folder_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MDIPaint").join("mdipaint.log");

        drop(open_log_file(&path).unwrap());
        fs::write(&path, "previous session\n").unwrap();
        drop(open_log_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn session_file_receives_events_without_colour_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdipaint.log");
        let file = open_log_file(&path).unwrap();

        tracing::subscriber::with_default(build_subscriber(true, Some(file)), || {
            tracing::warn!(target: "mdipaint", "canvas went missing");
        });

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("canvas went missing"));
        assert!(!written.contains('\u{1b}'));
        assert!(log_path().is_none());
    }
}
