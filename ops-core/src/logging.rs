//! logging.rs
//!
//! File-backed logging shared by every tool in the workspace. Each binary
//! writes to its own file under an OS-appropriate state directory; nothing is
//! printed to the terminal unless you `tail -f` the file.

use eyre::Result;
use std::{
    env,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// Return an OS-appropriate state directory for this toolset.
pub fn state_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("Library")
            .join("Application Support")
            .join("ops-tools")
    }
    #[cfg(not(target_os = "macos"))]
    {
        if let Ok(xdg_state) = env::var("XDG_STATE_HOME") {
            PathBuf::from(xdg_state).join("ops-tools")
        } else if let Ok(home) = env::var("HOME") {
            PathBuf::from(home).join(".local").join("state").join("ops-tools")
        } else {
            PathBuf::from("ops-tools")
        }
    }
}

/// Return an OS-appropriate log directory, creating it if necessary.
pub fn get_or_create_log_dir() -> PathBuf {
    let dir = {
        #[cfg(target_os = "macos")]
        {
            env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("Library")
                .join("Logs")
                .join("ops-tools")
        }
        #[cfg(not(target_os = "macos"))]
        {
            state_dir().join("logs")
        }
    };

    if let Err(e) = fs::create_dir_all(&dir) {
        eprintln!("Failed to create log directory {}: {}", dir.display(), e);
    }
    dir
}

/// Initialise env_logger piped to `<log dir>/<tool>.log` and return the path.
///
/// Call once at the top of `main`; a second call panics inside env_logger.
pub fn init_file_logging(tool: &str) -> Result<PathBuf> {
    let log_dir = get_or_create_log_dir();
    let log_file_path = log_dir.join(format!("{tool}.log"));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let ts = buf.timestamp_millis();
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Trace)
        .init();
    Ok(log_file_path)
}
