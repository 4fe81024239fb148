use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, MkvToolnixError>;

/// Error type for operations backed by the MKVToolNix command-line tools.
#[derive(Debug)]
pub enum MkvToolnixError {
    ToolNotFound,
    FileNotFound(PathBuf),
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    Terminated {
        command: String,
    },
    InvalidJson(serde_json::Error),
}

impl Display for MkvToolnixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolNotFound => {
                write!(f, "mkvmerge not found; install MKVToolNix or set its directory")
            }
            Self::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::CommandFailed {
                command,
                exit_code,
                stderr,
            } => write!(
                f,
                "command failed (exit code {exit_code}): {command}; stderr: {}",
                stderr.trim()
            ),
            Self::Terminated { command } => {
                write!(f, "command terminated without exit code: {command}")
            }
            Self::InvalidJson(err) => write!(f, "failed to parse mkvmerge output: {err}"),
        }
    }
}

impl std::error::Error for MkvToolnixError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MkvToolnixError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value)
    }
}
