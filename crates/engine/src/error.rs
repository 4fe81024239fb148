use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::backend::Tool;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by chapter parsing, session commands and tool runs.
///
/// The edit log, resolver and command builders never fail; everything here
/// comes from chapter documents, the filesystem or the external tools.
#[derive(Debug)]
pub enum EngineError {
    FileNotOpen,
    ChapterXml {
        reason: String,
    },
    InvalidChapterDocument,
    MissingRequiredTimestamp {
        element: &'static str,
    },
    UnparsableTimestamp {
        value: String,
    },
    ToolFailed {
        tool: Tool,
        exit_code: i32,
        stderr: String,
    },
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    Toolkit(mkvtoolnix::MkvToolnixError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotOpen => write!(f, "no file is open"),
            Self::ChapterXml { reason } => write!(f, "malformed chapter XML: {reason}"),
            Self::InvalidChapterDocument => {
                write!(f, "invalid chapter document: root element must be <Chapters>")
            }
            Self::MissingRequiredTimestamp { element } => {
                write!(f, "chapter atom is missing required <{element}>")
            }
            Self::UnparsableTimestamp { value } => write!(f, "invalid timestamp: {value:?}"),
            Self::ToolFailed {
                tool,
                exit_code,
                stderr,
            } => write!(
                f,
                "{} failed (exit code {exit_code}): {}",
                tool.program_name(),
                stderr.trim()
            ),
            Self::Io {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::Toolkit(err) => write!(f, "mkvtoolnix error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Toolkit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<mkvtoolnix::MkvToolnixError> for EngineError {
    fn from(value: mkvtoolnix::MkvToolnixError) -> Self {
        Self::Toolkit(value)
    }
}
