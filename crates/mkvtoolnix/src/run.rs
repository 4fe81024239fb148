use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{MkvToolnixError, Result};

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    /// MKVToolNix exits with 0 on success and 1 on success with warnings.
    ///
    /// # Example
    /// ```
    /// use mkvtoolnix::ToolOutput;
    ///
    /// let output = ToolOutput {
    ///     stdout: String::new(),
    ///     stderr: String::new(),
    ///     exit_code: 1,
    /// };
    /// assert!(output.succeeded());
    /// assert!(output.has_warnings());
    /// ```
    pub fn succeeded(&self) -> bool {
        matches!(self.exit_code, 0 | 1)
    }

    pub fn has_warnings(&self) -> bool {
        self.exit_code == 1
    }
}

/// Runs `executable` with `args` and captures its output.
///
/// A non-zero exit code is not an error here; callers decide how to
/// interpret it.
pub fn run_tool<I, S>(executable: &Path, args: I) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(executable)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| MkvToolnixError::Io {
            context: "run mkvtoolnix tool",
            source,
        })?;

    let Some(exit_code) = output.status.code() else {
        return Err(MkvToolnixError::Terminated {
            command: executable.display().to_string(),
        });
    };

    debug!(
        executable = %executable.display(),
        exit_code,
        stdout_len = output.stdout.len(),
        stderr_len = output.stderr.len(),
        "tool finished"
    );

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code,
    })
}
