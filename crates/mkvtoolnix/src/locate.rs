use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MkvToolnixError, Result};
use crate::run::run_tool;

const WELL_KNOWN_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// Absolute paths of the MKVToolNix executables used by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub mkvmerge: PathBuf,
    pub mkvpropedit: PathBuf,
    pub mkvextract: PathBuf,
    pub version: String,
}

/// Finds a working `mkvmerge` and its sibling `mkvpropedit` and `mkvextract`.
///
/// Search order: `override_dir`, well-known install directories, then `PATH`.
///
/// # Example
/// ```no_run
/// use mkvtoolnix::locate_tools;
///
/// let tools = locate_tools(None).expect("mkvtoolnix installed");
/// println!("{} at {}", tools.version, tools.mkvmerge.display());
/// ```
pub fn locate_tools(override_dir: Option<&Path>) -> Result<ToolPaths> {
    for dir in candidate_dirs(override_dir) {
        if let Some(tools) = validate_dir(&dir) {
            info!(
                mkvmerge = %tools.mkvmerge.display(),
                version = %tools.version,
                "mkvtoolnix located"
            );
            return Ok(tools);
        }
    }
    Err(MkvToolnixError::ToolNotFound)
}

fn candidate_dirs(override_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = override_dir {
        dirs.push(dir.to_path_buf());
    }
    dirs.extend(WELL_KNOWN_DIRS.iter().map(PathBuf::from));
    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }
    dirs
}

fn validate_dir(dir: &Path) -> Option<ToolPaths> {
    let mkvmerge = dir.join(executable_name("mkvmerge"));
    if !is_executable(&mkvmerge) {
        return None;
    }

    let output = run_tool(&mkvmerge, ["--version"]).ok()?;
    if output.exit_code != 0 {
        debug!(path = %mkvmerge.display(), exit_code = output.exit_code, "version check failed");
        return None;
    }
    let version = parse_version(&output.stdout)?;

    Some(ToolPaths {
        mkvpropedit: dir.join(executable_name("mkvpropedit")),
        mkvextract: dir.join(executable_name("mkvextract")),
        mkvmerge,
        version,
    })
}

/// Extracts the `v<major>.<minor>[.<patch>]` token from `--version` output.
///
/// # Example
/// ```
/// use mkvtoolnix::parse_version;
///
/// let version = parse_version("mkvmerge v97.0 ('You Don't Have A Clue') 64-bit");
/// assert_eq!(version.as_deref(), Some("v97.0"));
/// ```
pub fn parse_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find_map(version_token)
        .map(str::to_string)
}

fn version_token(word: &str) -> Option<&str> {
    let digits = word.strip_prefix('v')?;
    let end = digits
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(digits.len());
    let numbers = digits[..end].trim_end_matches('.');

    let parts = numbers.split('.').collect::<Vec<_>>();
    let well_formed = (2..=3).contains(&parts.len()) && parts.iter().all(|part| !part.is_empty());
    if !well_formed {
        return None;
    }
    Some(&word[..numbers.len() + 1])
}

fn executable_name(tool: &str) -> String {
    format!("{tool}{}", std::env::consts::EXE_SUFFIX)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
