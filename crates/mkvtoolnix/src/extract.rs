use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{MkvToolnixError, Result};
use crate::run::{ToolOutput, run_tool};

/// Arguments for `mkvextract <file> tracks <id>:<output>`.
///
/// # Example
/// ```
/// use std::path::Path;
/// use mkvtoolnix::track_extract_args;
///
/// let args = track_extract_args(Path::new("movie.mkv"), 2, Path::new("movie_track2.aac"));
/// assert_eq!(args, ["movie.mkv", "tracks", "2:movie_track2.aac"]);
/// ```
pub fn track_extract_args(path: &Path, track_id: u32, output: &Path) -> Vec<OsString> {
    mode_args(path, "tracks", track_id, output)
}

/// Arguments for `mkvextract <file> attachments <id>:<output>`.
pub fn attachment_extract_args(path: &Path, attachment_id: u32, output: &Path) -> Vec<OsString> {
    mode_args(path, "attachments", attachment_id, output)
}

/// Arguments for `mkvextract <file> chapters <output>`.
pub fn chapter_extract_args(path: &Path, output: &Path) -> Vec<OsString> {
    vec![
        path.as_os_str().to_owned(),
        OsString::from("chapters"),
        output.as_os_str().to_owned(),
    ]
}

fn mode_args(path: &Path, mode: &str, id: u32, output: &Path) -> Vec<OsString> {
    let mut target = OsString::from(format!("{id}:"));
    target.push(output);
    vec![path.as_os_str().to_owned(), OsString::from(mode), target]
}

/// Writes the raw stream of one track to `output`.
///
/// Any exit code other than 0 is a failure.
pub fn extract_track(mkvextract: &Path, path: &Path, track_id: u32, output: &Path) -> Result<()> {
    ensure_exists(path)?;
    let args = track_extract_args(path, track_id, output);
    let result = run_tool(mkvextract, &args)?;
    require_clean_exit(&args, result)?;
    info!(
        path = %path.display(),
        track_id,
        output = %output.display(),
        "track extracted"
    );
    Ok(())
}

/// Writes one attachment to `output`.
pub fn extract_attachment(
    mkvextract: &Path,
    path: &Path,
    attachment_id: u32,
    output: &Path,
) -> Result<()> {
    ensure_exists(path)?;
    let args = attachment_extract_args(path, attachment_id, output);
    let result = run_tool(mkvextract, &args)?;
    require_clean_exit(&args, result)?;
    info!(
        path = %path.display(),
        attachment_id,
        output = %output.display(),
        "attachment extracted"
    );
    Ok(())
}

/// Returns the chapter XML of `path`, or `None` when the file has no chapters.
///
/// The XML goes through a temporary file that is removed afterwards.
/// Exit code 1 (warnings) is accepted.
pub fn extract_chapters(mkvextract: &Path, path: &Path) -> Result<Option<String>> {
    ensure_exists(path)?;
    let scratch = tempfile::Builder::new()
        .prefix("chapters-")
        .suffix(".xml")
        .tempfile()
        .map_err(|source| MkvToolnixError::Io {
            context: "create chapter scratch file",
            source,
        })?
        .into_temp_path();

    let args = chapter_extract_args(path, &scratch);
    let output = run_tool(mkvextract, &args)?;
    if !output.succeeded() {
        return Err(command_failed(&args, output));
    }
    read_chapter_output(&scratch)
}

/// Reads what `mkvextract chapters` left behind; missing or blank means none.
fn read_chapter_output(path: &Path) -> Result<Option<String>> {
    let xml = match std::fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(MkvToolnixError::Io {
                context: "read extracted chapters",
                source,
            });
        }
    };
    if xml.trim().is_empty() {
        debug!(path = %path.display(), "no chapters extracted");
        return Ok(None);
    }
    Ok(Some(xml))
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MkvToolnixError::FileNotFound(path.to_path_buf()))
    }
}

fn require_clean_exit(args: &[OsString], output: ToolOutput) -> Result<()> {
    if output.exit_code == 0 {
        Ok(())
    } else {
        Err(command_failed(args, output))
    }
}

fn command_failed(args: &[OsString], output: ToolOutput) -> MkvToolnixError {
    let rendered = args
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    MkvToolnixError::CommandFailed {
        command: format!("mkvextract {rendered}"),
        exit_code: output.exit_code,
        stderr: output.stderr,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{
        attachment_extract_args, chapter_extract_args, command_failed, extract_attachment,
        extract_chapters, extract_track, read_chapter_output,
    };
    use crate::error::MkvToolnixError;
    use crate::run::ToolOutput;

    #[test]
    fn attachment_args_pair_id_with_output() {
        let args = attachment_extract_args(Path::new("/m/a.mkv"), 7, Path::new("/tmp/font.ttf"));
        assert_eq!(args, ["/m/a.mkv", "attachments", "7:/tmp/font.ttf"]);
    }

    #[test]
    fn chapter_args_name_output_file_directly() {
        let args = chapter_extract_args(Path::new("a.mkv"), Path::new("/tmp/ch.xml"));
        assert_eq!(args, ["a.mkv", "chapters", "/tmp/ch.xml"]);
    }

    #[test]
    fn missing_input_is_reported_before_running() {
        let tool = Path::new("/nonexistent/mkvextract");
        let input = Path::new("/nonexistent/input.mkv");

        let err = extract_track(tool, input, 0, Path::new("out.h264")).expect_err("missing file");
        assert!(matches!(err, MkvToolnixError::FileNotFound(path) if path == input));

        let err = extract_attachment(tool, input, 1, Path::new("font.ttf")).expect_err("missing");
        assert!(matches!(err, MkvToolnixError::FileNotFound(_)));

        let err = extract_chapters(tool, input).expect_err("missing file");
        assert!(matches!(err, MkvToolnixError::FileNotFound(_)));
    }

    #[test]
    fn blank_or_missing_chapter_output_means_no_chapters() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("missing.xml");
        assert_eq!(read_chapter_output(&missing).expect("missing is fine"), None);

        let blank = dir.path().join("blank.xml");
        std::fs::write(&blank, "  \n\t").expect("write blank output");
        assert_eq!(read_chapter_output(&blank).expect("blank is fine"), None);

        let full = dir.path().join("full.xml");
        std::fs::write(&full, "<Chapters/>\n").expect("write chapter output");
        assert_eq!(
            read_chapter_output(&full).expect("readable").as_deref(),
            Some("<Chapters/>\n")
        );
    }

    #[test]
    fn failure_names_the_extract_command() {
        let args = chapter_extract_args(Path::new("a.mkv"), Path::new("ch.xml"));
        let err = command_failed(
            &args,
            ToolOutput {
                stdout: String::new(),
                stderr: "Error: no chapters\n".to_string(),
                exit_code: 2,
            },
        );
        assert_eq!(
            err.to_string(),
            "command failed (exit code 2): mkvextract a.mkv chapters ch.xml; stderr: Error: no chapters"
        );
    }
}
