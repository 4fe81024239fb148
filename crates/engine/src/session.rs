use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use mkvtoolnix::{MkvToolnixError, ToolOutput};
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, info, warn};

use crate::backend::{Tool, ToolBackend};
use crate::chapters::{ChapterEdition, generate_chapters, parse_chapters};
use crate::edit_log::{EditLog, TrackAddition};
use crate::error::{EngineError, Result};
use crate::patch::{CropPreset, PropertyPatch};
use crate::propedit::build_propedit_args;
use crate::remux::build_remux_args;
use crate::resolve::ResolvedChangeset;
use crate::track::{FileSnapshot, TrackId};

/// Shown in dry runs where the generated chapter file would go.
const CHAPTER_FILE_PLACEHOLDER: &str = "<chapters.xml>";

/// Commands accepted by a session.
///
/// Commands deserialize from JSON objects tagged by `op`, so a JSON array of
/// them works as an edit script:
///
/// ```
/// use engine::Command;
///
/// let script = r#"[
///     {"op": "edit_properties", "track_id": 1, "patch": {"language": "jpn"}},
///     {"op": "remove_track", "track_id": 3},
///     {"op": "apply", "mode": "inline"}
/// ]"#;
/// let commands: Vec<Command> = serde_json::from_str(script).expect("valid script");
/// assert_eq!(commands.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Open {
        path: PathBuf,
    },
    Reload,
    EditProperties {
        track_id: TrackId,
        patch: PropertyPatch,
    },
    /// Queues symmetric crop values bringing a video track to `preset`.
    ///
    /// Queues nothing for [`CropPreset::None`] or a track of unknown size.
    CropToPreset {
        track_id: TrackId,
        preset: CropPreset,
    },
    RemoveTrack {
        track_id: TrackId,
    },
    AddTrack {
        addition: TrackAddition,
    },
    Reorder {
        order: Vec<TrackId>,
    },
    EditChapters {
        editions: Vec<ChapterEdition>,
    },
    /// Reads a chapter XML file and queues it as the new chapters.
    ///
    /// A file that fails to parse queues nothing.
    ImportChapters {
        path: PathBuf,
    },
    RemoveChapters,
    /// Reports the chapters an apply would leave in the file.
    LoadChapters,
    Undo,
    Redo,
    CancelAll,
    Apply {
        #[serde(default)]
        mode: OutputMode,
    },
}

/// Where a remux writes its result.
///
/// Property edits always modify the open file in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Replace the file and keep the previous version as `<file>.bak`.
    #[default]
    Backup,
    /// Replace the file.
    Inline,
    /// Write to another path and leave the file alone.
    SaveAs(PathBuf),
}

/// Events emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    FileOpened(FileSnapshot),
    ChangesetChanged(ChangesetSummary),
    /// Pending chapter edits if any, else the chapters stored in the file.
    ChaptersLoaded(Vec<ChapterEdition>),
    Applied {
        tool: Tool,
        path: PathBuf,
        warnings: Vec<String>,
    },
    Error(EngineErrorEvent),
}

/// Coarse error classes for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    FileNotOpen,
    InvalidChapters,
    ToolNotFound,
    ToolFailed,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::FileNotOpen => Self::FileNotOpen,
            EngineError::ChapterXml { .. }
            | EngineError::InvalidChapterDocument
            | EngineError::MissingRequiredTimestamp { .. }
            | EngineError::UnparsableTimestamp { .. } => Self::InvalidChapters,
            EngineError::Toolkit(MkvToolnixError::ToolNotFound) => Self::ToolNotFound,
            EngineError::ToolFailed { .. } => Self::ToolFailed,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// State of the edit log as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesetSummary {
    /// Descriptions of the pending operations, oldest first.
    pub pending: Vec<String>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub edited_tracks: usize,
    pub has_structural_changes: bool,
    pub has_chapter_changes: bool,
}

/// Tool invocation an apply would perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    pub tool: Tool,
    pub args: Vec<OsString>,
}

impl ApplyPlan {
    /// Shell-like rendering for display; not meant to be executed.
    pub fn command_line(&self) -> String {
        let mut line = self.tool.program_name().to_string();
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('"');
                line.push_str(&arg);
                line.push('"');
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Edit session for one open file.
#[derive(Debug)]
pub struct Session<B> {
    backend: B,
    file: Option<FileSnapshot>,
    log: EditLog,
}

impl<B> Session<B>
where
    B: ToolBackend,
{
    /// Creates a session with no file open.
    ///
    /// # Example
    /// ```no_run
    /// use std::path::PathBuf;
    /// use engine::{Command, MkvToolnixBackend, Session};
    ///
    /// let mut session = Session::new(MkvToolnixBackend::new(None));
    /// let _ = session.handle_command(Command::Open {
    ///     path: PathBuf::from("movie.mkv"),
    /// });
    /// ```
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            file: None,
            log: EditLog::new(),
        }
    }

    pub fn file(&self) -> Option<&FileSnapshot> {
        self.file.as_ref()
    }

    pub fn log(&self) -> &EditLog {
        &self.log
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Open { path } => self.open(path),
            Command::Reload => self.reload(),
            Command::EditProperties { track_id, patch } => {
                let track_uid = self
                    .current_file()?
                    .track(track_id)
                    .and_then(|track| track.uid);
                self.log.edit_properties(track_id, track_uid, patch);
                self.changeset_changed()
            }
            Command::CropToPreset { track_id, preset } => self.crop_to_preset(track_id, preset),
            Command::RemoveTrack { track_id } => {
                self.current_file()?;
                self.log.remove_track(track_id);
                self.changeset_changed()
            }
            Command::AddTrack { addition } => {
                self.current_file()?;
                self.log.add_track(addition);
                self.changeset_changed()
            }
            Command::Reorder { order } => {
                self.current_file()?;
                self.log.reorder(order);
                self.changeset_changed()
            }
            Command::EditChapters { editions } => {
                self.current_file()?;
                self.log.edit_chapters(editions);
                self.changeset_changed()
            }
            Command::ImportChapters { path } => self.import_chapters(&path),
            Command::RemoveChapters => {
                self.current_file()?;
                self.log.remove_chapters();
                self.changeset_changed()
            }
            Command::LoadChapters => self.load_chapters(),
            Command::Undo => {
                self.log.undo();
                self.changeset_changed()
            }
            Command::Redo => {
                self.log.redo();
                self.changeset_changed()
            }
            Command::CancelAll => {
                self.log.cancel_all();
                self.changeset_changed()
            }
            Command::Apply { mode } => self.apply(mode),
        }
    }

    /// Like [`Session::handle_command`], reporting failure as an [`Event::Error`].
    pub fn dispatch(&mut self, command: Command) -> Vec<Event> {
        match self.handle_command(command) {
            Ok(events) => events,
            Err(error) => {
                warn!(%error, "command failed");
                vec![Event::Error(EngineErrorEvent::from_error(&error))]
            }
        }
    }

    /// Current changeset against the open file.
    pub fn resolved(&self) -> Result<ResolvedChangeset> {
        Ok(self.log.resolve(&self.current_file()?.tracks))
    }

    pub fn summary(&self) -> ChangesetSummary {
        let changes = self
            .file
            .as_ref()
            .map(|file| self.log.resolve(&file.tracks))
            .unwrap_or_default();
        ChangesetSummary {
            pending: self
                .log
                .operations()
                .iter()
                .map(|operation| operation.kind.describe())
                .collect(),
            can_undo: self.log.can_undo(),
            can_redo: self.log.can_redo(),
            edited_tracks: changes.property_edits.len(),
            has_structural_changes: changes.has_structural_changes,
            has_chapter_changes: changes.has_chapter_changes(),
        }
    }

    /// Tool invocation `Apply { mode }` would run, without running it.
    ///
    /// Returns `None` when there is nothing to apply. Temporary paths are
    /// shown as placeholders.
    pub fn preview_apply(&self, mode: &OutputMode) -> Result<Option<ApplyPlan>> {
        let file = self.current_file()?;
        let changes = self.log.resolve(&file.tracks);
        if changes.is_noop() {
            return Ok(None);
        }

        let chapter_file = changes
            .chapter_edits
            .as_ref()
            .map(|_| PathBuf::from(CHAPTER_FILE_PLACEHOLDER));
        let output = match mode {
            OutputMode::SaveAs(path) => path.clone(),
            OutputMode::Backup | OutputMode::Inline => staging_placeholder(&file.path),
        };
        Ok(plan(&changes, file, &output, chapter_file.as_deref()))
    }

    fn open(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let snapshot = self.backend.identify(&path)?;
        info!(
            path = %path.display(),
            tracks = snapshot.tracks.len(),
            chapters = snapshot.chapter_count,
            "file opened"
        );
        self.file = Some(snapshot.clone());
        self.log = EditLog::new();
        Ok(vec![
            Event::FileOpened(snapshot),
            Event::ChangesetChanged(self.summary()),
        ])
    }

    fn reload(&mut self) -> Result<Vec<Event>> {
        let path = self.current_file()?.path.clone();
        let snapshot = self.backend.identify(&path)?;
        debug!(path = %path.display(), "file reloaded");
        self.file = Some(snapshot.clone());
        Ok(vec![
            Event::FileOpened(snapshot),
            Event::ChangesetChanged(self.summary()),
        ])
    }

    fn import_chapters(&mut self, path: &Path) -> Result<Vec<Event>> {
        self.current_file()?;
        let xml = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            context: "failed to read chapter file",
            path: path.to_path_buf(),
            source,
        })?;
        let editions = parse_chapters(&xml)?;
        info!(
            path = %path.display(),
            editions = editions.len(),
            "chapters imported"
        );
        self.log.edit_chapters(editions);
        self.changeset_changed()
    }

    fn load_chapters(&self) -> Result<Vec<Event>> {
        let file = self.current_file()?;
        let changes = self.log.resolve(&file.tracks);
        if changes.remove_chapters {
            return Ok(vec![Event::ChaptersLoaded(Vec::new())]);
        }
        if let Some(editions) = changes.chapter_edits {
            return Ok(vec![Event::ChaptersLoaded(editions)]);
        }

        let editions = match self.backend.extract_chapters(&file.path)? {
            Some(xml) => parse_chapters(&xml)?,
            None => Vec::new(),
        };
        info!(
            path = %file.path.display(),
            editions = editions.len(),
            "chapters loaded"
        );
        Ok(vec![Event::ChaptersLoaded(editions)])
    }

    fn crop_to_preset(&mut self, track_id: TrackId, preset: CropPreset) -> Result<Vec<Event>> {
        let track = self.current_file()?.track(track_id);
        let uid = track.and_then(|track| track.uid);
        let Some(patch) = track
            .and_then(|track| track.pixel_size)
            .and_then(|(width, height)| preset.crop_patch(width, height))
        else {
            debug!(track_id, ?preset, "crop preset not applicable");
            return Ok(Vec::new());
        };
        self.log.edit_properties(track_id, uid, patch);
        self.changeset_changed()
    }

    fn apply(&mut self, mode: OutputMode) -> Result<Vec<Event>> {
        let file = self.current_file()?;
        let path = file.path.clone();
        let changes = self.log.resolve(&file.tracks);
        if changes.is_noop() {
            info!(path = %path.display(), "nothing to apply");
            return Ok(Vec::new());
        }

        // Removed when dropped, whichever way this function returns.
        let chapter_file = changes
            .chapter_edits
            .as_deref()
            .map(write_chapter_file)
            .transpose()?;
        let chapter_path = chapter_file.as_ref().map(|chapters| chapters.path());

        let (tool, written_to, output) = if changes.has_structural_changes {
            match &mode {
                OutputMode::SaveAs(target) => {
                    let args =
                        build_remux_args(&changes, &file.tracks, &path, target, chapter_path);
                    let output = self.run_checked(Tool::Remux, &args)?;
                    (Tool::Remux, target.clone(), output)
                }
                OutputMode::Backup | OutputMode::Inline => {
                    let staging = staging_file(&path)?;
                    let args =
                        build_remux_args(&changes, &file.tracks, &path, &staging, chapter_path);
                    let output = self.run_checked(Tool::Remux, &args)?;
                    if mode == OutputMode::Backup {
                        move_to_backup(&path)?;
                    }
                    staging.persist(&path).map_err(|err| EngineError::Io {
                        context: "failed to replace original file",
                        path: path.clone(),
                        source: err.error,
                    })?;
                    (Tool::Remux, path.clone(), output)
                }
            }
        } else {
            let args = build_propedit_args(&changes, &file.tracks, &path, chapter_path);
            if args.is_empty() {
                return Ok(Vec::new());
            }
            let output = self.run_checked(Tool::PropertyEditor, &args)?;
            (Tool::PropertyEditor, path.clone(), output)
        };
        drop(chapter_file);

        let warnings = collect_warnings(&output);
        info!(
            tool = tool.program_name(),
            path = %written_to.display(),
            warnings = warnings.len(),
            "changes applied"
        );

        self.log.cancel_all();
        let mut events = vec![Event::Applied {
            tool,
            path: written_to,
            warnings,
        }];
        events.extend(self.reload()?);
        Ok(events)
    }

    fn run_checked(&self, tool: Tool, args: &[OsString]) -> Result<ToolOutput> {
        let output = self.backend.run(tool, args)?;
        if output.succeeded() {
            return Ok(output);
        }

        warn!(
            tool = tool.program_name(),
            exit_code = output.exit_code,
            "tool failed"
        );
        // mkvmerge reports its errors on stdout.
        let stderr = if output.stderr.trim().is_empty() {
            output.stdout
        } else {
            output.stderr
        };
        Err(EngineError::ToolFailed {
            tool,
            exit_code: output.exit_code,
            stderr,
        })
    }

    fn changeset_changed(&self) -> Result<Vec<Event>> {
        Ok(vec![Event::ChangesetChanged(self.summary())])
    }

    fn current_file(&self) -> Result<&FileSnapshot> {
        self.file.as_ref().ok_or(EngineError::FileNotOpen)
    }
}

fn plan(
    changes: &ResolvedChangeset,
    file: &FileSnapshot,
    remux_output: &Path,
    chapter_file: Option<&Path>,
) -> Option<ApplyPlan> {
    if changes.has_structural_changes {
        let args = build_remux_args(changes, &file.tracks, &file.path, remux_output, chapter_file);
        return Some(ApplyPlan {
            tool: Tool::Remux,
            args,
        });
    }
    let args = build_propedit_args(changes, &file.tracks, &file.path, chapter_file);
    (!args.is_empty()).then_some(ApplyPlan {
        tool: Tool::PropertyEditor,
        args,
    })
}

fn write_chapter_file(editions: &[ChapterEdition]) -> Result<NamedTempFile> {
    let temp_error = |source: std::io::Error| EngineError::Io {
        context: "failed to write chapter file",
        path: std::env::temp_dir(),
        source,
    };
    let mut file = tempfile::Builder::new()
        .prefix("trackpatch-chapters-")
        .suffix(".xml")
        .tempfile()
        .map_err(temp_error)?;
    file.write_all(generate_chapters(editions).as_bytes())
        .map_err(temp_error)?;
    file.flush().map_err(temp_error)?;
    debug!(path = %file.path().display(), "chapter file written");
    Ok(file)
}

/// Empty file beside `original` for the remux to write into.
fn staging_file(original: &Path) -> Result<TempPath> {
    let dir = parent_dir(original);
    let file = tempfile::Builder::new()
        .prefix(".trackpatch-")
        .suffix(".mkv")
        .tempfile_in(dir)
        .map_err(|source| EngineError::Io {
            context: "failed to create output file",
            path: dir.to_path_buf(),
            source,
        })?;
    Ok(file.into_temp_path())
}

fn staging_placeholder(original: &Path) -> PathBuf {
    parent_dir(original).join(".trackpatch-XXXXXX.mkv")
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `<file>.bak` next to `original`.
pub fn backup_path(original: &Path) -> PathBuf {
    let mut name = original.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Moves `original` to its backup path, replacing an older backup.
fn move_to_backup(original: &Path) -> Result<()> {
    let backup = backup_path(original);
    if backup.exists() {
        std::fs::remove_file(&backup).map_err(|source| EngineError::Io {
            context: "failed to remove old backup",
            path: backup.clone(),
            source,
        })?;
    }
    std::fs::rename(original, &backup).map_err(|source| EngineError::Io {
        context: "failed to back up original file",
        path: original.to_path_buf(),
        source,
    })?;
    debug!(backup = %backup.display(), "original moved to backup");
    Ok(())
}

fn collect_warnings(output: &ToolOutput) -> Vec<String> {
    let mut warnings = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .map(str::trim)
        .filter(|line| line.starts_with("Warning:"))
        .map(str::to_string)
        .collect::<Vec<_>>();
    if warnings.is_empty() && output.has_warnings() {
        warnings.push("completed with warnings".to_string());
    }
    warnings
}
