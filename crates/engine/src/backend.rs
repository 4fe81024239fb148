use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use mkvtoolnix::{Identification, ToolOutput, ToolPaths};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::track::{Attachment, FileSnapshot, Track};

/// External program an apply step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// `mkvmerge`, writes a new file.
    Remux,
    /// `mkvpropedit`, edits header fields in place.
    PropertyEditor,
}

impl Tool {
    pub fn program_name(self) -> &'static str {
        match self {
            Self::Remux => "mkvmerge",
            Self::PropertyEditor => "mkvpropedit",
        }
    }
}

/// Tool operations required by a session.
pub trait ToolBackend {
    /// Identifies `path` and converts the result into a snapshot.
    fn identify(&self, path: &Path) -> Result<FileSnapshot>;

    /// Runs `tool` with `args`; any exit code is returned, not interpreted.
    fn run(&self, tool: Tool, args: &[OsString]) -> Result<ToolOutput>;

    /// Chapter XML stored in `path`, or `None` if it has no chapters.
    fn extract_chapters(&self, path: &Path) -> Result<Option<String>>;
}

/// Backend running the installed MKVToolNix executables.
///
/// The tools are located on first use and the result is cached.
#[derive(Debug, Default)]
pub struct MkvToolnixBackend {
    override_dir: Option<PathBuf>,
    tools: OnceLock<ToolPaths>,
}

impl MkvToolnixBackend {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        Self {
            override_dir,
            tools: OnceLock::new(),
        }
    }

    /// Located tool paths, searching on the first call.
    pub fn tools(&self) -> Result<&ToolPaths> {
        if let Some(tools) = self.tools.get() {
            return Ok(tools);
        }
        let located = mkvtoolnix::locate_tools(self.override_dir.as_deref())?;
        Ok(self.tools.get_or_init(|| located))
    }

    /// Writes the raw stream of `track_id` in `path` to `output`.
    pub fn extract_track(&self, path: &Path, track_id: u32, output: &Path) -> Result<()> {
        let tools = self.tools()?;
        mkvtoolnix::extract_track(&tools.mkvextract, path, track_id, output)?;
        Ok(())
    }

    /// Writes attachment `attachment_id` of `path` to `output`.
    pub fn extract_attachment(&self, path: &Path, attachment_id: u32, output: &Path) -> Result<()> {
        let tools = self.tools()?;
        mkvtoolnix::extract_attachment(&tools.mkvextract, path, attachment_id, output)?;
        Ok(())
    }

    fn executable(&self, tool: Tool) -> Result<&Path> {
        let tools = self.tools()?;
        Ok(match tool {
            Tool::Remux => &tools.mkvmerge,
            Tool::PropertyEditor => &tools.mkvpropedit,
        })
    }
}

impl ToolBackend for MkvToolnixBackend {
    fn identify(&self, path: &Path) -> Result<FileSnapshot> {
        let mkvmerge = self.executable(Tool::Remux)?;
        let identification = mkvtoolnix::identify(mkvmerge, path)?;
        Ok(snapshot_from_identification(path, identification))
    }

    fn run(&self, tool: Tool, args: &[OsString]) -> Result<ToolOutput> {
        let executable = self.executable(tool)?;
        info!(tool = tool.program_name(), args = args.len(), "running tool");
        let output = mkvtoolnix::run_tool(executable, args)?;
        debug!(
            tool = tool.program_name(),
            exit_code = output.exit_code,
            "tool finished"
        );
        Ok(output)
    }

    fn extract_chapters(&self, path: &Path) -> Result<Option<String>> {
        let tools = self.tools()?;
        let xml = mkvtoolnix::extract_chapters(&tools.mkvextract, path)?;
        debug!(path = %path.display(), found = xml.is_some(), "chapters extracted");
        Ok(xml)
    }
}

/// Converts a decoded `mkvmerge -J` document into a snapshot of `path`.
pub fn snapshot_from_identification(path: &Path, identification: Identification) -> FileSnapshot {
    let title = identification
        .container
        .and_then(|container| container.properties.title);
    let chapter_count = identification
        .chapters
        .iter()
        .filter_map(|summary| summary.num_entries)
        .sum();

    FileSnapshot {
        path: path.to_path_buf(),
        title,
        tracks: identification.tracks.into_iter().map(Track::from).collect(),
        attachments: identification
            .attachments
            .into_iter()
            .map(Attachment::from)
            .collect(),
        chapter_count,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{Tool, snapshot_from_identification};
    use crate::track::TrackType;

    #[test]
    fn snapshot_sums_chapter_entries_and_keeps_title() {
        let json = r#"{
            "container": {"type": "Matroska", "properties": {"title": "Pilot"}},
            "chapters": [{"num_entries": 4}, {"num_entries": 2}],
            "tracks": [
                {"id": 0, "type": "video", "codec": "HEVC",
                 "properties": {"uid": 31, "pixel_crop_left": 12,
                                "pixel_dimensions": "3840x1600"}},
                {"id": 1, "type": "audio", "codec": "Opus",
                 "properties": {"language": "jpn", "flag_original": true}}
            ]
        }"#;
        let identification = mkvtoolnix::parse_identification(json).expect("valid json");

        let snapshot = snapshot_from_identification(Path::new("pilot.mkv"), identification);

        assert_eq!(snapshot.title.as_deref(), Some("Pilot"));
        assert_eq!(snapshot.chapter_count, 6);
        assert_eq!(snapshot.tracks.len(), 2);
        assert_eq!(snapshot.tracks[0].track_type, TrackType::Video);
        assert_eq!(snapshot.tracks[0].uid, Some(31));
        assert_eq!(snapshot.tracks[0].crop.left, Some(12));
        assert_eq!(snapshot.tracks[0].pixel_size, Some((3840, 1600)));
        assert_eq!(snapshot.tracks[1].flags.original, Some(true));
        assert_eq!(snapshot.tracks[1].flags.default_track, None);
    }

    #[test]
    fn program_names_match_executables() {
        assert_eq!(Tool::Remux.program_name(), "mkvmerge");
        assert_eq!(Tool::PropertyEditor.program_name(), "mkvpropedit");
    }
}
