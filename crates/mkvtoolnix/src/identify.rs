use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MkvToolnixError, Result};
use crate::run::run_tool;

/// Decoded `mkvmerge -J` document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Identification {
    #[serde(default)]
    pub file_name: Option<PathBuf>,
    #[serde(default)]
    pub container: Option<Container>,
    #[serde(default)]
    pub tracks: Vec<IdentifiedTrack>,
    #[serde(default)]
    pub attachments: Vec<IdentifiedAttachment>,
    #[serde(default)]
    pub chapters: Vec<ChapterSummary>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Container {
    #[serde(rename = "type", default)]
    pub container_type: Option<String>,
    #[serde(default)]
    pub recognized: bool,
    #[serde(default)]
    pub supported: bool,
    #[serde(default)]
    pub properties: ContainerProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContainerProperties {
    pub title: Option<String>,
    /// Duration in nanoseconds.
    pub duration: Option<u64>,
    pub muxing_application: Option<String>,
    pub writing_application: Option<String>,
}

/// Track kind as reported by mkvmerge. Unrecognized values map to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitles,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentifiedTrack {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub properties: TrackProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackProperties {
    pub uid: Option<u64>,
    pub number: Option<u32>,
    pub codec_id: Option<String>,
    pub track_name: Option<String>,
    pub language: Option<String>,
    pub default_track: Option<bool>,
    pub forced_track: Option<bool>,
    pub enabled_track: Option<bool>,
    pub flag_original: Option<bool>,
    pub flag_visual_impaired: Option<bool>,
    pub flag_commentary: Option<bool>,
    pub pixel_dimensions: Option<String>,
    pub pixel_crop_top: Option<u32>,
    pub pixel_crop_bottom: Option<u32>,
    pub pixel_crop_left: Option<u32>,
    pub pixel_crop_right: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentifiedAttachment {
    pub id: u32,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChapterSummary {
    pub num_entries: Option<u32>,
}

/// Runs `mkvmerge -J` for `path` and decodes the result.
///
/// Exit code 1 (warnings) is accepted; 2 and above is an error.
pub fn identify(mkvmerge: &Path, path: &Path) -> Result<Identification> {
    if !path.exists() {
        return Err(MkvToolnixError::FileNotFound(path.to_path_buf()));
    }

    let output = run_tool(mkvmerge, [OsStr::new("-J"), path.as_os_str()])?;
    if !output.succeeded() {
        return Err(MkvToolnixError::CommandFailed {
            command: format!("mkvmerge -J {}", path.display()),
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    let identification = parse_identification(&output.stdout)?;
    for message in &identification.warnings {
        warn!(path = %path.display(), %message, "mkvmerge identification warning");
    }
    debug!(
        path = %path.display(),
        tracks = identification.tracks.len(),
        attachments = identification.attachments.len(),
        "identified file"
    );
    Ok(identification)
}

/// Decodes an `mkvmerge -J` JSON document.
///
/// # Example
/// ```
/// use mkvtoolnix::{TrackKind, parse_identification};
///
/// let json = r#"{"tracks":[{"id":0,"type":"video","codec":"AVC/H.264","properties":{"uid":7}}]}"#;
/// let info = parse_identification(json).expect("valid json");
/// assert_eq!(info.tracks[0].kind, TrackKind::Video);
/// assert_eq!(info.tracks[0].properties.uid, Some(7));
/// ```
pub fn parse_identification(json: &str) -> Result<Identification> {
    Ok(serde_json::from_str(json)?)
}

impl TrackProperties {
    /// Parses `pixel_dimensions` (`"1920x1080"`) into width and height.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        let (width, height) = self.pixel_dimensions.as_deref()?.split_once('x')?;
        Some((width.parse().ok()?, height.parse().ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::{TrackKind, TrackProperties, parse_identification};
    use crate::MkvToolnixError;

    #[test]
    fn unknown_track_type_decodes_to_unknown() {
        let info = parse_identification(r#"{"tracks":[{"id":4,"type":"buttons"}]}"#)
            .expect("valid json");
        assert_eq!(info.tracks[0].kind, TrackKind::Unknown);
        assert_eq!(info.tracks[0].properties, TrackProperties::default());
    }

    #[test]
    fn malformed_json_is_reported() {
        let result = parse_identification("{\"tracks\": [");
        assert!(matches!(result, Err(MkvToolnixError::InvalidJson(_))));
    }

    #[test]
    fn pixel_size_requires_both_dimensions() {
        let mut props = TrackProperties {
            pixel_dimensions: Some("1920x1080".to_string()),
            ..TrackProperties::default()
        };
        assert_eq!(props.pixel_size(), Some((1920, 1080)));
        props.pixel_dimensions = Some("1920".to_string());
        assert_eq!(props.pixel_size(), None);
    }
}
