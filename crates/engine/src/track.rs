use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Track id as assigned by one identification run. Not stable across remuxes.
pub type TrackId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
    Subtitles,
    Unknown,
}

impl TrackType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitles => "subtitles",
            Self::Unknown => "unknown",
        }
    }
}

/// Boolean track flags. `None` means identification did not report the flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackFlags {
    pub default_track: Option<bool>,
    pub forced_track: Option<bool>,
    pub enabled_track: Option<bool>,
    pub original: Option<bool>,
    pub visual_impaired: Option<bool>,
    pub commentary: Option<bool>,
}

/// Pixel cropping of a video track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelCrop {
    pub top: Option<u32>,
    pub bottom: Option<u32>,
    pub left: Option<u32>,
    pub right: Option<u32>,
}

/// One track of the original file, read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub uid: Option<u64>,
    pub track_type: TrackType,
    pub codec: String,
    /// Matroska codec id such as `A_AAC`.
    #[serde(default)]
    pub codec_id: Option<String>,
    pub name: Option<String>,
    pub language: Option<String>,
    pub flags: TrackFlags,
    pub crop: PixelCrop,
    /// Width and height of video tracks.
    #[serde(default)]
    pub pixel_size: Option<(u32, u32)>,
}

impl Track {
    /// Name (or codec) with the language appended unless undetermined.
    pub fn display_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or(&self.codec);
        match self.language.as_deref() {
            Some(language) if language != "und" => format!("{name} ({language})"),
            _ => name.to_string(),
        }
    }

    /// File name for this track's raw stream extracted from `source`.
    ///
    /// # Example
    /// ```
    /// use std::path::Path;
    /// use engine::{PixelCrop, Track, TrackFlags, TrackType};
    ///
    /// let track = Track {
    ///     id: 2,
    ///     uid: None,
    ///     track_type: TrackType::Audio,
    ///     codec: "AAC".to_string(),
    ///     codec_id: Some("A_AAC".to_string()),
    ///     name: None,
    ///     language: None,
    ///     flags: TrackFlags::default(),
    ///     crop: PixelCrop::default(),
    ///     pixel_size: None,
    /// };
    /// assert_eq!(track.suggested_file_name(Path::new("movie.mkv")), "movie_track2.aac");
    /// ```
    pub fn suggested_file_name(&self, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        let codec = self.codec_id.as_deref().unwrap_or(&self.codec);
        format!("{stem}_track{}{}", self.id, codec_extension(codec))
    }
}

/// Extension (with the dot) for a raw stream of `codec_id`; `.bin` if unknown.
pub fn codec_extension(codec_id: &str) -> &'static str {
    match codec_id {
        "V_MPEG4/ISO/AVC" => ".h264",
        "V_MPEGH/ISO/HEVC" => ".h265",
        "V_VP8" | "V_VP9" | "V_AV1" => ".ivf",
        "A_AAC" => ".aac",
        "A_MP3" => ".mp3",
        "A_FLAC" => ".flac",
        "A_OPUS" => ".opus",
        "A_AC3" => ".ac3",
        "A_EAC3" => ".eac3",
        "A_DTS" => ".dts",
        "A_VORBIS" => ".ogg",
        "S_TEXT/UTF8" => ".srt",
        "S_TEXT/ASS" => ".ass",
        "S_TEXT/SSA" => ".ssa",
        "S_TEXT/WEBVTT" => ".vtt",
        "S_VOBSUB" => ".sub",
        "S_HDMV/PGS" => ".sup",
        _ => ".bin",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u32,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Everything known about an open file at the last identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub title: Option<String>,
    pub tracks: Vec<Track>,
    pub attachments: Vec<Attachment>,
    /// Number of chapter entries reported by identification.
    pub chapter_count: u32,
}

impl FileSnapshot {
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }
}

impl From<mkvtoolnix::TrackKind> for TrackType {
    fn from(value: mkvtoolnix::TrackKind) -> Self {
        match value {
            mkvtoolnix::TrackKind::Video => Self::Video,
            mkvtoolnix::TrackKind::Audio => Self::Audio,
            mkvtoolnix::TrackKind::Subtitles => Self::Subtitles,
            mkvtoolnix::TrackKind::Unknown => Self::Unknown,
        }
    }
}

impl From<mkvtoolnix::IdentifiedTrack> for Track {
    fn from(value: mkvtoolnix::IdentifiedTrack) -> Self {
        let props = value.properties;
        let pixel_size = props.pixel_size();
        Self {
            id: value.id,
            uid: props.uid,
            track_type: value.kind.into(),
            codec: value.codec,
            codec_id: props.codec_id,
            name: props.track_name,
            language: props.language,
            flags: TrackFlags {
                default_track: props.default_track,
                forced_track: props.forced_track,
                enabled_track: props.enabled_track,
                original: props.flag_original,
                visual_impaired: props.flag_visual_impaired,
                commentary: props.flag_commentary,
            },
            crop: PixelCrop {
                top: props.pixel_crop_top,
                bottom: props.pixel_crop_bottom,
                left: props.pixel_crop_left,
                right: props.pixel_crop_right,
            },
            pixel_size,
        }
    }
}

impl From<mkvtoolnix::IdentifiedAttachment> for Attachment {
    fn from(value: mkvtoolnix::IdentifiedAttachment) -> Self {
        Self {
            id: value.id,
            file_name: value.file_name,
            content_type: value.content_type,
            size: value.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{PixelCrop, Track, TrackFlags, TrackType, codec_extension};

    #[test]
    fn display_name_hides_undetermined_language() {
        let mut track = Track {
            id: 1,
            uid: None,
            track_type: TrackType::Audio,
            codec: "AAC".to_string(),
            codec_id: None,
            name: None,
            language: Some("und".to_string()),
            flags: TrackFlags::default(),
            crop: PixelCrop::default(),
            pixel_size: None,
        };
        assert_eq!(track.display_name(), "AAC");

        track.name = Some("Commentary".to_string());
        track.language = Some("eng".to_string());
        assert_eq!(track.display_name(), "Commentary (eng)");
    }

    #[test]
    fn suggested_name_uses_stem_id_and_codec_extension() {
        let track = Track {
            id: 0,
            uid: None,
            track_type: TrackType::Video,
            codec: "AVC/H.264/MPEG-4p10".to_string(),
            codec_id: Some("V_MPEG4/ISO/AVC".to_string()),
            name: None,
            language: None,
            flags: TrackFlags::default(),
            crop: PixelCrop::default(),
            pixel_size: Some((1920, 1080)),
        };
        assert_eq!(
            track.suggested_file_name(Path::new("/media/test_video.mkv")),
            "test_video_track0.h264"
        );
    }

    #[test]
    fn codec_name_stands_in_for_missing_codec_id() {
        let track = Track {
            id: 3,
            uid: None,
            track_type: TrackType::Subtitles,
            codec: "S_HDMV/PGS".to_string(),
            codec_id: None,
            name: None,
            language: None,
            flags: TrackFlags::default(),
            crop: PixelCrop::default(),
            pixel_size: None,
        };
        assert_eq!(track.suggested_file_name(Path::new("film.mkv")), "film_track3.sup");
    }

    #[test]
    fn unknown_codecs_extract_as_bin() {
        assert_eq!(codec_extension("V_MS/VFW/FOURCC"), ".bin");
        assert_eq!(codec_extension(""), ".bin");
        assert_eq!(codec_extension("V_AV1"), ".ivf");
        assert_eq!(codec_extension("A_VORBIS"), ".ogg");
    }
}
