use std::path::PathBuf;

use mkvtoolnix::{TrackKind, parse_identification};

const SAMPLE: &str = r#"{
  "attachments": [
    {
      "content_type": "font/ttf",
      "description": "",
      "file_name": "DejaVuSans.ttf",
      "id": 0,
      "properties": { "uid": 11528367315390164178 },
      "size": 757076
    }
  ],
  "chapters": [ { "num_entries": 12 } ],
  "container": {
    "properties": {
      "container_type": 17,
      "duration": 1422417000000,
      "is_providing_timestamps": true,
      "muxing_application": "libebml v1.4.4 + libmatroska v1.7.1",
      "title": "Sample Feature",
      "writing_application": "mkvmerge v81.0 ('Milliontown') 64-bit"
    },
    "recognized": true,
    "supported": true,
    "type": "Matroska"
  },
  "errors": [],
  "file_name": "/media/sample.mkv",
  "global_tags": [],
  "identification_format_version": 19,
  "track_tags": [],
  "tracks": [
    {
      "codec": "AVC/H.264/MPEG-4p10",
      "id": 0,
      "properties": {
        "codec_id": "V_MPEG4/ISO/AVC",
        "default_track": true,
        "enabled_track": true,
        "forced_track": false,
        "language": "und",
        "number": 1,
        "pixel_dimensions": "1920x1080",
        "pixel_crop_top": 0,
        "pixel_crop_bottom": 0,
        "uid": 1311240467062036004,
        "tag_bps": "4835648"
      },
      "type": "video"
    },
    {
      "codec": "AAC",
      "id": 1,
      "properties": {
        "audio_channels": 6,
        "audio_sampling_frequency": 48000,
        "codec_id": "A_AAC",
        "default_track": true,
        "flag_commentary": false,
        "language": "eng",
        "number": 2,
        "track_name": "Surround 5.1",
        "uid": 9105741823617302592
      },
      "type": "audio"
    },
    {
      "codec": "SubRip/SRT",
      "id": 2,
      "properties": {
        "codec_id": "S_TEXT/UTF8",
        "default_track": false,
        "forced_track": true,
        "language": "jpn",
        "number": 3,
        "text_subtitles": true
      },
      "type": "subtitles"
    }
  ],
  "warnings": ["The file uses an unknown element"]
}"#;

#[test]
fn decodes_tracks_attachments_and_container() {
    let info = parse_identification(SAMPLE).expect("fixture must decode");

    assert_eq!(info.file_name, Some(PathBuf::from("/media/sample.mkv")));
    assert_eq!(info.tracks.len(), 3);
    assert_eq!(info.attachments.len(), 1);
    assert_eq!(info.chapters[0].num_entries, Some(12));
    assert_eq!(info.warnings.len(), 1);

    let container = info.container.expect("container present");
    assert!(container.recognized);
    assert_eq!(container.properties.title.as_deref(), Some("Sample Feature"));
    assert_eq!(container.properties.duration, Some(1_422_417_000_000));

    let video = &info.tracks[0];
    assert_eq!(video.kind, TrackKind::Video);
    assert_eq!(video.properties.uid, Some(1_311_240_467_062_036_004));
    assert_eq!(video.properties.pixel_size(), Some((1920, 1080)));
    assert_eq!(video.properties.pixel_crop_top, Some(0));
    assert_eq!(video.properties.pixel_crop_left, None);

    let audio = &info.tracks[1];
    assert_eq!(audio.kind, TrackKind::Audio);
    assert_eq!(audio.properties.track_name.as_deref(), Some("Surround 5.1"));
    assert_eq!(audio.properties.flag_commentary, Some(false));

    let subtitles = &info.tracks[2];
    assert_eq!(subtitles.kind, TrackKind::Subtitles);
    assert_eq!(subtitles.properties.uid, None);
    assert_eq!(subtitles.properties.forced_track, Some(true));
}

#[test]
fn minimal_document_uses_defaults() {
    let info = parse_identification("{}").expect("empty object is valid");
    assert!(info.tracks.is_empty());
    assert!(info.container.is_none());
}
