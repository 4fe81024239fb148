use std::path::{Path, PathBuf};

use engine::{
    ChapterAtom, ChapterDisplay, ChapterEdition, EditLog, FileSnapshot, PropertyPatch,
    TrackAddition, build_propedit_args, build_remux_args, generate_chapters, parse_chapters,
    snapshot_from_identification,
};

const IDENTIFICATION: &str = r#"{
  "container": {"type": "Matroska", "recognized": true, "supported": true,
                "properties": {"title": "Night Train", "duration": 5400000000000}},
  "chapters": [{"num_entries": 3}],
  "tracks": [
    {"id": 0, "type": "video", "codec": "AVC/H.264/MPEG-4p10",
     "properties": {"uid": 12345, "language": "und", "default_track": true,
                    "enabled_track": true, "forced_track": false}},
    {"id": 1, "type": "audio", "codec": "AAC",
     "properties": {"uid": 23456, "language": "jpn", "track_name": "Stereo",
                    "default_track": true, "forced_track": false}},
    {"id": 2, "type": "audio", "codec": "AC-3",
     "properties": {"uid": 34567, "language": "eng", "default_track": false}},
    {"id": 3, "type": "audio", "codec": "AAC",
     "properties": {"language": "eng", "track_name": "Commentary", "flag_commentary": true}},
    {"id": 4, "type": "subtitles", "codec": "SubRip/SRT",
     "properties": {"uid": 56789, "language": "eng", "forced_track": false}}
  ]
}"#;

fn snapshot() -> FileSnapshot {
    let identification =
        mkvtoolnix::parse_identification(IDENTIFICATION).expect("fixture must decode");
    snapshot_from_identification(Path::new("/films/night-train.mkv"), identification)
}

fn strings(args: Vec<std::ffi::OsString>) -> Vec<String> {
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn metadata_only_edits_become_in_place_property_edits() {
    let file = snapshot();
    let mut log = EditLog::new();
    log.edit_properties(
        1,
        Some(23456),
        PropertyPatch {
            default_track: Some(false),
            ..PropertyPatch::default()
        },
    );
    log.edit_properties(
        2,
        Some(34567),
        PropertyPatch {
            default_track: Some(true),
            name: Some("English 5.1".to_string()),
            ..PropertyPatch::default()
        },
    );
    log.edit_properties(
        3,
        None,
        PropertyPatch {
            name: Some(String::new()),
            ..PropertyPatch::default()
        },
    );

    let changes = log.resolve(&file.tracks);
    assert!(!changes.has_structural_changes);

    let args = strings(build_propedit_args(&changes, &file.tracks, &file.path, None));

    assert_eq!(
        args,
        [
            "/films/night-train.mkv",
            "--edit",
            "track:=23456",
            "--set",
            "flag-default=0",
            "--edit",
            "track:=34567",
            "--set",
            "flag-default=1",
            "--set",
            "name=English 5.1",
            "--edit",
            "track:4",
            "--delete",
            "name"
        ]
    );
}

#[test]
fn structural_edits_become_one_remux() {
    let file = snapshot();
    let mut log = EditLog::new();
    log.edit_properties(
        2,
        Some(34567),
        PropertyPatch {
            language: Some("fre".to_string()),
            ..PropertyPatch::default()
        },
    );
    log.reorder(vec![0, 2, 1, 3, 4]);
    log.remove_track(3);
    log.edit_properties(
        3,
        None,
        PropertyPatch {
            forced_track: Some(true),
            ..PropertyPatch::default()
        },
    );
    log.add_track(TrackAddition {
        path: PathBuf::from("/films/night-train.ger.srt"),
        language: Some("ger".to_string()),
        name: Some("Deutsch".to_string()),
        default_track: Some(false),
    });
    log.edit_chapters(vec![ChapterEdition {
        uid: None,
        is_default: true,
        is_hidden: false,
        is_ordered: false,
        chapters: vec![ChapterAtom::new(0)],
    }]);

    let changes = log.resolve(&file.tracks);
    assert!(changes.has_structural_changes);
    assert_eq!(changes.track_order, Some(vec![0, 2, 1, 4]));

    let args = strings(build_remux_args(
        &changes,
        &file.tracks,
        &file.path,
        Path::new("/films/night-train.remux.mkv"),
        Some(Path::new("/tmp/chapters.xml")),
    ));

    assert_eq!(
        args,
        [
            "-o",
            "/films/night-train.remux.mkv",
            "-a",
            "1,2",
            "--language",
            "2:fre",
            "--track-order",
            "0:0,0:2,0:1,0:4",
            "--chapters",
            "/tmp/chapters.xml",
            "/films/night-train.mkv",
            "--language",
            "0:ger",
            "--track-name",
            "0:Deutsch",
            "--default-track-flag",
            "0:0",
            "/films/night-train.ger.srt"
        ]
    );
}

#[test]
fn undo_of_only_removal_switches_back_to_property_editor() {
    let file = snapshot();
    let mut log = EditLog::new();
    log.edit_properties(
        4,
        Some(56789),
        PropertyPatch {
            forced_track: Some(true),
            ..PropertyPatch::default()
        },
    );
    log.remove_track(4);
    assert!(log.resolve(&file.tracks).property_edits.is_empty());

    log.undo();
    let changes = log.resolve(&file.tracks);

    assert!(!changes.has_structural_changes);
    assert_eq!(
        strings(build_propedit_args(&changes, &file.tracks, &file.path, None)),
        [
            "/films/night-train.mkv",
            "--edit",
            "track:=56789",
            "--set",
            "flag-forced=1"
        ]
    );
}

#[test]
fn chapter_document_survives_generate_and_parse() {
    let editions = vec![ChapterEdition {
        uid: Some(8_112_334_455_667_788_990),
        is_default: true,
        is_hidden: false,
        is_ordered: false,
        chapters: vec![
            ChapterAtom {
                uid: Some(1),
                time_start: 0,
                time_end: Some(312_480_000_000),
                is_hidden: false,
                is_enabled: true,
                displays: vec![
                    ChapterDisplay::new("Departure"),
                    ChapterDisplay {
                        text: "Abfahrt".to_string(),
                        language: "ger".to_string(),
                    },
                    ChapterDisplay {
                        text: "出発".to_string(),
                        language: "jpn".to_string(),
                    },
                ],
            },
            ChapterAtom {
                uid: Some(2),
                time_start: 312_480_000_000,
                time_end: None,
                is_hidden: true,
                is_enabled: false,
                displays: vec![ChapterDisplay::new("Tunnel & Bridge")],
            },
        ],
    }];

    let xml = generate_chapters(&editions);

    assert_eq!(parse_chapters(&xml).expect("generated xml parses"), editions);
}
