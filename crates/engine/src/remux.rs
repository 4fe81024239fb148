use std::ffi::OsString;
use std::path::Path;

use crate::patch::PropertyPatch;
use crate::resolve::ResolvedChangeset;
use crate::track::{Track, TrackId, TrackType};

/// Language code mkvmerge and mkvpropedit use for "undetermined".
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Track selection flags per media category: (drop all, keep listed).
const CATEGORY_FLAGS: [(TrackType, &str, &str); 3] = [
    (TrackType::Video, "-D", "-d"),
    (TrackType::Audio, "-A", "-a"),
    (TrackType::Subtitles, "-S", "-s"),
];

/// Builds the `mkvmerge` arguments that rewrite `input` into `output`.
///
/// `chapter_file` is a chapter XML already written by the caller; it is only
/// used when the changeset replaces chapters. An order that is empty once
/// removed tracks are filtered out writes no `--track-order`.
///
/// # Example
/// ```
/// use std::path::Path;
/// use engine::{EditLog, build_remux_args};
///
/// let mut log = EditLog::new();
/// log.remove_track(1);
/// let changes = log.resolve(&[]);
///
/// let args = build_remux_args(&changes, &[], Path::new("in.mkv"), Path::new("out.mkv"), None);
/// assert_eq!(args, ["-o", "out.mkv", "in.mkv"]);
/// ```
pub fn build_remux_args(
    changes: &ResolvedChangeset,
    tracks: &[Track],
    input: &Path,
    output: &Path,
    chapter_file: Option<&Path>,
) -> Vec<OsString> {
    let mut args = ArgList::default();
    args.push("-o");
    args.push(output);

    for (track_type, drop_all, keep_listed) in CATEGORY_FLAGS {
        let ids = tracks
            .iter()
            .filter(|track| track.track_type == track_type)
            .map(|track| track.id)
            .collect::<Vec<_>>();
        let kept = ids
            .iter()
            .copied()
            .filter(|id| !changes.is_track_removed(*id))
            .collect::<Vec<_>>();
        if ids.is_empty() || kept.len() == ids.len() {
            continue;
        }
        if kept.is_empty() {
            args.push(drop_all);
        } else {
            args.push(keep_listed);
            args.push(join_ids(&kept));
        }
    }

    for (track_id, patch) in &changes.property_edits {
        push_track_options(&mut args, &track_id.to_string(), patch);
    }

    if let Some(order) = &changes.track_order {
        if !order.is_empty() {
            let pairs = order
                .iter()
                .map(|id| format!("0:{id}"))
                .collect::<Vec<_>>();
            args.push("--track-order");
            args.push(pairs.join(","));
        }
    }

    if changes.remove_chapters {
        args.push("--no-chapters");
    } else if let Some(path) = chapter_file.filter(|_| changes.chapter_edits.is_some()) {
        args.push("--chapters");
        args.push(path);
    }

    args.push(input);

    for added in &changes.added_tracks {
        let addition = &added.addition;
        if let Some(language) = addition.language.as_deref().filter(|value| !value.is_empty()) {
            args.push("--language");
            args.push(format!("0:{language}"));
        }
        if let Some(name) = addition.name.as_deref().filter(|value| !value.is_empty()) {
            args.push("--track-name");
            args.push(format!("0:{name}"));
        }
        if let Some(default_track) = addition.default_track {
            args.push("--default-track-flag");
            args.push(format!("0:{}", flag_digit(default_track)));
        }
        args.push(&addition.path);
    }

    args.into_inner()
}

fn push_track_options(args: &mut ArgList, selector: &str, patch: &PropertyPatch) {
    if let Some(name) = &patch.name {
        args.push("--track-name");
        args.push(format!("{selector}:{name}"));
    }
    if let Some(language) = &patch.language {
        let language = if language.is_empty() {
            UNDETERMINED_LANGUAGE
        } else {
            language
        };
        args.push("--language");
        args.push(format!("{selector}:{language}"));
    }

    let flags = [
        ("--default-track-flag", patch.default_track),
        ("--forced-track-flag", patch.forced_track),
        ("--track-enabled-flag", patch.enabled_track),
        ("--original-flag", patch.original),
        ("--visual-impaired-flag", patch.visual_impaired),
        ("--commentary-flag", patch.commentary),
    ];
    for (option, value) in flags {
        if let Some(value) = value {
            args.push(option);
            args.push(format!("{selector}:{}", flag_digit(value)));
        }
    }

    if patch.has_crop() {
        let side = |value: Option<u32>| value.unwrap_or(0);
        args.push("--cropping");
        args.push(format!(
            "{selector}:{},{},{},{}",
            side(patch.crop_top),
            side(patch.crop_bottom),
            side(patch.crop_left),
            side(patch.crop_right)
        ));
    }
}

fn join_ids(ids: &[TrackId]) -> String {
    ids.iter()
        .map(TrackId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn flag_digit(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Argument vector accepting both text and paths.
#[derive(Debug, Default)]
pub(crate) struct ArgList(Vec<OsString>);

impl ArgList {
    pub(crate) fn push(&mut self, arg: impl Into<OsString>) {
        self.0.push(arg.into());
    }

    pub(crate) fn into_inner(self) -> Vec<OsString> {
        self.0
    }
}
