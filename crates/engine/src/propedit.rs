use std::ffi::OsString;
use std::path::Path;

use crate::patch::PropertyPatch;
use crate::remux::{ArgList, UNDETERMINED_LANGUAGE, flag_digit};
use crate::resolve::ResolvedChangeset;
use crate::track::{Track, TrackId};

/// Builds the `mkvpropedit` arguments that edit `file` in place.
///
/// Returns an empty vector when there is nothing to edit. Chapter directives
/// are appended after all track edits: `--chapters <chapter_file>` for
/// replaced chapters, `--chapters ""` to remove them.
///
/// Structural changes are ignored; callers remux instead when there are any.
pub fn build_propedit_args(
    changes: &ResolvedChangeset,
    tracks: &[Track],
    file: &Path,
    chapter_file: Option<&Path>,
) -> Vec<OsString> {
    let chapter_directive = if changes.remove_chapters {
        Some(OsString::new())
    } else {
        chapter_file
            .filter(|_| changes.chapter_edits.is_some())
            .map(OsString::from)
    };
    if changes.property_edits.is_empty() && chapter_directive.is_none() {
        return Vec::new();
    }

    let mut args = ArgList::default();
    args.push(file);

    for (track_id, patch) in &changes.property_edits {
        args.push("--edit");
        args.push(track_selector(*track_id, tracks));
        push_set_directives(&mut args, patch);
    }

    if let Some(chapters) = chapter_directive {
        args.push("--chapters");
        args.push(chapters);
    }

    args.into_inner()
}

/// `track:=<uid>` when the track's uid is known, else the 1-based `track:<n>`.
fn track_selector(track_id: TrackId, tracks: &[Track]) -> String {
    let uid = tracks
        .iter()
        .find(|track| track.id == track_id)
        .and_then(|track| track.uid);
    match uid {
        Some(uid) => format!("track:={uid}"),
        None => format!("track:{}", u64::from(track_id) + 1),
    }
}

fn push_set_directives(args: &mut ArgList, patch: &PropertyPatch) {
    if let Some(value) = patch.default_track {
        set(args, "flag-default", flag_digit(value));
    }
    if let Some(value) = patch.forced_track {
        set(args, "flag-forced", flag_digit(value));
    }
    if let Some(value) = patch.enabled_track {
        set(args, "flag-enabled", flag_digit(value));
    }
    match patch.name.as_deref() {
        Some("") => {
            args.push("--delete");
            args.push("name");
        }
        Some(name) => set(args, "name", name),
        None => {}
    }
    if let Some(language) = &patch.language {
        let language = if language.is_empty() {
            UNDETERMINED_LANGUAGE
        } else {
            language
        };
        set(args, "language", language);
    }
    if let Some(value) = patch.original {
        set(args, "flag-original", flag_digit(value));
    }
    if let Some(value) = patch.visual_impaired {
        set(args, "flag-visual-impaired", flag_digit(value));
    }
    if let Some(value) = patch.commentary {
        set(args, "flag-commentary", flag_digit(value));
    }

    let crop = [
        ("pixel-crop-top", patch.crop_top),
        ("pixel-crop-bottom", patch.crop_bottom),
        ("pixel-crop-left", patch.crop_left),
        ("pixel-crop-right", patch.crop_right),
    ];
    for (property, value) in crop {
        if let Some(value) = value {
            set(args, property, &value.to_string());
        }
    }
}

fn set(args: &mut ArgList, property: &str, value: &str) {
    args.push("--set");
    args.push(format!("{property}={value}"));
}
