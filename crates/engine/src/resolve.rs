use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::chapters::ChapterEdition;
use crate::edit_log::{Operation, OperationId, OperationKind, TrackAddition};
use crate::patch::{FieldValue, PatchField, PropertyPatch};
use crate::track::{Track, TrackId};

/// One queued extra track, in the order it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedTrack {
    pub id: OperationId,
    pub addition: TrackAddition,
}

/// Minimal changes the edit log amounts to, relative to the original tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedChangeset {
    /// Reduced patch per surviving track, ascending by track id.
    pub property_edits: BTreeMap<TrackId, PropertyPatch>,
    pub removed_track_ids: BTreeSet<TrackId>,
    pub added_tracks: Vec<AddedTrack>,
    /// Latest requested order with removed tracks filtered out.
    pub track_order: Option<Vec<TrackId>>,
    /// Any removal, addition or reorder; chapters do not count.
    pub has_structural_changes: bool,
    pub chapter_edits: Option<Vec<ChapterEdition>>,
    pub remove_chapters: bool,
}

/// Collapses `operations` (oldest first) into one changeset against `tracks`.
///
/// Property patches merge field by field with the latest value winning, then
/// every field equal to the original track's value is dropped. Edits to
/// removed tracks are discarded. Patches for ids missing from `tracks` are
/// kept as they are.
///
/// # Example
/// ```
/// use engine::{EditLog, resolve};
///
/// let mut log = EditLog::new();
/// log.reorder(vec![0, 1, 2]);
/// log.remove_track(1);
///
/// let changes = resolve(log.operations(), &[]);
/// assert_eq!(changes.track_order, Some(vec![0, 2]));
/// assert!(changes.has_structural_changes);
/// ```
pub fn resolve(operations: &[Operation], tracks: &[Track]) -> ResolvedChangeset {
    let mut merged: BTreeMap<TrackId, PropertyPatch> = BTreeMap::new();
    let mut removed = BTreeSet::new();
    let mut added = Vec::new();
    let mut latest_order: Option<Vec<TrackId>> = None;
    let mut chapter_edits = None;
    let mut remove_chapters = false;

    for operation in operations {
        match &operation.kind {
            OperationKind::EditProperties {
                track_id, patch, ..
            } => merged.entry(*track_id).or_default().merge_from(patch),
            OperationKind::RemoveTrack { track_id } => {
                removed.insert(*track_id);
            }
            OperationKind::AddTrack { addition } => added.push(AddedTrack {
                id: operation.id,
                addition: addition.clone(),
            }),
            OperationKind::Reorder { order } => latest_order = Some(order.clone()),
            OperationKind::EditChapters { editions } => {
                chapter_edits = Some(editions.clone());
                remove_chapters = false;
            }
            OperationKind::RemoveChapters => {
                chapter_edits = None;
                remove_chapters = true;
            }
        }
    }

    merged.retain(|track_id, _| !removed.contains(track_id));
    if let Some(order) = latest_order.as_mut() {
        order.retain(|track_id| !removed.contains(track_id));
    }

    let mut property_edits = BTreeMap::new();
    for (track_id, patch) in merged {
        let reduced = match tracks.iter().find(|track| track.id == track_id) {
            Some(track) => patch.changes_from(track),
            None => patch,
        };
        if !reduced.is_empty() {
            property_edits.insert(track_id, reduced);
        }
    }

    let has_structural_changes =
        !removed.is_empty() || !added.is_empty() || latest_order.is_some();

    let changeset = ResolvedChangeset {
        property_edits,
        removed_track_ids: removed,
        added_tracks: added,
        track_order: latest_order,
        has_structural_changes,
        chapter_edits,
        remove_chapters,
    };
    debug!(
        operations = operations.len(),
        edited_tracks = changeset.property_edits.len(),
        removed = changeset.removed_track_ids.len(),
        added = changeset.added_tracks.len(),
        reordered = changeset.track_order.is_some(),
        structural = changeset.has_structural_changes,
        "changeset resolved"
    );
    changeset
}

impl ResolvedChangeset {
    /// True when applying would not change the file.
    pub fn is_noop(&self) -> bool {
        self.property_edits.is_empty()
            && !self.has_structural_changes
            && !self.has_chapter_changes()
    }

    pub fn has_chapter_changes(&self) -> bool {
        self.chapter_edits.is_some() || self.remove_chapters
    }

    pub fn is_track_removed(&self, track_id: TrackId) -> bool {
        self.removed_track_ids.contains(&track_id)
    }

    pub fn is_property_modified(&self, track_id: TrackId, field: PatchField) -> bool {
        self.property_edits
            .get(&track_id)
            .is_some_and(|patch| field.get(patch).is_some())
    }

    /// Value `field` will have after applying: the pending edit, else the
    /// track's current value, else the field default.
    pub fn effective_value(&self, track: &Track, field: PatchField) -> FieldValue {
        self.property_edits
            .get(&track.id)
            .and_then(|patch| field.get(patch))
            .or_else(|| field.original(track))
            .unwrap_or_else(|| field.default_value())
    }

    /// Surviving tracks in output order; ids missing from the order go last.
    pub fn effective_tracks<'a>(&self, tracks: &'a [Track]) -> Vec<&'a Track> {
        let mut surviving = tracks
            .iter()
            .filter(|track| !self.is_track_removed(track.id))
            .collect::<Vec<_>>();
        if let Some(order) = &self.track_order {
            surviving.sort_by_key(|track| {
                order
                    .iter()
                    .position(|id| *id == track.id)
                    .unwrap_or(usize::MAX)
            });
        }
        surviving
    }
}
