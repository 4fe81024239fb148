//! Undoable log of pending edits against one open file.
//!
//! Two stacks: `operations` (applied, oldest first) and `undone` (most recently
//! undone last). Every successful append clears `undone`.
//!
//! Reorders and chapter directives are *replacing* operations: appending one
//! first evicts every earlier operation of its family, so at most one reorder
//! and at most one chapter directive (`EditChapters` or `RemoveChapters`) is
//! pending. Undoing one therefore restores the state before the latest
//! replacement rather than an intermediate step.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chapters::ChapterEdition;
use crate::patch::PropertyPatch;
use crate::resolve::{ResolvedChangeset, resolve};
use crate::track::{Track, TrackId};

/// Identity of one logged operation, unique within an [`EditLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationId(pub u64);

/// A file contributing one extra track to a remux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackAddition {
    pub path: PathBuf,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_track: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    EditProperties {
        track_id: TrackId,
        track_uid: Option<u64>,
        patch: PropertyPatch,
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
    RemoveChapters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplacingFamily {
    Reorder,
    Chapters,
}

impl OperationKind {
    fn replacing_family(&self) -> Option<ReplacingFamily> {
        match self {
            Self::Reorder { .. } => Some(ReplacingFamily::Reorder),
            Self::EditChapters { .. } | Self::RemoveChapters => Some(ReplacingFamily::Chapters),
            Self::EditProperties { .. } | Self::RemoveTrack { .. } | Self::AddTrack { .. } => None,
        }
    }

    /// Short label for logs and pending-change listings.
    pub fn describe(&self) -> String {
        match self {
            Self::EditProperties {
                track_id, patch, ..
            } => {
                let fields = patch
                    .fields()
                    .into_iter()
                    .map(|field| field.label())
                    .collect::<Vec<_>>();
                format!("edit track {track_id}: {}", fields.join(", "))
            }
            Self::RemoveTrack { track_id } => format!("remove track {track_id}"),
            Self::AddTrack { addition } => format!("add track from {}", addition.path.display()),
            Self::Reorder { order } => format!("reorder tracks to {order:?}"),
            Self::EditChapters { editions } => {
                let atoms: usize = editions.iter().map(|edition| edition.chapters.len()).sum();
                format!("replace chapters ({} editions, {atoms} atoms)", editions.len())
            }
            Self::RemoveChapters => "remove all chapters".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
}

#[derive(Debug, Clone, Default)]
pub struct EditLog {
    operations: Vec<Operation>,
    undone: Vec<Operation>,
    next_id: u64,
}

impl EditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `kind` and returns its id.
    ///
    /// Returns `None` without touching the log when `kind` edits properties with
    /// an empty patch.
    ///
    /// # Example
    /// ```
    /// use engine::{EditLog, OperationKind, PropertyPatch};
    ///
    /// let mut log = EditLog::new();
    /// let empty = OperationKind::EditProperties {
    ///     track_id: 0,
    ///     track_uid: None,
    ///     patch: PropertyPatch::default(),
    /// };
    /// assert!(log.append(empty).is_none());
    /// assert!(log.append(OperationKind::RemoveTrack { track_id: 1 }).is_some());
    /// assert_eq!(log.operation_count(), 1);
    /// ```
    pub fn append(&mut self, kind: OperationKind) -> Option<OperationId> {
        if let OperationKind::EditProperties { track_id, patch, .. } = &kind {
            if patch.is_empty() {
                debug!(track_id, "empty property patch dropped");
                return None;
            }
        }

        if let Some(family) = kind.replacing_family() {
            let before = self.operations.len();
            self.operations
                .retain(|operation| operation.kind.replacing_family() != Some(family));
            let evicted = before - self.operations.len();
            if evicted > 0 {
                debug!(?family, evicted, "replaced pending operation");
            }
        }

        let id = self.allocate_id();
        debug!(id = id.0, operation = %kind.describe(), "operation appended");
        self.operations.push(Operation { id, kind });
        self.undone.clear();
        Some(id)
    }

    pub fn edit_properties(
        &mut self,
        track_id: TrackId,
        track_uid: Option<u64>,
        patch: PropertyPatch,
    ) -> Option<OperationId> {
        self.append(OperationKind::EditProperties {
            track_id,
            track_uid,
            patch,
        })
    }

    pub fn remove_track(&mut self, track_id: TrackId) -> Option<OperationId> {
        self.append(OperationKind::RemoveTrack { track_id })
    }

    /// Queues an extra track; the returned id identifies the addition.
    pub fn add_track(&mut self, addition: TrackAddition) -> Option<OperationId> {
        self.append(OperationKind::AddTrack { addition })
    }

    pub fn reorder(&mut self, order: Vec<TrackId>) -> Option<OperationId> {
        self.append(OperationKind::Reorder { order })
    }

    pub fn edit_chapters(&mut self, editions: Vec<ChapterEdition>) -> Option<OperationId> {
        self.append(OperationKind::EditChapters { editions })
    }

    pub fn remove_chapters(&mut self) -> Option<OperationId> {
        self.append(OperationKind::RemoveChapters)
    }

    /// Moves the latest operation onto the undone stack. No-op when empty.
    pub fn undo(&mut self) -> Option<&Operation> {
        let operation = self.operations.pop()?;
        debug!(
            id = operation.id.0,
            remaining = self.operations.len(),
            "operation undone"
        );
        self.undone.push(operation);
        self.undone.last()
    }

    /// Re-applies the most recently undone operation. No-op when nothing is undone.
    pub fn redo(&mut self) -> Option<&Operation> {
        let operation = self.undone.pop()?;
        debug!(
            id = operation.id.0,
            redo_remaining = self.undone.len(),
            "operation redone"
        );
        self.operations.push(operation);
        self.operations.last()
    }

    /// Drops every pending and undone operation.
    pub fn cancel_all(&mut self) {
        debug!(
            discarded = self.operations.len(),
            undone = self.undone.len(),
            "edit log cleared"
        );
        self.operations.clear();
        self.undone.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.operations.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// Applied operations, oldest first.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Collapses the applied operations into one changeset against `tracks`.
    pub fn resolve(&self, tracks: &[Track]) -> ResolvedChangeset {
        resolve(&self.operations, tracks)
    }

    fn allocate_id(&mut self) -> OperationId {
        let id = OperationId(self.next_id);
        self.next_id += 1;
        id
    }
}
