//! Edit queue and command builder for Matroska track and chapter changes.

pub mod backend;
pub mod chapters;
pub mod edit_log;
pub mod error;
pub mod patch;
pub mod propedit;
pub mod remux;
pub mod resolve;
pub mod session;
pub mod time;
pub mod track;

pub use backend::{MkvToolnixBackend, Tool, ToolBackend, snapshot_from_identification};
pub use chapters::{
    ChapterAtom, ChapterDisplay, ChapterEdition, DEFAULT_CHAPTER_LANGUAGE, generate_chapters,
    parse_chapters,
};
pub use edit_log::{EditLog, Operation, OperationId, OperationKind, TrackAddition};
pub use error::{EngineError, Result};
pub use mkvtoolnix::ToolOutput;
pub use patch::{CropPreset, FieldValue, PatchField, PropertyPatch};
pub use propedit::build_propedit_args;
pub use remux::{UNDETERMINED_LANGUAGE, build_remux_args};
pub use resolve::{AddedTrack, ResolvedChangeset, resolve};
pub use session::{
    ApplyPlan, ChangesetSummary, Command, EngineErrorEvent, EngineErrorKind, Event, OutputMode,
    Session, backup_path,
};
pub use time::{NANOS_PER_SECOND, format_timestamp, format_timestamp_millis, parse_timestamp};
pub use track::{
    Attachment, FileSnapshot, PixelCrop, Track, TrackFlags, TrackId, TrackType, codec_extension,
};
