//! Wrappers around the MKVToolNix command-line tools.

mod error;
mod extract;
mod identify;
mod locate;
mod run;

pub use error::{MkvToolnixError, Result};
pub use extract::{
    attachment_extract_args, chapter_extract_args, extract_attachment, extract_chapters,
    extract_track, track_extract_args,
};
pub use identify::{
    ChapterSummary, Container, ContainerProperties, IdentifiedAttachment, IdentifiedTrack,
    Identification, TrackKind, TrackProperties, identify, parse_identification,
};
pub use locate::{ToolPaths, locate_tools, parse_version};
pub use run::{ToolOutput, run_tool};
