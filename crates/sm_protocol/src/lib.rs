//! Wire and catalog-shared types for the slide indexing daemon: the closed
//! state-machine enums, job options schema, event envelope, and error-code
//! taxonomy used by every other crate in the workspace.

pub mod enums;
pub mod errors;
pub mod events;
pub mod options;

pub use enums::{
    Aspect, ArtifactKind, ArtifactStatus, EnumParseError, JobStatus, TaskKind, TaskStatus,
};
pub use events::{hello_frame, Event};
pub use options::{EmbedConfig, FileScan, JobOptions, PdfConfig, PdfPrefer, ThumbConfig};
