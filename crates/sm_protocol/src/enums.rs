//! Closed enumerations shared by the catalog, the pipelines, and the API.
//!
//! Each type here is the Rust counterpart of one of the Python `StrEnum`
//! classes in `backend_daemon/enums.py`: a fixed, closed set of string
//! values that round-trip through SQLite TEXT columns and JSON payloads
//! byte-for-byte.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! str_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant)),+,
                    other => Err(EnumParseError {
                        type_name: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = EnumParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {type_name} value: {value:?}")]
pub struct EnumParseError {
    type_name: &'static str,
    value: String,
}

str_enum! {
    /// The kind of a per-page artifact.
    pub enum ArtifactKind {
        Text => "text",
        Thumb => "thumb",
        TextVec => "text_vec",
        ImgVec => "img_vec",
        Bm25 => "bm25",
    }
}

str_enum! {
    /// State of one (page, kind) artifact.
    ///
    /// `missing -> queued -> running -> {ready | error | skipped | cancelled}`.
    pub enum ArtifactStatus {
        Missing => "missing",
        Queued => "queued",
        Running => "running",
        Ready => "ready",
        Skipped => "skipped",
        Error => "error",
        Cancelled => "cancelled",
    }
}

impl ArtifactStatus {
    /// Terminal-success statuses the planner will not re-queue without a
    /// file change: `READY` and `SKIPPED`.
    pub fn is_terminal_success(self) -> bool {
        matches!(self, ArtifactStatus::Ready | ArtifactStatus::Skipped)
    }
}

str_enum! {
    /// The kind of a scheduling/progress-bearing task.
    pub enum TaskKind {
        Text => "text",
        Pdf => "pdf",
        Thumb => "thumb",
        Bm25 => "bm25",
        TextVec => "text_vec",
        ImgVec => "img_vec",
    }
}

str_enum! {
    pub enum TaskStatus {
        Queued => "queued",
        Running => "running",
        Succeeded => "succeeded",
        Error => "error",
        Skipped => "skipped",
        Cancelled => "cancelled",
    }
}

str_enum! {
    /// Job lifecycle status. CANCEL_REQUESTED is transient; COMPLETED,
    /// CANCELLED, and FAILED are terminal.
    pub enum JobStatus {
        Created => "created",
        Planning => "planning",
        Running => "running",
        Paused => "paused",
        CancelRequested => "cancel_requested",
        Cancelled => "cancelled",
        Completed => "completed",
        Failed => "failed",
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }
}

/// Slide page geometry classification.
///
/// Not a `str_enum!` because its wire values (`"4:3"`, `"16:9"`) are not
/// valid Rust identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aspect {
    Ratio4x3,
    Ratio16x9,
    Unknown,
}

impl Aspect {
    pub const fn as_str(self) -> &'static str {
        match self {
            Aspect::Ratio4x3 => "4:3",
            Aspect::Ratio16x9 => "16:9",
            Aspect::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aspect {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4:3" => Ok(Aspect::Ratio4x3),
            "16:9" => Ok(Aspect::Ratio16x9),
            "unknown" => Ok(Aspect::Unknown),
            other => Err(EnumParseError {
                type_name: "Aspect",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Aspect {
    type Error = EnumParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Aspect> for String {
    fn from(value: Aspect) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_status_round_trips_through_str() {
        for status in ArtifactStatus::ALL {
            let s = status.as_str();
            assert_eq!(s.parse::<ArtifactStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn aspect_round_trips_through_json() {
        for a in [Aspect::Ratio4x3, Aspect::Ratio16x9, Aspect::Unknown] {
            let json = serde_json::to_string(&a).unwrap();
            let back: Aspect = serde_json::from_str(&json).unwrap();
            assert_eq!(a, back);
        }
    }

    #[test]
    fn terminal_job_status_is_closed() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::CancelRequested.is_terminal());
    }
}
