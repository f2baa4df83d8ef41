//! Row types returned by catalog queries.

use serde::Serialize;
use sm_protocol::{Aspect, ArtifactKind, ArtifactStatus, JobStatus, TaskKind, TaskStatus};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileRow {
    pub id: i64,
    pub path: String,
    pub size_bytes: i64,
    pub mtime_epoch: f64,
    #[sqlx(try_from = "String")]
    pub aspect: AspectCol,
    pub slide_count: i64,
    pub last_scanned_epoch: Option<f64>,
    pub last_scan_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PageRow {
    pub id: i64,
    pub file_id: i64,
    pub ordinal: i64,
    #[sqlx(try_from = "String")]
    pub aspect: AspectCol,
    pub src_size_bytes: i64,
    pub src_mtime_epoch: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ArtifactRow {
    pub id: i64,
    pub page_id: i64,
    #[sqlx(try_from = "String")]
    pub kind: ArtifactKindCol,
    #[sqlx(try_from = "String")]
    pub status: ArtifactStatusCol,
    pub updated_epoch: f64,
    pub attempts: i64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub params_json: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PageTextRow {
    pub page_id: i64,
    pub raw_text: String,
    pub norm_text: String,
    pub text_sig: String,
    pub updated_epoch: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ThumbnailRow {
    pub page_id: i64,
    #[sqlx(try_from = "String")]
    pub aspect: AspectCol,
    pub width: i64,
    pub height: i64,
    pub image_path: String,
    pub updated_epoch: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub library_root: String,
    pub created_epoch: f64,
    pub started_epoch: Option<f64>,
    pub finished_epoch: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: JobStatusCol,
    pub options_json: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub job_id: i64,
    #[sqlx(try_from = "String")]
    pub kind: TaskKindCol,
    #[sqlx(try_from = "String")]
    pub status: TaskStatusCol,
    pub page_id: Option<i64>,
    pub file_id: Option<i64>,
    pub priority: i64,
    pub started_epoch: Option<f64>,
    pub finished_epoch: Option<f64>,
    pub heartbeat_epoch: Option<f64>,
    pub progress: f64,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

/// Wraps `sm_protocol`'s enums so they can derive `TryFrom<String>` at the
/// `sqlx::FromRow` boundary without sqlx owning the protocol crate's types
/// directly; `Serialize` flattens through to the inner value.
macro_rules! enum_column {
    ($col:ident, $inner:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $col(pub $inner);

        impl std::ops::Deref for $col {
            type Target = $inner;
            fn deref(&self) -> &$inner {
                &self.0
            }
        }

        impl TryFrom<String> for $col {
            type Error = sm_protocol::EnumParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse().map($col)
            }
        }

        impl Serialize for $col {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.0.as_str())
            }
        }
    };
}

enum_column!(AspectCol, Aspect);
enum_column!(ArtifactKindCol, ArtifactKind);
enum_column!(ArtifactStatusCol, ArtifactStatus);
enum_column!(JobStatusCol, JobStatus);
enum_column!(TaskKindCol, TaskKind);
enum_column!(TaskStatusCol, TaskStatus);
