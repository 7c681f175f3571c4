use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the record store and the exporters. The UI and CLI wrap
/// these in `anyhow` and only show the message.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A required field is missing or a value is out of range.
    #[error("{0}")]
    Validation(String),

    #[error("Student {0} not found.")]
    NotFound(i64),

    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The CSV or PDF encoder failed for a reason other than I/O.
    #[error("failed to render {format}: {message}")]
    Render {
        format: &'static str,
        message: String,
    },
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RecordError> = std::result::Result<T, E>;
