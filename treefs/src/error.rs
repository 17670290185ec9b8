use thiserror::Error;

use crate::path::MalformedPath;

/// The closed set of filesystem conditions a caller is expected to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    NoFreeSpace,
    FileAlreadyExists,
    PathNotFound,
    FileIsDirectory,
    FileIsRegular,
    DestinationIsSourceSubtree,
    FsCreationFailed,
}

impl FsErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFreeSpace => "NO_FREE_SPACE",
            Self::FileAlreadyExists => "FILE_ALREADY_EXISTS",
            Self::PathNotFound => "PATH_NOT_FOUND",
            Self::FileIsDirectory => "FILE_IS_DIRECTORY",
            Self::FileIsRegular => "FILE_IS_REGULAR",
            Self::DestinationIsSourceSubtree => "DESTINATION_IS_SOURCE_SUBTREE",
            Self::FsCreationFailed => "FS_CREATION_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("No free space: {0}")]
    NoFreeSpace(String),
    #[error("Already exists: {0}")]
    FileAlreadyExists(String),
    #[error("Not found: {0}")]
    PathNotFound(String),
    #[error("Is a directory: {0}")]
    FileIsDirectory(String),
    #[error("Is a regular file: {0}")]
    FileIsRegular(String),
    #[error("Destination is inside source: {0}")]
    DestinationIsSourceSubtree(String),
    #[error("Filesystem creation failed: {0}")]
    FsCreationFailed(String),
}

impl FsError {
    pub fn kind(&self) -> FsErrorKind {
        match self {
            Self::NoFreeSpace(_) => FsErrorKind::NoFreeSpace,
            Self::FileAlreadyExists(_) => FsErrorKind::FileAlreadyExists,
            Self::PathNotFound(_) => FsErrorKind::PathNotFound,
            Self::FileIsDirectory(_) => FsErrorKind::FileIsDirectory,
            Self::FileIsRegular(_) => FsErrorKind::FileIsRegular,
            Self::DestinationIsSourceSubtree(_) => FsErrorKind::DestinationIsSourceSubtree,
            Self::FsCreationFailed(_) => FsErrorKind::FsCreationFailed,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn to_json_rpc_error(&self) -> serde_json::Value {
        serde_json::json!({
            "fsCode": self.code(),
            "message": self.to_string(),
        })
    }
}

/// Failures of the stdio server that wraps a filesystem.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Filesystem not initialized: call initialize first")]
    NotInitialized,
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<MalformedPath> for ServerError {
    fn from(e: MalformedPath) -> Self {
        Self::InvalidParams(e.to_string())
    }
}

impl ServerError {
    pub fn code(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::Fs(e) => e.code(),
            Self::InvalidParams(_) => "INVALID_PARAMS",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    pub fn to_json_rpc_error(&self) -> serde_json::Value {
        serde_json::json!({
            "fsCode": self.code(),
            "message": self.to_string(),
        })
    }
}
