use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a filesystem object as seen by callers. The root reports as a
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
	Directory,
	Regular,
}

impl FileType {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Directory => "directory",
			Self::Regular => "regular",
		}
	}
}

impl fmt::Display for FileType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Directory => f.write_str("DIRECTORY"),
			Self::Regular => f.write_str("REGULAR"),
		}
	}
}

/// Snapshot of a node returned by `info` and `list`. Computed on demand and
/// never stored in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
	/// Full absolute path.
	pub path: String,
	pub file_type: FileType,
	/// Size in bytes; recursive for directories.
	pub size: u64,
}

impl FileInfo {
	pub fn new(path: impl Into<String>, file_type: FileType, size: u64) -> Self {
		Self {
			path: path.into(),
			file_type,
			size,
		}
	}
}

impl fmt::Display for FileInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "FileInfo({:?},{},{})", self.path, self.file_type, self.size)
	}
}
