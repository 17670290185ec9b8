// ---------------------------------------------------------------------------
// Filesystem façade: path-qualified operations over the node tree
// ---------------------------------------------------------------------------
//
// `Fs` is the caller-facing contract. `MemoryFs` implements it on top of a
// `NodeArena`, enforcing the byte quota up front so a rejected call never
// leaves a partial mutation behind.
// ---------------------------------------------------------------------------

use crate::check::{checked, checked_ref, Invariant};
use crate::error::FsError;
use crate::info::{FileInfo, FileType};
use crate::node::{NodeArena, NodeId};
use crate::path::{is_strict_prefix, segments};

// ---------------------------------------------------------------------------
// Fs contract
// ---------------------------------------------------------------------------

/// Operations every filesystem exposes. Paths are absolute and `/`-rooted.
///
/// Passing a path that does not start with `/` is a caller bug and panics.
pub trait Fs {
	/// Create an empty file or directory. The parent must already exist.
	fn create(&mut self, path: &str, file_type: FileType) -> Result<(), FsError>;

	fn info(&self, path: &str) -> Result<FileInfo, FsError>;

	fn read(&self, path: &str) -> Result<Vec<u8>, FsError>;

	fn list(&self, path: &str) -> Result<Vec<FileInfo>, FsError>;

	/// Replace a file's content.
	fn write(&mut self, path: &str, content: &[u8]) -> Result<(), FsError>;

	fn append(&mut self, path: &str, content: &[u8]) -> Result<(), FsError>;

	/// Copy a file or a directory with its subtree.
	fn copy(&mut self, source: &str, destination: &str) -> Result<(), FsError>;

	/// Delete a file or a directory with its subtree.
	///
	/// # Panics
	///
	/// Panics when asked to delete the root.
	fn delete(&mut self, path: &str) -> Result<(), FsError>;

	/// Total capacity in bytes.
	fn size(&self) -> u64;

	/// Bytes occupied by file content.
	fn used(&self) -> u64;

	fn free(&self) -> u64 {
		self.size() - self.used()
	}

	/// Create the object described by `info`; its size is ignored.
	fn create_info(&mut self, info: &FileInfo) -> Result<(), FsError> {
		self.create(&info.path, info.file_type)
	}

	/// Move a file or directory.
	///
	/// The provided body is the generic fallback: copy, then delete the
	/// source. It briefly needs room for both copies. Implementations that
	/// can relink nodes in place should override it.
	fn move_path(&mut self, source: &str, destination: &str) -> Result<(), FsError> {
		if segments(source) == segments(destination) {
			return self.info(source).map(|_| ());
		}
		self.copy(source, destination)?;
		self.delete(source)
	}
}

/// Create an in-memory filesystem with `capacity` bytes.
pub fn init(capacity: i64) -> Result<MemoryFs, FsError> {
	let capacity = u64::try_from(capacity).map_err(|_| {
		FsError::FsCreationFailed(format!(
			"Can't create file system with negative size {capacity}"
		))
	})?;
	Ok(MemoryFs::new(capacity))
}

// ---------------------------------------------------------------------------
// MemoryFs
// ---------------------------------------------------------------------------

/// Where a copied or moved node will land.
struct Placement {
	parent: NodeId,
	name: String,
}

#[derive(Debug, Clone)]
pub struct MemoryFs {
	capacity: u64,
	nodes: NodeArena,
}

impl MemoryFs {
	pub fn new(capacity: u64) -> Self {
		let fs = Self {
			capacity,
			nodes: NodeArena::new(),
		};
		crate::check::verify(&fs);
		fs
	}

	// -- Helpers (private) ------------------------------------------------

	fn resolve(&self, segments: &[String]) -> Result<NodeId, FsError> {
		self.nodes.find(self.nodes.root(), segments)
	}

	fn no_free_space(&self, requested: u64, available: u64) -> FsError {
		tracing::debug!(requested, available, "quota check rejected");
		FsError::NoFreeSpace(format!(
			"{} bytes requested, {} bytes available",
			requested, available
		))
	}

	/// Decide where `src` goes for a copy or move to `dst`.
	///
	/// `Ok(None)` means `dst` already is `src`, so there is nothing to do.
	fn placement(&self, src: NodeId, dst: &[String], destination: &str) -> Result<Option<Placement>, FsError> {
		match self.resolve(dst) {
			Ok(existing) if existing == src => return Ok(None),
			Ok(_) => {
				return Err(FsError::FileAlreadyExists(format!(
					"File {} already exists",
					destination
				)));
			}
			Err(_) => {}
		}

		// The root always resolves, so a missing destination has a last segment.
		let Some((name, parent_segments)) = dst.split_last() else {
			unreachable!("the root always exists");
		};
		let parent = self.resolve(parent_segments)?;
		if !self.nodes.is_directory(parent) {
			return Err(FsError::FileIsRegular(format!(
				"Cannot place {} under regular file {}",
				name,
				self.nodes.path(parent)
			)));
		}
		Ok(Some(Placement {
			parent,
			name: name.clone(),
		}))
	}

	fn reject_into_own_subtree(
		src: &[String],
		dst: &[String],
		source: &str,
		destination: &str,
	) -> Result<(), FsError> {
		if is_strict_prefix(src, dst) {
			return Err(FsError::DestinationIsSourceSubtree(format!(
				"{} is subtree of {}",
				destination, source
			)));
		}
		Ok(())
	}
}

impl Invariant for MemoryFs {
	fn violation(&self) -> Option<String> {
		if let Some(violation) = self.nodes.violation() {
			return Some(violation);
		}
		let used = self.nodes.size(self.nodes.root());
		(used > self.capacity).then(|| format!("{} bytes used of {}", used, self.capacity))
	}
}

impl Fs for MemoryFs {
	fn create(&mut self, path: &str, file_type: FileType) -> Result<(), FsError> {
		let segments = segments(path);
		checked(self, |fs| {
			let Some((name, parent_segments)) = segments.split_last() else {
				return Err(FsError::FileAlreadyExists(
					"The root directory always exists".to_string(),
				));
			};
			let parent = fs.resolve(parent_segments)?;
			fs.nodes.create_under(parent, name, file_type)?;
			tracing::debug!(path, file_type = file_type.as_str(), "created");
			Ok(())
		})
	}

	fn info(&self, path: &str) -> Result<FileInfo, FsError> {
		let segments = segments(path);
		checked_ref(self, |fs| fs.resolve(&segments).map(|id| fs.nodes.info(id)))
	}

	fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
		let segments = segments(path);
		checked_ref(self, |fs| fs.nodes.content(fs.resolve(&segments)?))
	}

	fn list(&self, path: &str) -> Result<Vec<FileInfo>, FsError> {
		let segments = segments(path);
		checked_ref(self, |fs| fs.nodes.list(fs.resolve(&segments)?))
	}

	fn write(&mut self, path: &str, content: &[u8]) -> Result<(), FsError> {
		let segments = segments(path);
		checked(self, |fs| {
			let node = fs.resolve(&segments)?;
			// The old content is released by the overwrite.
			let available = fs.free() + fs.nodes.size(node);
			let requested = content.len() as u64;
			if requested > available {
				return Err(fs.no_free_space(requested, available));
			}
			fs.nodes.write(node, content)?;
			tracing::debug!(path, bytes = requested, "wrote");
			Ok(())
		})
	}

	fn append(&mut self, path: &str, content: &[u8]) -> Result<(), FsError> {
		let segments = segments(path);
		checked(self, |fs| {
			let node = fs.resolve(&segments)?;
			let available = fs.free();
			let requested = content.len() as u64;
			if requested > available {
				return Err(fs.no_free_space(requested, available));
			}
			fs.nodes.append(node, content)?;
			tracing::debug!(path, bytes = requested, "appended");
			Ok(())
		})
	}

	fn copy(&mut self, source: &str, destination: &str) -> Result<(), FsError> {
		let src_segments = segments(source);
		let dst_segments = segments(destination);
		checked(self, |fs| {
			Self::reject_into_own_subtree(&src_segments, &dst_segments, source, destination)?;
			let src = fs.resolve(&src_segments)?;
			let requested = fs.nodes.size(src);
			let available = fs.free();
			if requested > available {
				return Err(fs.no_free_space(requested, available));
			}
			let Some(target) = fs.placement(src, &dst_segments, destination)? else {
				return Ok(());
			};
			fs.nodes.copy_under(src, target.parent, &target.name)?;
			tracing::debug!(source, destination, bytes = requested, "copied");
			Ok(())
		})
	}

	fn delete(&mut self, path: &str) -> Result<(), FsError> {
		let segments = segments(path);
		let Some((name, parent_segments)) = segments.split_last() else {
			panic!("the root directory cannot be deleted");
		};
		checked(self, |fs| {
			let parent = fs.resolve(parent_segments)?;
			fs.nodes.delete_under(parent, name)?;
			tracing::debug!(path, "deleted");
			Ok(())
		})
	}

	fn size(&self) -> u64 {
		self.capacity
	}

	fn used(&self) -> u64 {
		self.nodes.size(self.nodes.root())
	}

	/// Relinks the source node under its new parent; no content is copied and
	/// usage does not change.
	fn move_path(&mut self, source: &str, destination: &str) -> Result<(), FsError> {
		let src_segments = segments(source);
		let dst_segments = segments(destination);
		checked(self, |fs| {
			Self::reject_into_own_subtree(&src_segments, &dst_segments, source, destination)?;
			let src = fs.resolve(&src_segments)?;
			let Some(target) = fs.placement(src, &dst_segments, destination)? else {
				return Ok(());
			};
			fs.nodes.relink(src, target.parent, &target.name)?;
			tracing::debug!(source, destination, "moved");
			Ok(())
		})
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
