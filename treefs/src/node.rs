// ---------------------------------------------------------------------------
// Node tree: arena-backed directories and files
// ---------------------------------------------------------------------------
//
// Every node lives in a slot of `NodeArena` and is addressed by `NodeId`.
// Directories map child names to ids; each node records its parent id. The
// arena owns all nodes, so the parent link never keeps anything alive.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::check::Invariant;
use crate::error::FsError;
use crate::info::{FileInfo, FileType};
use crate::path::{join_segments, SEPARATOR};

/// Handle to a node slot. Stale ids (pointing at released slots) panic when
/// used, since holding one means the caller has a bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
	#[inline]
	pub fn index(self) -> usize {
		self.0
	}
}

const ROOT_ID: NodeId = NodeId(0);

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum NodeKind {
	Root {
		children: HashMap<String, NodeId>,
	},
	Directory {
		children: HashMap<String, NodeId>,
	},
	/// Appended writes are kept as separate chunks; `size` caches their sum.
	File {
		chunks: Vec<Box<[u8]>>,
		size: u64,
	},
}

#[derive(Debug, Clone)]
struct Node {
	name: String,
	parent: Option<NodeId>,
	kind: NodeKind,
}

impl Node {
	fn children(&self) -> Option<&HashMap<String, NodeId>> {
		match &self.kind {
			NodeKind::Root { children } | NodeKind::Directory { children } => Some(children),
			NodeKind::File { .. } => None,
		}
	}

	fn children_mut(&mut self) -> Option<&mut HashMap<String, NodeId>> {
		match &mut self.kind {
			NodeKind::Root { children } | NodeKind::Directory { children } => Some(children),
			NodeKind::File { .. } => None,
		}
	}

	fn file_type(&self) -> FileType {
		match self.kind {
			NodeKind::Root { .. } | NodeKind::Directory { .. } => FileType::Directory,
			NodeKind::File { .. } => FileType::Regular,
		}
	}
}

// ---------------------------------------------------------------------------
// NodeArena
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NodeArena {
	slots: Vec<Option<Node>>,
	vacant: Vec<usize>,
}

impl Default for NodeArena {
	fn default() -> Self {
		Self::new()
	}
}

impl NodeArena {
	/// An arena holding only an empty root directory.
	pub fn new() -> Self {
		let root = Node {
			name: String::new(),
			parent: None,
			kind: NodeKind::Root {
				children: HashMap::new(),
			},
		};
		Self {
			slots: vec![Some(root)],
			vacant: Vec::new(),
		}
	}

	#[inline]
	pub fn root(&self) -> NodeId {
		ROOT_ID
	}

	// -- Slot access ------------------------------------------------------

	fn node(&self, id: NodeId) -> &Node {
		match self.slots.get(id.0) {
			Some(Some(node)) => node,
			_ => panic!("stale node id {}", id.0),
		}
	}

	fn node_mut(&mut self, id: NodeId) -> &mut Node {
		match self.slots.get_mut(id.0) {
			Some(Some(node)) => node,
			_ => panic!("stale node id {}", id.0),
		}
	}

	fn children_mut(&mut self, id: NodeId) -> &mut HashMap<String, NodeId> {
		match self.node_mut(id).children_mut() {
			Some(children) => children,
			None => panic!("node {} is not a directory", id.0),
		}
	}

	fn allocate(&mut self, node: Node) -> NodeId {
		match self.vacant.pop() {
			Some(index) => {
				self.slots[index] = Some(node);
				NodeId(index)
			}
			None => {
				self.slots.push(Some(node));
				NodeId(self.slots.len() - 1)
			}
		}
	}

	/// Free `id` and its whole subtree. The caller must already have removed
	/// `id` from its parent's mapping.
	fn release(&mut self, id: NodeId) {
		let mut pending = vec![id];
		while let Some(next) = pending.pop() {
			if let Some(node) = self.slots[next.0].take() {
				if let Some(children) = node.children() {
					pending.extend(children.values().copied());
				}
				self.vacant.push(next.0);
			}
		}
	}

	// -- Queries ----------------------------------------------------------

	pub fn name(&self, id: NodeId) -> &str {
		&self.node(id).name
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.node(id).parent
	}

	pub fn file_type(&self, id: NodeId) -> FileType {
		self.node(id).file_type()
	}

	pub fn is_root(&self, id: NodeId) -> bool {
		matches!(self.node(id).kind, NodeKind::Root { .. })
	}

	pub fn is_directory(&self, id: NodeId) -> bool {
		self.node(id).children().is_some()
	}

	/// Absolute path rebuilt from parent links.
	pub fn path(&self, id: NodeId) -> String {
		let mut names: Vec<&str> = Vec::new();
		let mut cursor = id;
		while let Some(parent) = self.node(cursor).parent {
			names.push(&self.node(cursor).name);
			cursor = parent;
		}
		names.reverse();
		join_segments(&names)
	}

	fn child_path(&self, parent: NodeId, name: &str) -> String {
		let mut path = self.path(parent);
		if !path.ends_with(SEPARATOR) {
			path.push(SEPARATOR);
		}
		path.push_str(name);
		path
	}

	/// True when `ancestor` is `id` or lies on its parent chain.
	pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
		let mut cursor = Some(id);
		while let Some(current) = cursor {
			if current == ancestor {
				return true;
			}
			cursor = self.node(current).parent;
		}
		false
	}

	/// Resolve `segments` starting at `from`.
	pub fn find<S: AsRef<str>>(&self, from: NodeId, segments: &[S]) -> Result<NodeId, FsError> {
		let mut current = from;
		for seg in segments {
			let seg = seg.as_ref();
			let Some(children) = self.node(current).children() else {
				return Err(FsError::FileIsRegular(format!(
					"Cannot descend into regular file {}",
					self.path(current)
				)));
			};
			match children.get(seg) {
				Some(&child) => current = child,
				None => return Err(FsError::PathNotFound(self.child_path(current, seg))),
			}
		}
		Ok(current)
	}

	/// Bytes held by `id`: the stored count for a file, the sum over the
	/// whole subtree for a directory.
	pub fn size(&self, id: NodeId) -> u64 {
		let mut total = 0;
		let mut pending = vec![id];
		while let Some(next) = pending.pop() {
			match &self.node(next).kind {
				NodeKind::File { size, .. } => total += *size,
				NodeKind::Root { children } | NodeKind::Directory { children } => {
					pending.extend(children.values().copied());
				}
			}
		}
		total
	}

	pub fn info(&self, id: NodeId) -> FileInfo {
		FileInfo::new(self.path(id), self.file_type(id), self.size(id))
	}

	/// Direct children of a directory, sorted by path.
	pub fn list(&self, id: NodeId) -> Result<Vec<FileInfo>, FsError> {
		let Some(children) = self.node(id).children() else {
			return Err(FsError::FileIsRegular(format!(
				"Cannot list regular file {}",
				self.path(id)
			)));
		};
		let mut entries: Vec<FileInfo> = children.values().map(|&child| self.info(child)).collect();
		entries.sort_by(|a, b| a.path.cmp(&b.path));
		Ok(entries)
	}

	/// Concatenated content of a file.
	pub fn content(&self, id: NodeId) -> Result<Vec<u8>, FsError> {
		match &self.node(id).kind {
			NodeKind::File { chunks, size } => {
				let mut out = Vec::with_capacity(*size as usize);
				for chunk in chunks {
					out.extend_from_slice(chunk);
				}
				Ok(out)
			}
			_ => Err(FsError::FileIsDirectory(self.path(id))),
		}
	}

	// -- File mutation ----------------------------------------------------

	fn file_mut(&mut self, id: NodeId) -> Result<(&mut Vec<Box<[u8]>>, &mut u64), FsError> {
		if self.is_directory(id) {
			return Err(FsError::FileIsDirectory(self.path(id)));
		}
		match &mut self.node_mut(id).kind {
			NodeKind::File { chunks, size } => Ok((chunks, size)),
			_ => unreachable!("directories rejected above"),
		}
	}

	/// Replace a file's content with a single chunk.
	pub fn write(&mut self, id: NodeId, content: &[u8]) -> Result<(), FsError> {
		let (chunks, size) = self.file_mut(id)?;
		chunks.clear();
		if !content.is_empty() {
			chunks.push(Box::from(content));
		}
		*size = content.len() as u64;
		Ok(())
	}

	/// Add one chunk to the end of a file.
	pub fn append(&mut self, id: NodeId, content: &[u8]) -> Result<(), FsError> {
		let (chunks, size) = self.file_mut(id)?;
		if !content.is_empty() {
			chunks.push(Box::from(content));
			*size += content.len() as u64;
		}
		Ok(())
	}

	// -- Structure mutation -----------------------------------------------

	/// Create an empty node called `name` inside directory `parent`.
	///
	/// # Panics
	///
	/// Panics if `name` is empty or contains `/`.
	pub fn create_under(
		&mut self,
		parent: NodeId,
		name: &str,
		file_type: FileType,
	) -> Result<NodeId, FsError> {
		assert!(!name_is_invalid(name), "invalid node name {name:?}");
		let Some(children) = self.node(parent).children() else {
			return Err(FsError::FileIsRegular(format!(
				"Cannot create {} under regular file {}",
				name,
				self.path(parent)
			)));
		};
		if children.contains_key(name) {
			return Err(FsError::FileAlreadyExists(self.child_path(parent, name)));
		}

		let kind = match file_type {
			FileType::Directory => NodeKind::Directory {
				children: HashMap::new(),
			},
			FileType::Regular => NodeKind::File {
				chunks: Vec::new(),
				size: 0,
			},
		};
		let id = self.allocate(Node {
			name: name.to_string(),
			parent: Some(parent),
			kind,
		});
		self.children_mut(parent).insert(name.to_string(), id);
		Ok(id)
	}

	/// Remove child `name` of `parent` together with its subtree.
	pub fn delete_under(&mut self, parent: NodeId, name: &str) -> Result<(), FsError> {
		let id = self.detach(parent, name)?;
		self.release(id);
		Ok(())
	}

	fn detach(&mut self, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
		if !self.is_directory(parent) {
			return Err(FsError::FileIsRegular(format!(
				"Cannot delete {} under regular file {}",
				name,
				self.path(parent)
			)));
		}
		let removed = self.children_mut(parent).remove(name);
		removed.ok_or_else(|| FsError::PathNotFound(self.child_path(parent, name)))
	}

	/// Move `id` under `new_parent` as `new_name` without touching its
	/// content. Relinking a node onto its current place is a no-op.
	///
	/// # Panics
	///
	/// Panics if `id` is the root, or if `new_parent` lies inside `id`'s
	/// subtree.
	pub fn relink(&mut self, id: NodeId, new_parent: NodeId, new_name: &str) -> Result<(), FsError> {
		assert!(!self.is_root(id), "the root directory cannot be moved or renamed");
		assert!(!name_is_invalid(new_name), "invalid node name {new_name:?}");
		let Some(children) = self.node(new_parent).children() else {
			return Err(FsError::FileIsRegular(format!(
				"Cannot move under regular file {}",
				self.path(new_parent)
			)));
		};
		match children.get(new_name) {
			Some(&existing) if existing == id => return Ok(()),
			Some(_) => {
				return Err(FsError::FileAlreadyExists(
					self.child_path(new_parent, new_name),
				));
			}
			None => {}
		}
		assert!(
			!self.is_ancestor_or_self(id, new_parent),
			"cannot move {} under its own subtree",
			self.path(id)
		);

		let Some(old_parent) = self.node(id).parent else {
			unreachable!("only the root has no parent");
		};
		let old_name = std::mem::take(&mut self.node_mut(id).name);
		self.children_mut(old_parent).remove(&old_name);

		let node = self.node_mut(id);
		node.name = new_name.to_string();
		node.parent = Some(new_parent);
		self.children_mut(new_parent).insert(new_name.to_string(), id);
		Ok(())
	}

	/// Deep-copy `src` under `parent` as `name`, subtree included.
	///
	/// # Panics
	///
	/// Panics if `parent` lies inside `src`'s subtree.
	pub fn copy_under(&mut self, src: NodeId, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
		assert!(
			!self.is_ancestor_or_self(src, parent),
			"cannot copy {} under its own subtree",
			self.path(src)
		);
		let top = self.copy_node(src, parent, name)?;

		// (source child, copied parent, child name)
		let mut pending = self.child_entries(src, top);
		while let Some((child, copied_parent, child_name)) = pending.pop() {
			let copy = self.copy_node(child, copied_parent, &child_name)?;
			pending.extend(self.child_entries(child, copy));
		}
		Ok(top)
	}

	/// Copy one node without its children.
	fn copy_node(&mut self, src: NodeId, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
		let copy = self.create_under(parent, name, self.file_type(src))?;
		if !self.is_directory(src) {
			let content = self.content(src)?;
			self.write(copy, &content)?;
		}
		Ok(copy)
	}

	fn child_entries(&self, src: NodeId, copy: NodeId) -> Vec<(NodeId, NodeId, String)> {
		match self.node(src).children() {
			Some(children) => children
				.iter()
				.map(|(child_name, &child)| (child, copy, child_name.clone()))
				.collect(),
			None => Vec::new(),
		}
	}
}

fn name_is_invalid(name: &str) -> bool {
	name.is_empty() || name.contains(SEPARATOR)
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

impl Invariant for NodeArena {
	fn violation(&self) -> Option<String> {
		for (index, slot) in self.slots.iter().enumerate() {
			let Some(node) = slot else {
				continue;
			};
			let id = NodeId(index);
			let is_root_kind = matches!(node.kind, NodeKind::Root { .. });
			if is_root_kind != (id == ROOT_ID) || node.parent.is_none() != (id == ROOT_ID) {
				return Some(format!("slot {index} has an inconsistent root marker"));
			}

			if let Some(parent) = node.parent {
				let linked = self
					.slots
					.get(parent.0)
					.and_then(Option::as_ref)
					.and_then(Node::children)
					.and_then(|children| children.get(&node.name));
				if linked != Some(&id) {
					return Some(format!(
						"node {:?} (slot {index}) is not linked from its parent",
						node.name
					));
				}
			}

			match &node.kind {
				NodeKind::File { chunks, size } => {
					let sum: u64 = chunks.iter().map(|c| c.len() as u64).sum();
					if sum != *size {
						return Some(format!(
							"file {:?} caches size {} but holds {} bytes",
							node.name, size, sum
						));
					}
				}
				NodeKind::Root { children } | NodeKind::Directory { children } => {
					for (name, child) in children {
						let Some(Some(child_node)) = self.slots.get(child.0) else {
							return Some(format!(
								"directory {:?} lists released child {:?}",
								node.name, name
							));
						};
						if child_node.name != *name || child_node.parent != Some(id) {
							return Some(format!(
								"child {:?} of {:?} disagrees with its key",
								name, node.name
							));
						}
					}
				}
			}
		}
		None
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
