// ---------------------------------------------------------------------------
// FsServer: JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes NDJSON JSON-RPC 2.0 requests to a `MemoryFs`. Client input is
// vetted here (path syntax, base64, the root as a delete target) so the
// filesystem's panicking paths are never reached from the wire.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{FsError, ServerError};
use crate::fs::{init, Fs, MemoryFs};
use crate::path::split_path;
use crate::protocol::*;
use crate::transport::NdjsonTransport;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC server owning at most one filesystem.
pub struct FsServer<W: Write = io::Stdout> {
	transport: NdjsonTransport<W>,
	fs: Option<MemoryFs>,
}

impl<W: Write> FsServer<W> {
	/// Create a server with no filesystem; clients must call `initialize`.
	pub fn new(transport: NdjsonTransport<W>) -> Self {
		Self {
			transport,
			fs: None,
		}
	}

	/// Create a server with a filesystem of `capacity` bytes already in place.
	pub fn with_capacity(transport: NdjsonTransport<W>, capacity: i64) -> Result<Self, FsError> {
		let fs = init(capacity)?;
		Ok(Self {
			transport,
			fs: Some(fs),
		})
	}

	pub fn into_transport(self) -> NdjsonTransport<W> {
		self.transport
	}

	/// Main loop: read JSON-RPC messages from stdin until EOF.
	pub fn run(&mut self) -> Result<(), ServerError> {
		let stdin = io::stdin();
		self.run_with(stdin.lock())
	}

	/// Serve every request line from `reader`.
	pub fn run_with<R: BufRead>(&mut self, reader: R) -> Result<(), ServerError> {
		for line_result in reader.lines() {
			let line = line_result?;
			let trimmed = line.trim();
			if trimmed.is_empty() {
				continue;
			}

			match serde_json::from_str::<JsonRpcRequest>(trimmed) {
				Ok(request) => self.dispatch(request),
				Err(e) => {
					tracing::warn!("Parse error: {}", e);
					self.transport.write_error(0, INTERNAL_ERROR, "Parse error: invalid JSON", None);
				}
			}
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"initialize" => self.handle_initialize(req.params),
			"fs/usage" => self.with_fs(usage),

			// -- Queries -------------------------------------------------
			"fs/info" => self.with_fs(|fs| handle_info(fs, req.params)),
			"fs/read" => self.with_fs(|fs| handle_read(fs, req.params)),
			"fs/list" => self.with_fs(|fs| handle_list(fs, req.params)),

			// -- Mutations -----------------------------------------------
			"fs/create" => self.with_fs_mut(|fs| handle_create(fs, req.params)),
			"fs/write" => self.with_fs_mut(|fs| {
				let (path, data) = data_params(req.params)?;
				fs.write(&path, &data)?;
				Ok(serde_json::json!({}))
			}),
			"fs/append" => self.with_fs_mut(|fs| {
				let (path, data) = data_params(req.params)?;
				fs.append(&path, &data)?;
				Ok(serde_json::json!({}))
			}),
			"fs/copy" => self.with_fs_mut(|fs| {
				let p = transfer_params(req.params)?;
				fs.copy(&p.source, &p.destination)?;
				Ok(serde_json::json!({}))
			}),
			"fs/move" => self.with_fs_mut(|fs| {
				let p = transfer_params(req.params)?;
				fs.move_path(&p.source, &p.destination)?;
				Ok(serde_json::json!({}))
			}),
			"fs/delete" => self.with_fs_mut(|fs| handle_delete(fs, req.params)),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				tracing::debug!(id, code = e.code(), "request failed");
				self.transport.write_server_error(id, &e);
			}
		}
	}

	// ── Filesystem accessors ──────────────────────────────────────────────

	fn with_fs<F>(&self, f: F) -> Result<serde_json::Value, ServerError>
	where
		F: FnOnce(&MemoryFs) -> Result<serde_json::Value, ServerError>,
	{
		match &self.fs {
			Some(fs) => f(fs),
			None => Err(ServerError::NotInitialized),
		}
	}

	fn with_fs_mut<F>(&mut self, f: F) -> Result<serde_json::Value, ServerError>
	where
		F: FnOnce(&mut MemoryFs) -> Result<serde_json::Value, ServerError>,
	{
		match &mut self.fs {
			Some(fs) => f(fs),
			None => Err(ServerError::NotInitialized),
		}
	}

	// ── Initialize ────────────────────────────────────────────────────────

	fn handle_initialize(&mut self, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
		let p: InitializeParams = parse_params(params)?;
		let fs = init(p.capacity)?;
		let result = usage(&fs)?;
		if self.fs.replace(fs).is_some() {
			tracing::info!(capacity = p.capacity, "filesystem replaced");
		} else {
			tracing::info!(capacity = p.capacity, "filesystem initialized");
		}
		Ok(result)
	}
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn usage(fs: &MemoryFs) -> Result<serde_json::Value, ServerError> {
	Ok(serde_json::to_value(UsageResult {
		size: fs.size(),
		used: fs.used(),
		free: fs.free(),
	})?)
}

fn handle_info(fs: &MemoryFs, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
	let path = path_param(params)?;
	Ok(serde_json::to_value(fs.info(&path)?)?)
}

fn handle_read(fs: &MemoryFs, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
	let path = path_param(params)?;
	let content = fs.read(&path)?;
	Ok(serde_json::to_value(ReadResult {
		data: BASE64.encode(&content),
		size: content.len() as u64,
	})?)
}

fn handle_list(fs: &MemoryFs, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
	let path = path_param(params)?;
	Ok(serde_json::to_value(ListResult {
		entries: fs.list(&path)?,
	})?)
}

fn handle_create(fs: &mut MemoryFs, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
	let p: CreateParams = parse_params(params)?;
	split_path(&p.path)?;
	fs.create(&p.path, p.file_type)?;
	Ok(serde_json::json!({}))
}

fn handle_delete(fs: &mut MemoryFs, params: serde_json::Value) -> Result<serde_json::Value, ServerError> {
	let path = path_param(params)?;
	if split_path(&path)?.is_empty() {
		return Err(ServerError::InvalidParams(
			"The root directory cannot be deleted".to_string(),
		));
	}
	fs.delete(&path)?;
	Ok(serde_json::json!({}))
}

// ---------------------------------------------------------------------------
// Param helpers
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(params: serde_json::Value) -> Result<T, ServerError> {
	serde_json::from_value(params).map_err(|e| ServerError::InvalidParams(e.to_string()))
}

/// Decode `{ path }` and reject paths that do not start with `/`.
fn path_param(params: serde_json::Value) -> Result<String, ServerError> {
	let p: PathParams = parse_params(params)?;
	split_path(&p.path)?;
	Ok(p.path)
}

fn data_params(params: serde_json::Value) -> Result<(String, Vec<u8>), ServerError> {
	let p: DataParams = parse_params(params)?;
	split_path(&p.path)?;
	let data = BASE64
		.decode(&p.data)
		.map_err(|e| ServerError::InvalidParams(format!("Invalid base64 data: {}", e)))?;
	Ok((p.path, data))
}

fn transfer_params(params: serde_json::Value) -> Result<TransferParams, ServerError> {
	let p: TransferParams = parse_params(params)?;
	split_path(&p.source)?;
	split_path(&p.destination)?;
	Ok(p)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
