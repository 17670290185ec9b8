// ---------------------------------------------------------------------------
// Integration tests for treefs-engine
//
// Each test spawns the binary, communicates over JSON-RPC 2.0 / NDJSON stdio,
// and verifies responses.
// ---------------------------------------------------------------------------

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

/// Manages a running `treefs-engine` child process and provides methods for
/// sending JSON-RPC requests and reading responses.
struct FsProcess {
    child: Child,
    reader: BufReader<std::process::ChildStdout>,
    next_id: AtomicU64,
}

impl FsProcess {
    /// Spawn a new engine process with no filesystem.
    fn spawn() -> Self {
        Self::spawn_with_args(&[])
    }

    fn spawn_with_args(args: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_treefs-engine");
        let mut child = Command::new(bin)
            .args(args)
            .env_remove("TREEFS_CAPACITY")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn treefs-engine");

        let stdout = child.stdout.take().expect("no stdout");
        let reader = BufReader::new(stdout);

        Self {
            child,
            reader,
            next_id: AtomicU64::new(1),
        }
    }

    fn write_raw(&mut self, line: &str) {
        let stdin = self.child.stdin.as_mut().expect("no stdin");
        stdin.write_all(line.as_bytes()).unwrap();
        stdin.write_all(b"\n").unwrap();
        stdin.flush().unwrap();
    }

    fn read_frame(&mut self) -> Value {
        loop {
            let mut buf = String::new();
            let bytes_read = self
                .reader
                .read_line(&mut buf)
                .expect("failed to read from stdout");
            if bytes_read == 0 {
                panic!("unexpected EOF from treefs-engine");
            }
            let buf = buf.trim();
            if buf.is_empty() {
                continue;
            }
            return serde_json::from_str(buf)
                .unwrap_or_else(|e| panic!("invalid JSON from engine: {e}\nline: {buf}"));
        }
    }

    /// Send a JSON-RPC request and return the response `result` or `error` field.
    fn send(&mut self, method: &str, params: Value) -> RpcResponse {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.write_raw(&request.to_string());

        let parsed = self.read_frame();
        let resp_id = parsed["id"].as_u64().expect("response id is not u64");
        assert_eq!(resp_id, id, "response id mismatch");

        if let Some(error) = parsed.get("error") {
            return RpcResponse::Error(error.clone());
        }
        RpcResponse::Ok(parsed.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Convenience: send a request, expect success, return the `result` value.
    fn call(&mut self, method: &str, params: Value) -> Value {
        match self.send(method, params) {
            RpcResponse::Ok(v) => v,
            RpcResponse::Error(e) => panic!("expected success, got error: {e}"),
        }
    }

    /// Convenience: send a request, expect an error, return the `error` object.
    fn call_err(&mut self, method: &str, params: Value) -> Value {
        match self.send(method, params) {
            RpcResponse::Error(e) => e,
            RpcResponse::Ok(v) => panic!("expected error, got success: {v}"),
        }
    }

    fn fs_code(&mut self, method: &str, params: Value) -> String {
        let err = self.call_err(method, params);
        assert_eq!(err["code"], -32000, "not a filesystem error: {err}");
        err["data"]["fsCode"].as_str().expect("missing fsCode").to_string()
    }

    fn initialize(&mut self, capacity: i64) -> Value {
        self.call("initialize", json!({ "capacity": capacity }))
    }

    fn create(&mut self, path: &str, file_type: &str) {
        self.call("fs/create", json!({ "path": path, "fileType": file_type }));
    }

    fn write(&mut self, path: &str, bytes: &[u8]) {
        self.call("fs/write", json!({ "path": path, "data": BASE64.encode(bytes) }));
    }

    fn read(&mut self, path: &str) -> Vec<u8> {
        let result = self.call("fs/read", json!({ "path": path }));
        BASE64
            .decode(result["data"].as_str().expect("data is not a string"))
            .expect("data is not base64")
    }
}

impl Drop for FsProcess {
    fn drop(&mut self) {
        // Close stdin to let the child exit gracefully.
        drop(self.child.stdin.take());
        let _ = self.child.wait();
    }
}

#[derive(Debug)]
enum RpcResponse {
    Ok(Value),
    Error(Value),
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn initialize_returns_usage() {
    let mut fs = FsProcess::spawn();
    let result = fs.initialize(128);
    assert_eq!(result, json!({ "size": 128, "used": 0, "free": 128 }));
}

#[test]
fn initialize_negative_capacity_fails() {
    let mut fs = FsProcess::spawn();
    assert_eq!(fs.fs_code("initialize", json!({ "capacity": -1 })), "FS_CREATION_FAILED");
}

#[test]
fn initialize_max_capacity() {
    let mut fs = FsProcess::spawn();
    let result = fs.initialize(i64::MAX);
    assert_eq!(result["free"], i64::MAX);
}

#[test]
fn calls_before_initialize_are_rejected() {
    let mut fs = FsProcess::spawn();
    assert_eq!(fs.fs_code("fs/list", json!({ "path": "/" })), "NOT_INITIALIZED");
}

#[test]
fn capacity_flag_preinitializes() {
    let mut fs = FsProcess::spawn_with_args(&["--capacity", "32"]);
    let usage = fs.call("fs/usage", json!({}));
    assert_eq!(usage, json!({ "size": 32, "used": 0, "free": 32 }));
}

#[test]
fn parse_error_then_recovery() {
    let mut fs = FsProcess::spawn();
    fs.write_raw("{ definitely not json");
    let frame = fs.read_frame();
    assert_eq!(frame["id"], 0);
    assert_eq!(frame["error"]["code"], -32603);

    fs.initialize(8);
    assert_eq!(fs.call("fs/usage", json!({}))["size"], 8);
}

#[test]
fn unknown_method() {
    let mut fs = FsProcess::spawn();
    let err = fs.call_err("fs/chmod", json!({}));
    assert_eq!(err["code"], -32601);
}

// ---------------------------------------------------------------------------
// Files and directories
// ---------------------------------------------------------------------------

#[test]
fn create_write_read() {
    let mut fs = FsProcess::spawn();
    fs.initialize(128);
    fs.create("/f", "regular");
    fs.write("/f", &[1, 2]);
    assert_eq!(fs.read("/f"), vec![1, 2]);
    let info = fs.call("fs/info", json!({ "path": "/f" }));
    assert_eq!(info, json!({ "path": "/f", "fileType": "regular", "size": 2 }));
}

#[test]
fn oversized_write_leaves_content() {
    let mut fs = FsProcess::spawn();
    fs.initialize(128);
    fs.create("/f", "regular");
    fs.write("/f", &[1, 2]);
    let big = vec![0u8; 129];
    let code = fs.fs_code("fs/write", json!({ "path": "/f", "data": BASE64.encode(&big) }));
    assert_eq!(code, "NO_FREE_SPACE");
    assert_eq!(fs.read("/f"), vec![1, 2]);
}

#[test]
fn append_extends_content() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/f", "regular");
    fs.write("/f", b"ab");
    fs.call("fs/append", json!({ "path": "/f", "data": BASE64.encode(b"cd") }));
    assert_eq!(fs.read("/f"), b"abcd".to_vec());
}

#[test]
fn error_codes_for_bad_targets() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/d", "directory");
    fs.create("/f", "regular");
    assert_eq!(fs.fs_code("fs/read", json!({ "path": "/missing" })), "PATH_NOT_FOUND");
    assert_eq!(fs.fs_code("fs/read", json!({ "path": "/d" })), "FILE_IS_DIRECTORY");
    assert_eq!(fs.fs_code("fs/list", json!({ "path": "/f" })), "FILE_IS_REGULAR");
    assert_eq!(
        fs.fs_code("fs/create", json!({ "path": "/f", "fileType": "directory" })),
        "FILE_ALREADY_EXISTS"
    );
    assert_eq!(
        fs.fs_code("fs/create", json!({ "path": "/", "fileType": "directory" })),
        "FILE_ALREADY_EXISTS"
    );
}

#[test]
fn list_is_sorted() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/b", "regular");
    fs.create("/a", "directory");
    fs.create("/c", "regular");
    let listed = fs.call("fs/list", json!({ "path": "/" }));
    let paths: Vec<&str> = listed["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["/a", "/b", "/c"]);
}

#[test]
fn paths_are_normalized() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("//d//", "directory");
    fs.create("/d///x", "regular");
    let info = fs.call("fs/info", json!({ "path": "/d/x/" }));
    assert_eq!(info["path"], "/d/x");
}

// ---------------------------------------------------------------------------
// Copy, move, delete
// ---------------------------------------------------------------------------

#[test]
fn copy_directory_is_deep() {
    let mut fs = FsProcess::spawn();
    fs.initialize(128);
    fs.create("/d", "directory");
    fs.create("/d/x", "regular");
    fs.write("/d/x", &[1, 2]);
    fs.call("fs/copy", json!({ "source": "/d", "destination": "/d2" }));
    assert_eq!(fs.read("/d2/x"), vec![1, 2]);
    assert_eq!(fs.read("/d/x"), vec![1, 2]);
    let usage = fs.call("fs/usage", json!({}));
    assert_eq!(usage["used"], 4);
}

#[test]
fn copy_into_own_subtree_is_rejected() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/d", "directory");
    let code = fs.fs_code("fs/copy", json!({ "source": "/d", "destination": "/d/inner" }));
    assert_eq!(code, "DESTINATION_IS_SOURCE_SUBTREE");
    let listed = fs.call("fs/list", json!({ "path": "/d" }));
    assert_eq!(listed["entries"], json!([]));
}

#[test]
fn move_relocates_without_extra_space() {
    let mut fs = FsProcess::spawn();
    fs.initialize(4);
    fs.create("/d", "directory");
    fs.create("/d/x", "regular");
    fs.write("/d/x", &[1, 2, 3, 4]);
    fs.call("fs/move", json!({ "source": "/d", "destination": "/e" }));
    assert_eq!(fs.read("/e/x"), vec![1, 2, 3, 4]);
    assert_eq!(fs.fs_code("fs/info", json!({ "path": "/d" })), "PATH_NOT_FOUND");
}

#[test]
fn move_onto_existing_fails() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/a", "regular");
    fs.create("/b", "regular");
    let code = fs.fs_code("fs/move", json!({ "source": "/a", "destination": "/b" }));
    assert_eq!(code, "FILE_ALREADY_EXISTS");
}

#[test]
fn delete_subtree_frees_space() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    fs.create("/d", "directory");
    fs.create("/d/x", "regular");
    fs.write("/d/x", &[0; 10]);
    fs.call("fs/delete", json!({ "path": "/d" }));
    let usage = fs.call("fs/usage", json!({}));
    assert_eq!(usage, json!({ "size": 16, "used": 0, "free": 16 }));
}

// ---------------------------------------------------------------------------
// Invalid params
// ---------------------------------------------------------------------------

#[test]
fn malformed_input_is_invalid_params() {
    let mut fs = FsProcess::spawn();
    fs.initialize(16);
    let cases = [
        ("fs/info", json!({ "path": "relative" })),
        ("fs/delete", json!({ "path": "/" })),
        ("fs/write", json!({ "path": "/f", "data": "%%%" })),
        ("fs/create", json!({ "path": "/x", "fileType": "symlink" })),
        ("fs/move", json!({ "source": "/a", "destination": "b" })),
    ];
    for (method, params) in cases {
        let err = fs.call_err(method, params);
        assert_eq!(err["code"], -32602, "{method}: {err}");
    }
    // The process is still alive and the tree untouched.
    assert_eq!(fs.call("fs/list", json!({ "path": "/" }))["entries"], json!([]));
}
