use std::io::{self, Write};

use serde::Serialize;

use crate::error::ServerError;
use crate::protocol::{FS_ERROR, INVALID_PARAMS};

#[derive(Serialize)]
struct JsonRpcResponse<'a> {
    jsonrpc: &'a str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Serialize)]
struct JsonRpcErrorBody {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

/// Writes one JSON-RPC frame per line to the wrapped sink.
pub struct NdjsonTransport<W: Write = io::Stdout> {
    out: W,
}

impl NdjsonTransport<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> NdjsonTransport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn write_response(&mut self, id: u64, result: serde_json::Value) {
        self.write_line(&JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        });
    }

    /// Write an error frame. Filesystem failures put `{ fsCode, message }` in
    /// `data`; protocol-level errors leave it out.
    pub fn write_error(
        &mut self,
        id: u64,
        code: i32,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        self.write_line(&JsonRpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcErrorBody {
                code,
                message: message.into(),
                data,
            }),
        });
    }

    /// Write the frame for a failed request. Invalid params become
    /// `INVALID_PARAMS` without data; everything else is `FS_ERROR` carrying
    /// the `fsCode` (including `NOT_INITIALIZED`).
    pub fn write_server_error(&mut self, id: u64, error: &ServerError) {
        match error {
            ServerError::InvalidParams(message) => {
                self.write_error(id, INVALID_PARAMS, message.clone(), None);
            }
            other => {
                self.write_error(id, FS_ERROR, other.to_string(), Some(other.to_json_rpc_error()));
            }
        }
    }

    fn write_line(&mut self, value: &impl Serialize) {
        if let Err(e) = serde_json::to_writer(&mut self.out, value) {
            tracing::error!("Failed to serialize: {}", e);
            return;
        }
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}
