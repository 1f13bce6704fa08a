//! JSON-RPC 2.0 over newline-delimited stdio.
//!
//! The backend speaks one JSON object per line on stdin/stdout. This module
//! holds the wire types and the line framing; process management lives in
//! the gateway's bridge.

mod codec;
mod types;

pub use codec::{DEFAULT_MAX_LINE_BYTES, LineRead, decode_response, encode_request, read_bounded_line};
pub use types::{JSONRPC_VERSION, RpcError, RpcRequest, RpcResponse};
