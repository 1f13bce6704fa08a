//! Line framing for the stdio transport.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::types::{RpcRequest, RpcResponse};
use crate::error::{Error, Result};

/// Upper bound on a single response line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Serialize a request as one newline-terminated line.
pub fn encode_request(request: &RpcRequest) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(request)?;
    line.push(b'\n');
    Ok(line)
}

/// Parse one response line (trailing newline and whitespace allowed).
pub fn decode_response(line: &[u8]) -> Result<RpcResponse> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::JsonRpc("empty line".into()));
    }
    serde_json::from_slice(trimmed).map_err(|e| Error::JsonRpc(format!("malformed response line: {e}")))
}

/// Outcome of [`read_bounded_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line of this many bytes (newline included) is in the buffer.
    Line(usize),
    /// The peer closed the stream; any partial line is left in the buffer.
    Eof,
    /// The line exceeded the limit. The buffer is cleared; the reader is
    /// positioned mid-line and should be abandoned.
    TooLarge,
}

/// Read one `\n`-terminated line into `buf` without allocating more than
/// `max_bytes`.
pub async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>, max_bytes: usize) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(LineRead::Eof);
        }
        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        if buf.len() + chunk > max_bytes {
            reader.consume(chunk);
            buf.clear();
            return Ok(LineRead::TooLarge);
        }
        buf.extend_from_slice(&available[..chunk]);
        reader.consume(chunk);
        if done {
            return Ok(LineRead::Line(buf.len()));
        }
    }
}
