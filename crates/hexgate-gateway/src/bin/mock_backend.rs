//! Stand-in tool backend for tests: JSON-RPC 2.0 over stdin/stdout.
//!
//! `tools/call` behaviour is picked by the tool name:
//! - `fail`: JSON-RPC error object
//! - `stall`: never answers
//! - `crash`: exits with status 3
//! - `garbage`: writes a non-JSON line
//! - `unparsable`: answers with a JSON-RPC error whose `id` is null
//! - `noisy`: writes a notification before the result
//! - `huge`: writes a result line of `MOCK_BACKEND_HUGE_BYTES` bytes
//! - `env`: returns the env var named by `arguments.key`
//! - anything else: echoes the name and arguments back
//!
//! `MOCK_BACKEND_FAIL_INIT=1` makes `initialize` fail.
//! `MOCK_BACKEND_DEAF=1` stops reading stdin once `initialize` is answered.

use std::io::{BufRead, Write};

use serde_json::{Value, json};

fn main() {
    let fail_init = std::env::var("MOCK_BACKEND_FAIL_INIT").is_ok_and(|v| v == "1");
    let deaf = std::env::var("MOCK_BACKEND_DEAF").is_ok_and(|v| v == "1");
    let huge_bytes: usize = std::env::var("MOCK_BACKEND_HUGE_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1024 * 1024);

    let _ = writeln!(std::io::stderr(), "mock backend started");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let Ok(request) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        let reply = match method {
            "initialize" if fail_init => error(&id, -32603, "initialization refused"),
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"protocolVersion": "2024-11-05", "serverInfo": {"name": "mock-backend"}}
            }),
            "tools/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {"tools": [{"name": "port_scan"}, {"name": "dns_lookup"}]}
            }),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                match name {
                    "fail" => error(&id, -32000, "tool failed"),
                    "stall" => continue,
                    "crash" => std::process::exit(3),
                    "unparsable" => error(&Value::Null, -32600, "Invalid Request"),
                    "garbage" => {
                        let _ = writeln!(stdout, "this is not json");
                        let _ = stdout.flush();
                        continue;
                    }
                    "noisy" => {
                        let note = json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {"progress": 50}});
                        let _ = writeln!(stdout, "{note}");
                        success(&id, name, &params)
                    }
                    "huge" => json!({"jsonrpc": "2.0", "id": id, "result": "x".repeat(huge_bytes)}),
                    "env" => {
                        let key = params
                            .pointer("/arguments/key")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        json!({"jsonrpc": "2.0", "id": id, "result": {"value": std::env::var(key).ok()}})
                    }
                    _ => success(&id, name, &params),
                }
            }
            _ => error(&id, -32601, "method not found"),
        };
        if writeln!(stdout, "{reply}").is_err() || stdout.flush().is_err() {
            break;
        }
        if deaf && method == "initialize" {
            std::thread::sleep(std::time::Duration::from_secs(3600));
        }
    }
}

fn success(id: &Value, name: &str, params: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "content": [{"type": "text", "text": format!("ran {name}")}],
            "tool": name,
            "arguments": params.get("arguments").cloned().unwrap_or(Value::Null),
        }
    })
}

fn error(id: &Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}
