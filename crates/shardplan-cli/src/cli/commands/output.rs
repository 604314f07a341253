//! Stable JSON output (`--format json`).

use serde_json::{json, Value};

pub(crate) const SCHEMA_VERSION: u32 = 1;

/// Wrap a command's payload in the common envelope. Fields of `body` are
/// merged at the top level.
pub(crate) fn envelope(command: &str, exit_code: i32, body: Value) -> Value {
    let mut out = json!({
        "schema_version": SCHEMA_VERSION,
        "ok": exit_code == 0,
        "exit_code": exit_code,
        "tool": {
            "name": "shardplan",
            "version": env!("CARGO_PKG_VERSION")
        },
        "command": command,
    });
    if let (Some(map), Value::Object(extra)) = (out.as_object_mut(), body) {
        map.extend(extra);
    }
    out
}

pub(crate) fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_merges_body() {
        let v = envelope("resolve", 0, json!({ "spec": { "node_index": 1 } }));
        assert_eq!(v["schema_version"], 1);
        assert_eq!(v["ok"], true);
        assert_eq!(v["command"], "resolve");
        assert_eq!(v["tool"]["name"], "shardplan");
        assert_eq!(v["spec"]["node_index"], 1);
    }

    #[test]
    fn test_envelope_not_ok_on_failure() {
        let v = envelope("run", 3, json!({}));
        assert_eq!(v["ok"], false);
        assert_eq!(v["exit_code"], 3);
    }
}
