//! Storage key encoding.

use anyhow::Result;
use edge_cache::{decode_prefix, StorageKey};

use super::KeyArgs;
use crate::context::Context;

/// Run the key command.
pub async fn run(args: KeyArgs, ctx: &Context) -> Result<()> {
    if args.decode {
        let decoded: Vec<_> = args
            .keys
            .iter()
            .map(|key| serde_json::json!({ "storage_key": key, "prefix": decode_prefix(key) }))
            .collect();
        if ctx.output.is_json() {
            ctx.output.json(&decoded);
            return Ok(());
        }
        for (key, entry) in args.keys.iter().zip(&decoded) {
            ctx.output.kv(key, entry["prefix"].as_str().unwrap_or_default());
        }
        return Ok(());
    }

    let encoded: Vec<_> = args
        .keys
        .iter()
        .map(|key| {
            let storage_key = StorageKey::encode(key);
            serde_json::json!({
                "cache_key": key,
                "storage_key": storage_key.as_str(),
                "length": storage_key.len(),
                "truncated": storage_key.is_truncated(),
            })
        })
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&encoded);
        return Ok(());
    }

    for entry in &encoded {
        ctx.output.header(entry["cache_key"].as_str().unwrap_or_default());
        ctx.output.kv("storage key", entry["storage_key"].as_str().unwrap_or_default());
        ctx.output.kv("length", &entry["length"].to_string());
        if entry["truncated"] == true {
            ctx.output.warn("truncated, digest suffix appended");
        }
    }
    Ok(())
}
