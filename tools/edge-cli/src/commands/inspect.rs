//! Read an entry from the deploy store.

use anyhow::{bail, Result};
use edge_cache::{to_storage, CacheHeadersBuilder, CacheStatus};

use super::InspectArgs;
use crate::context::Context;
use crate::output::{format_duration, status_badge};

/// Run the inspect command.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let handler = ctx.handler()?;

    let Some(hit) = handler.get(&args.key).await else {
        if ctx.output.is_json() {
            ctx.output.json(&serde_json::json!({
                "cache_key": args.key,
                "status": CacheStatus::Miss.to_string(),
            }));
            return Ok(());
        }
        bail!("No entry for '{}'", args.key);
    };

    let path = args.path.as_deref().unwrap_or(&args.key);
    let headers = CacheHeadersBuilder::from_hit(&hit, path)
        .include_debug(true)
        .build();
    let status = CacheStatus::from(hit.state).to_string();

    if ctx.output.is_json() {
        let headers: serde_json::Map<String, serde_json::Value> = headers
            .into_iter()
            .map(|(name, value)| (name, serde_json::Value::String(value)))
            .collect();
        ctx.output.json(&serde_json::json!({
            "cache_key": args.key,
            "status": status,
            "age_secs": hit.age.as_secs(),
            "entry": to_storage(&hit.entry)?,
            "headers": headers,
        }));
        return Ok(());
    }

    ctx.output.header(&args.key);
    ctx.output.kv("status", &status_badge(&status));
    ctx.output.kv("kind", &hit.entry.kind().to_string());
    ctx.output.kv("age", &format_duration(hit.age.as_secs()));
    let written = chrono::DateTime::from_timestamp_millis(hit.entry.last_modified)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| hit.entry.last_modified.to_string());
    ctx.output.kv("last modified", &written);
    ctx.output.kv(
        "revalidate",
        &hit.entry
            .revalidate
            .seconds()
            .map(format_duration)
            .unwrap_or_else(|| "never".to_string()),
    );
    if !hit.entry.tags.is_empty() {
        ctx.output.kv("tags", &hit.entry.tags.join(", "));
    }

    ctx.output.info("Response headers:");
    for (name, value) in &headers {
        ctx.output.list_item(&format!("{}: {}", name, value));
    }
    Ok(())
}
