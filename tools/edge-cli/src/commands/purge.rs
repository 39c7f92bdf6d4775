//! Purge tags and paths from the CDN.

use anyhow::{bail, Context as _, Result};
use edge_cache::{cdn_tag, path_tag};

use super::PurgeArgs;
use crate::context::Context;

/// Run the purge command.
pub async fn run(args: PurgeArgs, ctx: &Context) -> Result<()> {
    if args.tags.is_empty() && args.paths.is_empty() {
        bail!("Nothing to purge: pass --tag or --path");
    }

    let propagator = ctx.propagator()?;

    if !args.tags.is_empty() {
        propagator
            .purge_tags(&args.tags)
            .await
            .context("Failed to purge tags")?;
    }
    for path in &args.paths {
        propagator
            .purge_path(path)
            .await
            .with_context(|| format!("Failed to purge path {}", path))?;
    }

    let purged: Vec<String> = args
        .tags
        .iter()
        .map(|tag| cdn_tag(tag))
        .chain(args.paths.iter().map(|path| path_tag(path)))
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "purged": purged }));
        return Ok(());
    }

    ctx.output.success(&format!("Purged {} CDN tag(s)", purged.len()));
    for tag in &purged {
        ctx.output.list_item(tag);
    }
    Ok(())
}
