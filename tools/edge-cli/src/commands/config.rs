//! Configuration commands.

use anyhow::{Context as _, Result};
use edge_data::StoreSelector;

use super::{ConfigArgs, ConfigCommand};
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config.redacted_json());
        return Ok(());
    }

    let bridge = &ctx.config.bridge;
    ctx.output.header("Current Configuration");

    ctx.output.info("[bridge]");
    ctx.output.kv("site_id", bridge.site_id.as_deref().unwrap_or("<unset>"));
    ctx.output.kv("deploy_id", bridge.deploy_id.as_deref().unwrap_or("<unset>"));
    ctx.output.kv("api_host", &bridge.api_host);
    ctx.output.kv(
        "api_token",
        if bridge.api_token.is_some() {
            "<redacted>"
        } else {
            "<unset>"
        },
    );
    ctx.output
        .kv("use_regional_blobs", &bridge.use_regional_blobs.to_string());
    ctx.output.kv("blobs_region", &bridge.blobs_region);
    ctx.output
        .kv("store.timeout_ms", &bridge.store.timeout_ms.to_string());
    ctx.output
        .kv("store.max_retries", &bridge.store.max_retries.to_string());

    ctx.output.info("[logging]");
    ctx.output.kv("level", &ctx.config.logging.level.to_string());
    ctx.output
        .kv("format", &format!("{:?}", ctx.config.logging.format).to_lowercase());
    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.config
        .bridge
        .validate()
        .context("Configuration is incomplete")?;

    let selector = StoreSelector::new(ctx.bridge(), ctx.transport()?);
    let scope = selector.scope()?;

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": true,
            "store": scope.store_name(),
            "region": format!("{:?}", scope.region),
        }));
        return Ok(());
    }

    ctx.output.success("Configuration is valid");
    ctx.output.kv("store", &scope.store_name());
    ctx.output.kv("region", &format!("{:?}", scope.region));
    Ok(())
}
