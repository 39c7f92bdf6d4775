//! Revalidate tags on demand.

use anyhow::{anyhow, Result};
use edge_cache::{revalidation_response, CacheResult};

use super::{AlreadyReported, RevalidateArgs};
use crate::context::Context;
use crate::output::Output;

/// Run the revalidate command.
pub async fn run(args: RevalidateArgs, ctx: &Context) -> Result<()> {
    let handler = ctx.handler()?;
    let result = handler.revalidate_tags(&args.tags).await;
    report(&result, &args.tags, &ctx.output)
}

/// Print the outcome. In JSON mode the response body is the only document
/// written, failures included.
fn report(result: &CacheResult<()>, tags: &[String], output: &Output) -> Result<()> {
    let (status, body) = revalidation_response(result);

    if output.is_json() {
        output.json(&body);
        return match result {
            Ok(()) => Ok(()),
            Err(_) => Err(AlreadyReported.into()),
        };
    }

    match result {
        Ok(()) => {
            output.success(&format!("Revalidated {}", tags.join(", ")));
            Ok(())
        }
        Err(e) => Err(anyhow!("Revalidation failed ({}): {}", status, e)),
    }
}
