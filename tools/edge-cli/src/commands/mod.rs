//! CLI command implementations.

pub mod config;
pub mod inspect;
pub mod key;
pub mod purge;
pub mod revalidate;

use std::fmt;

use clap::{Args, Subcommand};

/// A failure whose details the command already printed. Only the exit
/// status remains to be set.
#[derive(Debug)]
pub struct AlreadyReported;

impl fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error already reported")
    }
}

impl std::error::Error for AlreadyReported {}

/// Whether `error` still needs to be printed.
pub fn needs_report(error: &anyhow::Error) -> bool {
    error.downcast_ref::<AlreadyReported>().is_none()
}

/// Arguments for the key command.
#[derive(Args)]
pub struct KeyArgs {
    /// Cache keys to encode (or storage keys with --decode).
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Recover the readable prefix of storage keys instead.
    #[arg(short, long)]
    pub decode: bool,
}

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Cache key to read.
    pub key: String,

    /// Page path for the CDN headers (default: the cache key).
    #[arg(short, long)]
    pub path: Option<String>,
}

/// Arguments for the purge command.
#[derive(Args)]
pub struct PurgeArgs {
    /// Cache tags to purge.
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Page paths to purge.
    #[arg(short, long = "path")]
    pub paths: Vec<String>,
}

/// Arguments for the revalidate command.
#[derive(Args)]
pub struct RevalidateArgs {
    /// Tags to revalidate.
    #[arg(required = true)]
    pub tags: Vec<String>,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the resolved configuration.
    Show,
    /// Check that the store can be resolved.
    Validate,
}
