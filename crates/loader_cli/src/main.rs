//! Command line front end: load resources into an in-memory document and
//! report how each one settled.

use anyhow::{Context as _, Result, anyhow};
use core::fmt::Display;
use core::str::FromStr;
use env_logger::{Builder, Env};
use log::info;
use resource_loader::{
    HttpFetcher, LoadError, LoadResult, LogLevel, LoaderConfig, MemoryDocument, Payload,
    ResourceLoader, ResourceRequest,
};
use serde::Serialize;
use serde_json::to_string;
use std::env;
use std::io::{Write as _, stderr, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

/// Parsed command line.
struct Args {
    config: Option<PathBuf>,
    concurrency: Option<usize>,
    retries: Option<u32>,
    timeout_ms: Option<u64>,
    batch_size: Option<usize>,
    log_level: Option<LogLevel>,
    base_url: Option<String>,
    json: bool,
    requests: Vec<ResourceRequest>,
}

/// One line of `--json` output.
#[derive(Serialize)]
struct Report<'result> {
    url: &'result str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'result LoadError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
}

impl<'result> Report<'result> {
    fn new(result: &'result LoadResult) -> Self {
        Self {
            url: &result.url,
            status: if result.is_fulfilled() {
                "fulfilled"
            } else {
                "rejected"
            },
            error: result.error(),
            bytes: result.payload().and_then(payload_len),
        }
    }
}

fn payload_len(payload: &Payload) -> Option<usize> {
    match payload {
        Payload::None => None,
        Payload::Json(value) => Some(value.to_string().len()),
        Payload::Blob(bytes) => Some(bytes.len()),
    }
}

/// Print usage information to stderr.
fn print_usage() {
    drop(writeln!(
        stderr(),
        "Usage:\n  resource-loader [OPTIONS] [-p <PRIORITY>] <URL>...\n\nOptions:\n  --config <FILE>        JSON config file (defaults to RESOURCE_LOADER_* variables)\n  --base <URL>           document URL relative URLs resolve against\n  --concurrency <N>      concurrency cap\n  --batch <N>            batched scheduling with chunks of N\n  --retries <N>          extra attempts after a failure\n  --timeout-ms <MS>      per-attempt timeout\n  --log-level <LEVEL>    silent, warn or verbose\n  --json                 one JSON object per resource\n  -p <PRIORITY>          priority of the next URL (higher loads first)"
    ));
}

/// Value following a flag.
///
/// # Errors
/// Returns an error if the flag is the last argument or the value does not parse.
fn value<T>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = args
        .next()
        .ok_or_else(|| anyhow!("{flag} requires a value"))?;
    raw.parse::<T>()
        .map_err(|err| anyhow!("invalid value {raw:?} for {flag}: {err}"))
}

/// # Errors
/// Returns an error for unknown flags, missing values or no URLs.
fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = raw.into_iter();
    let mut parsed = Args {
        config: None,
        concurrency: None,
        retries: None,
        timeout_ms: None,
        batch_size: None,
        log_level: None,
        base_url: None,
        json: false,
        requests: Vec::new(),
    };
    let mut priority = 0_i32;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(value(&mut args, "--config")?),
            "--base" => parsed.base_url = Some(value(&mut args, "--base")?),
            "--concurrency" => parsed.concurrency = Some(value(&mut args, "--concurrency")?),
            "--batch" => parsed.batch_size = Some(value(&mut args, "--batch")?),
            "--retries" => parsed.retries = Some(value(&mut args, "--retries")?),
            "--timeout-ms" => parsed.timeout_ms = Some(value(&mut args, "--timeout-ms")?),
            "--log-level" => {
                let name: String = value(&mut args, "--log-level")?;
                parsed.log_level = Some(LogLevel::parse_or_warn(&name));
            }
            "--json" => parsed.json = true,
            "-p" | "--priority" => priority = value(&mut args, "-p")?,
            flag if flag.starts_with('-') => return Err(anyhow!("unknown option {flag}")),
            url => {
                parsed
                    .requests
                    .push(ResourceRequest::new(url).with_priority(priority));
                priority = 0;
            }
        }
    }
    if parsed.requests.is_empty() {
        return Err(anyhow!("no resource URLs given"));
    }
    Ok(parsed)
}

/// Merge file or environment config with command line overrides.
///
/// # Errors
/// Returns an error if the config file cannot be loaded.
fn resolve_config(args: &Args) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)?,
        None => LoaderConfig::from_env(),
    };
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency.max(1);
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = Some(batch_size.max(1));
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    Ok(config)
}

/// Main entry point for the resource-loader CLI.
///
/// # Errors
/// Returns an error if arguments or config are invalid, or if any resource
/// failed to load.
fn main() -> Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            print_usage();
            return Err(err);
        }
    };
    let config = resolve_config(&args)?;
    let default_filter = if config.log_level == LogLevel::Verbose {
        "debug"
    } else {
        "warn"
    };
    let _log_init: Result<(), _> =
        Builder::from_env(Env::default().filter_or("RUST_LOG", default_filter)).try_init();

    let base = config.base_url()?;
    let fetcher = Arc::new(HttpFetcher::new());
    let document = Arc::new(MemoryDocument::new(base, Arc::clone(&fetcher) as _));
    let loader = ResourceLoader::new(document, fetcher);
    let options = config.load_options();

    let runtime = Runtime::new().context("Failed to start tokio runtime")?;
    let results = runtime.block_on(loader.include(args.requests, options));

    let mut out = stdout().lock();
    let mut failed = 0_usize;
    for result in &results {
        if !result.is_fulfilled() {
            failed = failed.saturating_add(1);
        }
        if args.json {
            writeln!(out, "{}", to_string(&Report::new(result))?)?;
        } else {
            match &result.outcome {
                Ok(payload) => match payload_len(payload) {
                    Some(len) => writeln!(out, "ok      {} ({len} bytes)", result.url)?,
                    None => writeln!(out, "ok      {}", result.url)?,
                },
                Err(error) => writeln!(
                    out,
                    "failed  {} [{}] {}",
                    result.url,
                    error.kind(),
                    error.message()
                )?,
            }
        }
    }
    info!(
        "Loaded {} of {} resource(s)",
        results.len().saturating_sub(failed),
        results.len()
    );
    if failed > 0 {
        return Err(anyhow!("{failed} of {} resource(s) failed to load", results.len()));
    }
    Ok(())
}
