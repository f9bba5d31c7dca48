//! OpenAPI Resolver CLI
//!
//! Command-line interface for resolving and bundling OpenAPI v3 documents.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use openapi_resolver::{
    DumpOptions, OpenapiResolver, ResolveOptions, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_DEPTH,
    DEFAULT_REMOVE_TAGS,
};

#[derive(Parser)]
#[command(name = "openapi-resolver")]
#[command(about = "Recursively resolves and bundles OpenAPI v3 files")]
#[command(version)]
struct Cli {
    /// An OpenAPI v3 YAML or JSON file: path or URL (http:// or https://)
    src_file: String,

    /// Destination file (stdout if not specified)
    dst_file: Option<PathBuf>,

    /// Top-level key to drop from the output (repeatable)
    #[arg(long = "remove-tag", value_name = "TAG", default_values_t = DEFAULT_REMOVE_TAGS.iter().map(|s| s.to_string()).collect::<Vec<_>>())]
    remove_tags: Vec<String>,

    /// Maximum nesting of reference resolutions
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Timeout for each HTTP fetch, in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_HTTP_TIMEOUT.as_secs())]
    timeout: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), u8> {
    let options = ResolveOptions::new()
        .max_depth(cli.max_depth)
        .http_timeout(Duration::from_secs(cli.timeout));

    let mut resolver = OpenapiResolver::from_source(&cli.src_file, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    resolver.resolve().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    for miss in resolver.unresolved() {
        eprintln!(
            "Warning: unresolved reference \"{}\" at {}",
            miss.reference, miss.path
        );
    }

    let output = resolver
        .dump(&DumpOptions::remove_tags(cli.remove_tags))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    match cli.dst_file {
        Some(path) => {
            std::fs::write(&path, &output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            print!("{}", output);
        }
    }

    Ok(())
}
