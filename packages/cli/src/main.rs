use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use gitsalt_core::{
    CloneEngine, ConfigError, DirectoryHost, HostValue, Instance, InstanceConfig, InstanceError,
    ResourceId, Status, StatusSink,
};

/// gitsalt - serve clone and mount commands over stdin/stdout
///
/// Reads one JSON command per line and prints one status string per line.
#[derive(Parser, Debug)]
#[command(name = "gitsalt")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON instance config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding persistent areas (default: the user data dir)
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Largest persistent area the host will grant, in bytes
    #[arg(long)]
    max_quota: Option<u64>,

    /// Origin for the read-through remote area
    #[arg(long)]
    remote_url: Option<String>,

    /// Register a host filesystem as ID=DIR (repeatable)
    #[arg(long = "host-fs", value_parser = parse_host_fs)]
    host_fs: Vec<(u32, PathBuf)>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no data directory found; pass --storage-dir")]
    NoDataDir,
}

fn parse_host_fs(arg: &str) -> Result<(u32, PathBuf), String> {
    let (id, dir) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=DIR, got '{}'", arg))?;
    let id = id
        .trim()
        .parse()
        .map_err(|e| format!("invalid resource id '{}': {}", id, e))?;
    if dir.is_empty() {
        return Err("directory must not be empty".to_string());
    }
    Ok((id, PathBuf::from(dir)))
}

#[cfg(feature = "git2")]
fn engine() -> Box<dyn CloneEngine> {
    Box::new(gitsalt_core::Git2Engine)
}

#[cfg(not(feature = "git2"))]
fn engine() -> Box<dyn CloneEngine> {
    Box::new(gitsalt_core::UnsupportedEngine)
}

fn run(args: Args) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => InstanceConfig::from_file(path)?,
        None => InstanceConfig::default(),
    };
    if let Some(url) = args.remote_url {
        config.remote.base_url = Some(url);
    }

    let storage_dir = args
        .storage_dir
        .or_else(|| dirs::data_dir().map(|dir| dir.join("gitsalt")))
        .ok_or(CliError::NoDataDir)?;
    log::info!("Persistent areas under {}", storage_dir.display());

    let mut host = DirectoryHost::new(storage_dir);
    if let Some(max_quota) = args.max_quota {
        host = host.with_max_quota(max_quota);
    }
    for (id, dir) in args.host_fs {
        host.register(ResourceId(id), dir);
    }

    let sink: Arc<dyn StatusSink> = Arc::new(|status: Status| println!("{}", status));
    let instance = Instance::start(config, Box::new(host), engine(), sink)?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Anything that is not JSON is passed on as a plain string, which
        // the router rejects as not a dictionary.
        let payload = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(json) => HostValue::from(json),
            Err(e) => {
                log::debug!("Line is not JSON: {}", e);
                HostValue::from(line)
            }
        };
        if let Err(e) = instance.handle_message(&payload) {
            log::debug!("Command rejected: {}", e);
        }
    }

    instance.shutdown();
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
