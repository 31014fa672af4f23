//! Scriptcast CLI - runs a Lua script as a rerun-on-interaction app.
//!
//! The client talks to the process over stdio: one JSON `BackMsg` per line
//! on stdin, one JSON `ForwardMsg` per line on stdout. Logs go to a file so
//! they never mix with the protocol stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use scriptcast::constants::{ENV_LOG_FILE, LOG_FILE_NAME};
use scriptcast::file_watcher::ScriptWatcher;
use scriptcast::{delivery, Config, LuaScript, Session};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// CLI
#[derive(Parser)]
#[command(name = "scriptcast")]
#[command(version)]
#[command(about = "Run a Lua script as an interactive app over stdio")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script and serve one session on stdin/stdout
    Run {
        /// Path to the `.lua` script
        script: PathBuf,
        /// Do not rerun when the script file is saved
        #[arg(long)]
        no_watch: bool,
        /// Override the message size limit, in megabytes
        #[arg(long)]
        max_message_size_mb: Option<u64>,
    },
    /// Print the effective configuration as JSON
    Config,
}

/// Log file location: `SCRIPTCAST_LOG_FILE`, else the config dir, else the
/// temp dir.
fn log_path() -> PathBuf {
    if let Ok(path) = std::env::var(ENV_LOG_FILE) {
        return PathBuf::from(path);
    }
    Config::config_dir()
        .map(|dir| dir.join(LOG_FILE_NAME))
        .unwrap_or_else(|_| std::env::temp_dir().join(LOG_FILE_NAME))
}

fn init_logging() {
    let log_path = log_path();
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    match std::fs::File::create(&log_path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(e) => {
            eprintln!("Failed to create log file at {}: {e}; logging to stderr", log_path.display());
            builder.target(env_logger::Target::Stderr);
        }
    }
    builder.init();
}

/// Read client messages from stdin until EOF.
async fn read_client(session: Arc<Session>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read client message")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match session.handle_json(line) {
            Ok(true) => {}
            Ok(false) => {
                log::info!("Session closed; ignoring further client input");
                break;
            }
            Err(e) => log::warn!("{e:#}"),
        }
    }
    Ok(())
}

/// Serve the session until the client leaves, the session ends or ctrl-c.
async fn serve(session: Arc<Session>, config: Arc<Config>) -> Result<()> {
    let mut delivery = tokio::spawn(delivery::run(
        Arc::clone(session.queue()),
        config,
        tokio::io::stdout(),
    ));
    let reader = tokio::spawn(read_client(Arc::clone(&session)));

    let delivered = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => log::info!("Interrupted, shutting down"),
                Err(e) => log::warn!("Failed to listen for ctrl-c: {e}"),
            }
            None
        }
        result = reader => {
            match result {
                Ok(Ok(())) => log::info!("Client input closed, shutting down"),
                Ok(Err(e)) => log::warn!("Client reader failed: {e:#}"),
                Err(e) => log::error!("Client reader task failed: {e}"),
            }
            None
        }
        result = &mut delivery => Some(result),
    };

    let stopping = Arc::clone(&session);
    let stopped = tokio::task::spawn_blocking(move || stopping.shutdown())
        .await
        .context("Shutdown task failed")?;
    if let Err(e) = stopped {
        if delivered.is_none() {
            delivery.abort();
        }
        return Err(e);
    }

    let result = match delivered {
        Some(result) => result,
        None => delivery.await,
    };
    result.context("Delivery task failed")?
}

fn run(script: &Path, watch: bool, max_message_size_mb: Option<u64>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(mb) = max_message_size_mb {
        config.max_message_size_mb = mb;
    }
    let config = Arc::new(config);

    let session = Arc::new(Session::start(LuaScript::new(script), Arc::clone(&config))?);
    log::info!("Session {} running {}", session.id(), script.display());

    let _watcher = if watch && config.run_on_save {
        match ScriptWatcher::start(script, Arc::clone(session.requests())) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log::warn!("Run-on-save disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(serve(session, config));
    // Stdin reads park a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            no_watch,
            max_message_size_mb,
        } => run(&script, !no_watch, max_message_size_mb)?,
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
