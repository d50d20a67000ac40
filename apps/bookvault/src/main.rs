//! # Bookvault
//!
//! Backup and restore server for the book databases.
//!
//! ```text
//! bookvault serve   [--bind 0.0.0.0:5000] [--public public]
//! bookvault status  [--json]
//! bookvault backup  --output books.zip
//! bookvault restore books.zip [--checksum <md5>]
//! bookvault verify  books.zip --checksum <md5>
//! ```

use bookvault::api;
use bookvault::cli::{cmd_backup, cmd_restore, cmd_status, cmd_verify};
use bookvault::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PUBLIC_DIR, ServerConfig, default_bind};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bookvault", version, about = "Book database backup and restore server")]
struct Cli {
    /// Service root; relative paths resolve against it.
    #[arg(long, global = true, env = "BOOKVAULT_ROOT", default_value = ".")]
    root: PathBuf,

    /// Database file to protect (repeatable). Defaults to the two book databases.
    #[arg(long = "database", global = true)]
    databases: Vec<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Address to listen on.
    #[arg(long, global = true, env = "BOOKVAULT_BIND", default_value_t = default_bind())]
    bind: SocketAddr,

    /// Static files directory.
    #[arg(long, global = true, env = "BOOKVAULT_PUBLIC_DIR", default_value = DEFAULT_PUBLIC_DIR)]
    public: PathBuf,

    /// Largest accepted restore request, in bytes.
    #[arg(long, global = true, env = "BOOKVAULT_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Show database status.
    Status {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Write a backup archive.
    Backup {
        /// Archive path to write.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Restore databases from an archive.
    Restore {
        /// Archive to restore from.
        archive: PathBuf,

        /// Expected MD5 of the archive.
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Check an archive against a checksum.
    Verify {
        /// Archive to check.
        file: PathBuf,

        /// Expected MD5 of the archive.
        #[arg(long)]
        checksum: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "bookvault=debug,bookvault_core=debug,tower_http=debug"
    } else {
        "bookvault=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ServerConfig::new(&cli.root).with_databases(cli.databases.as_slice());

    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = config
                .with_bind(cli.server.bind)
                .with_public_dir(&cli.server.public)
                .with_max_upload_bytes(cli.server.max_upload_bytes);
            api::serve(config).await.map_err(|e| e.to_string())
        }
        Command::Status { json } => cmd_status(&config, json).map(|_| ()).map_err(|e| e.to_string()),
        Command::Backup { output } => cmd_backup(&config, &output).map_err(|e| e.to_string()),
        Command::Restore { archive, checksum } => {
            cmd_restore(&config, &archive, checksum.as_deref()).map_err(|e| e.to_string())
        }
        Command::Verify { file, checksum } => cmd_verify(&file, &checksum).map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}
