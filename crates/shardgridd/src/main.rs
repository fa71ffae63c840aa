//! shardgridd: the shardgrid operator daemon.
//!
//! Assembles the shardgrid subsystems around one redb state store:
//! - Dialect registry + resource topologies
//! - Metadata persistence
//! - Scaling job coordinator + notification worker
//!
//! # Usage
//!
//! ```text
//! shardgridd init --database sharding_db --units 2 > shardgrid.toml
//! shardgridd topology --config shardgrid.toml
//! shardgridd persist --config shardgrid.toml
//! shardgridd create-job --notification event.json
//! shardgridd jobs --database sharding_db
//! shardgridd stop --database sharding_db --job-id <id>
//! shardgridd serve < notifications.jsonl
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shardgridd", about = "shardgrid operator daemon")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "shardgrid.toml")]
    config: PathBuf,

    /// State directory; overrides `[store] data_dir` from the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a starter configuration.
    Init {
        #[arg(long, default_value = "sharding_db")]
        database: String,

        /// Number of storage units to declare.
        #[arg(long, default_value = "2")]
        units: usize,
    },

    /// Print the storage units and instance representatives of every database.
    Topology,

    /// Write the configured databases and global rules into the state store.
    Persist,

    /// Create a scaling job from a notification JSON file.
    CreateJob {
        #[arg(long)]
        notification: PathBuf,
    },

    /// List the scaling jobs of a database.
    Jobs {
        #[arg(long)]
        database: String,
    },

    /// Stop a scaling job.
    Stop {
        #[arg(long)]
        database: String,

        #[arg(long)]
        job_id: String,
    },

    /// Consume JSON-line notifications from stdin until EOF or Ctrl-C.
    Serve {
        /// Queue capacity between the reader and the worker.
        #[arg(long, default_value = "64")]
        queue_capacity: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,shardgridd=debug,shardgrid=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    match cli.command {
        Command::Init { database, units } => commands::init(&database, units),
        Command::Topology => commands::topology(&cli.config),
        Command::Persist => commands::persist(&cli.config, data_dir),
        Command::CreateJob { notification } => {
            commands::create_job(&cli.config, data_dir, &notification)
        }
        Command::Jobs { database } => commands::jobs(&cli.config, data_dir, &database),
        Command::Stop { database, job_id } => {
            commands::stop(&cli.config, data_dir, &database, &job_id)
        }
        Command::Serve { queue_capacity } => {
            commands::serve(&cli.config, data_dir, queue_capacity).await
        }
    }
}
