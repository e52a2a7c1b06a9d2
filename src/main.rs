use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use taskd::{
    cli::{self, client::TaskdClient},
    config::TaskdConfig,
    functions::trigger,
    rest,
    storage::Storage,
    AppContext,
};

#[derive(Parser)]
#[command(name = "taskd", about = "taskd — self-hosted task-sync host", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP port
    #[arg(long, env = "TASKD_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "TASKD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKD_LOG")]
    log: Option<String>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "TASKD_BIND")]
    bind_address: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the host server (default when no subcommand given).
    Serve,
    /// Create a task.
    Add { title: String },
    /// List tasks, newest first.
    List,
    /// Mark a task completed (or reopen it with --undo).
    Done {
        id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a task.
    Rm { id: String },
    /// Call the helloWorld function.
    Hello { message: Option<String> },
    /// Follow the live task stream.
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TaskdConfig::new(args.port, args.data_dir, args.log, args.bind_address);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        command => {
            let client = TaskdClient::new(config.base_url());
            match command {
                Command::Add { title } => cli::add(&client, &title).await,
                Command::List => cli::list(&client).await,
                Command::Done { id, undo } => cli::done(&client, &id, undo).await,
                Command::Rm { id } => cli::rm(&client, &id).await,
                Command::Hello { message } => cli::hello(&client, message.as_deref()).await,
                Command::Watch => cli::watch(&client).await,
                Command::Serve => unreachable!(),
            }
        }
    }
}

async fn serve(config: TaskdConfig) -> Result<()> {
    init_tracing(&config.log_level);

    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        "starting taskd"
    );

    let storage = Storage::new(&config.data_dir).await?;
    let ctx = Arc::new(AppContext::new(config, storage));

    let _dispatcher = trigger::spawn_dispatcher(ctx.clone(), trigger::default_handlers());

    rest::start_rest_server(ctx).await
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
