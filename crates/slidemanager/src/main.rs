//! Slide library indexing daemon.
//!
//! Usage:
//!     slidemanager serve --library-root <path> [--host] [--port]

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sm_daemon::{watchdog, EventBus, JobManager};
use sm_db::Catalog;

#[derive(Parser)]
#[command(name = "slidemanager", about = "Slide library indexing daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the indexing daemon and its HTTP API.
    Serve {
        /// Root directory of the slide library to index and serve.
        #[arg(long)]
        library_root: PathBuf,

        /// Address the HTTP API binds to.
        #[arg(long, env = "APP_BACKEND_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port the HTTP API binds to.
        #[arg(long, env = "APP_BACKEND_PORT", default_value_t = 5123)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { library_root, host, port } => serve(library_root, host, port).await,
    }
}

async fn serve(library_root: PathBuf, host: String, port: u16) -> anyhow::Result<()> {
    sm_logging::init_logging(&library_root)?;
    tracing::info!(library_root = %library_root.display(), "starting slidemanager");

    let db_path = library_root.join(".slidemanager").join("index.sqlite");
    let catalog = Catalog::open(&db_path).await?;
    let bus = EventBus::new();
    let jobs = JobManager::new(catalog.clone(), bus.clone());

    tokio::spawn(watchdog::run(catalog, bus));

    let app = sm_server::build_router(jobs);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
