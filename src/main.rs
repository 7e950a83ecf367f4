use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tierguard::authz::CacheRegistry;
use tierguard::cli::{run_explain, run_init};
use tierguard::config::{CacheMode, Config};
use tierguard::server::{AppState, create_router};
use tierguard::store::{SqliteStore, Store};

#[derive(Parser)]
#[command(name = "tierguard")]
#[command(about = "Hierarchical privilege authorization for multi-tenant resources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and seed the built-in roles
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Start the server
    Serve {
        /// TOML config file; flags below override it
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// `per_request` or `shared`
        #[arg(long)]
        cache_mode: Option<CacheMode>,
    },

    /// Print a team's authorization cache
    Explain {
        /// Team id
        #[arg(long)]
        team: i64,

        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tierguard=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { data_dir } => run_init(&data_dir)?,
        Commands::Explain { team, data_dir } => run_explain(&data_dir, team)?,
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            cache_mode,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            if let Some(mode) = cache_mode {
                config.authz.cache_mode = mode;
            }

            let db_path = config.server.db_path();
            if !db_path.exists() {
                bail!("Database not found at {}. Run 'tierguard init' first.", db_path.display());
            }

            let store = SqliteStore::new(&db_path)?;
            store.initialize()?;
            let store: Arc<dyn Store> = Arc::new(store);

            let authz = Arc::new(CacheRegistry::new(
                Arc::clone(&store),
                config.authz.cache_mode,
            ));
            let state = Arc::new(AppState::new(store, authz));

            let app = create_router(state);
            let addr = config.server.socket_addr()?;

            info!(cache_mode = %config.authz.cache_mode, "Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
