//! webhttrack-server main entry point
//!
//! Parses the command line, sets up logging and runs the control panel
//! until the browser sends `quit` or the process is signalled.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhttrack_server::{
    config::ServerConfig,
    control::{ControlServer, ServerContext},
    engine::{CrawlEngine, ProcessEngine},
    lang::LanguageCatalog,
    APP_NAME, VERSION,
};

/// Browser control panel for the HTTrack website copier
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the control panel
    Serve {
        /// Port to listen on; tries 8080-8089, 32000-32009, 42000-42009 by default
        #[arg(short, long)]
        port: Option<u16>,

        /// Installation directory holding lang.def, lang/ and html/
        #[arg(short, long)]
        install_dir: Option<PathBuf>,

        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// List the installed languages
    Languages {
        /// Installation directory holding lang.def and lang/
        #[arg(short, long)]
        install_dir: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    info!("Starting {} v{}", APP_NAME, VERSION);

    if let Err(e) = run(cli).await {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&str>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Ok(ServerConfig::from_file(path)?)
        }
        None => Ok(ServerConfig::default()),
    }
}

/// Run the CLI command
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            port,
            install_dir,
            bind,
        } => {
            let config = load_config(cli.config.as_deref())?.with_overrides(port, install_dir, bind);
            config.validate()?;

            let catalog = LanguageCatalog::load(&config.install_dir)?;
            let engine = Arc::new(ProcessEngine::new(&config.engine_binary));
            info!("Crawl engine: {}", engine.binary().display());
            let context = ServerContext::new(&config, catalog, engine.clone()).shared();

            let server = ControlServer::bind(&config, context).await?;
            let run_status = server.context().lock().await.run().clone();
            // The launcher reads this line to open the browser
            println!("URL={}", server.url()?);

            server.serve(shutdown_signal()).await?;

            if run_status.is_running() {
                warn!("Mirror still running, stopping it");
                engine.stop(true);
            }
            info!("Control panel closed");
            Ok(())
        }
        Commands::Languages { install_dir } => {
            let config = load_config(cli.config.as_deref())?.with_overrides(None, install_dir, None);
            let catalog = LanguageCatalog::load(&config.install_dir)?;
            for language in catalog.languages() {
                println!("{}\t{}\t{}", language.index + 1, language.iso, language.name);
            }
            Ok(())
        }
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            Ok(())
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
