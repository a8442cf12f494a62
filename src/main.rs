use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use cashbook::cloud_adapters::google_sheets4::{self, GoogleSheets4Adapter};
use cashbook::cloud_adapters::{
    CloudSpreadsheetService, FileAdapter, MemorySheetsAdapter, RetryingService,
};
use cashbook::config::{self, Backend, Config, ConfigError};
use cashbook::core::RecordStore;
use cashbook::gateway::{Gateway, server};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type Service = RetryingService<Box<dyn CloudSpreadsheetService + Send>>;

#[derive(Parser)]
#[command(name = "cashbook", about = "Bookkeeping tables behind an HTTP gateway")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the tables and serve requests until interrupted
    Serve {
        /// Overrides `server.bind`
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Create missing tables and header rows
    Setup,
    /// Add a login to the Users table
    AddUser {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },
    /// Rebuild and print the Summary table
    Summary,
    /// Run the Google OAuth consent flow and cache the token
    OauthLogin,
}

fn load_config(path: &PathBuf) -> Result<Config, ConfigError> {
    match Config::load(path) {
        Err(ConfigError::Missing(path)) => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Config::default())
        }
        other => other,
    }
}

fn build_service(cfg: &Config, rt: &Runtime) -> Result<Service, Box<dyn std::error::Error>> {
    let service: Box<dyn CloudSpreadsheetService + Send> = match cfg.storage.backend {
        Backend::Memory => Box::new(MemorySheetsAdapter::new()),
        Backend::File => Box::new(FileAdapter::new(&cfg.storage.data_dir)),
        Backend::GoogleSheets => {
            let gs = &cfg.google_sheets;
            let id = gs
                .spreadsheet_id
                .as_deref()
                .map(config::parse_sheet_id)
                .ok_or_else(|| ConfigError::Invalid("google_sheets.spreadsheet_id is missing".into()))?;
            let auth = rt.block_on(google_sheets4::installed_flow_authenticator(
                &gs.credentials_path,
                &gs.token_cache,
            ))?;
            Box::new(GoogleSheets4Adapter::new(auth, id)?)
        }
    };
    info!(backend = ?cfg.storage.backend, "Storage ready");
    Ok(RetryingService::new(
        service,
        cfg.retry.max_retries,
        cfg.retry.base_delay(),
    ))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;
    let rt = Runtime::new()?;

    let open_store = || -> Result<RecordStore<Service>, Box<dyn std::error::Error>> {
        Ok(RecordStore::new(build_service(&cfg, &rt)?))
    };

    match cli.command {
        Commands::Serve { bind } => {
            let mut store = open_store()?;
            store.setup()?;
            let addr = bind.unwrap_or(cfg.server.bind);
            let gateway = Arc::new(Gateway::new(store));
            rt.block_on(async move {
                let listener = TcpListener::bind(addr).await?;
                server::serve(gateway, listener, server::shutdown_signal()).await
            })?;
        }
        Commands::Setup => {
            open_store()?.setup()?;
            println!("Tables ready");
        }
        Commands::AddUser { phone, password } => {
            if open_store()?.add_user(&phone, &password)? {
                println!("User added");
            } else {
                println!("A user with that phone already exists");
            }
        }
        Commands::Summary => {
            let summary = open_store()?.recompute_summary();
            for row in summary.to_rows() {
                println!("{}", row.join(" | "));
            }
        }
        Commands::OauthLogin => {
            rt.block_on(google_sheets4::initial_oauth_login(
                &cfg.google_sheets.credentials_path,
                &cfg.google_sheets.token_cache,
            ))?;
            println!("Login successful");
        }
    }

    Ok(())
}
