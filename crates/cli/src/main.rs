mod config;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use fnos_proxy_client::{build_http_client, AssetSearchClient, AuthDelegateClient, GalleryClient};
use fnos_proxy_server::{passthrough_client, OcrPipeline, Passthrough, Server};
use fnos_proxy_storage_sqlite::SqliteMetadataStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_config, AppConfig};

const PASSTHROUGH_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "fnos-proxy", version, about = "OCR search proxy in front of fnOS Photos")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the proxy.
    Serve(ServeArgs),
    /// Load and validate the configuration, print the effective rules, exit.
    CheckConfig,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen port; overrides `port` from the config.
    #[arg(long)]
    port: Option<u16>,
    /// Full listen address; takes precedence over any port setting.
    #[arg(long)]
    addr: Option<String>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let cfg = load_config(&cli.config)?;
    match cli.command {
        Commands::Serve(args) => serve(args, &cfg).await?,
        Commands::CheckConfig => check_config(&cfg)?,
    }
    Ok(())
}

async fn serve(args: ServeArgs, cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;
    let addr = args
        .addr
        .unwrap_or_else(|| format!("0.0.0.0:{}", args.port.unwrap_or(cfg.port)));

    let http = build_http_client(cfg.request_timeout())?;
    let auth = AuthDelegateClient::new(http.clone(), cfg.automate_url.as_str());
    let gallery = GalleryClient::new(http.clone(), cfg.fnos_base_url.as_str(), auth)
        .with_login_fallback(cfg.login_fallback);
    let index = AssetSearchClient::new(http, cfg.immich_url.as_str(), cfg.immich_api_key.as_str());
    let store = SqliteMetadataStore::open(&cfg.sqlite_db_path)?;
    let rewriter = cfg.rewriter()?;
    info!(
        rules = rewriter.rules().len(),
        db = %cfg.sqlite_db_path.display(),
        login_fallback = cfg.login_fallback,
        "starting fnos proxy"
    );

    let pipeline =
        OcrPipeline::new(store, index, gallery, rewriter).with_deadline(cfg.pipeline_deadline());
    let passthrough = Passthrough::new(
        passthrough_client(PASSTHROUGH_CONNECT_TIMEOUT)?,
        &cfg.fnos_base_url,
    )?;
    Server::new(pipeline, passthrough)
        .run_http(&addr)
        .await
        .map_err(|e| eyre!("server error: {e}"))
}

fn check_config(cfg: &AppConfig) -> Result<()> {
    cfg.validate()?;
    let rewriter = cfg.rewriter()?;
    println!("port: {}", cfg.port);
    println!("fnos_base_url: {}", cfg.fnos_base_url);
    println!("immich_url: {}", cfg.immich_url);
    println!("automate_url: {}", cfg.automate_url);
    println!("sqlite_db_path: {}", cfg.sqlite_db_path.display());
    println!("request_timeout_secs: {}", cfg.request_timeout_secs);
    println!("pipeline_deadline_secs: {}", cfg.pipeline_deadline_secs);
    println!("login_fallback: {}", cfg.login_fallback);
    println!("path rules ({}, applied in order):", rewriter.rules().len());
    for rule in rewriter.rules() {
        println!("  {} -> {}", rule.from, rule.to);
    }
    Ok(())
}
