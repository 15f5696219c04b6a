use anyhow::{Context, anyhow};
use clap::Parser;
use colored::Colorize;
use log::{LevelFilter, info};
use std::{net::IpAddr, process, sync::Arc};
use vidkey::{Config, Resolver, logger::Logger, server};

/// Resolve video identifiers into playable stream urls and content keys.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[command(flatten)]
    config: Config,

    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Logging verbosity.
    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    Logger::init(args.log_level).map_err(|e| anyhow!("{}", e))?;

    let resolver = Resolver::builder(args.config)
        .build()
        .context("invalid configuration")?;
    let listener = tokio::net::TcpListener::bind((args.host, args.port))
        .await
        .with_context(|| format!("cannot listen on {}:{}", args.host, args.port))?;

    info!("listening on http://{}", listener.local_addr()?);
    info!("api endpoint: {}", server::VIDEO_URL_DETAILS);
    axum::serve(listener, server::router(Arc::new(resolver))).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {:#}", "error".bold().red(), e);
        process::exit(1);
    }
}
