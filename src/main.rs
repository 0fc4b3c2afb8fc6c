use clap::Parser;
use depth_ingest::cli::{Cli, Commands};
use depth_ingest::config::Config;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load_or_default(&cli.config)?;
    let ignored = config.apply_env();
    config.validate()?;

    // Initialize telemetry
    depth_ingest::telemetry::init_telemetry(&config.telemetry)?;
    for o in &ignored {
        tracing::warn!(key = o.key, value = %o.value, "Ignoring unparseable override");
    }

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(config = %cli.config, dry_run = args.dry_run, "Starting ingestion");
            let shutdown = CancellationToken::new();
            tokio::spawn(shutdown_signal(shutdown.clone()));
            args.execute(&config, shutdown).await?;
        }
        Commands::Symbols(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("# Effective configuration ({})", cli.config);
            print!("{}", toml::to_string_pretty(&config.redacted())?);
        }
    }

    Ok(())
}

/// Cancel `token` on Ctrl+C or SIGTERM
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
    token.cancel();
}
