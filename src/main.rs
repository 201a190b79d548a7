use clap::Parser;
use trustsync::cli::Cli;
use trustsync::cli::Commands;
use trustsync::AppConfig;
use trustsync::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing required configuration is the only fatal startup condition
    let config = AppConfig::load(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let _log_guard = trustsync::logging::init_logging(level, &config.logging.directory)?;
    tracing::debug!("Configuration loaded successfully");

    match cli.command {
        Commands::Init => {
            trustsync::cli::handle_init_command(&config).await?;
        }
        Commands::Serve { host, port, cors } => {
            trustsync::cli::handle_serve(&config, host, port, cors).await?;
        }
        Commands::Sync(sync_command) => {
            trustsync::cli::handle_sync_command(&config, sync_command).await?;
        }
        Commands::Config => {
            trustsync::cli::handle_config_command(&config)?;
        }
    }

    Ok(())
}
