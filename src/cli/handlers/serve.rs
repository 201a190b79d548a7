//! Long-running service handler

use crate::AppConfig;
use crate::Result;
use crate::TrustSync;

pub async fn handle_serve(
    config: &AppConfig,
    host: Option<String>,
    port: Option<u16>,
    cors: bool,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.server.enable_cors |= cors;

    println!("Starting TrustSync");
    println!("==================\n");
    println!("Host: {}", config.server.host);
    println!("Port: {}", config.server.port);
    println!("Ledger: {}", config.ledger.url);
    println!(
        "Sync: every {}s (backoff {}s), watermark {:?}",
        config.sync.interval_secs, config.sync.error_backoff_secs, config.sync.watermark_policy
    );
    println!();

    let service = TrustSync::new(&config)?;
    service
        .serve(&config.server.host, config.server.port)
        .await
}
