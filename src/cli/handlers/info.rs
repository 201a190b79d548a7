//! Information display handlers

use crate::AppConfig;
use crate::Database;
use crate::Result;

pub async fn handle_init_command(config: &AppConfig) -> Result<()> {
    let database = Database::from_config(config)?;
    database.init_schema().await?;
    database.close().await;
    println!("Schema ready at {}", crate::config::mask_password(config.database_url()));
    Ok(())
}

pub fn handle_config_command(config: &AppConfig) -> Result<()> {
    println!("TrustSync configuration");
    println!("=======================\n");
    println!("{}", config.to_display_toml()?);
    Ok(())
}
