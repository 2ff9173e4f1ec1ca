//! GPS command - send one position update.

use console::style;

use rl_core::config::ConfigHandle;
use rl_core::error::{RlError, RlResult};
use rl_models::UserRole;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    role: UserRole,
    user: String,
    lat: f64,
    lng: f64,
    format: OutputFormat,
) -> RlResult<()> {
    let registry = super::create_registry(&config).await;
    let channel = super::connect_and_wait(&registry, role, &user).await?;

    let sent = channel.send_gps(lat, lng).await;
    registry.shutdown().await;

    if !sent {
        return Err(RlError::InvalidArgument(format!(
            "position {lat},{lng} was not sent"
        )));
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "sent": true, "latitude": lat, "longitude": lng })
        ),
        OutputFormat::Text => println!("{} position {lat},{lng} sent", style("OK").green().bold()),
    }
    Ok(())
}
