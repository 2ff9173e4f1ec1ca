//! Chat command - send one message on a ride.

use console::style;

use rl_core::config::ConfigHandle;
use rl_core::error::{RlError, RlResult};
use rl_models::UserRole;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    role: UserRole,
    user: String,
    ride: String,
    message: String,
    format: OutputFormat,
) -> RlResult<()> {
    let registry = super::create_registry(&config).await;
    let channel = super::connect_and_wait(&registry, role, &user).await?;

    let sent = channel.send_chat(&ride, &message).await;
    registry.shutdown().await;

    let Some(sent) = sent else {
        return Err(RlError::Socket("chat message was not sent".into()));
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sent)?),
        OutputFormat::Text => println!(
            "{} sent to ride {} at {}",
            style("OK").green().bold(),
            sent.ride_id,
            sent.timestamp
        ),
    }
    Ok(())
}
