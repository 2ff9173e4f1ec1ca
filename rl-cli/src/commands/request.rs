//! Request command - authenticated REST call against the API base URL.

use console::style;

use rl_api::{AuthClient, Method};
use rl_core::config::ConfigHandle;
use rl_core::error::{RlError, RlResult};

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    method: String,
    path: String,
    body: Option<String>,
    format: OutputFormat,
) -> RlResult<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| RlError::InvalidArgument(format!("bad method {method:?}: {e}")))?;
    let body: Option<serde_json::Value> = body.as_deref().map(serde_json::from_str).transpose()?;

    let client = super::create_auth_client(&config).await?;
    let response = match client.request(method.clone(), &path, body.as_ref()).await {
        Ok(response) => response,
        Err(e) if e.requires_reauth() => {
            println!("{} Session expired, run `ridelink login` again.", style("AUTH").yellow().bold());
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    let status = response.status();
    let value: serde_json::Value = AuthClient::parse_json(response)
        .await
        .unwrap_or(serde_json::Value::Null);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => {
            println!("{} {} {}", style(status.as_u16()).green().bold(), method, path);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}
