//! Login, logout and whoami commands.

use console::style;
use dialoguer::Input;

use rl_api::AuthSession;
use rl_core::config::ConfigHandle;
use rl_core::error::{RlError, RlResult};
use rl_models::UserRole;

use crate::OutputFormat;

/// Request a code, verify it and persist the resulting credential.
pub async fn login(
    config: ConfigHandle,
    phone: String,
    role: UserRole,
    otp: Option<String>,
    format: OutputFormat,
) -> RlResult<()> {
    let client = super::create_auth_client(&config).await?;

    let otp = match otp {
        Some(code) => code,
        None => {
            client.send_otp(&phone, role).await?;
            println!("  {} Code sent to {phone}.", style("OK").green());
            Input::<String>::new()
                .with_prompt("One-time code")
                .interact_text()
                .map_err(|e| RlError::Internal(e.to_string()))?
        }
    };

    let credential = client.verify_otp(&phone, otp.trim(), role).await?;
    let session = AuthSession::bootstrap(client.store().clone()).await;
    session.complete_login(&credential).await?;

    let state = session.snapshot().await;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => println!(
            "{} Logged in as {} {}",
            style("OK").green().bold(),
            role,
            state.user_id.as_deref().unwrap_or("?")
        ),
    }
    Ok(())
}

pub async fn logout(config: ConfigHandle) -> RlResult<()> {
    let store = super::credential_store(&config).await?;
    let session = AuthSession::bootstrap(store).await;
    session.logout().await?;
    println!("{} Logged out.", style("OK").green().bold());
    Ok(())
}

pub async fn whoami(config: ConfigHandle, format: OutputFormat) -> RlResult<()> {
    let store = super::credential_store(&config).await?;
    let state = AuthSession::bootstrap(store).await.snapshot().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text if !state.is_authenticated => {
            println!("{}", style("Not logged in.").yellow());
        }
        OutputFormat::Text => {
            println!("  Role:    {}", state.user_type.map(|r| r.to_string()).unwrap_or_default());
            println!("  User id: {}", state.user_id.as_deref().unwrap_or(""));
            println!("  Phone:   {}", state.phone_number.as_deref().unwrap_or(""));
        }
    }
    Ok(())
}
