//! Connect command - hold a socket open and print incoming frames.

use console::style;
use tokio::sync::broadcast::error::RecvError;

use rl_core::config::ConfigHandle;
use rl_core::error::RlResult;
use rl_models::UserRole;
use rl_socket::ConnectionState;

use crate::OutputFormat;

/// Run the connect command.
pub async fn run(
    config: ConfigHandle,
    role: UserRole,
    user: String,
    message_type: Option<String>,
    format: OutputFormat,
) -> RlResult<()> {
    let registry = super::create_registry(&config).await;
    let socket_url = registry.config().server.socket_url.clone();

    println!(
        "{} Connecting to {} as {} {}...",
        style("[1/2]").bold().dim(),
        socket_url,
        role,
        user
    );

    // Subscribe before connecting so the first frames are not missed
    let channel = registry.channel(role);
    let mut events = channel.manager().dispatcher().subscribe();
    let mut state = channel.manager().state_receiver();
    let channel = super::connect_and_wait(&registry, role, &user).await?;

    println!(
        "{} {} Listening for events... (Ctrl+C to stop)",
        style("[2/2]").bold().dim(),
        style("OK").green().bold()
    );
    println!();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(ev) => {
                        if message_type.as_deref().is_some_and(|t| t != ev.message_type.as_str()) {
                            continue;
                        }
                        match format {
                            OutputFormat::Json => println!("{}", ev.data),
                            OutputFormat::Text => println!(
                                "  {} {}",
                                style(format!("[{}]", ev.message_type)).cyan(),
                                ev.data
                            ),
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        println!("  {} Missed {n} events (slow consumer)", style("WARN").yellow());
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                println!("  {} socket {}", style("STATE").magenta(), current);
                if current == ConnectionState::Failed {
                    println!("  {} Giving up after repeated failures.", style("FAIL").red().bold());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Disconnecting...");
                break;
            }
        }
    }

    channel.disconnect().await;
    registry.shutdown().await;
    Ok(())
}
