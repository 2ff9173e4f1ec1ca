//! RideLink CLI - drive a ride-hailing client session from the terminal.
//!
//! Opens driver or passenger sockets, sends GPS and chat frames, runs the OTP
//! login flow and issues authenticated REST calls. Useful for exercising a
//! backend without the mobile apps.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use rl_core::config::{AppConfig, ConfigHandle};
use rl_core::error::RlResult;
use rl_core::logging;
use rl_models::UserRole;

/// RideLink - real-time ride-hailing client.
#[derive(Parser)]
#[command(
    name = "ridelink",
    version,
    about = "RideLink ride-hailing client CLI",
    long_about = "A command-line client for the RideLink backend.\n\
                  Connect as a driver or passenger, stream socket events and call the REST API."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a socket and print incoming events until Ctrl+C.
    Connect {
        /// driver or passenger.
        #[arg(short, long)]
        role: UserRole,
        /// Identity announced on the socket.
        #[arg(short, long)]
        user: String,
        /// Only print frames of this type.
        #[arg(short = 't', long = "type")]
        message_type: Option<String>,
    },
    /// Send one chat message on a ride.
    Chat {
        #[arg(short, long)]
        role: UserRole,
        #[arg(short, long)]
        user: String,
        /// Ride the message belongs to.
        #[arg(long)]
        ride: String,
        /// Message text.
        #[arg(short, long)]
        message: String,
    },
    /// Send one GPS position.
    Gps {
        #[arg(short, long)]
        role: UserRole,
        #[arg(short, long)]
        user: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Log in with a one-time code and store the credential.
    Login {
        /// Phone number the code is sent to.
        #[arg(short, long)]
        phone: String,
        #[arg(short, long)]
        role: UserRole,
        /// Code to verify (prompted for when omitted).
        #[arg(long)]
        otp: Option<String>,
    },
    /// Forget the stored credential.
    Logout,
    /// Show the stored session.
    Whoami,
    /// Issue an authenticated REST call.
    Request {
        /// HTTP method (GET, POST, PUT, DELETE, ...).
        method: String,
        /// Path relative to the API base URL.
        path: String,
        /// JSON request body.
        #[arg(short, long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> RlResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(std::path::Path::new(path))?,
        None => AppConfig::load_default()?,
    };
    config.validate()?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    let config_handle = ConfigHandle::new(config);

    info!("RideLink CLI v{}", rl_core::constants::APP_VERSION);

    match cli.command {
        Commands::Connect { role, user, message_type } => {
            commands::connect::run(config_handle, role, user, message_type, cli.format).await
        }
        Commands::Chat { role, user, ride, message } => {
            commands::chat::run(config_handle, role, user, ride, message, cli.format).await
        }
        Commands::Gps { role, user, lat, lng } => {
            commands::gps::run(config_handle, role, user, lat, lng, cli.format).await
        }
        Commands::Login { phone, role, otp } => {
            commands::auth::login(config_handle, phone, role, otp, cli.format).await
        }
        Commands::Logout => commands::auth::logout(config_handle).await,
        Commands::Whoami => commands::auth::whoami(config_handle, cli.format).await,
        Commands::Request { method, path, body } => {
            commands::request::run(config_handle, method, path, body, cli.format).await
        }
    }
}
