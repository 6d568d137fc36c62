//! Evently CLI - run and administer the Evently gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "evently")]
#[command(about = "Evently - event listings with authenticated organizers")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "EVENTLY_PORT")]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long, env = "EVENTLY_BIND")]
        bind: Option<String>,

        /// Data directory override
        #[arg(long, env = "EVENTLY_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Identity management
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true, env = "EVENTLY_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Print a fresh pair of token signing secrets
    Secret,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Print the configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new identity
    Create {
        /// Email address
        #[arg(long)]
        email: String,

        /// Ten-digit phone number
        #[arg(long)]
        phone: String,

        /// Role: 0/owner, 1/organizer, 2/standard
        #[arg(long, default_value = "1")]
        role: String,

        /// Password (prompted if omitted)
        #[arg(long)]
        password: Option<String>,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,
    },

    /// List all identities
    List,

    /// Reset an identity's password and revoke its refresh token
    ResetPassword {
        /// Email of the identity
        #[arg(long)]
        email: String,
    },

    /// Delete an identity
    Delete {
        /// Email of the identity
        #[arg(long)]
        email: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }

    let Some(command) = cli.command else {
        ui::banner();
        ui::info("Run 'evently serve' to start the gateway, or 'evently --help' for all commands.");
        return Ok(());
    };

    match command {
        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            let args = commands::serve::ServeArgs {
                port,
                bind,
                data_dir,
            };
            commands::run_serve(args).await?;
        }

        Commands::Admin { action, data_dir } => {
            let args = commands::admin::AdminArgs {
                action: match action {
                    AdminCommands::Create {
                        email,
                        phone,
                        role,
                        password,
                        generate_password,
                    } => commands::admin::AdminAction::Create {
                        email,
                        phone,
                        role,
                        password,
                        generate_password,
                    },
                    AdminCommands::List => commands::admin::AdminAction::List,
                    AdminCommands::ResetPassword { email } => {
                        commands::admin::AdminAction::ResetPassword { email }
                    }
                    AdminCommands::Delete { email, yes } => {
                        commands::admin::AdminAction::Delete { email, yes }
                    }
                },
                data_dir,
            };
            commands::run_admin(args)?;
        }

        Commands::Secret => commands::run_secret(),

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(action)?;
        }
    }

    Ok(())
}
