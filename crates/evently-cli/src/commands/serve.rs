//! Serve command - start the gateway server.

use std::path::PathBuf;

use anyhow::Result;
use evently_core::config::BindMode;
use evently_core::Config;
use evently_gateway::GatewayConfig;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address: `local`, `public`, or an IP.
    pub bind: Option<String>,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Resolve a `--bind` value.
fn parse_bind(bind: &str) -> BindMode {
    match bind {
        "local" | "loopback" => BindMode::Local,
        "public" | "lan" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if configuration is invalid or the server fails.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = Config::load_default()?;

    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind.as_deref() {
        config.gateway.mode = parse_bind(bind);
    }
    config.auth = config.auth.with_env_overrides();
    config.validate()?;

    let mut gateway_config = GatewayConfig::from_config(&config);
    if let Some(data_dir) = args.data_dir {
        gateway_config.data_dir = data_dir;
    }
    tracing::debug!(
        bind = %gateway_config.bind_address,
        port = gateway_config.port,
        data_dir = %gateway_config.data_dir.display(),
        "Resolved gateway config"
    );

    ui::header("Starting Evently Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway_config.bind_address, gateway_config.port),
    );
    ui::kv("Data", &gateway_config.data_dir.display().to_string());
    ui::kv(
        "Access token lifetime",
        &format!("{} min", config.auth.access_expiry_minutes),
    );
    ui::kv(
        "Refresh token lifetime",
        &format!("{} days", config.auth.refresh_expiry_days),
    );
    if !config.auth.secure_cookies {
        ui::warning("Session cookies are not marked Secure");
    }
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    evently_gateway::start(gateway_config).await?;

    Ok(())
}
