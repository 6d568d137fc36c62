//! Config inspection command.

use anyhow::Result;
use evently_core::Config;
use serde_json::Value;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file path.
    Path,
    /// Load and validate the configuration.
    Validate,
}

/// Run the config command.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or serialized.
pub fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::default_path().display());
            Ok(())
        }
        ConfigAction::Show => show_config(),
        ConfigAction::Validate => validate_config(),
    }
}

fn show_config() -> Result<()> {
    let path = Config::default_path();
    if !path.exists() {
        ui::warning(&format!(
            "Config file not found: {} (showing defaults)",
            path.display()
        ));
    }

    let mut config = Config::load_default()?;
    config.auth = config.auth.with_env_overrides();

    let mut value = serde_json::to_value(&config)?;
    redact_secrets(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);

    Ok(())
}

fn validate_config() -> Result<()> {
    ui::header("Validating Configuration");
    ui::kv("Path", &Config::default_path().display().to_string());

    let config = match Config::load_default() {
        Ok(config) => config,
        Err(e) => {
            ui::error(&format!("Invalid configuration: {e}"));
            return Err(e.into());
        }
    };

    let auth = config.auth.with_env_overrides();
    auth.validate()?;

    if auth.access_token_secret.is_none() || auth.refresh_token_secret.is_none() {
        ui::warning("Signing secrets not set; sessions will not survive a restart");
        ui::info("Run 'evently secret' to generate a pair");
    }

    ui::success("Configuration is valid");
    Ok(())
}

/// Replace present signing secrets with a marker.
fn redact_secrets(value: &mut Value) {
    let Some(auth) = value.get_mut("auth").and_then(Value::as_object_mut) else {
        return;
    };

    for key in ["accessTokenSecret", "refreshTokenSecret"] {
        if let Some(secret) = auth.get_mut(key) {
            if !secret.is_null() {
                *secret = Value::String("[REDACTED]".to_string());
            }
        }
    }
}
