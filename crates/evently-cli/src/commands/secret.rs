//! Signing secret generation.

use evently_core::SigningSecrets;

use crate::ui;

/// Print a fresh access/refresh secret pair, ready for the config file or
/// the environment.
pub fn run_secret() {
    let secrets = SigningSecrets::generate();

    ui::header("Token Signing Secrets");
    ui::kv("EVENTLY_ACCESS_TOKEN_SECRET", &secrets.access.to_hex());
    ui::kv("EVENTLY_REFRESH_TOKEN_SECRET", &secrets.refresh.to_hex());
    println!();
    ui::info("Store these in evently.json under auth.accessTokenSecret / auth.refreshTokenSecret");
}
