//! Identity management commands.

use std::path::PathBuf;

use anyhow::Context;
use evently_core::Config;
use evently_core::validation::{normalize_email, validate_password, validate_phone_number};
use evently_gateway::auth::{Role, User, UserStore};
use rand::Rng;
use zeroize::Zeroizing;

use crate::ui;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new identity.
    Create {
        email: String,
        phone: String,
        role: String,
        password: Option<String>,
        generate_password: bool,
    },
    /// List all identities.
    List,
    /// Reset an identity's password.
    ResetPassword { email: String },
    /// Delete an identity.
    Delete { email: String, yes: bool },
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(Config::data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let store = UserStore::open(&data_dir).context("Failed to open identity store")?;

    match args.action {
        AdminAction::Create {
            email,
            phone,
            role,
            password,
            generate_password: generate,
        } => create_user(&store, &email, &phone, &role, password, generate),
        AdminAction::List => list_users(&store),
        AdminAction::ResetPassword { email } => reset_password(&store, &email),
        AdminAction::Delete { email, yes } => delete_user(&store, &email, yes),
    }
}

/// Random password drawn from a mixed charset.
fn generate_password(length: usize) -> Zeroizing<String> {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();

    Zeroizing::new(
        (0..length)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect(),
    )
}

fn create_user(
    store: &UserStore,
    email: &str,
    phone: &str,
    role: &str,
    password: Option<String>,
    generate: bool,
) -> anyhow::Result<()> {
    let email = normalize_email(email)?;
    let phone = validate_phone_number(phone)?;
    let role: Role = role
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid role: {role}. Use 0/owner, 1/organizer or 2/standard"))?;

    let password = match (password, generate) {
        (_, true) => {
            let generated = generate_password(16);
            ui::success(&format!("Generated password: {}", generated.as_str()));
            generated
        }
        (Some(password), false) => Zeroizing::new(password),
        (None, false) => Zeroizing::new(ui::prompts::new_password("Password")?),
    };
    validate_password(&password)?;

    let user = User::new(email, &password, phone, role).context("Failed to create identity")?;
    store.create(&user).context("Failed to save identity")?;

    ui::success(&format!(
        "Created identity '{}' with role '{}'",
        user.email, user.role
    ));
    ui::kv("ID", user.id.as_ref());

    Ok(())
}

fn list_users(store: &UserStore) -> anyhow::Result<()> {
    let users = store.list().context("Failed to list identities")?;

    if users.is_empty() {
        ui::info("No identities registered.");
        ui::info("Run 'evently admin create --email <email> --phone <phone> --generate-password' to create one.");
        return Ok(());
    }

    ui::info(&format!("Identities ({}):", users.len()));
    println!();
    println!(
        "{:<36}  {:<30} {:<10} {:<12} {:<20}",
        "ID", "EMAIL", "ROLE", "PHONE", "CREATED"
    );
    println!("{}", "-".repeat(112));

    for user in users {
        let created = user.created_at.format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:<36}  {:<30} {:<10} {:<12} {:<20}",
            user.id.as_ref(),
            user.email,
            user.role.to_string(),
            user.phone_number,
            created
        );
    }

    Ok(())
}

fn find_user(store: &UserStore, email: &str) -> anyhow::Result<User> {
    store
        .get_by_email(email)
        .context("Failed to look up identity")?
        .ok_or_else(|| anyhow::anyhow!("Identity not found: {email}"))
}

fn reset_password(store: &UserStore, email: &str) -> anyhow::Result<()> {
    let mut user = find_user(store, email)?;
    let new_password = generate_password(16);

    user.set_password(&new_password)
        .context("Failed to set password")?;
    // A reset ends any open session
    user.set_refresh_token(None);

    store.update(&user).context("Failed to update identity")?;

    ui::success(&format!("Password reset for '{}'", user.email));
    ui::success(&format!("New password: {}", new_password.as_str()));

    Ok(())
}

fn delete_user(store: &UserStore, email: &str, yes: bool) -> anyhow::Result<()> {
    let user = find_user(store, email)?;

    if !yes && !ui::prompts::confirm(&format!("Delete identity '{}'?", user.email))? {
        ui::info("Delete cancelled");
        return Ok(());
    }

    store.delete(&user.id).context("Failed to delete identity")?;
    ui::success(&format!("Deleted identity '{}'", user.email));

    Ok(())
}
