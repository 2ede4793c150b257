//! Admin bootstrap command handler

use crate::auth::{PasswordHasher, PasswordStrengthValidator};
use crate::config::Config;
use crate::db::Store;
use crate::entities::users::Role;

const GENERATED_PASSWORD_LEN: usize = 20;

pub async fn cmd_create_admin(
    config: &Config,
    username: &str,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    if store.get_user_by_username(username).await?.is_some() {
        anyhow::bail!("Username '{username}' is already taken");
    }
    if store.get_user_by_email(email).await?.is_some() {
        anyhow::bail!("Email '{email}' is already registered");
    }

    let strength = PasswordStrengthValidator::new(&config.security.password);
    let (password, generated) = match password {
        Some(given) => (given, false),
        None => (strength.generate(GENERATED_PASSWORD_LEN), true),
    };

    let report = strength.validate(&password);
    if !report.is_valid {
        for error in &report.errors {
            eprintln!("  - {error}");
        }
        anyhow::bail!("Password does not meet the strength policy");
    }

    let hasher = PasswordHasher::new(&config.security.argon2)?;
    let hash = hasher.hash_blocking(&password).await?;
    let user = store
        .create_user(username, email, &hash, Role::Admin)
        .await?;

    println!("Created admin account '{}' (id {})", user.username, user.id);
    if generated {
        println!("Generated password: {password}");
        println!("Store it now; it is not shown again.");
    }

    Ok(())
}
