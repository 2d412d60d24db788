use anyhow::Context;
use clap::Subcommand;
use serde_json::json;

use crate::api::requests::CreateUserRequest;
use crate::cli::OutputFormat;
use crate::config::{self, StoreBackend};
use crate::database::DatabaseManager;
use crate::services::UserService;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Register a user")]
    Create {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Email address (unique)")]
        email: String,
    },

    #[command(about = "List users and how many todos each owns")]
    List,
}

/// User commands run in their own process, so an in-memory store would
/// drop everything they write as soon as they exit.
fn require_persistent_store(backend: StoreBackend) -> anyhow::Result<()> {
    if backend == StoreBackend::Memory {
        anyhow::bail!("user commands need TODO_STORE=postgres; the in-memory store does not outlive this command");
    }
    Ok(())
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = config::config();
    require_persistent_store(config.database.backend)?;

    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open entity store")?;
    let users = UserService::new(store);

    match cmd {
        UserCommands::Create { name, email } => {
            let new_user = CreateUserRequest { name, email }.validate()?;
            let user = users.register(new_user).await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "user": user }))?),
                OutputFormat::Text => println!("Created user {} <{}> with id {}", user.name, user.email, user.id),
            }
        }
        UserCommands::List => {
            let all = users.list().await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "users": all }))?),
                OutputFormat::Text => {
                    if all.is_empty() {
                        println!("No users registered");
                        return Ok(());
                    }
                    println!("{:<38} {:<20} {:<30} {}", "ID", "NAME", "EMAIL", "TODOS");
                    println!("{}", "-".repeat(95));
                    for user in &all {
                        println!("{:<38} {:<20} {:<30} {}", user.id, user.name, user.email, user.todos.len());
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_is_refused() {
        let err = require_persistent_store(StoreBackend::Memory).unwrap_err();
        assert!(err.to_string().contains("TODO_STORE=postgres"));
        assert!(require_persistent_store(StoreBackend::Postgres).is_ok());
    }
}
