//! Shopfront CLI - session migration and backend management tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the session table
//! shopfront-cli migrate
//!
//! # Create a user (e.g. the first admin)
//! shopfront-cli user create -e admin@example.com -n "Admin Name" -r admin
//!
//! # Print every row of a table as JSON
//! shopfront-cli table dump orders
//! ```
//!
//! # Commands
//!
//! - `migrate` - Create the session store table
//! - `user create` - Create a confirmed user with the service role
//! - `table dump` - Dump a table through the generic table request

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront-cli")]
#[command(author, version, about = "Shopfront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session store table
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Read backend tables
    Table {
        #[command(subcommand)]
        action: TableAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a confirmed user
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`buyer`, `seller`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum TableAction {
    /// Print every row as JSON
    Dump {
        /// Table name, e.g. `products` or `orders`
        table: String,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so `table dump` output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::sessions().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                password,
            } => {
                commands::user::create(&email, &name, &role, password).await?;
            }
        },
        Commands::Table { action } => match action {
            TableAction::Dump { table } => commands::table::dump(&table).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_user_create_parses() {
        let cli = Cli::try_parse_from([
            "shopfront-cli",
            "user",
            "create",
            "-e",
            "admin@example.com",
            "-n",
            "Admin",
            "-r",
            "seller",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        let Commands::User {
            action: UserAction::Create { role, password, .. },
        } = cli.command
        else {
            panic!("expected user create");
        };
        assert_eq!(role, "seller");
        assert_eq!(password, None);
    }
}
