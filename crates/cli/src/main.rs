//! EasyCart CLI - Database migrations and demo data.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! easycart-cli migrate
//!
//! # Create a demo shop for a user, with categories and products
//! easycart-cli seed --owner 6f1c... --name "Corner Store"
//! ```
//!
//! Both commands read `EASYCART_DATABASE_URL` (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use easycart_core::UserId;

mod commands;

#[derive(Parser)]
#[command(name = "easycart-cli")]
#[command(author, version, about = "EasyCart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Create a demo shop with categories and products
    Seed {
        /// User ID of the shop owner
        #[arg(short, long)]
        owner: UserId,

        /// Shop name
        #[arg(short, long, default_value = "Demo Shop")]
        name: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed { owner, name } => commands::seed::run(owner, &name).await,
    }
}
