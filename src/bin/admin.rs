//! CLI administration tool for the shortener registry.
//!
//! Works against whichever backend the environment selects (PostgreSQL,
//! storage log or, for smoke tests, an empty in-memory registry).
//!
//! # Usage
//!
//! ```bash
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Resolve an alias or find the alias of a URL
//! cargo run --bin admin -- lookup EwHXdJfB
//! cargo run --bin admin -- find https://practicum.yandex.ru/
//!
//! # List and delete an owner's URLs
//! cargo run --bin admin -- list 7f1c2a
//! cargo run --bin admin -- delete --owner 7f1c2a EwHXdJfB Xk29aQpL
//!
//! # Check the backend
//! cargo run --bin admin -- check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` or `DB_*` components: PostgreSQL backend
//! - `FILE_STORAGE_PATH`: storage log backend
//!
//! Do not run `delete` against a storage log while the service is running:
//! both processes would append to the same file.

use shortener_core::config::Config;
use shortener_core::domain::entities::ShortenedUrl;
use shortener_core::domain::repositories::UrlRegistry;
use shortener_core::infrastructure::persistence::open_registry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;

/// CLI tool for inspecting and maintaining the registry.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show registry statistics
    Stats,

    /// Show the mapping stored under an alias
    Lookup { alias: String },

    /// Find the alias of an original URL
    Find { url: String },

    /// List every URL shortened by an owner
    List { owner: String },

    /// Soft-delete aliases of an owner immediately
    Delete {
        /// Owner ID the aliases must belong to
        #[arg(short, long)]
        owner: String,

        /// Aliases to delete
        #[arg(required = true)]
        aliases: Vec<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Check the storage backend
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.validate()?;
    let backend = config.backend();
    let registry = open_registry(&backend, &config.pg_settings())
        .await
        .with_context(|| format!("Failed to open {} registry", backend))?;

    let result = match cli.command {
        Commands::Stats => handle_stats(registry.as_ref()).await,
        Commands::Lookup { alias } => handle_lookup(registry.as_ref(), &alias).await,
        Commands::Find { url } => handle_find(registry.as_ref(), &url).await,
        Commands::List { owner } => handle_list(registry.as_ref(), &owner).await,
        Commands::Delete {
            owner,
            aliases,
            yes,
        } => handle_delete(registry.as_ref(), &owner, aliases, yes).await,
        Commands::Check => handle_check(registry.as_ref(), &backend.to_string()).await,
    };

    registry.close().await.context("Failed to close registry")?;
    result
}

/// Displays registry counters.
async fn handle_stats(registry: &dyn UrlRegistry) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let counts = registry.count().await?;

    println!(
        "  URLs:   {}",
        counts.urls.to_string().bright_green().bold()
    );
    println!(
        "  Owners: {}",
        counts.owners.to_string().bright_green().bold()
    );
    println!();

    Ok(())
}

async fn handle_lookup(registry: &dyn UrlRegistry, alias: &str) -> Result<()> {
    match registry.get_by_alias(alias).await {
        Ok(url) => print_entry(&url),
        Err(e) if e.is_not_found() => println!("{}", "❌ Alias not found".red()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn handle_find(registry: &dyn UrlRegistry, url: &str) -> Result<()> {
    match registry.get_by_original_url(url).await {
        Ok(entry) => print_entry(&entry),
        Err(e) if e.is_not_found() => println!("{}", "❌ URL not shortened".red()),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Lists an owner's URLs in the order they were shortened.
async fn handle_list(registry: &dyn UrlRegistry, owner: &str) -> Result<()> {
    println!("{}", "📋 Owner URLs".bright_blue().bold());
    println!();

    let urls = registry.list_by_owner(owner).await?;

    if urls.is_empty() {
        println!("{}", "  No URLs found".yellow());
        println!();
        return Ok(());
    }

    for url in &urls {
        let status = if url.deleted {
            "DELETED".red()
        } else {
            "ACTIVE".green()
        };

        println!(
            "  {:<12} {:<8} {}",
            url.alias.cyan(),
            status,
            url.original_url.bright_black()
        );
    }

    println!();
    println!("  Total: {}", urls.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Soft-deletes aliases directly, bypassing the deferred pipeline.
///
/// Aliases the owner does not own, or that are already deleted, are left untouched.
async fn handle_delete(
    registry: &dyn UrlRegistry,
    owner: &str,
    aliases: Vec<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🗑  Delete URLs".bright_blue().bold());
    println!();
    println!("  Owner:   {}", owner.cyan());
    println!("  Aliases: {}", aliases.join(", ").bright_white());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Delete these aliases?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    registry
        .delete_batch(owner, &aliases)
        .await
        .context("Failed to delete aliases")?;

    let mut deleted = 0usize;
    for alias in &aliases {
        if let Ok(url) = registry.get_by_alias(alias).await
            && url.is_owned_by(owner)
            && url.deleted
        {
            deleted += 1;
        }
    }

    println!();
    println!(
        "{} {}/{}",
        "✅ Deleted".green().bold(),
        deleted,
        aliases.len()
    );
    println!();

    Ok(())
}

async fn handle_check(registry: &dyn UrlRegistry, backend: &str) -> Result<()> {
    println!(
        "{}",
        format!("🔍 Checking {} backend...", backend).bright_blue()
    );

    registry.ping().await?;

    println!("{}", "✅ Backend OK".green().bold());
    Ok(())
}

fn print_entry(url: &ShortenedUrl) {
    let owner = if url.is_anonymous() {
        "(anonymous)".bright_black()
    } else {
        url.owner_id.cyan()
    };
    let status = if url.deleted {
        "DELETED".red()
    } else {
        "ACTIVE".green()
    };

    println!("  Alias:  {}", url.alias.cyan());
    println!("  URL:    {}", url.original_url.bright_white());
    println!("  Owner:  {}", owner);
    println!("  Status: {}", status);
}
