//! searchmix CLI - index document trees and search them from the shell.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;

    let mix = commands::open_engine(&cli)?;

    match cli.command {
        Commands::Add {
            path,
            tags,
            exclude,
            no_recursive,
            update,
            no_check_modified,
        } => {
            commands::add(
                &mix,
                &path,
                tags,
                exclude,
                !no_recursive,
                update,
                !no_check_modified,
            )
            .await?;
        },
        Commands::Search {
            query,
            limit,
            tags,
            min_score,
            snippet_length,
            per_doc,
            no_snippets,
            count,
            json,
        } => {
            commands::search(
                &mix,
                &query,
                limit,
                tags,
                min_score,
                snippet_length,
                per_doc,
                !no_snippets,
                count,
                json,
            )?;
        },
        Commands::Get {
            path,
            position,
            length,
            json,
        } => {
            commands::get(&mix, &path, position, length, json)?;
        },
        Commands::Heading { path, id, json } => {
            commands::heading(&mix, &path, &id, json)?;
        },
        Commands::Remove { path } => {
            commands::remove(&mix, &path)?;
        },
        Commands::RemoveTag { tag } => {
            commands::remove_tag(&mix, &tag)?;
        },
        Commands::Clear { yes } => {
            commands::clear(&mix, yes)?;
        },
        Commands::Stats { tag, json } => {
            commands::stats(&mix, tag.as_deref(), json)?;
        },
    }

    mix.close()?;
    Ok(())
}

fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
