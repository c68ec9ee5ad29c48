//! Command implementations over the core engine.

use anyhow::{bail, Result};
use colored::Colorize;
use std::io::Write;
use std::path::Path;

use searchmix_core::{
    AddInput, AddOptions, Config, GetOptions, SearchMix, SearchOptions, Snippet,
};

use crate::cli::Cli;

pub fn open_engine(cli: &Cli) -> Result<SearchMix> {
    let config = Config {
        db_path: cli.db.clone(),
        include_code_blocks: cli.include_code_blocks,
        ..Config::default()
    };
    Ok(SearchMix::new(config)?)
}

#[allow(clippy::fn_params_excessive_bools)]
pub async fn add(
    mix: &SearchMix,
    path: &Path,
    tags: Vec<String>,
    exclude: Vec<String>,
    recursive: bool,
    update: bool,
    check_modified: bool,
) -> Result<()> {
    let options = AddOptions {
        tags,
        exclude,
        recursive,
        update,
        check_modified,
        ..AddOptions::default()
    };
    let report = mix.add(AddInput::path(path), options).await?;

    println!(
        "{} {} indexed, {} skipped, {} failed",
        "✓".green(),
        report.indexed.len(),
        report.skipped,
        report.failed
    );
    for path in &report.indexed {
        println!("  {}", path.dimmed());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub fn search(
    mix: &SearchMix,
    query: &str,
    limit: usize,
    tags: Vec<String>,
    min_score: Option<f32>,
    snippet_length: usize,
    per_doc: usize,
    snippets: bool,
    count: bool,
    json: bool,
) -> Result<()> {
    let response = mix.search(
        query,
        SearchOptions {
            limit,
            min_score,
            tags,
            snippets,
            snippet_length,
            snippets_per_doc: per_doc,
            count,
        },
    )?;

    if json {
        let payload = serde_json::json!({
            "results": response.results,
            "totalCount": response.total_count,
            "totalSnippets": response.total_snippets,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("{} no matches", "∅".yellow());
        return Ok(());
    }
    for snippet in &response.results {
        print_snippet(snippet);
    }
    if let Some(total) = response.total_count {
        println!("\n{} matching documents", total.to_string().bold());
    }
    Ok(())
}

fn print_snippet(snippet: &Snippet) {
    let location = match &snippet.heading {
        Some(heading) => format!("{} · {}", snippet.document_title, heading.text),
        None => snippet.document_title.clone(),
    };
    println!(
        "{} {}  {}",
        format!("{:.2}", snippet.rank).dimmed(),
        location.bold(),
        snippet.document_path.dimmed()
    );
    println!("   {}", snippet.text.trim());
}

pub fn get(
    mix: &SearchMix,
    path: &str,
    position: Option<usize>,
    length: usize,
    json: bool,
) -> Result<()> {
    let record = mix.get(path, GetOptions { position, length })?;
    let Some(record) = record else {
        bail!("no document stored under '{path}'");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("{}", record.title.bold());
        println!("{}", record.path.dimmed());
        if !record.tags.is_empty() {
            println!("tags: {}", record.tags.join(", "));
        }
        println!("\n{}", record.body);
    }
    Ok(())
}

pub fn heading(mix: &SearchMix, path: &str, id: &str, json: bool) -> Result<()> {
    let Some(details) = mix.get_heading_by_id(path, id)? else {
        bail!("no heading '{id}' in '{path}'");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
        return Ok(());
    }
    println!(
        "{} {} (depth {})",
        details.id.dimmed(),
        details.text.bold(),
        details.depth
    );
    if let Some(parent) = &details.parent {
        println!("parent: {} {}", parent.id.dimmed(), parent.text);
    }
    for child in &details.children {
        println!("child:  {} {}", child.id.dimmed(), child.text);
    }
    println!("{} content blocks", details.content_count);
    Ok(())
}

pub fn remove(mix: &SearchMix, path: &str) -> Result<()> {
    if mix.remove_document(path)? {
        println!("{} removed {path}", "✓".green());
    } else {
        println!("{} nothing stored under {path}", "∅".yellow());
    }
    Ok(())
}

pub fn remove_tag(mix: &SearchMix, tag: &str) -> Result<()> {
    let removed = mix.remove_by_tag(tag)?;
    println!("{} removed {removed} documents tagged '{tag}'", "✓".green());
    Ok(())
}

pub fn clear(mix: &SearchMix, yes: bool) -> Result<()> {
    let documents = mix.get_stats(None)?.documents;
    if documents == 0 {
        println!("{} index is already empty", "∅".yellow());
        return Ok(());
    }
    if !yes && !confirm(&format!("remove all {documents} documents?"))? {
        println!("cancelled");
        return Ok(());
    }
    mix.clear()?;
    println!("{} cleared {documents} documents", "✓".green());
    Ok(())
}

pub fn stats(mix: &SearchMix, tag: Option<&str>, json: bool) -> Result<()> {
    let stats = mix.get_stats(tag)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("documents: {}", stats.documents.to_string().bold());
    println!("sections:  {}", stats.sections);
    println!("body size: {} bytes", stats.body_bytes);
    for (tag, count) in &stats.tags {
        println!("  {tag}: {count}");
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
