use crate::cache::{CacheKey, CacheStore, format_size};
use crate::cli::{CacheArgs, CacheSubcommand};
use crate::common::fs::tree_stats;
use crate::error::Result;

pub fn run(args: CacheArgs) -> Result<()> {
    let store = CacheStore::open_default()?;
    run_with_store(&store, args)
}

fn run_with_store(store: &CacheStore, args: CacheArgs) -> Result<()> {
    match args.command {
        Some(CacheSubcommand::List) => list_cached_bundles(store),
        Some(CacheSubcommand::Clear(clear_args)) => match clear_args.only {
            Some(key) => clean_specific_entry(store, &key),
            None => clean_all_cache(store),
        },
        // Default: show only cache statistics
        None => show_cache_stats(store, true),
    }
}

fn show_cache_stats(store: &CacheStore, with_hints: bool) -> Result<()> {
    let stats = store.stats()?;

    println!("Cache Statistics:");
    println!("  Location: {}", store.root().display());
    println!("  Entries: {}", stats.entries);
    println!("  Files: {}", stats.files);
    println!("  Size: {}", stats.formatted_size());

    if !with_hints {
        return Ok(());
    }
    if stats.entries == 0 {
        println!("\nCache is empty.");
    } else {
        println!("\nRun 'pair-kb cache list' to list cached bundles.");
        println!("Run 'pair-kb cache clear' to remove everything from cache.");
        println!("Run 'pair-kb cache clear --only <key>' to remove a specific entry.");
    }
    Ok(())
}

fn list_cached_bundles(store: &CacheStore) -> Result<()> {
    show_cache_stats(store, false)?;
    println!();

    let entries = store.list()?;
    if entries.is_empty() {
        println!("No cached bundles.");
        return Ok(());
    }

    println!("Cached bundles ({}):", entries.len());
    for entry in &entries {
        let size = tree_stats(&entry.path).map_or(0, |(_, bytes)| bytes);
        println!(
            "  {} ({}, populated {})",
            entry.key,
            format_size(size),
            entry.populated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(source) = &entry.origin.source {
            println!("    Source: {source}");
        }
        if let Some(commit) = &entry.origin.commit {
            match &entry.origin.resolved_ref {
                Some(git_ref) => println!("    Commit: {commit} ({git_ref})"),
                None => println!("    Commit: {commit}"),
            }
        }
    }
    Ok(())
}

fn clean_all_cache(store: &CacheStore) -> Result<()> {
    store.clear()?;
    println!("Cache cleared successfully.");
    Ok(())
}

fn clean_specific_entry(store: &CacheStore, key: &str) -> Result<()> {
    store.remove(&CacheKey::parse(key)?)?;
    println!("Removed cached bundle: {key}");
    Ok(())
}
