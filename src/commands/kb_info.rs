//! kb-info command

use serde::Serialize;

use crate::cache::format_size;
use crate::checksum;
use crate::cli::KbInfoArgs;
use crate::common::fs::tree_stats;
use crate::error::Result;
use crate::hash::hash_tree;
use crate::manifest;

use super::helpers::{bundle_dir, is_archive, open_bundle};

#[derive(Debug, Serialize)]
struct BundleInfo {
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    files: u64,
    size: u64,
    /// BLAKE3 digest of the bundle tree
    digest: String,
    /// SHA-256 of the archive file itself
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

pub fn run(args: KbInfoArgs) -> Result<()> {
    let path = bundle_dir(Some(args.bundle))?;
    let sha256 = if is_archive(&path) {
        Some(checksum::sha256_file(&path)?)
    } else {
        None
    };

    let opened = open_bundle(&path)?;
    let manifest = manifest::load(&opened.root)?;
    let (files, size) =
        tree_stats(&opened.root).map_err(|e| crate::error::read_failed(&opened.root, e))?;

    let info = BundleInfo {
        name: manifest.name,
        version: manifest.version,
        description: manifest.description,
        files,
        size,
        digest: hash_tree(&opened.root)?,
        sha256,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Name:        {}", info.name);
    println!("Version:     {}", info.version);
    if let Some(description) = &info.description {
        println!("Description: {description}");
    }
    println!("Files:       {}", info.files);
    println!("Size:        {}", format_size(info.size));
    println!("Digest:      {}", info.digest);
    if let Some(sha256) = &info.sha256 {
        println!("SHA-256:     {sha256}");
    }
    Ok(())
}
