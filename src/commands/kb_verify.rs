//! kb-verify command
//!
//! Checks, in order: the sibling `.sha256` of an archive (when present), the
//! archive structure and limits, and the bundle manifest. The checksum is
//! always verified before anything is extracted.

use serde::Serialize;

use crate::checksum;
use crate::cli::KbVerifyArgs;
use crate::error::Result;
use crate::manifest;

use super::helpers::{bundle_dir, is_archive, open_bundle, success, warning};

#[derive(Debug, Serialize)]
struct Verification {
    bundle: String,
    kind: &'static str,
    /// `verified`, `absent` or `not-applicable`
    checksum: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
    name: String,
    version: String,
    valid: bool,
}

pub fn run(args: KbVerifyArgs) -> Result<()> {
    let path = bundle_dir(Some(args.bundle))?;
    let archive = is_archive(&path);

    let checksum = if !archive {
        "not-applicable"
    } else if checksum::verify_sibling_if_present(&path)? {
        "verified"
    } else {
        "absent"
    };

    let opened = open_bundle(&path)?;
    let manifest = manifest::validate(&opened.root, None)?;

    let result = Verification {
        bundle: path.display().to_string(),
        kind: if archive { "archive" } else { "directory" },
        checksum,
        entries: opened.extraction.as_ref().map(|r| r.entries),
        name: manifest.name,
        version: manifest.version,
        valid: true,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result.checksum {
        "verified" => println!("  checksum:  verified (sha256)"),
        "absent" => warning(format!(
            "no {} file next to the archive, checksum not verified",
            checksum::CHECKSUM_EXTENSION
        )),
        _ => {}
    }
    if let Some(entries) = result.entries {
        println!("  structure: {entries} entries");
    }
    println!("  manifest:  {} {}", result.name, result.version);
    success(format!("{} is valid", result.bundle));
    Ok(())
}
