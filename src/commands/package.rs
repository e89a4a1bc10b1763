//! Package command

use crate::archive::pack::{archive_name, pack};
use crate::cli::PackageArgs;
use crate::error::{PairError, Result};
use crate::manifest;

use super::helpers::{bundle_dir, success};

/// Validate a bundle directory and pack it into `<name>-<version>.zip`.
///
/// Without `--output` the archive is written next to the bundle directory.
pub fn run(args: PackageArgs) -> Result<()> {
    let root = bundle_dir(args.path)?;
    if !root.is_dir() {
        return Err(PairError::PackageFailed {
            path: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let manifest = manifest::validate(&root, None)?;
    let version = manifest.normalized_version()?;
    let out_dir = match args.output {
        Some(dir) => dir,
        None => root
            .parent()
            .map_or_else(|| root.clone(), std::path::Path::to_path_buf),
    };
    let output = out_dir.join(archive_name(&manifest.name, &version));

    let report = pack(&root, &output)?;
    println!("  archive:  {}", report.archive.display());
    println!("  checksum: {}", report.checksum_file.display());
    println!("  sha256:   {}", report.digest);
    success(format!(
        "Packaged {} {} ({} files)",
        manifest.name, version, report.files
    ));
    Ok(())
}
