//! KB bundle sources
//!
//! ## Module Organization
//!
//! - `descriptor.rs`: SourceDescriptor enum and `--source` parsing
//! - `download.rs`: Downloader seam and the blocking HTTP implementation
//! - `resolver.rs`: SourceResolver producing validated local bundles

pub mod descriptor;
pub mod download;
pub mod resolver;

pub use descriptor::{DEFAULT_GIT_REF, SourceDescriptor};
pub use download::{Downloader, HttpDownloader};
pub use resolver::{ResolvedBundle, SourceResolver, release_url};
