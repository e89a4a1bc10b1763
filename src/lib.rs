//! pair-kb - knowledge-base installer
//!
//! Resolves a knowledge-base bundle from a release, an archive, a git
//! repository or a local directory, verifies and caches it, and installs its
//! registries into a project idempotently.

pub mod archive;
pub mod backup;
pub mod cache;
pub mod checksum;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod error;
pub mod git;
pub mod hash;
pub mod installer;
pub mod manifest;
pub mod progress;
pub mod source;
pub mod state;
pub mod temp;
