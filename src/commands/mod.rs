//! Command implementations for the pair-kb CLI

pub mod cache;
pub mod completions;
pub mod helpers;
pub mod install;
pub mod kb_info;
pub mod kb_validate;
pub mod kb_verify;
pub mod package;
pub mod update;
pub mod update_link;
pub mod validate_config;
