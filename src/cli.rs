//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// pair-kb - knowledge-base installer
///
/// Install and update pair knowledge-base bundles in a project.
#[derive(Parser, Debug)]
#[command(
    name = "pair-kb",
    author,
    version,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Install and update knowledge-base bundles in a project",
    long_about = "pair-kb resolves a knowledge-base bundle from a published release, an archive, \
                  a git repository or a local directory, verifies and caches it, and installs \
                  its registries (knowledge, adoption, agents, ...) into the project.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  pair-kb install\n    \
                  pair-kb install --source ./kb\n    \
                  pair-kb install --source git+https://github.com/org/kb.git#main\n    \
                  pair-kb update --source 1.3.0 --persist-backup\n    \
                  pair-kb kb-verify knowledge-base-1.3.0.zip\n    \
                  pair-kb cache list"
)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(long, short = 'p', global = true)]
    pub project: Option<PathBuf>,

    /// Registry configuration file (defaults to <project>/config.json, then built-in registries)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install a KB bundle into a project that has none yet
    Install(InstallArgs),

    /// Update the KB of a project that already has one
    Update(UpdateArgs),

    /// Package a bundle directory into a versioned ZIP with checksum
    Package(PackageArgs),

    /// Validate a bundle directory
    KbValidate(KbValidateArgs),

    /// Verify a bundle archive or directory
    KbVerify(KbVerifyArgs),

    /// Show bundle name, version, size and digest
    KbInfo(KbInfoArgs),

    /// Rewrite Markdown links in installed content
    UpdateLink(UpdateLinkArgs),

    /// Validate the registry configuration
    ValidateConfig,

    /// Show, list or clear the bundle cache
    Cache(CacheArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Install the release matching this CLI:\n    pair-kb install\n\n\
                  Install from a local directory:\n    pair-kb install --source ./kb\n\n\
                  Install a specific release:\n    pair-kb install --source 1.2.0\n\n\
                  Install from a git branch:\n    pair-kb install --source git+https://github.com/org/kb.git#main\n\n\
                  Show where registries would be installed:\n    pair-kb install --list-targets")]
pub struct InstallArgs {
    /// Bundle source (directory, .zip, version, archive URL or git URL)
    #[arg(long, short = 's')]
    pub source: Option<String>,

    /// Fail instead of accessing the network; cached bundles still work
    #[arg(long)]
    pub offline: bool,

    /// List configured registries and exit
    #[arg(long)]
    pub list_targets: bool,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Update to the release matching this CLI:\n    pair-kb update\n\n\
                  Update from a local archive and keep the backup:\n    pair-kb update --source ./kb-1.3.0.zip --persist-backup\n\n\
                  Update from the cache only:\n    pair-kb update --source 1.3.0 --offline")]
pub struct UpdateArgs {
    /// Bundle source (directory, .zip, version, archive URL or git URL)
    #[arg(long, short = 's')]
    pub source: Option<String>,

    /// Fail instead of accessing the network; cached bundles still work
    #[arg(long)]
    pub offline: bool,

    /// Keep the backup taken before the update
    #[arg(long)]
    pub persist_backup: bool,
}

/// Arguments for the package command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Package the current directory:\n    pair-kb package\n\n\
                  Package into dist/:\n    pair-kb package ./kb --output dist")]
pub struct PackageArgs {
    /// Bundle directory (defaults to current directory)
    pub path: Option<PathBuf>,

    /// Output directory for the archive and its checksum
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Arguments for the kb-validate command
#[derive(Parser, Debug)]
pub struct KbValidateArgs {
    /// Bundle directory (defaults to current directory)
    pub path: Option<PathBuf>,
}

/// Arguments for the kb-verify command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Verify an archive against its .sha256:\n    pair-kb kb-verify kb-1.2.0.zip\n\n\
                  Machine-readable output:\n    pair-kb kb-verify kb-1.2.0.zip --json")]
pub struct KbVerifyArgs {
    /// Bundle archive or directory
    pub bundle: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the kb-info command
#[derive(Parser, Debug)]
pub struct KbInfoArgs {
    /// Bundle archive or directory
    pub bundle: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the update-link command
#[derive(Parser, Debug)]
pub struct UpdateLinkArgs {
    /// Report planned changes without writing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Show cache statistics:\n    pair-kb cache\n\n\
                  List cached bundles:\n    pair-kb cache list\n\n\
                  Remove one entry:\n    pair-kb cache clear --only 1.2.0\n\n\
                  Remove everything:\n    pair-kb cache clear")]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: Option<CacheSubcommand>,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List cached bundles
    List,

    /// Remove cached bundles
    Clear(CacheClearArgs),
}

#[derive(Parser, Debug)]
pub struct CacheClearArgs {
    /// Remove only this cache key
    #[arg(long)]
    pub only: Option<String>,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    pair-kb completions --shell bash > ~/.bash_completion.d/pair-kb\n\n\
                  Generate zsh completions:\n    pair-kb completions --shell zsh > ~/.zfunc/_pair-kb\n\n\
                  Generate fish completions:\n    pair-kb completions --shell fish > ~/.config/fish/completions/pair-kb.fish")]
pub struct CompletionsArgs {
    /// Shell type
    #[arg(long, value_enum, ignore_case = true)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parsing_install() {
        let cli = Cli::try_parse_from(["pair-kb", "install", "--source", "./kb"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.source.as_deref(), Some("./kb"));
                assert!(!args.offline);
                assert!(!args.list_targets);
            }
            _ => panic!("Expected Install command"),
        }
    }

    #[test]
    fn test_cli_parsing_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "pair-kb",
            "update",
            "--persist-backup",
            "-p",
            "/tmp/p1",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.project, Some(PathBuf::from("/tmp/p1")));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Update(args) => assert!(args.persist_backup),
            _ => panic!("Expected Update command"),
        }
    }

    #[test]
    fn test_cli_parsing_kebab_commands() {
        let cli = Cli::try_parse_from(["pair-kb", "kb-verify", "bad.zip", "--json"]).unwrap();
        match cli.command {
            Commands::KbVerify(args) => {
                assert_eq!(args.bundle, PathBuf::from("bad.zip"));
                assert!(args.json);
            }
            _ => panic!("Expected KbVerify command"),
        }
        let cli = Cli::try_parse_from(["pair-kb", "validate-config"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateConfig));
        let cli = Cli::try_parse_from(["pair-kb", "update-link", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::UpdateLink(UpdateLinkArgs { dry_run: true })));
    }

    #[test]
    fn test_cli_parsing_cache_clear_only() {
        let cli = Cli::try_parse_from(["pair-kb", "cache", "clear", "--only", "1.2.0"]).unwrap();
        match cli.command {
            Commands::Cache(CacheArgs {
                command: Some(CacheSubcommand::Clear(args)),
            }) => assert_eq!(args.only.as_deref(), Some("1.2.0")),
            _ => panic!("Expected cache clear"),
        }
    }

    #[test]
    fn test_cli_parsing_completions_case_insensitive() {
        let cli = Cli::try_parse_from(["pair-kb", "completions", "--shell", "ZSH"]).unwrap();
        match cli.command {
            Commands::Completions(args) => assert_eq!(args.shell, Shell::Zsh),
            _ => panic!("Expected Completions command"),
        }
    }

    #[test]
    fn test_unknown_command_is_usage_error() {
        let err = Cli::try_parse_from(["pair-kb", "frobnicate"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
