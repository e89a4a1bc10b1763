//! pair-kb - knowledge-base installer
//!
//! Installs and updates knowledge-base bundles in a project.

use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pair_kb::cli::{Cli, Commands};
use pair_kb::commands::{self, helpers::Context};
use pair_kb::error::Result;

/// Initialize tracing; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        })
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let context = || Context::new(cli.project.clone(), cli.config.clone());

    match cli.command {
        Commands::Install(args) => commands::install::run(&context()?, args),
        Commands::Update(args) => commands::update::run(&context()?, args),
        Commands::Package(args) => commands::package::run(args),
        Commands::KbValidate(args) => commands::kb_validate::run(&context()?, args),
        Commands::KbVerify(args) => commands::kb_verify::run(args),
        Commands::KbInfo(args) => commands::kb_info::run(args),
        Commands::UpdateLink(args) => commands::update_link::run(&context()?, args),
        Commands::ValidateConfig => commands::validate_config::run(&context()?),
        Commands::Cache(args) => commands::cache::run(args),
        Commands::Completions(args) => commands::completions::run(args),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        if let Some(help) = e.help() {
            eprintln!("help: {help}");
        }
        std::process::exit(1);
    }
}
