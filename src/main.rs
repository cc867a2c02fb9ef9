use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use confload::{
    ConfigRole, ConstructionPolicy,
    config::{Settings, load_settings},
    logging::init_logging,
};

/// Parse configuration files through the format registry and print them as JSON.
#[derive(Debug, Parser)]
#[command(name = "confload", version, about)]
struct Cli {
    /// Settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the construction policy from the settings file.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Parse with the rule or system parser of the format's family.
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// Print the registered formats and exit.
    #[arg(long)]
    list_formats: bool,

    /// Configuration files to load.
    #[arg(required_unless_present = "list_formats")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Fresh,
    Eager,
    Lazy,
}

impl From<PolicyArg> for ConstructionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fresh => ConstructionPolicy::Fresh,
            PolicyArg::Eager => ConstructionPolicy::Eager,
            PolicyArg::Lazy => ConstructionPolicy::Lazy,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Rule,
    System,
}

impl From<RoleArg> for ConfigRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Rule => ConfigRole::Rule,
            RoleArg::System => ConfigRole::System,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    if let Some(policy) = cli.policy {
        settings.policy = policy.into();
    }
    init_logging(&settings.logging.level);

    let source = settings.build_source();
    if cli.list_formats {
        for format in source.registry().formats() {
            println!("{format}");
        }
        return Ok(());
    }

    let role = cli.role.map(ConfigRole::from).unwrap_or_default();
    for path in &cli.paths {
        let config = source
            .load_as(path, role)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let rendered = serde_json::to_string_pretty(config.root())
            .context("failed to render parsed config")?;
        println!("{rendered}");
    }
    Ok(())
}
