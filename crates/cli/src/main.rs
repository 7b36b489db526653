use std::path::PathBuf;

use anthill_core::{BuildManager, BuildManagerConfig, MessageLevel};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Anthill - a target based build tool
#[derive(Parser)]
#[command(name = "anthill")]
#[command(about = "A target based build tool with forked test runs")]
#[command(version)]
struct Cli {
    /// Build file to use
    #[arg(short = 'f', long = "file", default_value = "build.yml", global = true)]
    file: PathBuf,

    /// Set a user property, e.g. -D version=1.0
    #[arg(short = 'D', value_name = "NAME=VALUE", value_parser = parse_property, global = true)]
    define: Vec<(String, String)>,

    /// Load user properties from a properties file
    #[arg(long = "propertyfile", value_name = "FILE", global = true)]
    property_files: Vec<PathBuf>,

    /// Keep building targets that do not depend on a failed one
    #[arg(short = 'k', long, global = true)]
    keep_going: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with_all = ["verbose", "debug"])]
    quiet: bool,

    /// Print verbose build messages
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print debug build messages
    #[arg(short, long, global = true)]
    debug: bool,

    /// Filter for internal diagnostics, e.g. `anthill_core=debug` (defaults to RUST_LOG)
    #[arg(long, value_name = "FILTER", global = true)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run targets (the default target when none are given)
    Run {
        targets: Vec<String>,
    },
    /// Show the execution order of a build without running it
    Plan {
        targets: Vec<String>,
        /// Also check targets the build would not reach
        #[arg(long)]
        strict: bool,
    },
    /// List the targets of the build file
    List {
        /// Include targets without a description
        #[arg(long)]
        all: bool,
    },
    /// Show the target dependency graph
    Graph,
    /// Print the JSON schema of the build file format
    Schema,
    /// Run forked tests; started by the junit task
    #[command(hide = true)]
    TestRunner {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Cli {
    fn message_level(&self) -> MessageLevel {
        if self.quiet {
            MessageLevel::Warn
        } else if self.debug {
            MessageLevel::Debug
        } else if self.verbose {
            MessageLevel::Verbose
        } else {
            MessageLevel::Info
        }
    }

    fn manager_config(&self) -> BuildManagerConfig {
        // A repeated -D replaces the earlier value.
        let user_properties = self.define.iter().cloned().collect();
        BuildManagerConfig {
            build_file: self.file.clone(),
            user_properties,
            property_files: self.property_files.clone(),
            keep_going: self.keep_going,
        }
    }
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(format!("missing property name in '{}'", raw)),
        Some((name, value)) => Ok((name.to_string(), value.to_string())),
        None => Ok((raw.to_string(), String::new())),
    }
}

/// Install the diagnostics subscriber. Returns whether a filter was
/// requested, in which case build events are traced as well.
fn init_tracing(log_level: Option<&str>) -> bool {
    let (filter, requested) = match log_level {
        Some(level) => (EnvFilter::new(level), true),
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, true),
            Err(_) => (EnvFilter::new("warn"), false),
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
    requested
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let trace_events = init_tracing(cli.log_level.as_deref());
    if cli.no_color {
        colored::control::set_override(false);
    }

    match &cli.command {
        Commands::TestRunner { args } => return commands::test_runner::execute(args),
        Commands::Schema => return commands::schema::execute(),
        _ => {}
    }

    let mut manager = BuildManager::load(cli.manager_config())
        .map_err(|e| anyhow::anyhow!("Failed to load build file: {}", e))?;

    match &cli.command {
        Commands::Run { targets } => {
            commands::run::execute(&mut manager, targets, cli.message_level(), trace_events)
        }
        Commands::Plan { targets, strict } => commands::plan::execute(&manager, targets, *strict),
        Commands::List { all } => commands::list::execute(&manager, *all),
        Commands::Graph => commands::graph::execute(&manager),
        Commands::TestRunner { .. } | Commands::Schema => Ok(()),
    }
}
