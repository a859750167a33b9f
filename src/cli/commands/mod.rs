use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};

use crate::cli::output::{Output, OutputFormat};
use crate::config::{PipeworkConfig, Settings};
use crate::report::RunReport;

pub mod config;
pub mod grades;
pub mod ips;
pub mod movies;
pub mod version;
pub mod vowels;

#[derive(Parser)]
#[command(
    name = "pipework",
    version = env!("CARGO_PKG_VERSION"),
    about = "Concurrent pipelines over OS threads: fan-out, staged pipelines, pools and shared locks",
    long_about = "pipework runs small data-processing jobs on independent worker threads \
                  connected by single-sender channels, and reports what every worker did."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<String>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Count letters in a text file, one worker per letter (fan-out / fan-in)
    Vowels(vowels::VowelsArgs),
    /// Classify random IPv4 addresses through a three-stage pipeline
    Ips(ips::IpsArgs),
    /// Generate, average and rank student grades (shared lock or worker pool)
    Grades(grades::GradesArgs),
    /// Extract the movies of one year into peliculasYYYY.txt (two-stage pipeline)
    Movies(movies::MoviesArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// What every command needs from the global flags.
pub struct CommandContext {
    pub output: Output,
    config_path: Option<String>,
}

impl CommandContext {
    pub fn load_config(&self) -> Result<PipeworkConfig> {
        PipeworkConfig::load(self.config_path.as_deref())
    }

    pub fn settings(&self) -> Result<Settings> {
        self.load_config()?.settings()
    }

    pub fn emit(&self, report: &RunReport) -> Result<()> {
        self.output.report(report)
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Change directory if specified
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir).with_context(|| format!("Cannot change directory to {dir}"))?;
        }

        // Set up logging based on verbosity
        setup_logging(self.verbose, self.quiet);

        let ctx = CommandContext {
            output: Output::new(self.quiet, self.format),
            config_path: self.config,
        };

        match self.command {
            Some(Commands::Vowels(args)) => vowels::execute(args, &ctx),
            Some(Commands::Ips(args)) => ips::execute(args, &ctx),
            Some(Commands::Grades(args)) => grades::execute(args, &ctx),
            Some(Commands::Movies(args)) => movies::execute(args, &ctx),
            Some(Commands::Config(args)) => config::execute(args, &ctx),
            Some(Commands::Version(args)) => version::execute(args, &ctx),
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info"),
        2 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // Logs go to stderr so --format json stays parseable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
