#![forbid(unsafe_code)]
//! modforge Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use modforge::commands::{
    execute_disable, execute_enable, execute_generate, execute_init, execute_modules,
    execute_set, execute_show, DisableOptions, EnableOptions, GenerateOptions, InitOptions,
    ModulesOptions, SetOptions, ShowOptions,
};
use modforge::config::CONFIG_FILE;
use modforge::project::DESCRIPTOR_FILE;
use modforge::Config;

#[derive(Parser)]
#[command(name = "modforge")]
#[command(about = "Configure embedded source trees: select modules, tune parameters, generate build files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Project descriptor path
    #[arg(short, long, global = true, default_value = DESCRIPTOR_FILE, env = "MODFORGE_PROJECT")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project descriptor
    Init {
        /// Project name; also names the output subdirectory
        name: String,

        /// Root of the module source tree
        #[arg(short, long)]
        source_root: PathBuf,

        /// Directory receiving the generated project
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// CPU name
        #[arg(long)]
        cpu: String,

        /// CPU architecture tag (can specify multiple)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Toolchain identifier the CPU builds with
        #[arg(long, default_value = "gcc")]
        cpu_toolchain: String,

        /// Compiler driver, e.g. /usr/bin/avr-gcc
        #[arg(long)]
        toolchain: Option<PathBuf>,

        /// CPU clock frequency in Hz
        #[arg(long, default_value = "")]
        clock: String,

        /// Tag usable in `supports` expressions (can specify multiple)
        #[arg(long = "known-tag")]
        known_tags: Vec<String>,

        /// Write a version 1 descriptor using the legacy templates
        #[arg(long)]
        legacy: bool,

        /// Overwrite an existing descriptor
        #[arg(short, long)]
        force: bool,
    },

    /// List modules found in the source tree
    Modules {
        /// Only show this category
        #[arg(long)]
        category: Option<String>,

        /// Only show enabled modules
        #[arg(long)]
        enabled: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a module's dependencies and parameters
    Show {
        /// Module name
        module: String,
    },

    /// Enable modules and everything they depend on
    Enable {
        #[arg(required = true)]
        modules: Vec<String>,
    },

    /// Disable modules and everything depending on them
    Disable {
        #[arg(required = true)]
        modules: Vec<String>,

        /// Accept all follow-up changes without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Change a configuration parameter
    Set {
        /// Module name or configuration file path
        target: String,

        /// Parameter name
        name: String,

        /// New value
        value: String,
    },

    /// Write configuration headers and makefiles
    Generate {
        /// Print a diff instead of writing
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "modforge=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let requires_project = !matches!(cli.command, Commands::Init { .. });
    if requires_project && !cli.project.exists() {
        eprintln!(
            "{} No {} found",
            style("✗").red(),
            cli.project.display()
        );
        eprintln!("  Run 'modforge init' to create a project");
        eprintln!("  Use 'modforge init --help' for the available options");
        std::process::exit(1);
    }

    let descriptor = cli.project;
    match cli.command {
        Commands::Init {
            name,
            source_root,
            output_dir,
            cpu,
            tags,
            cpu_toolchain,
            toolchain,
            clock,
            known_tags,
            legacy,
            force,
        } => {
            let options = InitOptions {
                descriptor,
                name,
                source_root,
                output_dir,
                cpu,
                tags,
                cpu_toolchain,
                toolchain,
                clock_frequency: clock,
                known_tags,
                legacy,
                force,
            };
            execute_init(options, &config)?;
        }

        Commands::Modules { category, enabled, json } => {
            let options = ModulesOptions {
                descriptor,
                category,
                enabled,
                json,
            };
            execute_modules(options, &config)?;
        }

        Commands::Show { module } => {
            execute_show(ShowOptions { descriptor, module }, &config)?;
        }

        Commands::Enable { modules } => {
            execute_enable(EnableOptions { descriptor, modules }, &config)?;
        }

        Commands::Disable { modules, yes } => {
            let options = DisableOptions {
                descriptor,
                modules,
                yes,
            };
            execute_disable(options, &config)?;
        }

        Commands::Set { target, name, value } => {
            let options = SetOptions {
                descriptor,
                target,
                name,
                value,
            };
            execute_set(options, &config)?;
        }

        Commands::Generate { dry_run } => {
            execute_generate(GenerateOptions { descriptor, dry_run }, &config)?;
        }
    }

    Ok(())
}
