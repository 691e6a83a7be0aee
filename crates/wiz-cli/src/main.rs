//! wizk8s CLI - Helm deployments driven by an environment directory

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wiz_kube::kubectl::KUBECTL;
use wiz_kube::release::HELM;

mod commands;
mod display;
mod error;
mod exit_codes;
mod prompt;
mod workspace;

use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "wizk8s")]
#[command(version)]
#[command(about = "Push secrets, render values and release Helm charts from an environment directory", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Environment directory (defaults to the current directory if it has a wiz.yml)
    #[arg(long, global = true, env = "WIZ_DIRPATH")]
    pub dirpath: Option<PathBuf>,

    /// Namespace, overriding wiz.yml
    #[arg(short, long, global = true, env = "WIZ_NAMESPACE")]
    pub namespace: Option<String>,

    /// Kube context, overriding wiz.yml
    #[arg(long, global = true, env = "WIZ_CONTEXT")]
    pub context: Option<String>,

    /// Kill kubectl/helm invocations after this many seconds
    #[arg(long, global = true, env = "WIZ_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// kubectl binary
    #[arg(long, global = true, env = "WIZ_KUBECTL", default_value = KUBECTL)]
    pub kubectl: String,

    /// helm binary
    #[arg(long, global = true, env = "WIZ_HELM", default_value = HELM)]
    pub helm: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively fill in wiz.yml and .env, then prepare the cluster
    Setup {
        /// Do not generate or create an image pull secret
        #[arg(long)]
        no_registry: bool,
    },

    /// Upsert the secrets the environment references
    Push,

    /// Print the Helm values rendered from the environment
    Genvalues {
        /// Image reference to inject, as `release` would
        #[arg(long)]
        image: Option<String>,
    },

    /// Install or upgrade the release with the given image
    Release {
        /// Image reference, e.g. ghcr.io/acme/app:1.4.2
        image: String,
    },

    /// Show cluster context, namespace and release name
    Info,

    /// Inspect or change the environment's release
    #[command(subcommand)]
    Releases(ReleasesCommand),

    /// Manage secrets in the environment's namespace
    #[command(subcommand)]
    Secrets(SecretsCommand),
}

#[derive(Subcommand)]
pub enum ReleasesCommand {
    /// Show release history
    List,

    /// Roll back to a revision
    Rollback {
        /// Revision number (see `releases list`)
        revision: u32,
    },

    /// Uninstall the release
    Nuke,
}

#[derive(Subcommand)]
pub enum SecretsCommand {
    /// List secrets
    List,

    /// Print a secret's `value` key
    Get {
        name: String,

        /// Print every data key, base64-encoded, as JSON
        #[arg(long)]
        no_parse: bool,
    },

    /// Store VALUE under the `value` key of secret NAME
    Set { name: String, value: String },

    /// Upload a local file as a mountable secret, to appear at REMOTE in the container
    SetFile {
        /// File to upload
        local: PathBuf,

        /// Full path inside the container, e.g. /etc/app/config.json
        remote: String,
    },

    /// Delete a secret
    Rm { name: String },

    /// Store a value as the env secret of an environment variable
    SetAsEnvar { name: String, value: String },

    /// Store every variable of a dotenv file as env secrets
    SetFromEnvFile { path: PathBuf },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn to_exit_code(code: i32) -> ExitCode {
    if code == exit_codes::SUCCESS {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(u8::try_from(code).unwrap_or(1))
    }
}

fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                to_exit_code(exit_codes::USAGE_ERROR)
            } else {
                to_exit_code(exit_codes::SUCCESS)
            };
        }
    };

    init_logging(cli.global.verbose);

    match run(cli) {
        Ok(()) => to_exit_code(exit_codes::SUCCESS),
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            to_exit_code(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // One command at a time; external processes are the only concurrency
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::internal(format!("failed to start runtime: {}", e)))?;

    let Cli { global, command } = cli;
    let result = runtime.block_on(async move {
        match command {
            Commands::Setup { no_registry } => commands::setup::run(&global, no_registry).await,
            Commands::Push => commands::push::run(&global).await,
            Commands::Genvalues { image } => commands::genvalues::run(&global, image.as_deref()),
            Commands::Release { image } => commands::release::run(&global, &image).await,
            Commands::Info => commands::info::run(&global).await,
            Commands::Releases(cmd) => commands::releases::run(&global, cmd).await,
            Commands::Secrets(cmd) => commands::secrets::run(&global, cmd).await,
        }
    });
    // A prompt read abandoned on Ctrl-C must not hold up exit
    runtime.shutdown_background();
    result
}
