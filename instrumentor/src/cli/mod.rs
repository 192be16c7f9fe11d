//! The `instrumentor` command line interface.
//!
//! Runs the pod mutator outside of an admission webhook, against manifests on
//! disk or pods fetched from a cluster. Nothing is ever written back.
//!
//! # Examples
//!
//! ```bash
//! # Show the supported runtimes and their configured images
//! instrumentor runtimes
//!
//! # Print a manifest with instrumentation injected
//! instrumentor mutate --pod-file pod.yaml --namespace-file namespace.yaml
//!
//! # Check whether a running pod is already instrumented
//! instrumentor status --pod-name checkout-7d9f --namespace shop
//! ```

pub mod error;
mod internal;
mod mutate;
mod runtimes;
mod status;

use std::{io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use instrumentor::{CLI_PROGRAM_NAME, config::Config};
use snafu::ResultExt;
use tokio::runtime::Runtime;

pub use self::error::Error;
use self::{mutate::MutateCommand, runtimes::RuntimesCommand, status::StatusCommand};
use crate::shadow;

#[derive(Parser)]
#[command(
    name = CLI_PROGRAM_NAME,
    author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about = "Instrumentor: inject OpenTelemetry auto-instrumentation into Kubernetes pods.",
    long_about = "Instrumentor rewrites pod manifests the way an admission webhook would: it \
                  adds an instrumentation volume and initializer container and sets the \
                  environment the selected runtimes need, without overriding values the \
                  application already defines.",
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Option<Commands>,

    #[clap(
        long = "config",
        short = 'c',
        env = "INSTRUMENTOR_CONFIG_FILE_PATH",
        help = "Specify a configuration file. Defaults to ~/.config/instrumentor/config.yaml or \
                INSTRUMENTOR_CONFIG_FILE_PATH env var."
    )]
    config_file: Option<PathBuf>,

    #[clap(
        long = "log-level",
        env = "INSTRUMENTOR_LOG_LEVEL",
        help = "Set the logging level (e.g., info, debug, trace)."
    )]
    log_level: Option<tracing::Level>,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Display client and server version information")]
    Version {
        #[clap(long = "client", help = "If true, shows client version only (no server required).")]
        client: bool,
    },

    #[command(about = "Generate shell completion script for the specified shell (bash, zsh, fish)")]
    Completions { shell: clap_complete::Shell },

    #[command(about = "Output the default configuration in YAML format")]
    DefaultConfig,

    #[command(alias = "r", about = "List the supported runtimes and what they add to a pod")]
    Runtimes(RuntimesCommand),

    #[command(
        alias = "m",
        about = "Print a pod with auto-instrumentation injected, without applying it"
    )]
    Mutate(MutateCommand),

    #[command(alias = "s", about = "Show whether a pod is already instrumented")]
    Status(StatusCommand),
}

impl Default for Cli {
    fn default() -> Self { Self::parse() }
}

impl Cli {
    /// Loads the configuration from `--config`, or from the first existing
    /// default location. Without any file the built-in defaults apply.
    fn load_config(&self) -> Result<Config, Error> {
        let mut config = match &self.config_file {
            Some(path) => Config::load(path)?,
            None => {
                let path = Config::search_config_file_path();
                if path.try_exists().unwrap_or(false) {
                    Config::load(path)?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(log_level) = self.log_level {
            config.log.level = log_level;
        }

        Ok(config)
    }

    /// Dispatches the parsed command and returns the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the tokio
    /// runtime cannot be created or the command itself fails.
    pub fn run(self) -> Result<i32, Error> {
        let client_version = Self::command().get_version().unwrap_or_default().to_string();
        let mut stdout = std::io::stdout();
        match self.commands {
            Some(Commands::Version { client }) if client => {
                stdout
                    .write_all(Self::command().render_long_version().as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                stdout
                    .write_all(format!("Client Version: {client_version}\n").as_bytes())
                    .context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            Some(Commands::Completions { shell }) => {
                let mut app = Self::command();
                let bin_name = app.get_name().to_string();
                clap_complete::generate(shell, &mut app, bin_name, &mut stdout);
                return Ok(0);
            }
            Some(Commands::DefaultConfig) => {
                stdout.write_all(&Config::template_basic()?).context(error::WriteStdoutSnafu)?;
                return Ok(0);
            }
            _ => {}
        }

        let config = self.load_config()?;
        config.log.registry();

        let fut = async move {
            match self.commands {
                Some(Commands::Version { .. }) => {
                    let kube_client =
                        kube::Client::try_default().await.context(error::KubeConfigSnafu)?;
                    let server_version = kube_client.apiserver_version().await.map_or_else(
                        |_| "unknown".to_string(),
                        |info| format!("{}.{}", info.major, info.minor),
                    );
                    let info = format!(
                        "Client Version: {client_version}\nServer Version: {server_version}\n",
                    );
                    stdout
                        .write_all(Self::command().render_long_version().as_bytes())
                        .context(error::WriteStdoutSnafu)?;
                    stdout.write_all(info.as_bytes()).context(error::WriteStdoutSnafu)?;
                }
                Some(Commands::Runtimes(cmd)) => cmd.run(config).await?,
                Some(Commands::Mutate(cmd)) => cmd.run(config).await?,
                Some(Commands::Status(cmd)) => cmd.run().await?,
                _ => {
                    let help = Self::command().render_long_help().ansi().to_string();
                    std::io::stderr()
                        .write_all(help.as_bytes())
                        .context(error::WriteStdoutSnafu)?;
                    return Ok(-1);
                }
            }

            Ok(0)
        };

        Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(fut)
    }
}
