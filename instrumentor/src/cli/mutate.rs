use clap::{Args, ValueEnum};
use instrumentor::{
    config::{Config, FailurePolicy},
    instrumentation::Runtime,
    mutator::PodMutator,
};
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::cli::{
    Error, error,
    internal::{PodSource, SourcedPod},
};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Clone)]
pub struct MutateCommand {
    #[command(flatten)]
    pub source: PodSource,

    #[arg(
        long = "failure-policy",
        help = "Override the configured failure policy (Reject or Skip) for this run."
    )]
    pub failure_policy: Option<FailurePolicy>,

    #[arg(
        long = "runtime",
        short = 'r',
        value_name = "RUNTIME",
        help = "Only apply the configured instrumentation of the given runtime (preload or \
                php). May be repeated."
    )]
    pub runtimes: Vec<Runtime>,

    #[arg(short, long, value_enum, default_value_t, help = "Output format of the mutated pod.")]
    pub output: OutputFormat,
}

impl MutateCommand {
    pub async fn run(self, mut config: Config) -> Result<(), Error> {
        let Self { source, failure_policy, runtimes, output } = self;
        if let Some(failure_policy) = failure_policy {
            config.failure_policy = failure_policy;
        }
        config.retain_runtimes(&runtimes);

        let SourcedPod { namespace, pod } = source.load().await?;
        let mutator = PodMutator::from_config(&config);
        if mutator.instrumentations().is_empty() {
            tracing::warn!(
                "No instrumentation is configured, the pod is printed unchanged; see `{} \
                 default-config`",
                instrumentor::CLI_PROGRAM_NAME
            );
        }

        let pod = mutator.mutate(&namespace, pod)?;
        let rendered = match output {
            OutputFormat::Yaml => {
                serde_yaml::to_string(&pod).context(error::SerializePodYamlSnafu)?
            }
            OutputFormat::Json => {
                let mut json =
                    serde_json::to_string_pretty(&pod).context(error::SerializePodJsonSnafu)?;
                json.push('\n');
                json
            }
        };
        tokio::io::stdout().write_all(rendered.as_bytes()).await.context(error::WriteStdoutSnafu)
    }
}
