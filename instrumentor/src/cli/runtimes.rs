use clap::Args;
use instrumentor::{config::Config, instrumentation::Runtime};
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{Error, error},
    ui::table::RuntimeExt,
};

#[derive(Args, Clone)]
pub struct RuntimesCommand {
    #[arg(
        long = "runtime",
        short = 'r',
        value_name = "RUNTIME",
        help = "Only list the given runtime (preload or php). May be repeated."
    )]
    pub runtimes: Vec<Runtime>,
}

impl RuntimesCommand {
    pub async fn run(self, config: Config) -> Result<(), Error> {
        let runtimes = if self.runtimes.is_empty() { Runtime::ALL.to_vec() } else { self.runtimes };
        let table = runtimes.as_slice().render_table(&config.instrumentations);
        let mut stdout = tokio::io::stdout();
        stdout.write_all(table.as_bytes()).await.context(error::WriteStdoutSnafu)?;
        stdout.write_u8(b'\n').await.context(error::WriteStdoutSnafu)
    }
}
