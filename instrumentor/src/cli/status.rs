use clap::Args;
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;

use crate::{
    cli::{
        Error, error,
        internal::{PodSource, SourcedPod},
    },
    ui::table::PodStatusExt,
};

#[derive(Args, Clone)]
pub struct StatusCommand {
    #[command(flatten)]
    pub source: PodSource,
}

impl StatusCommand {
    pub async fn run(self) -> Result<(), Error> {
        let SourcedPod { pod, .. } = self.source.load().await?;

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(pod.render_status_table().as_bytes())
            .await
            .context(error::WriteStdoutSnafu)?;
        stdout.write_u8(b'\n').await.context(error::WriteStdoutSnafu)
    }
}
