use clap::Parser;
use eyre::Result as EyreResult;
use metashare_node::start;

use crate::cli::RootArgs;

/// Run the node: serve the sync api and the periodic sync jobs
#[derive(Debug, Parser)]
pub struct RunCommand;

impl RunCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        start(root_args.node_config()?).await
    }
}
