use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use const_format::concatcp;
use eyre::{bail, Result as EyreResult};
use metashare_config::ConfigFile;
use metashare_folderstore::config::FolderStoreConfig;
use metashare_node::{Node, NodeConfig};
use metashare_primitives::common::NODE_VERSION;
use metashare_server::config::ServerConfig;
use metashare_storage::index::NoopIndex;
use metashare_store::config::StoreConfig;

use crate::defaults;

mod config;
mod init;
mod run;
mod storage;
mod sync;

use config::ConfigCommand;
use init::InitCommand;
use run::RunCommand;
use storage::{
    RemoveNodeCommand, RepairStorageFolderCommand, RepairStorageObjectsCommand, RestoreCommand,
};
use sync::{
    CheckProxiedNodesCommand, ResourceListCommand, SyncUserCommand, SynchronizeCommand,
    UpdateDigestsCommand,
};

pub const EXAMPLES: &str = r"
  # Initialize a new node
  $ metashared --home data/ init --node-name node1 --node-url http://localhost:2529/

  # Show part of the configuration
  $ metashared --home data/ config sync.core_nodes sync.timeout_ms

  # Run the node
  $ metashared --home data/ run

  # Pull from every configured node once
  $ metashared --home data/ synchronize
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  METASHARE_HOME    Directory for config and data\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    Config(ConfigCommand),
    #[command(alias = "up")]
    Run(RunCommand),
    Synchronize(SynchronizeCommand),
    CheckProxiedNodes(CheckProxiedNodesCommand),
    UpdateDigests(UpdateDigestsCommand),
    Restore(RestoreCommand),
    RemoveNode(RemoveNodeCommand),
    RepairStorageFolder(RepairStorageFolderCommand),
    RepairStorageObjects(RepairStorageObjectsCommand),
    ResourceList(ResourceListCommand),
    SyncUser(SyncUserCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config and data
    #[arg(long, value_name = "PATH", default_value_t = defaults::default_node_dir())]
    #[arg(env = "METASHARE_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,
}

impl RootArgs {
    /// Loads `config.toml` and resolves its paths against the home directory.
    pub fn node_config(&self) -> EyreResult<NodeConfig> {
        if !ConfigFile::exists(&self.home) {
            bail!("Node is not initialized in {:?}", self.home);
        }

        let config = ConfigFile::load(&self.home)?;

        Ok(NodeConfig::new(
            self.home.clone(),
            config.node.clone(),
            StoreConfig::new(self.home.join(&config.datastore.path)),
            FolderStoreConfig::new(self.home.join(&config.storage.path)),
            ServerConfig::new(
                config.server.listen.clone(),
                config.auth(),
                NODE_VERSION.to_owned(),
            ),
            config.peer_sync(),
            config.digest(),
        ))
    }

    /// Opens the node for a one-shot maintenance command.
    pub fn open_node(&self) -> EyreResult<Node> {
        Node::open(&self.node_config()?, Arc::new(NoopIndex))
    }
}

impl RootCommand {
    pub async fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Config(config) => config.run(&self.args),
            SubCommands::Run(run) => run.run(&self.args).await,
            SubCommands::Synchronize(synchronize) => synchronize.run(&self.args).await,
            SubCommands::CheckProxiedNodes(check) => check.run(&self.args),
            SubCommands::UpdateDigests(update) => update.run(&self.args),
            SubCommands::Restore(restore) => restore.run(&self.args),
            SubCommands::RemoveNode(remove) => remove.run(&self.args),
            SubCommands::RepairStorageFolder(repair) => repair.run(&self.args),
            SubCommands::RepairStorageObjects(repair) => repair.run(&self.args),
            SubCommands::ResourceList(list) => list.run(&self.args),
            SubCommands::SyncUser(user) => {
                user.run();
                Ok(())
            }
        }
    }
}
