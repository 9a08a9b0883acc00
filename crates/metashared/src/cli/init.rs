use std::fs;
use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use metashare_config::{
    ConfigFile, DataStoreConfig, DigestSection, ServerConfig, StorageConfig, SyncConfig,
};
use metashare_storage::config::LocalNode;
use metashare_store::config::StoreConfig;
use metashare_store::Store;
use metashare_store_rocksdb::RocksDB;
use tracing::{info, warn};

use crate::cli::RootArgs;
use crate::defaults;

/// Initialize node configuration
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Name of this node, recorded on the objects it originates
    #[arg(long, value_name = "NAME")]
    pub node_name: String,

    /// Public url of this node
    #[arg(long, value_name = "URL")]
    pub node_url: Option<String>,

    /// Host to listen on for the sync api
    #[arg(long, value_name = "HOST")]
    #[arg(default_value = "127.0.0.1,::1")]
    #[arg(use_value_delimiter = true)]
    pub server_host: Vec<IpAddr>,

    /// Port to listen on for the sync api
    #[arg(long, value_name = "PORT")]
    #[arg(default_value_t = metashare_server::config::DEFAULT_PORT)]
    pub server_port: u16,

    /// Answer sync requests without credentials
    #[arg(long)]
    pub anonymous_sync: bool,

    /// Force initialization even if the directory already exists
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let home = &root_args.home;

        if !home.exists() {
            fs::create_dir_all(home)
                .wrap_err_with(|| format!("failed to create directory {home:?}"))?;
        }

        if ConfigFile::exists(home) {
            if let Err(err) = ConfigFile::load(home) {
                if self.force {
                    warn!(%err, "Failed to load existing configuration, overwriting");
                } else {
                    bail!("failed to load existing configuration: {err}");
                }
            }
            if !self.force {
                bail!("node is already initialized in {home:?}");
            }
        }

        let listen = self
            .server_host
            .into_iter()
            .map(|host| SocketAddr::from((host, self.server_port)))
            .collect();

        let mut sync = SyncConfig::default();
        sync.require_auth = !self.anonymous_sync;

        let config = ConfigFile::new(
            LocalNode::new(self.node_name, self.node_url),
            ServerConfig::new(listen),
            DataStoreConfig::new(defaults::DEFAULT_DATASTORE_DIR.into()),
            StorageConfig::new(defaults::DEFAULT_STORAGE_DIR.into()),
            sync,
            DigestSection::default(),
        );

        config.save(home)?;

        drop(Store::open::<RocksDB>(&StoreConfig::new(
            home.join(&config.datastore.path),
        ))?);

        let storage = home.join(&config.storage.path);
        fs::create_dir_all(&storage)
            .wrap_err_with(|| format!("failed to create storage root {storage:?}"))?;

        info!(name = %config.node.name, "Initialized a node in {home:?}");

        Ok(())
    }
}
