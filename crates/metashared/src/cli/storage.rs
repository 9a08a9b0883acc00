use clap::Parser;
use eyre::{bail, Result as EyreResult};
use metashare_primitives::identifier::StorageId;
use metashare_primitives::status::CopyStatus;
use tracing::error;

use crate::cli::RootArgs;

/// Rebuild objects from their storage folders
#[derive(Debug, Parser)]
pub struct RestoreCommand {
    /// Objects to restore, every folder under the storage root when empty
    #[arg(value_name = "ID")]
    pub ids: Vec<StorageId>,

    /// Copy status of objects whose folder has no local envelope
    #[arg(long, value_name = "STATUS", default_value_t = CopyStatus::Master)]
    pub copy_status: CopyStatus,
}

impl RestoreCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let node = root_args.open_node()?;
        let storage = node.storage();

        if self.ids.is_empty() {
            if self.copy_status != CopyStatus::Master {
                bail!("--copy-status needs explicit identifiers");
            }

            let report = storage.restore_all()?;

            for (id, err) in &report.failed {
                error!(%id, %err, "Failed to restore object");
            }

            println!(
                "{} restored, {} failed",
                report.restored.len(),
                report.failed.len()
            );

            return Ok(());
        }

        let mut failed = 0_usize;

        for id in &self.ids {
            match storage.restore_from_folder(id, self.copy_status) {
                Ok(outcome) => println!("{id}: {outcome:?}"),
                Err(err) => {
                    error!(%id, %err, "Failed to restore object");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{failed} object(s) could not be restored");
        }

        Ok(())
    }
}

/// Purge every object that originates from the given nodes
#[derive(Debug, Parser)]
pub struct RemoveNodeCommand {
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,
}

impl RemoveNodeCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let node = root_args.open_node()?;

        for name in &self.names {
            let purged = node.storage().remove_node(name)?;

            println!("{name}: {} object(s) purged", purged.len());
        }

        Ok(())
    }
}

/// Rewrite storage folders from the database and drop stray ones
#[derive(Debug, Parser)]
pub struct RepairStorageFolderCommand;

impl RepairStorageFolderCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let report = root_args.open_node()?.storage().repair_storage_folder()?;

        println!(
            "{} folder(s) rewritten, {} removed",
            report.rematerialized.len(),
            report.removed.len()
        );

        Ok(())
    }
}

/// Drop storage objects whose record is missing
#[derive(Debug, Parser)]
pub struct RepairStorageObjectsCommand;

impl RepairStorageObjectsCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let removed = root_args.open_node()?.storage().repair_storage_objects()?;

        for id in &removed {
            println!("removed {id}");
        }

        println!("{} object(s) removed", removed.len());

        Ok(())
    }
}
