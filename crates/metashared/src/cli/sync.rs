use clap::Parser;
use eyre::{bail, Result as EyreResult};
use metashare_server::auth::hash_password;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use tracing::error;

use crate::cli::RootArgs;

const GENERATED_PASSWORD_LEN: usize = 24;

/// Pull once from every configured core and proxied node
#[derive(Debug, Parser)]
pub struct SynchronizeCommand;

impl SynchronizeCommand {
    pub async fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let node = root_args.open_node()?;

        let results = node.puller().pull_all().await;

        if results.is_empty() {
            println!("No core or proxied nodes configured");
        }

        let mut failed = 0_usize;

        for (name, result) in results {
            match result {
                Ok(report) => {
                    println!(
                        "{name}: {} created, {} updated, {} unchanged, {} failed",
                        report.created, report.updated, report.unchanged, report.failed
                    );

                    for id in report.stale {
                        println!("{name}: {id} is no longer offered");
                    }
                }
                Err(err) => {
                    error!(node = %name, %err, "Synchronization failed");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("synchronization failed for {failed} node(s)");
        }

        Ok(())
    }
}

/// Purge copies of nodes that are no longer proxied
#[derive(Debug, Parser)]
pub struct CheckProxiedNodesCommand;

impl CheckProxiedNodesCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let purged = root_args.open_node()?.reconciler().check_proxied_nodes()?;

        for id in &purged {
            println!("purged {id}");
        }

        println!("{} object(s) purged", purged.len());

        Ok(())
    }
}

/// Re-check stored digests that are due
#[derive(Debug, Parser)]
pub struct UpdateDigestsCommand;

impl UpdateDigestsCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let report = root_args.open_node()?.digests().update_digests()?;

        println!(
            "{} checked, {} changed, {} skipped, {} failed",
            report.checked, report.changed, report.skipped, report.failed
        );

        Ok(())
    }
}

/// List published objects with their digests
#[derive(Debug, Parser)]
pub struct ResourceListCommand;

impl ResourceListCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        for (id, digest) in root_args.open_node()?.responder().resource_list()? {
            println!("{id} {digest}");
        }

        Ok(())
    }
}

/// Print a `[sync.users]` entry for a new sync account
#[derive(Debug, Parser)]
pub struct SyncUserCommand {
    /// Name of the account
    pub username: String,

    /// Password of the account, generated when omitted
    #[arg(long)]
    pub password: Option<String>,
}

impl SyncUserCommand {
    pub fn run(self) {
        let password = self.password.unwrap_or_else(|| {
            let password: String = thread_rng()
                .sample_iter(&Alphanumeric)
                .take(GENERATED_PASSWORD_LEN)
                .map(char::from)
                .collect();

            eprintln!("generated password: {password}");

            password
        });

        println!("[sync.users.{}]", self.username);
        println!("password_sha256 = \"{}\"", hash_password(&password));
    }
}
