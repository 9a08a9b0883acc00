use clap::{Parser, ValueEnum};
use eyre::{bail, Result as EyreResult};
use metashare_config::hints::{hint, CONFIG_HINTS};
use metashare_config::ConfigFile;

use crate::cli::RootArgs;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Toml,
    Json,
}

/// Inspect the node configuration
#[derive(Debug, Parser)]
#[command(after_help = "EXAMPLES:\n
  View the full config:\n
  metashared config\n
  View single keys:\n
  metashared config sync.timeout_ms sync.proxied_nodes\n
  Describe a key:\n
  metashared config --hint digest.max_age_ms")]
pub struct ConfigCommand {
    /// Dotted keys to print, the full config when empty
    #[arg(value_name = "KEY")]
    pub keys: Vec<String>,

    /// Format of the full config
    #[arg(long, value_enum, default_value = "toml")]
    pub print: OutputFormat,

    /// Describe the given keys instead of printing their values
    #[arg(long)]
    pub hint: bool,
}

impl ConfigCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        if self.hint {
            if self.keys.is_empty() {
                for hint in CONFIG_HINTS {
                    println!("{}: {}", hint.key, hint.description);
                }
            }

            for key in &self.keys {
                match hint(key) {
                    Some(hint) => println!("{}: {}", hint.key, hint.description),
                    None => bail!("no hint available for key `{key}`"),
                }
            }

            return Ok(());
        }

        if !ConfigFile::exists(&root_args.home) {
            bail!("Node is not initialized in {:?}", root_args.home);
        }

        let config = ConfigFile::load(&root_args.home)?;

        if self.keys.is_empty() {
            match self.print {
                OutputFormat::Toml => print!("{}", toml::to_string_pretty(&config)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            }

            return Ok(());
        }

        for key in &self.keys {
            match config.get_value(key) {
                Some(value) => println!("{key} = {value}"),
                None => bail!("unknown config key `{key}`"),
            }
        }

        Ok(())
    }
}
