//! `pareto config`: inspect or scaffold the config file.

use anyhow::{Context, Result};
use clap::Subcommand;

use pareto_core::{config as core_config, Config};

use super::{home, load_config};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (file + environment).
    Show,
    /// Print the config file location.
    Path,
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = load_config()?;
            print!(
                "{}",
                config
                    .to_display_yaml()
                    .context("failed to render configuration")?
            );
        }
        ConfigCommand::Path => {
            println!("{}", core_config::config_path_at(&home()?).display());
        }
        ConfigCommand::Init { force } => {
            let home = home()?;
            let path = core_config::config_path_at(&home);
            if path.exists() && !force {
                println!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
                return Ok(());
            }
            let written = core_config::save_at(&home, &Config::default())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", written.display());
        }
    }
    Ok(())
}
