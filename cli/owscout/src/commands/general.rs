use std::io;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use toml_edit::Key;
use tracing::{debug, instrument};

use crate::commands::Owscout;
use crate::config::{Config, OWSCOUT_CONFIG_FILE};

#[derive(Bpaf, Clone)]
#[bpaf(fallback(ConfigArgs::List))]
pub enum ConfigArgs {
    /// List the current values of all options
    #[bpaf(short, long)]
    List,
    /// Reset all options to their default values without further confirmation
    #[bpaf(short, long)]
    Reset,
    /// Set a config value
    Set(#[bpaf(external(config_set))] ConfigSet),
    /// Delete a config value
    Delete(#[bpaf(external(config_delete))] ConfigDelete),
}

impl ConfigArgs {
    /// handle config flags like commands
    #[instrument(name = "config", skip_all)]
    pub async fn handle(&self, config: Config, scout: Owscout) -> Result<()> {
        match self {
            ConfigArgs::List => println!("{}", config.get(&[])?),
            ConfigArgs::Reset => {
                match fs::remove_file(&scout.config_dir.join(OWSCOUT_CONFIG_FILE)).await {
                    Err(err) if err.kind() != io::ErrorKind::NotFound => {
                        Err(err).context("Could not reset config file")?
                    },
                    _ => (),
                }
            },
            ConfigArgs::Set(ConfigSet { key, value, .. }) => {
                let parsed_value = match Value::from_str(value) {
                    Ok(parsed) => {
                        debug!(supplied = value, ?parsed, "parsed config value");
                        parsed
                    },
                    Err(error) => {
                        debug!(
                            supplied = value,
                            ?error,
                            "failed to parse as JSON value, treating as unquoted string"
                        );
                        Value::String(value.clone())
                    },
                };

                update_config(&scout.config_dir, key, Some(parsed_value))?
            },
            ConfigArgs::Delete(ConfigDelete { key, .. }) => {
                update_config::<()>(&scout.config_dir, key, None)?
            },
        }
        Ok(())
    }
}

#[derive(Bpaf, Clone)]
pub struct ConfigSet {
    /// set <key> <value>
    #[bpaf(long("set"), short('s'), req_flag(()))]
    _set: (),
    /// Configuration key
    #[bpaf(positional("key"))]
    key: String,
    /// Configuration value
    #[bpaf(positional("value"))]
    value: String,
}

#[derive(Bpaf, Clone)]
pub struct ConfigDelete {
    /// Configuration key to delete
    #[bpaf(long("delete"), short('d'), argument("key"))]
    key: String,
}

/// Modify the user's config file with a new or removed value.
pub(crate) fn update_config<V: Serialize>(
    config_dir: &Path,
    key: &str,
    value: Option<V>,
) -> Result<()> {
    let query = Key::parse(key).context("Could not parse configuration key")?;
    let config_file_path = config_dir.join(OWSCOUT_CONFIG_FILE);

    match Config::write_to_in(config_file_path, &query, value) {
        err @ Err(crate::config::ReadWriteError::InvalidKey(_))
        | err @ Err(crate::config::ReadWriteError::NotAUserValue(_)) => {
            err.with_context(|| format!("'{key}' is not a valid configuration option"))?
        },
        other => other.context("Could not update configuration")?,
    }
    Ok(())
}
