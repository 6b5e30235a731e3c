use std::num::NonZeroU8;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{env, fs};

use anyhow::{Context, Result, anyhow};
use config::{Config as HierarchicalConfig, Environment};
use log::{debug, trace};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tempfile::PersistError;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Key, Table, TableLike};
use xdg::BaseDirectories;

/// Name of owscout managed directories (config, data, cache)
pub const OWSCOUT_DIR_NAME: &str = "owscout";
const OWSCOUT_CONFIG_DIR_VAR: &str = "OWSCOUT_CONFIG_DIR";
pub const OWSCOUT_CONFIG_FILE: &str = "owscout.toml";

#[derive(Clone, Debug, Deserialize, Default, Serialize)]
pub struct Config {
    /// owscout configuration options
    #[serde(default, flatten)]
    pub owscout: OwscoutConfig,
}

/// The owscout configuration options.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct OwscoutConfig {
    /// Directory where owscout stores ephemeral data (default:
    /// `$XDG_CACHE_HOME/owscout`)
    pub cache_dir: PathBuf,
    /// Directory where owscout stores the connection registry (default:
    /// `$XDG_DATA_HOME/owscout`)
    pub data_dir: PathBuf,
    /// Directory owscout loads its configuration file from (default:
    /// `$XDG_CONFIG_HOME/owscout`)
    pub config_dir: PathBuf,

    /// How many records a result page holds by default
    pub page_size: Option<NonZeroU8>,

    /// User agent reported to catalogue and service endpoints
    pub user_agent: Option<String>,
}

/// Error returned by [`Config::get()`] and [`Config::write_to()`]
#[derive(Debug, Error)]
pub enum ReadWriteError {
    #[error("Invalid config key: '{}'", display_key(_0))]
    InvalidKey(Vec<Key>),
    #[error("Config key '{}' not in user configuration", display_key(_0))]
    NotAUserValue(Vec<Key>),
    #[error(transparent)]
    TomlEdit(#[from] toml_edit::TomlError),
    #[error(transparent)]
    TomlSer(#[from] toml_edit::ser::Error),
    #[error(transparent)]
    TomlDe(#[from] toml_edit::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Could not read config file: {0}")]
    ReadConfig(std::io::Error),
    #[error("Could not write config file: {0}")]
    WriteConfig(std::io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

fn display_key(path: &[Key]) -> String {
    path.iter()
        .map(|key| key.display_repr().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

impl Config {
    /// Creates a raw [Config] object and caches it for the lifetime of the program
    fn raw_config(mut reload: bool) -> Result<HierarchicalConfig> {
        static INSTANCE: OnceCell<Mutex<HierarchicalConfig>> = OnceCell::new();

        debug!(
            "reading raw config (initialized: {initialized}, reload: {reload})",
            initialized = INSTANCE.get().is_some()
        );

        fn read_raw_config() -> Result<HierarchicalConfig> {
            let owscout_dirs = BaseDirectories::with_prefix(OWSCOUT_DIR_NAME);

            let cache_dir = owscout_dirs
                .get_cache_home()
                .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
            let data_dir = owscout_dirs
                .get_data_home()
                .ok_or_else(|| anyhow!("Could not determine data directory"))?;

            let config_dir = match env::var(OWSCOUT_CONFIG_DIR_VAR) {
                Ok(v) => {
                    debug!("`${OWSCOUT_CONFIG_DIR_VAR}` set: {v}");
                    fs::create_dir_all(&v)
                        .context(format!("Could not create config directory: {v:?}"))?;
                    PathBuf::from(v)
                },
                Err(_) => {
                    let config_dir = owscout_dirs
                        .get_config_home()
                        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
                    debug!("`${OWSCOUT_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                    fs::create_dir_all(&config_dir)
                        .context(format!("Could not create config directory: {config_dir:?}"))?;
                    config_dir
                        .canonicalize()
                        .context("Could not canonicalize config directory")?
                },
            };

            let mut builder = HierarchicalConfig::builder()
                .set_default("cache_dir", cache_dir.to_string_lossy().as_ref())?
                .set_default("data_dir", data_dir.to_string_lossy().as_ref())?
                // Config dir is added to the config for completeness;
                // the config file cannot change the config dir.
                .set_override("config_dir", config_dir.to_string_lossy().as_ref())?;

            // read from /etc
            builder = builder.add_source(
                config::File::from(PathBuf::from("/etc").join(OWSCOUT_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            );

            // the user's config file
            builder = builder.add_source(
                config::File::from(config_dir.join(OWSCOUT_CONFIG_FILE))
                    .format(config::FileFormat::Toml)
                    .required(false),
            );

            // override via `OWSCOUT_*` environment variables
            let builder =
                builder.add_source(Environment::with_prefix("OWSCOUT").try_parsing(true));

            let final_config = builder.build()?;
            Ok(final_config)
        }

        let instance = INSTANCE.get_or_try_init(|| {
            // If we are initializing the config for the first time,
            // we don't need to reload right after
            reload = false;
            let config = read_raw_config()?;

            Ok::<_, anyhow::Error>(Mutex::new(config))
        })?;

        let mut config_guard = instance.lock().expect("config mutex poisoned");
        if reload {
            *config_guard = read_raw_config()?;
        }

        Ok(config_guard.deref().clone())
    }

    /// Creates a [Config] from the environment and config file
    ///
    /// When running in tests, the config is reloaded on every call.
    pub fn parse() -> Result<Config> {
        #[cfg(test)]
        let reload = true;

        #[cfg(not(test))]
        let reload = false;

        let final_config = Self::raw_config(reload)?;
        let config: Config = final_config
            .to_owned()
            .try_deserialize()
            .context("Could not parse config")?;
        Ok(config)
    }

    /// get a value from the config
    ///
    /// **intended for human consumption/introspection of config only**
    ///
    /// Values in code should be read from the [Config] type instead!
    pub fn get(&self, path: &[Key]) -> Result<String, ReadWriteError> {
        let document: DocumentMut = toml_edit::ser::to_document(self)?;

        if path.is_empty() {
            return Ok(document.to_string());
        }

        let mut cfg = document.as_table() as &dyn TableLike;

        let (key, parents) = path.split_last().expect("just checked path is non-empty");

        for (n, segment) in parents.iter().enumerate() {
            let maybe_value = cfg.get(segment).and_then(|item| item.as_table_like());

            match maybe_value {
                Some(v) => cfg = v,
                None => {
                    Err(ReadWriteError::InvalidKey(path[..=n].to_vec()))?;
                },
            }
        }

        let value = cfg
            .get(key.as_ref())
            .ok_or(ReadWriteError::InvalidKey(path.to_vec()))?;

        Ok(value.to_string())
    }

    /// Append or update a key value pair in the toml representation of a
    /// partial config
    ///
    /// Validated against the [Config] schema before it is accepted.
    pub fn write_to<V: Serialize>(
        config_file: Option<String>,
        path: &[Key],
        value: Option<V>,
    ) -> Result<String, ReadWriteError> {
        let mut validation_document = toml_edit::ser::to_document(&Config::default())?;

        let mut document = match config_file {
            Some(content) => content.parse::<DocumentMut>()?,
            None => DocumentMut::new(),
        };

        let (mut handle, mut validation) =
            (document.as_table_mut(), validation_document.as_table_mut());

        let (key, parents) = path.split_last().expect("config keys are non-empty");

        for segment in parents {
            trace!("stepping into path segment {}", segment);

            if !handle.contains_table(segment) {
                handle.insert(segment, Item::Table(Table::new()));
            }
            if !validation.contains_table(segment) {
                validation.insert(segment, Item::Table(Table::new()));
            }

            handle = handle
                .get_mut(segment)
                .expect("just inserted")
                .as_table_mut()
                .expect("just inserted as table");
            validation = validation
                .get_mut(segment)
                .expect("just inserted")
                .as_table_mut()
                .expect("just inserted as table");
        }

        trace!("write value for key '{}'", key.display_repr());

        match value {
            None => {
                let _ = handle
                    .remove(key.as_ref())
                    .ok_or(ReadWriteError::NotAUserValue(path.to_vec()))?;
            },
            Some(ref value) => {
                for handle in [handle, validation] {
                    handle.insert(
                        key.as_ref(),
                        Item::Value(value.serialize(toml_edit::ser::ValueSerializer::default())?),
                    );
                }
                trace!("try parsing the new virtual config (validation)");
                let validation_config: Config = toml_edit::de::from_document(validation_document)?;

                validation_config.get(path)?;
            },
        }

        Ok(document.to_string())
    }

    /// Apply [Self::write_to] to the config file on disk, atomically.
    pub fn write_to_in<V: Serialize>(
        config_file_path: impl AsRef<Path>,
        query: &[Key],
        value: Option<V>,
    ) -> Result<(), ReadWriteError> {
        let config_file_contents = match fs::read_to_string(&config_file_path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "No existing user config file found in {:?}, creating it now",
                    config_file_path.as_ref()
                );
                Ok(None)
            },
            Err(e) => Err(e),
        }
        .map_err(ReadWriteError::ReadConfig)?;

        let config_file_contents = Self::write_to(config_file_contents, query, value)?;

        let parent = config_file_path
            .as_ref()
            .parent()
            .ok_or(ReadWriteError::NotAUserValue(query.to_vec()))?;
        let tempfile = tempfile::Builder::new().tempfile_in(parent)?;
        fs::write(&tempfile, config_file_contents).map_err(ReadWriteError::WriteConfig)?;
        tempfile.persist(config_file_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_read_value() {
        let mut config = Config::default();
        config.owscout.page_size = NonZeroU8::new(25);
        assert_eq!(
            config.get(&Key::parse("page_size").unwrap()).unwrap(),
            "25".to_string()
        );
    }

    #[test]
    #[serial]
    fn test_set_by_env() {
        let tempdir = tempfile::tempdir().unwrap();
        temp_env::with_vars(
            [
                (
                    "HOME",
                    Some(tempdir.path().as_os_str().to_string_lossy().as_ref()),
                ),
                ("XDG_CACHE_HOME", None),
                ("XDG_DATA_HOME", None),
                ("XDG_CONFIG_HOME", None),
                ("OWSCOUT_CONFIG_DIR", None),
                ("OWSCOUT_PAGE_SIZE", Some("50")),
            ],
            || {
                let config = Config::parse().unwrap();
                assert_eq!(config.owscout.page_size, NonZeroU8::new(50));
            },
        );
    }

    #[test]
    fn test_writing_value() {
        let config_content = Config::write_to(
            None,
            &Key::parse("user_agent").unwrap(),
            Some("custom-agent/1.0"),
        )
        .unwrap();
        assert_eq!(config_content, indoc! {r#"
            user_agent = "custom-agent/1.0"
        "#});
    }

    #[test]
    fn test_appending_value_keeps_comments() {
        let config_before = indoc! {r#"
            # my preferred page size
            page_size = 25
        "#};

        let config_content = Config::write_to(
            Some(config_before.to_string()),
            &Key::parse("user_agent").unwrap(),
            Some("custom-agent/1.0"),
        )
        .unwrap();
        assert_eq!(config_content, indoc! {r#"
            # my preferred page size
            page_size = 25
            user_agent = "custom-agent/1.0"
        "#});
    }

    #[test]
    fn test_writing_invalid_key() {
        let config_content =
            Config::write_to(None, &Key::parse("does_not_exist").unwrap(), Some("true"));
        assert!(matches!(config_content, Err(ReadWriteError::InvalidKey(_))));
    }

    #[test]
    fn test_remove() {
        let config_before = indoc! {r#"
            page_size = 25
        "#};

        let config_content = Config::write_to(
            Some(config_before.to_string()),
            &Key::parse("page_size").unwrap(),
            None::<()>,
        )
        .unwrap();
        assert_eq!(config_content, indoc! {""});
    }

    #[test]
    fn test_remove_not_present() {
        let config_content =
            Config::write_to(Some(String::new()), &Key::parse("page_size").unwrap(), None::<()>);
        assert!(matches!(
            config_content,
            Err(ReadWriteError::NotAUserValue(_))
        ));
    }
}
