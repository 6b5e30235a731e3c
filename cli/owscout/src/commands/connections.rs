use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use itertools::Itertools;
use owscout_csw::{ClientTrait, ServiceIdentification};
use owscout_sdk::models::connections::document::{self, ImportOutcome};
use owscout_sdk::models::connections::{Connection, Namespace};
use tracing::instrument;
use url::Url;

use crate::commands::{Owscout, catalogue_error};
use crate::utils::dialog::{Confirm, Dialog, Spinner};
use crate::utils::message;

/// Manage catalogue connections
#[derive(Bpaf, Clone)]
pub enum ConnectionsCommands {
    /// List the catalogue connections
    #[bpaf(command)]
    List,

    /// Add a catalogue connection
    #[bpaf(command)]
    Add {
        /// Connection name
        #[bpaf(positional("NAME"))]
        name: String,
        /// CSW endpoint URL
        #[bpaf(positional("URL"))]
        url: Url,
    },

    /// Remove a catalogue connection
    #[bpaf(command)]
    Remove {
        /// Connection name
        #[bpaf(positional("NAME"))]
        name: String,
    },

    /// Select the catalogue that search and browse use
    #[bpaf(command)]
    Select {
        /// Connection name
        #[bpaf(positional("NAME"))]
        name: String,
    },

    /// Show the service metadata of a catalogue
    #[bpaf(command)]
    Info {
        /// Connection to inspect (defaults to the selected one)
        #[bpaf(positional("NAME"))]
        name: Option<String>,
    },

    /// Import catalogue connections from an XML document
    #[bpaf(command)]
    Import {
        /// Connections file to read
        #[bpaf(positional("FILE"))]
        file: PathBuf,
    },

    /// Export the catalogue connections as an XML document
    #[bpaf(command)]
    Export {
        /// Write to this file instead of stdout
        #[bpaf(long, short, argument("FILE"))]
        file: Option<PathBuf>,
    },

    /// Add the built-in default catalogues
    #[bpaf(command)]
    Defaults,
}

impl ConnectionsCommands {
    #[instrument(name = "connections", skip_all)]
    pub async fn handle(self, scout: Owscout) -> Result<()> {
        match self {
            ConnectionsCommands::List => list(&scout),
            ConnectionsCommands::Add { name, url } => add(&scout, name, url),
            ConnectionsCommands::Remove { name } => remove(&scout, &name),
            ConnectionsCommands::Select { name } => {
                scout.registry.set_selected(Namespace::Catalogue, &name)?;
                message::updated(format!("'{name}' is now the selected catalogue"));
                Ok(())
            },
            ConnectionsCommands::Info { name } => info(&scout, name.as_deref()).await,
            ConnectionsCommands::Import { file } => {
                let incoming = document::read_document(&file)
                    .with_context(|| format!("Cannot load connections from {}", file.display()))?;
                let outcome = import(&scout, incoming)?;
                report_import(outcome);
                Ok(())
            },
            ConnectionsCommands::Export { file } => export(&scout, file).await,
            ConnectionsCommands::Defaults => {
                let incoming = document::default_connections()?;
                let outcome = import(&scout, incoming)?;
                report_import(outcome);
                message::plain("Default connections added");
                Ok(())
            },
        }
    }
}

fn list(scout: &Owscout) -> Result<()> {
    let entries = scout.registry.list(Namespace::Catalogue)?;
    if entries.is_empty() {
        message::plain(
            "No catalogue connections. Add one with 'owscout connections add' \
             or load the built-in list with 'owscout connections defaults'.",
        );
        return Ok(());
    }

    let selected = scout.registry.selected(Namespace::Catalogue)?;
    let name_width = entries
        .iter()
        .map(|connection| connection.name.len())
        .max()
        .unwrap_or_default();

    let rows = entries
        .iter()
        .map(|connection| {
            let marker = if selected.as_ref().is_some_and(|s| s.name == connection.name) {
                "*"
            } else {
                " "
            };
            format!(
                "{marker} {:<name_width$}  {}",
                connection.name, connection.url
            )
        })
        .join("\n");
    println!("{rows}");
    Ok(())
}

fn add(scout: &Owscout, name: String, url: Url) -> Result<()> {
    if scout.registry.get(Namespace::Catalogue, &name)?.is_some() {
        let overwrite = if Dialog::can_prompt() {
            Dialog {
                message: &format!("Connection '{name}' exists. Overwrite?"),
                help_message: None,
                typed: Confirm {
                    default: Some(false),
                },
            }
            .raw_prompt()?
        } else {
            false
        };

        if !overwrite {
            message::plain(format!("Kept the existing '{name}' connection."));
            return Ok(());
        }
    }

    let first_connection = scout.registry.selected(Namespace::Catalogue)?.is_none();
    scout.registry.set(Namespace::Catalogue, Connection {
        name: name.clone(),
        url,
    })?;
    if first_connection {
        scout.registry.set_selected(Namespace::Catalogue, &name)?;
    }

    message::created(format!("Added catalogue connection '{name}'"));
    Ok(())
}

fn remove(scout: &Owscout, name: &str) -> Result<()> {
    if Dialog::can_prompt() {
        let confirmed = Dialog {
            message: &format!("Remove service '{name}'?"),
            help_message: None,
            typed: Confirm {
                default: Some(false),
            },
        }
        .raw_prompt()?;
        if !confirmed {
            return Ok(());
        }
    }

    scout.registry.remove(Namespace::Catalogue, name)?;
    message::deleted(format!("Removed catalogue connection '{name}'"));
    Ok(())
}

async fn info(scout: &Owscout, name: Option<&str>) -> Result<()> {
    let connection = scout.resolve_catalogue(name)?;
    let client = scout.catalogue_client(connection.url.as_str())?;

    let identification = Dialog {
        message: "Connecting to catalogue...",
        help_message: None,
        typed: Spinner::new(|| tokio::runtime::Handle::current().block_on(client.capabilities())),
    }
    .spin_with_delay(Duration::from_secs(1))
    .map_err(catalogue_error)?;

    println!("{}", render_identification(&connection, &identification));
    Ok(())
}

fn render_identification(
    connection: &Connection,
    identification: &ServiceIdentification,
) -> String {
    let mut lines = vec![
        format!("{} ({})", connection.name, connection.url),
        format!(
            "  title:    {}",
            identification.title.as_deref().unwrap_or("(none)")
        ),
    ];
    if let Some(abstract_) = identification.abstract_.as_deref() {
        lines.push(format!("  abstract: {}", abstract_.trim()));
    }
    if !identification.keywords.is_empty() {
        lines.push(format!("  keywords: {}", identification.keywords.join(", ")));
    }
    if let (Some(service_type), Some(version)) = (
        identification.service_type.as_deref(),
        identification.service_type_version.as_deref(),
    ) {
        lines.push(format!("  service:  {service_type} {version}"));
    }
    if let Some(provider) = identification.provider_name.as_deref() {
        lines.push(format!("  provider: {provider}"));
    }
    lines.join("\n")
}

/// Shared by `import` and `defaults`: duplicates prompt per entry; without
/// a terminal every duplicate keeps its existing URL.
fn import(scout: &Owscout, incoming: Vec<Connection>) -> Result<ImportOutcome> {
    let outcome = document::import_connections(&scout.registry, incoming, |connection| {
        if !Dialog::can_prompt() {
            return false;
        }
        Dialog {
            message: &format!("'{}' exists. Overwrite?", connection.name),
            help_message: None,
            typed: Confirm {
                default: Some(false),
            },
        }
        .raw_prompt()
        .unwrap_or(false)
    })?;
    Ok(outcome)
}

fn report_import(outcome: ImportOutcome) {
    message::updated(format!(
        "Imported {} connections ({} updated)",
        outcome.added, outcome.updated
    ));
    if outcome.skipped > 0 {
        message::warning(format!(
            "{} existing connections kept unchanged",
            outcome.skipped
        ));
    }
}

async fn export(scout: &Owscout, file: Option<PathBuf>) -> Result<()> {
    let entries = scout.registry.list(Namespace::Catalogue)?;
    let rendered = document::render_document(&entries)?;

    match file {
        Some(path) => {
            tokio::fs::write(&path, &rendered)
                .await
                .with_context(|| format!("Could not write {}", path.display()))?;
            message::updated(format!(
                "Exported {} connections to {}",
                entries.len(),
                path.display()
            ));
        },
        None => println!("{rendered}"),
    }
    Ok(())
}
