use std::time::Duration;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use owscout_sdk::models::connections::{Connection, Namespace};
use owscout_sdk::models::services::ServiceKind;
use owscout_sdk::providers::ows::OwsProbe;
use tracing::instrument;
use url::Url;

use crate::commands::Owscout;
use crate::utils::dialog::{Confirm, Dialog, Spinner, Text};
use crate::utils::message;

// Validate a service endpoint and add it to the connection list
#[derive(Debug, Bpaf, Clone)]
pub struct Register {
    /// Connection name (prompted for interactively when omitted)
    #[bpaf(long, short, argument("NAME"))]
    pub name: Option<String>,

    /// Service kind to register: wms, wfs or wcs
    #[bpaf(positional("KIND"))]
    pub kind: ServiceKind,

    /// GetCapabilities endpoint URL
    #[bpaf(positional("URL"))]
    pub url: String,
}

impl Register {
    #[instrument(name = "register", fields(kind = %self.kind), skip_all)]
    pub async fn handle(self, scout: Owscout) -> Result<()> {
        register_endpoint(&scout, self.kind, &self.url, self.name).await
    }
}

/// The registration workflow: probe the endpoint, resolve the connection
/// name, confirm overwrites, persist.
///
/// A failing probe aborts before anything is stored.
pub(crate) async fn register_endpoint(
    scout: &Owscout,
    kind: ServiceKind,
    url: &str,
    name: Option<String>,
) -> Result<()> {
    let parsed_url: Url = url
        .parse()
        .with_context(|| format!("'{url}' is not a valid URL"))?;

    let probe = OwsProbe::new()?;
    Dialog {
        message: &format!("Checking {} endpoint...", kind.label()),
        help_message: None,
        typed: Spinner::new(|| tokio::runtime::Handle::current().block_on(probe.probe(kind, url))),
    }
    .spin_with_delay(Duration::from_secs(1))
    .context("Connection error")?;

    let name = match name {
        Some(name) => name,
        None if Dialog::can_prompt() => {
            Dialog {
                message: &format!("Enter name for {}", kind.label()),
                help_message: None,
                typed: Text { default: None },
            }
            .raw_prompt()?
        },
        None => bail!("a connection name is required; pass it with '--name'"),
    };

    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("a connection name is required");
    }

    let namespace = Namespace::Service(kind);
    if scout.registry.get(namespace, &name)?.is_some() {
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

    scout.registry.set(namespace, Connection {
        name: name.clone(),
        url: parsed_url,
    })?;
    message::updated(format!("Registered {kind} connection '{name}'"));
    Ok(())
}
