use std::time::Duration;

use anyhow::Result;
use bpaf::Bpaf;
use owscout_csw::ClientTrait;
use owscout_sdk::models::services::ServiceAssociation;
use tracing::instrument;

use crate::commands::{Owscout, catalogue_error};
use crate::utils::dialog::{Dialog, Spinner};
use crate::utils::search::DisplayRecord;

// Show the full metadata of one record
#[derive(Debug, Bpaf, Clone)]
pub struct Show {
    /// Print the raw XML response instead of the parsed metadata
    #[bpaf(long)]
    pub xml: bool,

    /// Catalogue connection to query (defaults to the selected one)
    #[bpaf(long, short, argument("NAME"))]
    pub connection: Option<String>,

    /// Record identifier
    #[bpaf(positional("IDENTIFIER"))]
    pub identifier: String,
}

impl Show {
    #[instrument(name = "show", fields(identifier = self.identifier), skip_all)]
    pub async fn handle(self, scout: Owscout) -> Result<()> {
        let connection = scout.resolve_catalogue(self.connection.as_deref())?;
        let client = scout.catalogue_client(connection.url.as_str())?;

        if self.xml {
            let body = Dialog {
                message: "Fetching record...",
                help_message: None,
                typed: Spinner::new(|| {
                    tokio::runtime::Handle::current()
                        .block_on(client.get_record_xml(&self.identifier))
                }),
            }
            .spin_with_delay(Duration::from_secs(1))
            .map_err(catalogue_error)?;

            println!("{body}");
            return Ok(());
        }

        let record = Dialog {
            message: "Fetching record...",
            help_message: None,
            typed: Spinner::new(|| {
                tokio::runtime::Handle::current().block_on(client.get_record_by_id(&self.identifier))
            }),
        }
        .spin_with_delay(Duration::from_secs(1))
        .map_err(catalogue_error)?;

        let services = ServiceAssociation::classify(&record);
        println!("{}", DisplayRecord::new(&record, &services));
        Ok(())
    }
}
