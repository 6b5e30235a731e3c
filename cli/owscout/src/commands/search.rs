use std::num::NonZeroU8;
use std::time::Duration;

use anyhow::Result;
use bpaf::Bpaf;
use owscout_sdk::models::search::SearchSession;
use tracing::{debug, instrument};

use crate::commands::{Owscout, catalogue_error, resolve_page_size};
use crate::config::Config;
use crate::utils::dialog::{Dialog, Spinner};
use crate::utils::message;
use crate::utils::search::{DisplayResultPage, build_filter, range_label};

// Search the catalogue and print one page of results
#[derive(Debug, Bpaf, Clone)]
pub struct Search {
    /// Display search results as a JSON array
    #[bpaf(long)]
    pub json: bool,

    /// Catalogue connection to search (defaults to the selected one)
    #[bpaf(long, short, argument("NAME"))]
    pub connection: Option<String>,

    /// Spatial filter as 'west,south,east,north' in degrees
    #[bpaf(long, argument("BBOX"))]
    pub bbox: Option<String>,

    /// Records per page
    #[bpaf(long, argument("N"))]
    pub page_size: Option<NonZeroU8>,

    /// Keyword text matched anywhere in the record
    #[bpaf(positional("keywords"))]
    pub keywords: Option<String>,
}

impl Search {
    #[instrument(name = "search", fields(json = self.json), skip_all)]
    pub async fn handle(self, config: Config, scout: Owscout) -> Result<()> {
        let filter = build_filter(self.bbox.as_deref(), self.keywords.as_deref())?;
        let connection = scout.resolve_catalogue(self.connection.as_deref())?;
        let client = scout.catalogue_client(connection.url.as_str())?;
        let page_size = resolve_page_size(&config, self.page_size);

        debug!(
            catalogue = %connection.url,
            page_size,
            "searching catalogue"
        );

        let session = Dialog {
            message: "Searching catalogue...",
            help_message: None,
            typed: Spinner::new(|| {
                tokio::runtime::Handle::current().block_on(SearchSession::start(
                    &client,
                    filter,
                    page_size,
                ))
            }),
        }
        .spin_with_delay(Duration::from_secs(1))
        .map_err(catalogue_error)?;

        if self.json {
            debug!("printing search results as JSON");
            let json = serde_json::to_string(&session.page().records)?;
            println!("{json}");
            return Ok(());
        }

        message::plain(range_label(session.page()));
        if session.is_empty() {
            return Ok(());
        }

        println!("{}", DisplayResultPage::new(session.page()));

        if session.can_navigate() {
            message::plain(format!(
                "\nUse 'owscout browse' to page through all {} results.",
                session.page().matches
            ));
        }
        Ok(())
    }
}
