use std::fmt::{self, Display};
use std::num::NonZeroU8;
use std::time::Duration;

use anyhow::{Result, bail};
use bpaf::Bpaf;
use owscout_csw::Client;
use owscout_sdk::models::search::{Edge, Move, NavCommand, SearchSession};
use owscout_sdk::models::services::ServiceAssociation;
use tracing::{debug, instrument};

use crate::commands::{Owscout, catalogue_error, register, resolve_page_size};
use crate::config::Config;
use crate::utils::dialog::{Confirm, Dialog, Select, Spinner};
use crate::utils::errors::display_chain;
use crate::utils::message;
use crate::utils::search::{DisplayRecord, DisplayResultPage, build_filter, range_label, service_choices};

// Interactively page through catalogue results
#[derive(Debug, Bpaf, Clone)]
pub struct Browse {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrowseAction {
    Inspect,
    Next,
    Prev,
    First,
    Last,
    Quit,
}

impl Display for BrowseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BrowseAction::Inspect => "Inspect a record",
            BrowseAction::Next => "Next page",
            BrowseAction::Prev => "Previous page",
            BrowseAction::First => "First page",
            BrowseAction::Last => "Last page",
            BrowseAction::Quit => "Quit",
        };
        f.write_str(label)
    }
}

impl Browse {
    #[instrument(name = "browse", skip_all)]
    pub async fn handle(self, config: Config, scout: Owscout) -> Result<()> {
        if !Dialog::can_prompt() {
            bail!("'owscout browse' needs an interactive terminal; use 'owscout search' instead");
        }

        let filter = build_filter(self.bbox.as_deref(), self.keywords.as_deref())?;
        let connection = scout.resolve_catalogue(self.connection.as_deref())?;
        let client = scout.catalogue_client(connection.url.as_str())?;
        let page_size = resolve_page_size(&config, self.page_size);

        debug!(catalogue = %connection.url, "starting browse session");

        let mut session = Dialog {
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

        if session.is_empty() {
            message::plain("0 results");
            return Ok(());
        }

        loop {
            println!("{}", DisplayResultPage::new(session.page()));

            let mut actions = vec![BrowseAction::Inspect];
            if session.can_navigate() {
                actions.extend([
                    BrowseAction::Next,
                    BrowseAction::Prev,
                    BrowseAction::First,
                    BrowseAction::Last,
                ]);
            }
            actions.push(BrowseAction::Quit);

            let label = range_label(session.page());
            let (_, action) = Dialog {
                message: &label,
                help_message: None,
                typed: Select { options: actions },
            }
            .raw_prompt()?;

            let command = match action {
                BrowseAction::Next => Some(NavCommand::Next),
                BrowseAction::Prev => Some(NavCommand::Prev),
                BrowseAction::First => Some(NavCommand::First),
                BrowseAction::Last => Some(NavCommand::Last),
                BrowseAction::Inspect => {
                    inspect_record(&scout, &session).await?;
                    None
                },
                BrowseAction::Quit => break,
            };

            let Some(command) = command else {
                continue;
            };

            // Wrap decisions are asked for and consumed right here; a
            // declined wrap changes nothing and issues no query.
            let target = match session.plan(command) {
                Move::Jump(target) => Some(target),
                Move::Wrap { edge, to } => {
                    let question = match edge {
                        Edge::End => "End of results. Go to start?",
                        Edge::Start => "Start of results. Go to end?",
                    };
                    let confirmed = Dialog {
                        message: question,
                        help_message: None,
                        typed: Confirm {
                            default: Some(false),
                        },
                    }
                    .raw_prompt()?;
                    confirmed.then_some(to)
                },
            };

            if let Some(target) = target {
                let result = Dialog {
                    message: "Fetching results...",
                    help_message: None,
                    typed: Spinner::new(|| {
                        tokio::runtime::Handle::current().block_on(session.goto(target))
                    }),
                }
                .spin_with_delay(Duration::from_secs(1));

                // The session keeps the previous page on failure; report
                // and carry on.
                if let Err(err) = result {
                    message::error(display_chain(&catalogue_error(err)));
                }
            }
        }

        Ok(())
    }
}

/// Show one record of the current page and offer its service endpoints for
/// registration.
async fn inspect_record(scout: &Owscout, session: &SearchSession<'_, Client>) -> Result<()> {
    let records = &session.page().records;
    if records.is_empty() {
        message::plain("No records on this page.");
        return Ok(());
    }

    let titles: Vec<String> = records
        .iter()
        .map(|record| format!("{} ({})", record.title, record.type_))
        .collect();
    let (index, _) = Dialog {
        message: "Inspect which record?",
        help_message: None,
        typed: Select { options: titles },
    }
    .raw_prompt()?;

    let record = &records[index];
    let services = ServiceAssociation::classify(record);
    println!("{}", DisplayRecord::new(record, &services));

    let choices = service_choices(&services);
    if choices.is_empty() {
        return Ok(());
    }

    let mut options: Vec<String> = choices.iter().map(|(_, label)| label.clone()).collect();
    options.push("Back".to_string());
    let (choice, _) = Dialog {
        message: "Register an endpoint?",
        help_message: None,
        typed: Select { options },
    }
    .raw_prompt()?;

    if let Some((kind, _)) = choices.get(choice) {
        let url = services
            .get(*kind)
            .expect("offered endpoints have a URL")
            .to_string();
        if let Err(err) = register::register_endpoint(scout, *kind, &url, None).await {
            message::error(display_chain(&err));
        }
    }

    Ok(())
}
