//! Stateful paging over a catalogue result set.
//!
//! The cursor plans navigation as pure decisions; a wrap around either end
//! of the result set is only applied once the caller confirms *that*
//! decision. A declined wrap leaves the cursor untouched and triggers no
//! query.

use owscout_csw::{ClientTrait, CswError, ResultPage, SearchFilter};
use tracing::debug;

/// Which end of the result set a navigation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Start,
    End,
}

/// A navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    First,
    Prev,
    Next,
    Last,
}

/// The planned effect of a navigation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Query at this offset.
    Jump(u32),
    /// The command ran off `edge`; wrapping would query at `to`. Requires a
    /// fresh confirmation before it is applied.
    Wrap { edge: Edge, to: u32 },
}

/// Paging state: current offset, page size, and the match count of the last
/// successful query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    start: u32,
    page_size: u32,
    matches: u32,
}

impl PageCursor {
    pub fn new(page_size: u32) -> Self {
        PageCursor {
            start: 0,
            page_size,
            matches: 0,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn matches(&self) -> u32 {
        self.matches
    }

    /// Whether paging controls apply to this result set.
    ///
    /// Derived, never stored: navigation exists exactly when the result set
    /// reaches a full page.
    pub fn can_navigate(&self) -> bool {
        self.matches >= self.page_size
    }

    /// Plan a navigation command against the current state.
    ///
    /// The cursor is not modified; apply the plan by querying at the target
    /// offset and committing the result.
    pub fn plan(&self, command: NavCommand) -> Move {
        match command {
            NavCommand::First => Move::Jump(0),
            NavCommand::Last => Move::Jump(self.last_offset()),
            NavCommand::Next => {
                let target = self.start + self.page_size;
                if target >= self.matches {
                    Move::Wrap {
                        edge: Edge::End,
                        to: 0,
                    }
                } else {
                    Move::Jump(target)
                }
            },
            NavCommand::Prev => {
                let target = i64::from(self.start) - i64::from(self.page_size);
                // Landing exactly on zero also counts as running off the
                // start; only `first` goes back to offset zero.
                if target <= 0 {
                    Move::Wrap {
                        edge: Edge::Start,
                        to: self.last_offset(),
                    }
                } else {
                    Move::Jump(target as u32)
                }
            },
        }
    }

    fn last_offset(&self) -> u32 {
        self.matches.saturating_sub(self.page_size)
    }
}

/// One search over one catalogue: the stored filter, the paging cursor, and
/// the currently displayed page.
///
/// Navigation always re-queries with the filter captured at
/// [`SearchSession::start`], not whatever the input form holds by then.
#[derive(Debug)]
pub struct SearchSession<'a, C> {
    client: &'a C,
    filter: SearchFilter,
    cursor: PageCursor,
    page: ResultPage,
}

impl<'a, C: ClientTrait> SearchSession<'a, C> {
    /// Run the initial query at offset zero.
    ///
    /// On failure no session exists, so whatever the caller displayed
    /// before stays untouched.
    pub async fn start(
        client: &'a C,
        filter: SearchFilter,
        page_size: u32,
    ) -> Result<SearchSession<'a, C>, CswError> {
        let page = client.get_records(&filter, page_size, 0).await?;
        debug!(matches = page.matches, "search session started");

        let mut cursor = PageCursor::new(page_size);
        cursor.matches = page.matches;

        Ok(SearchSession {
            client,
            filter,
            cursor,
            page,
        })
    }

    pub fn page(&self) -> &ResultPage {
        &self.page
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// A terminal empty page: the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.page.matches == 0
    }

    pub fn can_navigate(&self) -> bool {
        self.cursor.can_navigate()
    }

    pub fn plan(&self, command: NavCommand) -> Move {
        self.cursor.plan(command)
    }

    /// Query the stored filter at `start` and replace the displayed page.
    ///
    /// The cursor only advances when the query succeeds; a failed
    /// navigation keeps the previous page displayed.
    pub async fn goto(&mut self, start: u32) -> Result<&ResultPage, CswError> {
        let page = self
            .client
            .get_records(&self.filter, self.cursor.page_size, start)
            .await?;

        self.cursor.start = start;
        // Servers may gain or lose records between queries.
        self.cursor.matches = page.matches;
        self.page = page;
        Ok(&self.page)
    }
}

#[cfg(test)]
mod tests {
    use owscout_csw::{MockClient, Record};
    use pretty_assertions::assert_eq;

    use super::*;

    fn cursor(start: u32, page_size: u32, matches: u32) -> PageCursor {
        PageCursor {
            start,
            page_size,
            matches,
        }
    }

    fn page(matches: u32, returned: u32) -> ResultPage {
        ResultPage {
            matches,
            returned,
            start_position: 0,
            records: (0..returned)
                .map(|i| Record {
                    identifier: format!("rec-{i}"),
                    title: format!("Record {i}"),
                    type_: "dataset".to_string(),
                    abstract_: None,
                    bbox: None,
                    uris: vec![],
                    references: vec![],
                })
                .collect(),
        }
    }

    #[test]
    fn next_at_the_end_plans_a_wrap_to_the_start() {
        let plan = cursor(20, 10, 25).plan(NavCommand::Next);
        assert_eq!(plan, Move::Wrap {
            edge: Edge::End,
            to: 0,
        });
    }

    #[test]
    fn next_in_the_middle_jumps_one_page() {
        let plan = cursor(0, 10, 25).plan(NavCommand::Next);
        assert_eq!(plan, Move::Jump(10));
    }

    #[test]
    fn last_jumps_to_matches_minus_page_size() {
        let plan = cursor(0, 10, 25).plan(NavCommand::Last);
        assert_eq!(plan, Move::Jump(15));
    }

    #[test]
    fn prev_at_or_below_zero_plans_a_wrap_to_the_end() {
        // Landing exactly on zero wraps too; only `first` reaches offset 0.
        let plan = cursor(10, 10, 25).plan(NavCommand::Prev);
        assert_eq!(plan, Move::Wrap {
            edge: Edge::Start,
            to: 15,
        });

        let plan = cursor(0, 10, 25).plan(NavCommand::Prev);
        assert_eq!(plan, Move::Wrap {
            edge: Edge::Start,
            to: 15,
        });
    }

    #[test]
    fn prev_in_the_middle_jumps_back_one_page() {
        let plan = cursor(20, 10, 25).plan(NavCommand::Prev);
        assert_eq!(plan, Move::Jump(10));
    }

    #[test]
    fn navigation_requires_a_full_page_of_matches() {
        assert!(!cursor(0, 10, 0).can_navigate());
        assert!(!cursor(0, 10, 9).can_navigate());
        assert!(cursor(0, 10, 10).can_navigate());
        assert!(cursor(0, 10, 25).can_navigate());
    }

    #[tokio::test]
    async fn declined_wrap_leaves_the_cursor_and_issues_no_query() {
        let client = MockClient::new();
        client.push_records_response(page(25, 10));

        let mut session = SearchSession::start(&client, SearchFilter::Unconstrained, 10)
            .await
            .unwrap();

        // Reach offset 20 via a scripted page.
        client.push_records_response(page(25, 5));
        session.goto(20).await.unwrap();

        let plan = session.plan(NavCommand::Next);
        assert_eq!(plan, Move::Wrap {
            edge: Edge::End,
            to: 0,
        });

        // The caller declines: nothing is committed and nothing is queried.
        assert_eq!(session.cursor().start(), 20);
        assert_eq!(client.remaining_responses(), 0);
    }

    #[tokio::test]
    async fn accepted_wrap_queries_at_the_wrapped_offset() {
        let client = MockClient::new();
        client.push_records_response(page(25, 5));

        let mut session = SearchSession::start(&client, SearchFilter::Unconstrained, 10)
            .await
            .unwrap();
        client.push_records_response(page(25, 5));
        session.goto(20).await.unwrap();

        let Move::Wrap { to, .. } = session.plan(NavCommand::Next) else {
            panic!("expected a wrap");
        };
        client.push_records_response(page(25, 10));
        session.goto(to).await.unwrap();
        assert_eq!(session.cursor().start(), 0);
        assert_eq!(session.page().returned, 10);
    }

    #[tokio::test]
    async fn failed_navigation_keeps_the_previous_page() {
        let client = MockClient::new();
        client.push_records_response(page(25, 10));

        let mut session = SearchSession::start(&client, SearchFilter::Unconstrained, 10)
            .await
            .unwrap();

        client.push_exception_response(owscout_csw::ExceptionReport {
            code: Some("NoApplicableCode".to_string()),
            locator: None,
            text: "transient fault".to_string(),
        });
        session.goto(10).await.unwrap_err();

        assert_eq!(session.cursor().start(), 0);
        assert_eq!(session.page().returned, 10);
    }

    #[tokio::test]
    async fn empty_result_set_is_terminal() {
        let client = MockClient::new();
        client.push_records_response(page(0, 0));

        let session = SearchSession::start(&client, SearchFilter::Unconstrained, 10)
            .await
            .unwrap();
        assert!(session.is_empty());
        assert!(!session.can_navigate());
    }
}
