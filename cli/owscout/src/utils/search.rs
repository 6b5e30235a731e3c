//! Search input parsing and result rendering.

use std::fmt;

use anyhow::{Result, bail};
use itertools::Itertools;
use owscout_csw::{BoundingBox, Record, ResultPage, SearchFilter, parse_bbox};
use owscout_sdk::models::services::{ServiceAssociation, ServiceKind};

/// Build the search filter from the CLI inputs.
///
/// The bounding box is given as one `west,south,east,north` argument; an
/// omitted bbox means the whole globe, which adds no spatial constraint.
pub(crate) fn build_filter(bbox: Option<&str>, keywords: Option<&str>) -> Result<SearchFilter> {
    let bbox = match bbox {
        Some(raw) => {
            let fields: Vec<&str> = raw.split(',').collect();
            let [west, south, east, north] = fields.as_slice() else {
                bail!("invalid bounding box '{raw}', expected 'west,south,east,north'");
            };
            parse_bbox(west, south, east, north)?
        },
        None => BoundingBox::GLOBAL,
    };

    Ok(SearchFilter::build(
        &bbox,
        keywords.unwrap_or_default().trim(),
    ))
}

/// The result range line shown above each page.
pub(crate) fn range_label(page: &ResultPage) -> String {
    if page.matches == 0 {
        return "0 results".to_string();
    }
    format!(
        "Showing {} - {} of {} results",
        page.start_position + 1,
        page.start_position + page.returned,
        page.matches
    )
}

/// One result page rendered as aligned columns: type, title, identifier.
pub(crate) struct DisplayResultPage<'a> {
    page: &'a ResultPage,
}

impl<'a> DisplayResultPage<'a> {
    pub(crate) fn new(page: &'a ResultPage) -> Self {
        DisplayResultPage { page }
    }
}

impl fmt::Display for DisplayResultPage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_width = self
            .page
            .records
            .iter()
            .map(|record| record.type_.len())
            .max()
            .unwrap_or_default();
        let title_width = self
            .page
            .records
            .iter()
            .map(|record| record.title.len())
            .max()
            .unwrap_or_default();

        let rows = self
            .page
            .records
            .iter()
            .map(|record| {
                format!(
                    "{:<type_width$}  {:<title_width$}  {}",
                    record.type_, record.title, record.identifier
                )
            })
            .join("\n");

        write!(f, "{rows}")
    }
}

/// One record rendered in full, with its addable service endpoints.
pub(crate) struct DisplayRecord<'a> {
    record: &'a Record,
    services: &'a ServiceAssociation,
}

impl<'a> DisplayRecord<'a> {
    pub(crate) fn new(record: &'a Record, services: &'a ServiceAssociation) -> Self {
        DisplayRecord { record, services }
    }
}

impl fmt::Display for DisplayRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.record.title)?;
        writeln!(f, "  identifier: {}", self.record.identifier)?;
        writeln!(f, "  type:       {}", self.record.type_)?;

        if let Some(bbox) = &self.record.bbox {
            writeln!(
                f,
                "  extent:     {}, {}, {}, {}",
                bbox.west, bbox.south, bbox.east, bbox.north
            )?;
        }

        match self.record.abstract_.as_deref() {
            Some(abstract_) => writeln!(f, "  abstract:   {}", abstract_.trim())?,
            None => writeln!(f, "  abstract:   (none)")?,
        }

        let available = self.services.available();
        if available.is_empty() {
            write!(f, "  services:   (none recognized)")?;
        } else {
            write!(f, "  services:")?;
            for kind in available {
                let url = self.services.get(kind).unwrap_or_default();
                write!(f, "\n    {}: {url}", kind.label())?;
            }
        }
        Ok(())
    }
}

/// The add-endpoint choices a record's classification offers.
pub(crate) fn service_choices(services: &ServiceAssociation) -> Vec<(ServiceKind, String)> {
    services
        .available()
        .into_iter()
        .map(|kind| (kind, format!("Add {} endpoint to connections", kind.label())))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(type_: &str, title: &str, identifier: &str) -> Record {
        Record {
            identifier: identifier.to_string(),
            title: title.to_string(),
            type_: type_.to_string(),
            abstract_: None,
            bbox: None,
            uris: vec![],
            references: vec![],
        }
    }

    #[test]
    fn range_label_counts_from_one() {
        let page = ResultPage {
            matches: 25,
            returned: 5,
            start_position: 20,
            records: vec![],
        };
        assert_eq!(range_label(&page), "Showing 21 - 25 of 25 results");
    }

    #[test]
    fn range_label_for_empty_result_sets() {
        let page = ResultPage::empty(0);
        assert_eq!(range_label(&page), "0 results");
    }

    #[test]
    fn build_filter_rejects_malformed_bbox_specs() {
        let err = build_filter(Some("-10,40,5"), None).unwrap_err();
        assert!(err.to_string().contains("expected 'west,south,east,north'"));

        let err = build_filter(Some("-10,forty,5,55"), None).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn build_filter_treats_missing_bbox_as_global() {
        let filter = build_filter(None, None).unwrap();
        assert_eq!(filter, SearchFilter::Unconstrained);
    }

    #[test]
    fn display_page_aligns_columns() {
        let page = ResultPage {
            matches: 2,
            returned: 2,
            start_position: 0,
            records: vec![
                record("dataset", "Rivers", "rec-1"),
                record("service", "Elevation model", "rec-2"),
            ],
        };

        let rendered = DisplayResultPage::new(&page).to_string();
        assert_eq!(
            rendered,
            "dataset  Rivers           rec-1\nservice  Elevation model  rec-2"
        );
    }
}
