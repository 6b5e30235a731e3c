//! Search filter model.
//!
//! Translates user-entered bounding box and keyword text into the
//! constraint set sent with a GetRecords request. The model mirrors what
//! the wire encoding needs: zero constraints (unconstrained search), a
//! single constraint, or a conjunctive group of several.

use thiserror::Error;

use crate::types::BoundingBox;

/// A user input error detected before any query is attempted.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("bounding box {field} is not a number: '{value}'")]
    InvalidBbox {
        field: &'static str,
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },
}

/// One search constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Records whose extent intersects the given bbox.
    Bbox(BoundingBox),
    /// Records whose full-text field contains the given text.
    ///
    /// The text is used verbatim as a contains-pattern; multi-word input is
    /// not tokenized.
    AnyText(String),
}

/// The constraint set of one search.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchFilter {
    #[default]
    Unconstrained,
    Single(Constraint),
    /// Conjunctive group; only ever built with two or more constraints.
    All(Vec<Constraint>),
}

impl SearchFilter {
    /// Build the filter for a search over `bbox` and `keywords`.
    ///
    /// A global bbox adds no spatial constraint: with an explicit spatial
    /// filter present, servers exclude records that carry no bbox, which
    /// changes the result set for a search that meant "anywhere". Empty
    /// keyword text adds no text constraint.
    pub fn build(bbox: &BoundingBox, keywords: &str) -> SearchFilter {
        let mut constraints = Vec::new();

        if !bbox.is_global() {
            constraints.push(Constraint::Bbox(*bbox));
        }

        if !keywords.is_empty() {
            constraints.push(Constraint::AnyText(keywords.to_string()));
        }

        match constraints.len() {
            0 => SearchFilter::Unconstrained,
            1 => SearchFilter::Single(constraints.remove(0)),
            _ => SearchFilter::All(constraints),
        }
    }

    /// The constraints in encoding order.
    pub fn constraints(&self) -> &[Constraint] {
        match self {
            SearchFilter::Unconstrained => &[],
            SearchFilter::Single(constraint) => std::slice::from_ref(constraint),
            SearchFilter::All(constraints) => constraints,
        }
    }
}

/// Parse the four bounding box fields (west, south, east, north).
///
/// Each field must parse as a float; the first failing field is reported.
pub fn parse_bbox(
    west: &str,
    south: &str,
    east: &str,
    north: &str,
) -> Result<BoundingBox, FilterError> {
    let parse = |field: &'static str, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|source| FilterError::InvalidBbox {
                field,
                value: value.to_string(),
                source,
            })
    };

    Ok(BoundingBox {
        west: parse("west", west)?,
        south: parse("south", south)?,
        east: parse("east", east)?,
        north: parse("north", north)?,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn bbox(west: f64, south: f64, east: f64, north: f64) -> BoundingBox {
        BoundingBox {
            west,
            south,
            east,
            north,
        }
    }

    #[test]
    fn global_bbox_adds_no_spatial_constraint() {
        let filter = SearchFilter::build(&BoundingBox::GLOBAL, "");
        assert_eq!(filter, SearchFilter::Unconstrained);
    }

    #[test]
    fn non_global_bbox_adds_exactly_one_spatial_constraint() {
        let extent = bbox(-10.0, 40.0, 5.0, 55.0);
        let filter = SearchFilter::build(&extent, "");
        assert_eq!(filter, SearchFilter::Single(Constraint::Bbox(extent)));
    }

    #[test]
    fn keywords_are_used_verbatim() {
        let filter = SearchFilter::build(&BoundingBox::GLOBAL, "land cover");
        assert_eq!(
            filter,
            SearchFilter::Single(Constraint::AnyText("land cover".to_string()))
        );
    }

    #[test]
    fn two_constraints_form_a_conjunctive_group() {
        let extent = bbox(-10.0, 40.0, 5.0, 55.0);
        let filter = SearchFilter::build(&extent, "rivers");
        assert_eq!(
            filter,
            SearchFilter::All(vec![
                Constraint::Bbox(extent),
                Constraint::AnyText("rivers".to_string()),
            ])
        );
    }

    #[test]
    fn parse_bbox_reports_the_failing_field() {
        let err = parse_bbox("-10", "forty", "5", "55").unwrap_err();
        let FilterError::InvalidBbox { field, value, .. } = err;
        assert_eq!(field, "south");
        assert_eq!(value, "forty");
    }

    #[test]
    fn parse_bbox_accepts_surrounding_whitespace() {
        let parsed = parse_bbox(" -10 ", "40", "5", " 55").unwrap();
        assert_eq!(parsed, bbox(-10.0, 40.0, 5.0, 55.0));
    }

    proptest! {
        /// The grouping rule: n constraints produce Unconstrained, Single or
        /// All with exactly n entries, and a global bbox never contributes.
        #[test]
        fn constraint_count_matches_inputs(
            west in -180.0..0.0f64,
            keywords in "[a-z ]{0,12}",
            global in proptest::bool::ANY,
        ) {
            let extent = if global {
                BoundingBox::GLOBAL
            } else {
                bbox(west, -90.0, 180.0, 90.0)
            };
            let expected = usize::from(!extent.is_global()) + usize::from(!keywords.is_empty());
            let filter = SearchFilter::build(&extent, &keywords);

            prop_assert_eq!(filter.constraints().len(), expected);
            match filter {
                SearchFilter::Unconstrained => prop_assert_eq!(expected, 0),
                SearchFilter::Single(_) => prop_assert_eq!(expected, 1),
                SearchFilter::All(ref group) => prop_assert_eq!(group.len(), expected),
            }
        }
    }
}
