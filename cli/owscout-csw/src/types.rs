//! Catalogue domain types.
//!
//! These are the parsed forms of the Dublin Core records and OWS common
//! blocks that CSW responses carry. A [`Record`] lives for exactly one
//! result page; the next query replaces the page wholesale.

use serde::{Deserialize, Serialize};

/// A rectangular spatial extent in degrees (west, south, east, north).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// The whole-globe extent.
    pub const GLOBAL: BoundingBox = BoundingBox {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    /// Whether this bbox covers the entire globe exactly.
    ///
    /// A global bbox is semantically "no spatial filter": sending it as an
    /// explicit constraint makes servers drop records that carry no bbox.
    pub fn is_global(&self) -> bool {
        *self == Self::GLOBAL
    }
}

/// One service or resource link attached to a record.
///
/// CSW Dublin Core records carry links in two places: `dc:URI` elements
/// (tagged with a `protocol` attribute) and `dct:references` elements
/// (tagged with a `scheme` attribute). Both shapes collapse into this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub url: String,
}

/// A single catalogue record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub identifier: String,
    pub title: String,
    /// `dc:type`; "unknown" when the record does not carry one.
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    /// `dc:URI` links, in document order.
    pub uris: Vec<Link>,
    /// `dct:references` links, in document order.
    pub references: Vec<Link>,
}

impl Record {
    /// All links of the record: uris first, then references.
    ///
    /// Encounter order defines precedence when several links advertise the
    /// same service kind.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.uris.iter().chain(self.references.iter())
    }
}

/// One page of a catalogue result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Total records matching the query on the server.
    pub matches: u32,
    /// Records returned in this page.
    pub returned: u32,
    /// Zero-based offset of the first record in this page.
    pub start_position: u32,
    pub records: Vec<Record>,
}

impl ResultPage {
    /// A page representing an empty result set.
    pub fn empty(start_position: u32) -> Self {
        ResultPage {
            matches: 0,
            returned: 0,
            start_position,
            records: Vec::new(),
        }
    }
}

/// Service metadata from the capabilities document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdentification {
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,
    pub keywords: Vec<String>,
    pub service_type: Option<String>,
    pub service_type_version: Option<String>,
    pub fees: Option<String>,
    pub access_constraints: Option<String>,
    pub provider_name: Option<String>,
}
