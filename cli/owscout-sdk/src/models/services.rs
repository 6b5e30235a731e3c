//! Classification of record links into addable OGC service endpoints.

use std::fmt::{self, Display};
use std::str::FromStr;

use owscout_csw::Record;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The OGC service kinds a discovered endpoint can be registered as.
///
/// WMS and WMTS are both map services from the point of view of the
/// connection list and share one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Wms,
    Wfs,
    Wcs,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Wms, ServiceKind::Wfs, ServiceKind::Wcs];

    /// The registry namespace and CLI spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Wms => "wms",
            ServiceKind::Wfs => "wfs",
            ServiceKind::Wcs => "wcs",
        }
    }

    /// The `SERVICE` parameter value of the kind's GetCapabilities request.
    pub fn query_value(&self) -> &'static str {
        match self {
            ServiceKind::Wms => "WMS",
            ServiceKind::Wfs => "WFS",
            ServiceKind::Wcs => "WCS",
        }
    }

    /// Human-readable label, e.g. for prompts.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceKind::Wms => "OGC:WMS/OGC:WMTS",
            ServiceKind::Wfs => "OGC:WFS",
            ServiceKind::Wcs => "OGC:WCS",
        }
    }

    /// Whether an (uppercased) link tag advertises this kind.
    fn recognizes(&self, tag: &str) -> bool {
        match self {
            ServiceKind::Wms => tag == "OGC:WMS" || tag == "OGC:WMTS",
            ServiceKind::Wfs => tag == "OGC:WFS",
            ServiceKind::Wcs => tag == "OGC:WCS",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown service kind '{0}', expected one of: wms, wfs, wcs")]
pub struct ParseServiceKindError(String);

impl FromStr for ServiceKind {
    type Err = ParseServiceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wms" | "wmts" => Ok(ServiceKind::Wms),
            "wfs" => Ok(ServiceKind::Wfs),
            "wcs" => Ok(ServiceKind::Wcs),
            other => Err(ParseServiceKindError(other.to_string())),
        }
    }
}

/// The addable service endpoints of one record, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAssociation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wfs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wcs: Option<String>,
}

impl ServiceAssociation {
    /// Scan a record's links for recognized OGC service endpoints.
    ///
    /// Links are inspected in encounter order (uris before references); the
    /// first link advertising a kind claims that kind's slot. A link's tag
    /// comes from its `scheme` field, falling back to `protocol`; untagged
    /// links are skipped.
    pub fn classify(record: &Record) -> Self {
        let mut association = ServiceAssociation::default();

        for link in record.links() {
            let Some(tag) = link.scheme.as_deref().or(link.protocol.as_deref()) else {
                continue;
            };
            let tag = tag.to_uppercase();

            for kind in ServiceKind::ALL {
                if kind.recognizes(&tag) {
                    let slot = association.slot_mut(kind);
                    if slot.is_none() {
                        *slot = Some(link.url.clone());
                    }
                }
            }
        }

        association
    }

    pub fn get(&self, kind: ServiceKind) -> Option<&str> {
        match kind {
            ServiceKind::Wms => self.wms.as_deref(),
            ServiceKind::Wfs => self.wfs.as_deref(),
            ServiceKind::Wcs => self.wcs.as_deref(),
        }
    }

    /// The kinds this record can be registered as, in fixed order.
    pub fn available(&self) -> Vec<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.available().is_empty()
    }

    fn slot_mut(&mut self, kind: ServiceKind) -> &mut Option<String> {
        match kind {
            ServiceKind::Wms => &mut self.wms,
            ServiceKind::Wfs => &mut self.wfs,
            ServiceKind::Wcs => &mut self.wcs,
        }
    }
}

#[cfg(test)]
mod tests {
    use owscout_csw::Link;
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(uris: Vec<Link>, references: Vec<Link>) -> Record {
        Record {
            identifier: "rec".to_string(),
            title: "Record".to_string(),
            type_: "dataset".to_string(),
            abstract_: None,
            bbox: None,
            uris,
            references,
        }
    }

    fn scheme_link(scheme: &str, url: &str) -> Link {
        Link {
            scheme: Some(scheme.to_string()),
            protocol: None,
            url: url.to_string(),
        }
    }

    fn protocol_link(protocol: &str, url: &str) -> Link {
        Link {
            scheme: None,
            protocol: Some(protocol.to_string()),
            url: url.to_string(),
        }
    }

    #[test]
    fn first_link_per_kind_wins() {
        let record = record(
            vec![
                protocol_link("OGC:WFS", "A"),
                scheme_link("OGC:WMS", "B"),
                scheme_link("OGC:WMS", "C"),
            ],
            vec![],
        );

        let association = ServiceAssociation::classify(&record);
        assert_eq!(association, ServiceAssociation {
            wms: Some("B".to_string()),
            wfs: Some("A".to_string()),
            wcs: None,
        });
    }

    #[test]
    fn uris_take_precedence_over_references() {
        let record = record(
            vec![scheme_link("OGC:WCS", "from-uri")],
            vec![scheme_link("OGC:WCS", "from-references")],
        );

        let association = ServiceAssociation::classify(&record);
        assert_eq!(association.get(ServiceKind::Wcs), Some("from-uri"));
    }

    #[test]
    fn wmts_shares_the_wms_slot() {
        let record = record(
            vec![
                scheme_link("OGC:WMTS", "tiles"),
                scheme_link("OGC:WMS", "maps"),
            ],
            vec![],
        );

        let association = ServiceAssociation::classify(&record);
        assert_eq!(association.get(ServiceKind::Wms), Some("tiles"));
    }

    #[test]
    fn tags_are_compared_case_insensitively() {
        let record = record(vec![scheme_link("ogc:wfs", "A")], vec![]);
        let association = ServiceAssociation::classify(&record);
        assert_eq!(association.get(ServiceKind::Wfs), Some("A"));
    }

    #[test]
    fn untagged_and_unrecognized_links_are_skipped() {
        let record = record(
            vec![
                Link {
                    scheme: None,
                    protocol: None,
                    url: "X".to_string(),
                },
                scheme_link("WWW:LINK", "Y"),
            ],
            vec![],
        );

        let association = ServiceAssociation::classify(&record);
        assert!(association.is_empty());
        assert_eq!(association.available(), Vec::<ServiceKind>::new());
    }

    #[test]
    fn scheme_beats_protocol_on_the_same_link() {
        let link = Link {
            scheme: Some("OGC:WMS".to_string()),
            protocol: Some("OGC:WFS".to_string()),
            url: "Z".to_string(),
        };
        let association = ServiceAssociation::classify(&record(vec![link], vec![]));
        assert_eq!(association.get(ServiceKind::Wms), Some("Z"));
        assert_eq!(association.get(ServiceKind::Wfs), None);
    }
}
