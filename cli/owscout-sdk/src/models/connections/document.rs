//! Bulk import and export of catalogue connections.
//!
//! The interchange format is the XML document desktop GIS clients exchange:
//! a `qgcCSWConnections` root with one `<csw name="..." url="..."/>`
//! element per connection. Keeping that sentinel root tag means files
//! exported elsewhere import here unchanged.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use super::{Connection, ConnectionRegistry, Namespace, RegistryError};

/// Root element a connections document must carry.
pub const CONNECTIONS_ROOT_TAG: &str = "qgcCSWConnections";

/// Well-known public catalogues, importable via `connections defaults`.
///
/// Shipped in the interchange format and run through the same parser as
/// user-supplied files.
const DEFAULT_CONNECTIONS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<qgcCSWConnections version="1.0">
  <csw name="Data.gov CSW" url="https://catalog.data.gov/csw-all"/>
  <csw name="Geonorge" url="https://www.geonorge.no/geonetwork/srv/nor/csw"/>
  <csw name="INSPIRE Geoportal" url="https://inspire-geoportal.ec.europa.eu/GeoportalProxyWebServices/resources/OGCCSW202"/>
  <csw name="NOAA Data Catalog" url="https://data.noaa.gov/csw"/>
  <csw name="UK Location Catalogue" url="https://csw.data.gov.uk/geonetwork/srv/en/csw"/>
</qgcCSWConnections>
"#;

/// Errors reading or decoding a connections document.
///
/// A failing document is rejected whole; the registry is never left with a
/// partial import.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot open connections file")]
    Read(#[source] std::io::Error),
    #[error("cannot parse connections XML")]
    Parse(#[from] quick_xml::Error),
    #[error("malformed connections XML attribute")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("not a catalogue connections document (root element '{0}')")]
    InvalidRoot(String),
    #[error("connections document has no root element")]
    Empty,
    #[error("connection entry is missing the '{0}' attribute")]
    MissingAttribute(&'static str),
    #[error("connection '{name}' has an invalid URL")]
    InvalidUrl {
        name: String,
        #[source]
        source: url::ParseError,
    },
}

/// What an import did, per entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Read and decode a connections file.
pub fn read_document(path: impl AsRef<Path>) -> Result<Vec<Connection>, DocumentError> {
    let contents = std::fs::read_to_string(path).map_err(DocumentError::Read)?;
    parse_document(&contents)
}

/// Decode a connections document.
pub fn parse_document(xml: &str) -> Result<Vec<Connection>, DocumentError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut connections = Vec::new();
    let mut root_checked = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
                if !root_checked {
                    if name != CONNECTIONS_ROOT_TAG {
                        return Err(DocumentError::InvalidRoot(name));
                    }
                    root_checked = true;
                } else if name == "csw" {
                    connections.push(read_entry(&element)?);
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !root_checked {
        return Err(DocumentError::Empty);
    }

    Ok(connections)
}

/// Encode connections in the interchange format.
pub fn render_document(connections: &[Connection]) -> Result<String, DocumentError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .create_element(CONNECTIONS_ROOT_TAG)
        .with_attribute(("version", "1.0"))
        .write_inner_content(|w| -> std::io::Result<()> {
            for connection in connections {
                w.create_element("csw")
                    .with_attributes([
                        ("name", connection.name.as_str()),
                        ("url", connection.url.as_str()),
                    ])
                    .write_empty()?;
            }
            Ok(())
        })
        .map_err(|e| DocumentError::Parse(e.into()))?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// The built-in default catalogue list.
pub fn default_connections() -> Result<Vec<Connection>, DocumentError> {
    parse_document(DEFAULT_CONNECTIONS_XML)
}

/// Import decoded connections into the catalogue namespace.
///
/// Every name collision is put to `overwrite`; declining keeps the existing
/// entry (and its URL) and moves on. The decision is requested per entry,
/// when the collision is found.
pub fn import_connections(
    registry: &ConnectionRegistry,
    incoming: Vec<Connection>,
    mut overwrite: impl FnMut(&Connection) -> bool,
) -> Result<ImportOutcome, RegistryError> {
    let mut outcome = ImportOutcome::default();

    for connection in incoming {
        if registry.get(Namespace::Catalogue, &connection.name)?.is_some() {
            if !overwrite(&connection) {
                outcome.skipped += 1;
                continue;
            }
            registry.set(Namespace::Catalogue, connection)?;
            outcome.updated += 1;
        } else {
            registry.set(Namespace::Catalogue, connection)?;
            outcome.added += 1;
        }
    }

    Ok(outcome)
}

fn read_entry(element: &BytesStart) -> Result<Connection, DocumentError> {
    let name = attr_value(element, "name")?.ok_or(DocumentError::MissingAttribute("name"))?;
    let url = attr_value(element, "url")?.ok_or(DocumentError::MissingAttribute("url"))?;
    let url = url.parse().map_err(|source| DocumentError::InvalidUrl {
        name: name.clone(),
        source,
    })?;
    Ok(Connection { name, url })
}

fn attr_value(element: &BytesStart, name: &str) -> Result<Option<String>, DocumentError> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == name.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn registry() -> (TempDir, ConnectionRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = ConnectionRegistry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn parses_connection_entries() {
        let xml = indoc! {r#"
            <qgcCSWConnections version="1.0">
              <csw name="Demo" url="https://demo.example/csw"/>
              <csw name="Other" url="https://other.example/csw"/>
            </qgcCSWConnections>
        "#};

        let connections = parse_document(xml).unwrap();
        let names: Vec<_> = connections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Demo", "Other"]);
    }

    #[test]
    fn rejects_wrong_root_tag() {
        let xml = r#"<connections><csw name="Demo" url="https://demo.example/csw"/></connections>"#;
        let err = parse_document(xml).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRoot(root) if root == "connections"));
    }

    #[test]
    fn rejects_entries_without_a_url() {
        let xml = r#"<qgcCSWConnections><csw name="Demo"/></qgcCSWConnections>"#;
        let err = parse_document(xml).unwrap_err();
        assert!(matches!(err, DocumentError::MissingAttribute("url")));
    }

    #[test]
    fn rejected_document_leaves_the_registry_unchanged() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, Connection {
                name: "existing".to_string(),
                url: "https://existing.example/csw".parse().unwrap(),
            })
            .unwrap();
        let before = registry.list(Namespace::Catalogue).unwrap();

        let err = parse_document("<wrongRoot/>").unwrap_err();
        assert!(matches!(err, DocumentError::InvalidRoot(_)));

        assert_eq!(registry.list(Namespace::Catalogue).unwrap(), before);
    }

    #[test]
    fn declining_overwrite_keeps_the_original_url() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, Connection {
                name: "Demo".to_string(),
                url: "https://original.example/csw".parse().unwrap(),
            })
            .unwrap();

        let incoming = vec![
            Connection {
                name: "Demo".to_string(),
                url: "https://replacement.example/csw".parse().unwrap(),
            },
            Connection {
                name: "Fresh".to_string(),
                url: "https://fresh.example/csw".parse().unwrap(),
            },
        ];

        let outcome = import_connections(&registry, incoming, |_| false).unwrap();
        assert_eq!(outcome, ImportOutcome {
            added: 1,
            updated: 0,
            skipped: 1,
        });
        assert_eq!(
            registry
                .get(Namespace::Catalogue, "Demo")
                .unwrap()
                .unwrap()
                .url
                .as_str(),
            "https://original.example/csw"
        );
        assert!(registry.get(Namespace::Catalogue, "Fresh").unwrap().is_some());
    }

    #[test]
    fn accepting_overwrite_replaces_the_url() {
        let (_dir, registry) = registry();
        registry
            .set(Namespace::Catalogue, Connection {
                name: "Demo".to_string(),
                url: "https://original.example/csw".parse().unwrap(),
            })
            .unwrap();

        let incoming = vec![Connection {
            name: "Demo".to_string(),
            url: "https://replacement.example/csw".parse().unwrap(),
        }];

        let outcome = import_connections(&registry, incoming, |_| true).unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(
            registry
                .get(Namespace::Catalogue, "Demo")
                .unwrap()
                .unwrap()
                .url
                .as_str(),
            "https://replacement.example/csw"
        );
    }

    #[test]
    fn export_and_import_round_trip() {
        let connections = vec![
            Connection {
                name: "A".to_string(),
                url: "https://a.example/csw".parse().unwrap(),
            },
            Connection {
                name: "B & co".to_string(),
                url: "https://b.example/csw?x=1".parse().unwrap(),
            },
        ];

        let rendered = render_document(&connections).unwrap();
        assert!(rendered.starts_with(&format!("<{CONNECTIONS_ROOT_TAG}")));
        let parsed = parse_document(&rendered).unwrap();
        assert_eq!(parsed, connections);
    }

    #[test]
    fn default_connections_parse() {
        let defaults = default_connections().unwrap();
        assert!(!defaults.is_empty());
        assert!(defaults.iter().all(|c| c.url.scheme() == "https"));
    }
}
