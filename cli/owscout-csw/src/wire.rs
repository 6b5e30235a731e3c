//! Encoding and decoding of the CSW 2.0.2 wire format.
//!
//! Requests are POSTed as XML documents; responses are Dublin Core record
//! sets. Only the subset of the protocol the search workflow uses is
//! covered: GetCapabilities, GetRecords with BBOX/PropertyIsLike filters,
//! and GetRecordById.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesStart, BytesText, Event};

use crate::error::{ExceptionReport, WireError};
use crate::filter::{Constraint, SearchFilter};
use crate::types::{BoundingBox, Link, Record, ServiceIdentification};

const CSW_NS: &str = "http://www.opengis.net/cat/csw/2.0.2";
const OGC_NS: &str = "http://www.opengis.net/ogc";
const OWS_NS: &str = "http://www.opengis.net/ows";
const GML_NS: &str = "http://www.opengis.net/gml";

/// Record element names a response may carry, depending on the element set
/// the server honored.
const RECORD_ELEMENTS: [&str; 3] = ["Record", "SummaryRecord", "BriefRecord"];

// ---------------------------------------------------------------------------
// Request encoding
// ---------------------------------------------------------------------------

/// Encode a GetRecords request for one result page.
///
/// `start_position` is the zero-based offset of the paging state; CSW counts
/// records from 1 on the wire, so the offset is shifted here and nowhere
/// else.
pub(crate) fn get_records_request(
    filter: &SearchFilter,
    page_size: u32,
    start_position: u32,
) -> Result<String, WireError> {
    let mut writer = Writer::new(Vec::new());
    let start = (start_position + 1).to_string();
    let max = page_size.to_string();

    writer
        .create_element("csw:GetRecords")
        .with_attributes([
            ("xmlns:csw", CSW_NS),
            ("xmlns:ogc", OGC_NS),
            ("xmlns:ows", OWS_NS),
            ("xmlns:gml", GML_NS),
            ("service", "CSW"),
            ("version", "2.0.2"),
            ("resultType", "results"),
            ("outputSchema", CSW_NS),
            ("startPosition", start.as_str()),
            ("maxRecords", max.as_str()),
        ])
        .write_inner_content(|w| -> std::io::Result<()> {
            w.create_element("csw:Query")
                .with_attribute(("typeNames", "csw:Record"))
                .write_inner_content(|w| -> std::io::Result<()> {
                    w.create_element("csw:ElementSetName")
                        .write_text_content(BytesText::new("full"))?;
                    write_constraint(w, filter)?;
                    Ok(())
                })?;
            Ok(())
        })
        .map_err(|e| WireError::Xml(e.into()))?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Encode a GetRecordById request for a full record.
pub(crate) fn get_record_by_id_request(identifier: &str) -> Result<String, WireError> {
    let mut writer = Writer::new(Vec::new());

    writer
        .create_element("csw:GetRecordById")
        .with_attributes([
            ("xmlns:csw", CSW_NS),
            ("service", "CSW"),
            ("version", "2.0.2"),
            ("outputSchema", CSW_NS),
        ])
        .write_inner_content(|w| -> std::io::Result<()> {
            w.create_element("csw:Id")
                .write_text_content(BytesText::new(identifier))?;
            w.create_element("csw:ElementSetName")
                .write_text_content(BytesText::new("full"))?;
            Ok(())
        })
        .map_err(|e| WireError::Xml(e.into()))?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_constraint<W: std::io::Write>(
    w: &mut Writer<W>,
    filter: &SearchFilter,
) -> std::io::Result<()> {
    if filter.constraints().is_empty() {
        return Ok(());
    }

    w.create_element("csw:Constraint")
        .with_attribute(("version", "1.1.0"))
        .write_inner_content(|w| -> std::io::Result<()> {
            w.create_element("ogc:Filter")
                .write_inner_content(|w| -> std::io::Result<()> {
                    match filter {
                        SearchFilter::All(constraints) => {
                            w.create_element("ogc:And").write_inner_content(
                                |w| -> std::io::Result<()> {
                                    for constraint in constraints {
                                        write_operator(w, constraint)?;
                                    }
                                    Ok(())
                                },
                            )?;
                        },
                        SearchFilter::Single(constraint) => {
                            write_operator(w, constraint)?;
                        },
                        SearchFilter::Unconstrained => {},
                    }
                    Ok(())
                })?;
            Ok(())
        })?;

    Ok(())
}

fn write_operator<W: std::io::Write>(
    w: &mut Writer<W>,
    constraint: &Constraint,
) -> std::io::Result<()> {
    match constraint {
        Constraint::Bbox(bbox) => {
            let lower = format!("{} {}", bbox.west, bbox.south);
            let upper = format!("{} {}", bbox.east, bbox.north);
            w.create_element("ogc:BBOX")
                .write_inner_content(|w| -> std::io::Result<()> {
                    w.create_element("ogc:PropertyName")
                        .write_text_content(BytesText::new("ows:BoundingBox"))?;
                    w.create_element("gml:Envelope").write_inner_content(
                        |w| -> std::io::Result<()> {
                            w.create_element("gml:lowerCorner")
                                .write_text_content(BytesText::new(&lower))?;
                            w.create_element("gml:upperCorner")
                                .write_text_content(BytesText::new(&upper))?;
                            Ok(())
                        },
                    )?;
                    Ok(())
                })?;
        },
        Constraint::AnyText(text) => {
            let pattern = format!("%{text}%");
            w.create_element("ogc:PropertyIsLike")
                .with_attributes([
                    ("wildCard", "%"),
                    ("singleChar", "_"),
                    ("escapeChar", "\\"),
                ])
                .write_inner_content(|w| -> std::io::Result<()> {
                    w.create_element("ogc:PropertyName")
                        .write_text_content(BytesText::new("csw:AnyText"))?;
                    w.create_element("ogc:Literal")
                        .write_text_content(BytesText::new(&pattern))?;
                    Ok(())
                })?;
        },
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// A decoded record document: GetRecordsResponse or GetRecordByIdResponse.
#[derive(Debug, Default)]
pub(crate) struct RecordsDocument {
    /// `numberOfRecordsMatched`; absent for GetRecordById responses.
    pub matches: Option<u32>,
    /// `numberOfRecordsReturned`; absent for GetRecordById responses.
    pub returned: Option<u32>,
    pub records: Vec<Record>,
}

#[derive(Debug, Default)]
struct RecordBuilder {
    identifier: String,
    title: String,
    type_: Option<String>,
    abstract_: Option<String>,
    lower_corner: Option<String>,
    upper_corner: Option<String>,
    uris: Vec<Link>,
    references: Vec<Link>,
    current_link: Option<Link>,
}

impl RecordBuilder {
    fn finish(self) -> Record {
        Record {
            identifier: self.identifier,
            title: self.title,
            type_: self.type_.unwrap_or_else(|| "unknown".to_string()),
            abstract_: self.abstract_,
            bbox: parse_corners(self.lower_corner.as_deref(), self.upper_corner.as_deref()),
            uris: self.uris,
            references: self.references,
        }
    }
}

/// Decode the record elements and result counts of a response document.
pub(crate) fn parse_records_document(body: &str) -> Result<RecordsDocument, WireError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut document = RecordsDocument::default();
    let mut builder: Option<RecordBuilder> = None;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(&element);
                if name == "SearchResults" {
                    read_counts(&element, &mut document)?;
                } else if RECORD_ELEMENTS.contains(&name.as_str()) {
                    builder = Some(RecordBuilder::default());
                } else if let Some(record) = builder.as_mut() {
                    if name == "URI" || name == "references" {
                        record.current_link = Some(Link {
                            scheme: attr_value(&element, "scheme")?,
                            protocol: attr_value(&element, "protocol")?,
                            url: String::new(),
                        });
                    }
                }
                path.push(name);
            },
            Event::Empty(element) => {
                if element_name(&element) == "SearchResults" {
                    read_counts(&element, &mut document)?;
                }
            },
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                record_text(path.last(), builder.as_mut(), text);
            },
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                record_text(path.last(), builder.as_mut(), text);
            },
            Event::End(_) => {
                if let Some(name) = path.pop() {
                    if let Some(record) = builder.as_mut() {
                        if name == "URI" || name == "references" {
                            push_link(record, name == "URI");
                        }
                    }
                    if RECORD_ELEMENTS.contains(&name.as_str()) {
                        if let Some(record) = builder.take() {
                            document.records.push(record.finish());
                        }
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(document)
}

fn record_text(element: Option<&String>, builder: Option<&mut RecordBuilder>, text: String) {
    let (Some(element), Some(record)) = (element, builder) else {
        return;
    };
    match element.as_str() {
        "identifier" => record.identifier = text,
        "title" => record.title = text,
        "type" => record.type_ = Some(text),
        "abstract" => record.abstract_ = Some(text),
        "LowerCorner" => record.lower_corner = Some(text),
        "UpperCorner" => record.upper_corner = Some(text),
        "URI" | "references" => {
            if let Some(link) = record.current_link.as_mut() {
                link.url = text;
            }
        },
        _ => {},
    }
}

fn push_link(record: &mut RecordBuilder, is_uri: bool) {
    let Some(link) = record.current_link.take() else {
        return;
    };
    if link.url.is_empty() {
        return;
    }
    if is_uri {
        record.uris.push(link);
    } else {
        record.references.push(link);
    }
}

fn read_counts(element: &BytesStart, document: &mut RecordsDocument) -> Result<(), WireError> {
    document.matches = Some(count_attr(element, "numberOfRecordsMatched")?);
    document.returned = Some(count_attr(element, "numberOfRecordsReturned")?);
    Ok(())
}

fn count_attr(element: &BytesStart, attribute: &'static str) -> Result<u32, WireError> {
    let value = attr_value(element, attribute)?.unwrap_or_else(|| "0".to_string());
    value
        .parse::<u32>()
        .map_err(|_| WireError::InvalidCount {
            attribute,
            value,
        })
}

/// Corner texts are "<x> <y>" pairs: lower carries west/south, upper
/// east/north. Records with malformed extents keep `bbox: None` rather than
/// failing the whole page.
fn parse_corners(lower: Option<&str>, upper: Option<&str>) -> Option<BoundingBox> {
    let (west, south) = parse_corner(lower?)?;
    let (east, north) = parse_corner(upper?)?;
    Some(BoundingBox {
        west,
        south,
        east,
        north,
    })
}

fn parse_corner(corner: &str) -> Option<(f64, f64)> {
    let mut parts = corner.split_whitespace();
    let first = parts.next()?.parse().ok()?;
    let second = parts.next()?.parse().ok()?;
    Some((first, second))
}

// ---------------------------------------------------------------------------
// Exception reports
// ---------------------------------------------------------------------------

/// Detect a server fault document.
///
/// Returns `None` for anything that is not an `ows:ExceptionReport` (or the
/// older `ServiceExceptionReport`), including unparseable bodies; those are
/// diagnosed by the caller as decode failures instead.
pub(crate) fn parse_exception_report(body: &str) -> Option<ExceptionReport> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut report: Option<ExceptionReport> = None;
    let mut root_checked = false;
    let mut in_exception_text = false;

    loop {
        match reader.read_event().ok()? {
            Event::Start(element) | Event::Empty(element) => {
                let name = element_name(&element);
                if !root_checked {
                    if name != "ExceptionReport" && name != "ServiceExceptionReport" {
                        return None;
                    }
                    root_checked = true;
                    continue;
                }
                if (name == "Exception" || name == "ServiceException") && report.is_none() {
                    report = Some(ExceptionReport {
                        code: attr_value(&element, "exceptionCode")
                            .ok()
                            .flatten()
                            .or_else(|| attr_value(&element, "code").ok().flatten()),
                        locator: attr_value(&element, "locator").ok().flatten(),
                        text: String::new(),
                    });
                    in_exception_text = name == "ServiceException";
                } else if name == "ExceptionText" {
                    in_exception_text = true;
                }
            },
            Event::Text(text) => {
                if in_exception_text {
                    if let Some(report) = report.as_mut() {
                        if report.text.is_empty() {
                            report.text = text.unescape().ok()?.into_owned();
                        }
                    }
                }
            },
            Event::End(_) => {
                in_exception_text = false;
            },
            Event::Eof => break,
            _ => {},
        }
    }

    report.map(|mut report| {
        if report.text.is_empty() {
            report.text = "service reported an exception".to_string();
        }
        report
    })
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Decode the service identification block of a capabilities document.
pub(crate) fn parse_capabilities(body: &str) -> Result<ServiceIdentification, WireError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut identification = ServiceIdentification::default();
    let mut path: Vec<String> = Vec::new();
    let mut root_checked = false;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                let name = element_name(&element);
                if !root_checked {
                    if !name.ends_with("Capabilities") {
                        return Err(WireError::NotCapabilities(name));
                    }
                    root_checked = true;
                }
                path.push(name);
            },
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                capability_text(&path, &mut identification, text);
            },
            Event::End(_) => {
                path.pop();
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !root_checked {
        return Err(WireError::MissingElement("Capabilities"));
    }

    Ok(identification)
}

fn capability_text(path: &[String], identification: &mut ServiceIdentification, text: String) {
    let in_identification = path.iter().any(|name| name == "ServiceIdentification");
    let in_provider = path.iter().any(|name| name == "ServiceProvider");
    let Some(element) = path.last() else {
        return;
    };

    if in_identification {
        match element.as_str() {
            "Title" => identification.title = Some(text),
            "Abstract" => identification.abstract_ = Some(text),
            "Keyword" => identification.keywords.push(text),
            "ServiceType" => identification.service_type = Some(text),
            "ServiceTypeVersion" => identification.service_type_version = Some(text),
            "Fees" => identification.fees = Some(text),
            "AccessConstraints" => identification.access_constraints = Some(text),
            _ => {},
        }
    } else if in_provider && element == "ProviderName" {
        identification.provider_name = Some(text);
    }
}

fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

fn attr_value(element: &BytesStart, name: &str) -> Result<Option<String>, WireError> {
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attribute.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
