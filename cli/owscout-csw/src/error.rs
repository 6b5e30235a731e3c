//! Error handling for catalogue operations.

use std::fmt::{self, Display};

use thiserror::Error;

/// Common error type for catalogue operations.
///
/// Transport failures and server faults are kept distinct so that callers
/// can report "could not reach the service" separately from "the service
/// rejected the request", which also differ in how much session state may
/// be kept (a server fault leaves the previous result page valid).
#[derive(Debug, Error)]
pub enum CswError {
    #[error("could not reach catalogue service")]
    Connection(#[source] reqwest::Error),
    #[error("catalogue service reported an error: {0}")]
    Exception(ExceptionReport),
    #[error("could not encode catalogue request")]
    InvalidRequest(#[source] WireError),
    #[error("could not decode catalogue response")]
    InvalidResponse(#[source] WireError),
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(http::StatusCode),
    #[error("no record with identifier '{0}'")]
    RecordNotFound(String),
    #[error("{0}")]
    Other(String),
}

/// A fault reported by the server in an `ows:ExceptionReport` document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    /// The `exceptionCode` attribute, e.g. `InvalidParameterValue`.
    pub code: Option<String>,
    /// The `locator` attribute naming the offending parameter, if any.
    pub locator: Option<String>,
    /// Server-supplied message text.
    pub text: String,
}

impl Display for ExceptionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.locator) {
            (Some(code), Some(locator)) => write!(f, "{} ({}: {})", self.text, code, locator),
            (Some(code), None) => write!(f, "{} ({})", self.text, code),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// Failures while encoding requests or decoding response documents.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed XML attribute")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("response is missing the '{0}' element")]
    MissingElement(&'static str),
    #[error("'{attribute}' is not an integer: '{value}'")]
    InvalidCount { attribute: &'static str, value: String },
    #[error("expected a capabilities document, found '{0}'")]
    NotCapabilities(String),
}
