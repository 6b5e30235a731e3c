//! Typed client for OGC Catalogue Service for the Web (CSW 2.0.2) endpoints.
//!
//! This crate provides:
//! - HTTP client construction with timeouts and default headers
//! - The three catalogue operations the search workflow needs
//!   (GetCapabilities, GetRecords, GetRecordById)
//! - A filter model for spatial/full-text constraints and its OGC Filter
//!   encoding
//! - A scripted mock client for downstream test suites
//!
//! ## Usage
//!
//! ```ignore
//! use owscout_csw::{ClientTrait, CswClient, CswClientConfig, SearchFilter};
//!
//! let client = CswClient::new(CswClientConfig::new("https://example.org/csw"))?;
//! let page = client.get_records(&SearchFilter::Unconstrained, 10, 0).await?;
//! ```

mod client;
mod config;
mod error;
pub mod filter;
pub mod mock;
mod types;
mod wire;

pub use client::{Client, ClientTrait, CswClient};
pub use config::CswClientConfig;
pub use error::{CswError, ExceptionReport, WireError};
pub use filter::{Constraint, FilterError, SearchFilter, parse_bbox};
pub use mock::MockClient;
pub use types::{BoundingBox, Link, Record, ResultPage, ServiceIdentification};
