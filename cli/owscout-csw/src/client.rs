//! Catalogue client over HTTP.

use std::fmt::Debug;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, instrument};

use crate::config::CswClientConfig;
use crate::error::{CswError, WireError};
use crate::filter::SearchFilter;
use crate::mock::MockClient;
use crate::types::{Record, ResultPage, ServiceIdentification};
use crate::wire;

/// The catalogue operations the search workflow needs.
///
/// The trait is the seam between the workflow and the transport: the CLI
/// and SDK only ever talk to a [`Client`], which is either the HTTP
/// implementation or a scripted mock.
#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait ClientTrait {
    /// Fetch the service identification from the capabilities document.
    async fn capabilities(&self) -> Result<ServiceIdentification, CswError>;

    /// Fetch one page of records matching `filter`.
    ///
    /// `start_position` is a zero-based offset into the result set.
    async fn get_records(
        &self,
        filter: &SearchFilter,
        page_size: u32,
        start_position: u32,
    ) -> Result<ResultPage, CswError>;

    /// Fetch a single record by its identifier.
    async fn get_record_by_id(&self, identifier: &str) -> Result<Record, CswError>;

    /// Fetch the raw response XML of a GetRecordById request.
    async fn get_record_xml(&self, identifier: &str) -> Result<String, CswError>;
}

/// Either a client for a real catalogue endpoint, or a scripted mock.
#[derive(Debug)]
#[enum_dispatch(ClientTrait)]
pub enum Client {
    Csw(CswClient),
    Mock(MockClient),
}

/// HTTP implementation of the catalogue operations.
pub struct CswClient {
    http: reqwest::Client,
    config: CswClientConfig,
}

impl Debug for CswClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CswClient")
            .field("endpoint_url", &self.config.endpoint_url)
            .finish_non_exhaustive()
    }
}

impl CswClient {
    /// Create a new catalogue client from configuration.
    pub fn new(config: CswClientConfig) -> Result<Self, CswError> {
        let http = build_http_client(&config)?;
        Ok(CswClient { http, config })
    }

    /// The configured endpoint URL.
    pub fn endpoint_url(&self) -> &str {
        &self.config.endpoint_url
    }

    async fn post(&self, body: String) -> Result<String, CswError> {
        let response = self
            .http
            .post(&self.config.endpoint_url)
            .header(header::CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(CswError::Connection)?;

        let status = response.status();
        let text = response.text().await.map_err(CswError::Connection)?;

        if !status.is_success() {
            // Faulting servers frequently pair an error status with an
            // exception document; surface the server's message when so.
            if let Some(report) = wire::parse_exception_report(&text) {
                return Err(CswError::Exception(report));
            }
            return Err(CswError::UnexpectedStatus(status));
        }

        Ok(text)
    }

    async fn record_response(&self, identifier: &str) -> Result<String, CswError> {
        let request =
            wire::get_record_by_id_request(identifier).map_err(CswError::InvalidRequest)?;
        let body = self.post(request).await?;
        if let Some(report) = wire::parse_exception_report(&body) {
            return Err(CswError::Exception(report));
        }
        Ok(body)
    }
}

impl ClientTrait for CswClient {
    #[instrument(skip_all, fields(endpoint = %self.config.endpoint_url))]
    async fn capabilities(&self) -> Result<ServiceIdentification, CswError> {
        let response = self
            .http
            .get(&self.config.endpoint_url)
            .query(&[
                ("service", "CSW"),
                ("version", "2.0.2"),
                ("request", "GetCapabilities"),
            ])
            .send()
            .await
            .map_err(CswError::Connection)?;

        let status = response.status();
        let body = response.text().await.map_err(CswError::Connection)?;

        if let Some(report) = wire::parse_exception_report(&body) {
            return Err(CswError::Exception(report));
        }
        if !status.is_success() {
            return Err(CswError::UnexpectedStatus(status));
        }

        wire::parse_capabilities(&body).map_err(CswError::InvalidResponse)
    }

    #[instrument(skip_all, fields(page_size, start_position))]
    async fn get_records(
        &self,
        filter: &SearchFilter,
        page_size: u32,
        start_position: u32,
    ) -> Result<ResultPage, CswError> {
        let request = wire::get_records_request(filter, page_size, start_position)
            .map_err(CswError::InvalidRequest)?;

        let body = self.post(request).await?;
        if let Some(report) = wire::parse_exception_report(&body) {
            return Err(CswError::Exception(report));
        }

        let document = wire::parse_records_document(&body).map_err(CswError::InvalidResponse)?;
        let matches = document.matches.ok_or(CswError::InvalidResponse(
            WireError::MissingElement("csw:SearchResults"),
        ))?;
        let returned = document
            .returned
            .unwrap_or(document.records.len() as u32);

        debug!(matches, returned, "received record page");

        Ok(ResultPage {
            matches,
            returned,
            start_position,
            records: document.records,
        })
    }

    async fn get_record_by_id(&self, identifier: &str) -> Result<Record, CswError> {
        let body = self.record_response(identifier).await?;
        let document = wire::parse_records_document(&body).map_err(CswError::InvalidResponse)?;
        document
            .records
            .into_iter()
            .next()
            .ok_or_else(|| CswError::RecordNotFound(identifier.to_string()))
    }

    async fn get_record_xml(&self, identifier: &str) -> Result<String, CswError> {
        self.record_response(identifier).await
    }
}

fn build_http_client(config: &CswClientConfig) -> Result<reqwest::Client, CswError> {
    let mut headers = HeaderMap::new();
    for (key, value) in &config.extra_headers {
        headers.insert(
            HeaderName::from_str(key).map_err(|e| CswError::Other(e.to_string()))?,
            HeaderValue::from_str(value).map_err(|e| CswError::Other(e.to_string()))?,
        );
    }

    debug!(
        endpoint_url = %config.endpoint_url,
        extra_headers = config.extra_headers.len(),
        "building catalogue HTTP client"
    );

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout);

    if let Some(ref user_agent) = config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }

    builder.build().map_err(|e| CswError::Other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::filter::Constraint;
    use crate::types::BoundingBox;

    fn client(url: String) -> CswClient {
        CswClient::new(CswClientConfig::new(url)).unwrap()
    }

    const EMPTY_RESPONSE: &str = indoc! {r#"
        <csw:GetRecordsResponse xmlns:csw="http://www.opengis.net/cat/csw/2.0.2">
          <csw:SearchResults numberOfRecordsMatched="0" numberOfRecordsReturned="0"/>
        </csw:GetRecordsResponse>
    "#};

    #[tokio::test]
    async fn sends_shifted_paging_parameters() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/csw")
                .body_contains(r#"startPosition="21""#)
                .body_contains(r#"maxRecords="10""#);
            then.status(200)
                .header("content-type", "application/xml")
                .body(EMPTY_RESPONSE);
        });

        let client = client(server.url("/csw"));
        let page = client
            .get_records(&SearchFilter::Unconstrained, 10, 20)
            .await
            .unwrap();
        assert_eq!(page.matches, 0);
        assert_eq!(page.start_position, 20);
        mock.assert();
    }

    #[tokio::test]
    async fn sends_grouped_filter() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .body_contains("<ogc:And>")
                .body_contains("<ogc:Literal>%rivers%</ogc:Literal>");
            then.status(200)
                .header("content-type", "application/xml")
                .body(EMPTY_RESPONSE);
        });

        let filter = SearchFilter::All(vec![
            Constraint::Bbox(BoundingBox {
                west: -10.0,
                south: 40.0,
                east: 5.0,
                north: 55.0,
            }),
            Constraint::AnyText("rivers".to_string()),
        ]);
        let client = client(server.base_url());
        client.get_records(&filter, 10, 0).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn maps_exception_reports_to_service_errors() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|_when, then| {
            then.status(200)
                .header("content-type", "application/xml")
                .body(indoc! {r#"
                    <ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows">
                      <ows:Exception exceptionCode="NoApplicableCode">
                        <ows:ExceptionText>broken query</ows:ExceptionText>
                      </ows:Exception>
                    </ows:ExceptionReport>
                "#});
        });

        let client = client(server.base_url());
        let result = client
            .get_records(&SearchFilter::Unconstrained, 10, 0)
            .await;
        let Err(CswError::Exception(report)) = result else {
            panic!("expected exception, found: {result:?}");
        };
        assert_eq!(report.code.as_deref(), Some("NoApplicableCode"));
        assert_eq!(report.text, "broken query");
        mock.assert();
    }

    #[tokio::test]
    async fn surfaces_unexpected_statuses() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|_when, then| {
            then.status(502).body("bad gateway");
        });

        let client = client(server.base_url());
        let result = client
            .get_records(&SearchFilter::Unconstrained, 10, 0)
            .await;
        assert!(
            matches!(result, Err(CswError::UnexpectedStatus(status)) if status.as_u16() == 502),
            "found: {result:?}"
        );
        mock.assert();
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).body_contains("<csw:Id>gone</csw:Id>");
            then.status(200)
                .header("content-type", "application/xml")
                .body(indoc! {r#"
                    <csw:GetRecordByIdResponse xmlns:csw="http://www.opengis.net/cat/csw/2.0.2"/>
                "#});
        });

        let client = client(server.base_url());
        let result = client.get_record_by_id("gone").await;
        assert!(
            matches!(result, Err(CswError::RecordNotFound(ref id)) if id == "gone"),
            "found: {result:?}"
        );
        mock.assert();
    }

    #[tokio::test]
    async fn fetches_capabilities_via_kvp_get() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.query_param("request", "GetCapabilities")
                .query_param("service", "CSW");
            then.status(200)
                .header("content-type", "application/xml")
                .body(indoc! {r#"
                    <csw:Capabilities xmlns:csw="http://www.opengis.net/cat/csw/2.0.2"
                        xmlns:ows="http://www.opengis.net/ows">
                      <ows:ServiceIdentification>
                        <ows:Title>Demo</ows:Title>
                      </ows:ServiceIdentification>
                    </csw:Capabilities>
                "#});
        });

        let client = client(server.base_url());
        let identification = client.capabilities().await.unwrap();
        assert_eq!(identification.title.as_deref(), Some("Demo"));
        mock.assert();
    }

    #[tokio::test]
    async fn extra_headers_are_sent_on_requests() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.header("x-catalogue-tenant", "demo");
            then.status(200)
                .header("content-type", "application/xml")
                .body(EMPTY_RESPONSE);
        });

        let mut config = CswClientConfig::new(server.base_url());
        config
            .extra_headers
            .insert("x-catalogue-tenant".to_string(), "demo".to_string());
        let client = CswClient::new(config).unwrap();
        client
            .get_records(&SearchFilter::Unconstrained, 10, 0)
            .await
            .unwrap();
        mock.assert();
    }
}
