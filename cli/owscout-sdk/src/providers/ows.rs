//! Reachability probe for discovered OWS endpoints.
//!
//! Before a discovered URL is registered it must answer a GetCapabilities
//! request for its kind. Nothing is persisted when the probe fails.

use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::Event;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::services::ServiceKind;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not construct HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("could not reach {kind} service")]
    Connection {
        kind: ServiceKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{kind} service returned status {status}")]
    Status {
        kind: ServiceKind,
        status: http::StatusCode,
    },
    #[error("{kind} service reported an exception: {text}")]
    Exception { kind: ServiceKind, text: String },
    #[error("response is not a {kind} capabilities document (root element '{root}')")]
    NotCapabilities { kind: ServiceKind, root: String },
}

/// Issues GetCapabilities handshakes against candidate service endpoints.
#[derive(Debug, Clone)]
pub struct OwsProbe {
    http: reqwest::Client,
}

impl OwsProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(ProbeError::Client)?;
        Ok(OwsProbe { http })
    }

    /// Require `url` to answer a capabilities request for `kind`.
    #[instrument(skip(self))]
    pub async fn probe(&self, kind: ServiceKind, url: &str) -> Result<(), ProbeError> {
        let response = self
            .http
            .get(url)
            .query(&[
                ("service", kind.query_value()),
                ("request", "GetCapabilities"),
            ])
            .send()
            .await
            .map_err(|source| ProbeError::Connection { kind, source })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ProbeError::Connection { kind, source })?;

        match root_element(&body) {
            Some(root) if root.ends_with("Capabilities") => {
                debug!(%root, "capabilities handshake succeeded");
                Ok(())
            },
            Some(root) if root.ends_with("ExceptionReport") => Err(ProbeError::Exception {
                kind,
                text: exception_text(&body)
                    .unwrap_or_else(|| "service reported an exception".to_string()),
            }),
            _ if !status.is_success() => Err(ProbeError::Status { kind, status }),
            Some(root) => Err(ProbeError::NotCapabilities { kind, root }),
            None => Err(ProbeError::NotCapabilities {
                kind,
                root: "(not XML)".to_string(),
            }),
        }
    }
}

/// Local name of the document's root element, if the body is XML at all.
fn root_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().ok()? {
            Event::Start(element) | Event::Empty(element) => {
                return Some(String::from_utf8_lossy(element.local_name().as_ref()).into_owned());
            },
            Event::Eof => return None,
            _ => {},
        }
    }
}

/// First non-empty text node of an exception document.
fn exception_text(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().ok()? {
            Event::Text(text) => {
                let text = text.unescape().ok()?.into_owned();
                if !text.is_empty() {
                    return Some(text);
                }
            },
            Event::Eof => return None,
            _ => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use indoc::indoc;

    use super::*;

    #[tokio::test]
    async fn accepts_a_capabilities_document() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.query_param("service", "WMS")
                .query_param("request", "GetCapabilities");
            then.status(200)
                .header("content-type", "application/xml")
                .body(r#"<WMS_Capabilities version="1.3.0"></WMS_Capabilities>"#);
        });

        let probe = OwsProbe::new().unwrap();
        probe
            .probe(ServiceKind::Wms, &server.base_url())
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn rejects_an_exception_report() {
        let server = MockServer::start_async().await;
        server.mock(|_when, then| {
            then.status(200)
                .header("content-type", "application/xml")
                .body(indoc! {r#"
                    <ServiceExceptionReport version="1.3.0">
                      <ServiceException code="InvalidRequest">no such layer</ServiceException>
                    </ServiceExceptionReport>
                "#});
        });

        let probe = OwsProbe::new().unwrap();
        let err = probe
            .probe(ServiceKind::Wfs, &server.base_url())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProbeError::Exception { ref text, .. } if text == "no such layer"),
            "found: {err:?}"
        );
    }

    #[tokio::test]
    async fn rejects_non_xml_bodies() {
        let server = MockServer::start_async().await;
        server.mock(|_when, then| {
            then.status(200).body("<html><body>sign in</body></html>");
        });

        let probe = OwsProbe::new().unwrap();
        let err = probe
            .probe(ServiceKind::Wcs, &server.base_url())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProbeError::NotCapabilities { ref root, .. } if root == "html"),
            "found: {err:?}"
        );
    }

    #[tokio::test]
    async fn surfaces_error_statuses() {
        let server = MockServer::start_async().await;
        server.mock(|_when, then| {
            then.status(503).body("maintenance");
        });

        let probe = OwsProbe::new().unwrap();
        let err = probe
            .probe(ServiceKind::Wms, &server.base_url())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProbeError::Status { status, .. } if status.as_u16() == 503),
            "found: {err:?}"
        );
    }
}
