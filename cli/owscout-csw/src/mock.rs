//! A catalogue client that can be seeded with scripted responses.
//!
//! Responses are consumed in the order they were pushed, regardless of the
//! operation that consumes them; a mismatch between the scripted response
//! and the operation is a test bug and panics.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::client::ClientTrait;
use crate::error::{CswError, ExceptionReport};
use crate::filter::SearchFilter;
use crate::types::{Record, ResultPage, ServiceIdentification};

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Response {
    Capabilities(ServiceIdentification),
    Records(ResultPage),
    Record(Record),
    RecordXml(String),
    /// Served as a [`CswError::Exception`] for any operation.
    Exception(ExceptionReport),
    /// Served as a connection-style failure for any operation.
    Unreachable(String),
}

#[derive(Debug, Default, Clone)]
pub struct MockClient {
    // Mutex so responses can be drained through the shared-reference trait
    // methods.
    responses: Arc<Mutex<VecDeque<Response>>>,
}

impl MockClient {
    pub fn new() -> Self {
        MockClient::default()
    }

    pub fn push_capabilities_response(&self, identification: ServiceIdentification) {
        self.push(Response::Capabilities(identification));
    }

    pub fn push_records_response(&self, page: ResultPage) {
        self.push(Response::Records(page));
    }

    pub fn push_record_response(&self, record: Record) {
        self.push(Response::Record(record));
    }

    pub fn push_record_xml_response(&self, body: impl Into<String>) {
        self.push(Response::RecordXml(body.into()));
    }

    pub fn push_exception_response(&self, report: ExceptionReport) {
        self.push(Response::Exception(report));
    }

    pub fn push_unreachable_response(&self, message: impl Into<String>) {
        self.push(Response::Unreachable(message.into()));
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining_responses(&self) -> usize {
        self.responses
            .lock()
            .expect("couldn't acquire mock lock")
            .len()
    }

    fn push(&self, response: Response) {
        self.responses
            .lock()
            .expect("couldn't acquire mock lock")
            .push_back(response);
    }

    fn next_response(&self, operation: &str) -> Response {
        self.responses
            .lock()
            .expect("couldn't acquire mock lock")
            .pop_front()
            .unwrap_or_else(|| panic!("no mock response scripted for {operation}"))
    }
}

impl ClientTrait for MockClient {
    async fn capabilities(&self) -> Result<ServiceIdentification, CswError> {
        match self.next_response("capabilities") {
            Response::Capabilities(identification) => Ok(identification),
            Response::Exception(report) => Err(CswError::Exception(report)),
            Response::Unreachable(message) => Err(CswError::Other(message)),
            other => panic!("unexpected mock response for capabilities: {other:?}"),
        }
    }

    async fn get_records(
        &self,
        _filter: &SearchFilter,
        _page_size: u32,
        start_position: u32,
    ) -> Result<ResultPage, CswError> {
        match self.next_response("get_records") {
            Response::Records(mut page) => {
                page.start_position = start_position;
                Ok(page)
            },
            Response::Exception(report) => Err(CswError::Exception(report)),
            Response::Unreachable(message) => Err(CswError::Other(message)),
            other => panic!("unexpected mock response for get_records: {other:?}"),
        }
    }

    async fn get_record_by_id(&self, identifier: &str) -> Result<Record, CswError> {
        match self.next_response("get_record_by_id") {
            Response::Record(record) => Ok(record),
            Response::Exception(report) => Err(CswError::Exception(report)),
            Response::Unreachable(message) => Err(CswError::Other(message)),
            other => {
                panic!("unexpected mock response for get_record_by_id({identifier}): {other:?}")
            },
        }
    }

    async fn get_record_xml(&self, identifier: &str) -> Result<String, CswError> {
        match self.next_response("get_record_xml") {
            Response::RecordXml(body) => Ok(body),
            Response::Exception(report) => Err(CswError::Exception(report)),
            Response::Unreachable(message) => Err(CswError::Other(message)),
            other => {
                panic!("unexpected mock response for get_record_xml({identifier}): {other:?}")
            },
        }
    }
}
