use std::time::Duration;

use thiserror::Error;
use ureq::tls::{TlsConfig, TlsProvider};
use url::Url;

use crate::config::PvOutputSettings;
use crate::data_mgmt::{models::UploadRecord, publish::StatusSink};

const ADD_STATUS_PATH: &str = "/service/r2/addstatus.jsp";
const API_KEY_HEADER: &str = "X-Pvoutput-Apikey";
const SYSTEM_ID_HEADER: &str = "X-Pvoutput-SystemId";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Http(#[from] ureq::Error),
    #[error("PVOutput rejected status (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid PVOutput base URL: {0}")]
    Url(#[from] url::ParseError),
}

pub struct PvOutputClient {
    agent: ureq::Agent,
    endpoint: Url,
    api_key: String,
    system_id: String,
}

fn get_ureq_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .tls_config(
            TlsConfig::builder()
                .provider(TlsProvider::NativeTls)
                .build(),
        )
        .build();
    ureq::Agent::new_with_config(config)
}

impl PvOutputClient {
    pub fn new(settings: &PvOutputSettings) -> Result<Self, UploadError> {
        let endpoint = Url::parse(&settings.base_url)?.join(ADD_STATUS_PATH)?;
        log::debug!("PVOutput status endpoint: {endpoint}");
        Ok(Self {
            agent: get_ureq_agent(settings.request_timeout),
            endpoint,
            api_key: settings.api_key.clone(),
            system_id: settings.system_id.clone(),
        })
    }

    pub fn add_status(&self, record: &UploadRecord) -> Result<(), UploadError> {
        let mut response = self
            .agent
            .post(self.endpoint.as_str())
            .header(API_KEY_HEADER, &self.api_key)
            .header(SYSTEM_ID_HEADER, &self.system_id)
            .send_form(record.form_fields())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .body_mut()
            .read_to_string()
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

impl StatusSink for PvOutputClient {
    type Error = UploadError;

    fn add_status(&self, record: &UploadRecord) -> Result<(), UploadError> {
        PvOutputClient::add_status(self, record)
    }
}
