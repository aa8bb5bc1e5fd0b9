use std::time::Duration;

use reqwest::blocking::Client;

use super::ArchiveClient;
use crate::data::loader::{read_csv, sources_from_table};
use crate::data::model::RawRecord;
use crate::error::{PipelineError, PipelineResult};
use crate::query::QueryParameters;

/// Synchronous TAP endpoint of the ESA Gaia archive.
pub const GAIA_TAP_SYNC_URL: &str = "https://gea.esac.esa.int/tap-server/tap/sync";

/// Gaia archive client issuing ADQL cone searches over TAP.
pub struct GaiaTapClient {
    endpoint: String,
    http: Client,
}

impl GaiaTapClient {
    pub fn new() -> PipelineResult<Self> {
        Self::with_endpoint(GAIA_TAP_SYNC_URL)
    }

    /// Point at another TAP `sync` endpoint (a mirror, or a local test server).
    pub fn with_endpoint(endpoint: impl Into<String>) -> PipelineResult<Self> {
        // Large cones can take minutes; the request is left to run.
        let http = Client::builder().timeout(None::<Duration>).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Form fields of a synchronous TAP request.
    pub fn form(params: &QueryParameters) -> Vec<(&'static str, String)> {
        vec![
            ("REQUEST", "doQuery".to_string()),
            ("LANG", "ADQL".to_string()),
            ("FORMAT", "csv".to_string()),
            ("QUERY", params.to_adql()),
        ]
    }
}

/// Turn a TAP response body into source rows.
pub(crate) fn parse_response(body: &str) -> PipelineResult<Vec<RawRecord>> {
    // Errors come back as a VOTable document even when CSV was requested.
    if body.trim_start().starts_with('<') {
        return Err(PipelineError::Query(format!(
            "archive returned an error document: {}",
            body.chars().take(200).collect::<String>()
        )));
    }
    let table = read_csv(body.as_bytes()).map_err(malformed)?;
    if !table.has_column("source_id") {
        return Err(PipelineError::Query(
            "response has no source_id column".into(),
        ));
    }
    sources_from_table(&table).map_err(malformed)
}

fn malformed(e: PipelineError) -> PipelineError {
    PipelineError::Query(format!("malformed archive response: {e}"))
}

impl ArchiveClient for GaiaTapClient {
    fn name(&self) -> &str {
        "Gaia DR3"
    }

    fn cone_search(&self, params: &QueryParameters) -> PipelineResult<Vec<RawRecord>> {
        let form = Self::form(params);
        log::debug!("POST {} QUERY={}", self.endpoint, params.to_adql());

        let response = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .map_err(|e| PipelineError::Query(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(PipelineError::Query(format!(
                "archive returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        parse_response(&body)
    }
}
